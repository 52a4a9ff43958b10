use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Service configuration, loaded from `config/live-interview.toml` and
/// `LIVE_INTERVIEW__*` environment variables. Every field has a default, so an
/// empty (or missing) file yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub agent: AgentConfig,
    pub audio: AudioConfig,
    pub interview: InterviewConfig,
    pub retry: RetryConfig,
    pub recruiter: RecruiterConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "live-interview".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Seconds a finished interview stays available to the API
    pub retention_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
            retention_secs: 3600,
        }
    }
}

/// Remote conversational agent endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// WebSocket endpoint of the live agent service
    pub url: String,
    /// API key, appended as the `key` query parameter (usually set via env)
    pub api_key: String,
    pub model: String,
    pub voice: String,
    /// Maximum time to wait for the session setup handshake
    pub connect_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            api_key: String::new(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice: "Kore".to_string(),
            connect_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate sent to the agent
    pub input_sample_rate: u32,
    /// Sample rate assumed for agent audio without a `rate=` mime parameter
    pub output_sample_rate: u32,
    /// Samples per encoded frame sent upstream
    pub frame_samples: usize,
    /// Period of the input level sampling tick
    pub sample_interval_ms: u64,
    /// Input level (0-255) above which the candidate counts as speaking
    pub speech_threshold: f32,
    /// Capture from this WAV file instead of the microphone
    pub input_file: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            frame_samples: 4096,
            sample_interval_ms: 50,
            speech_threshold: 20.0,
            input_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    pub duration_secs: u32,
    pub silence_timeout_secs: u64,
    pub max_strikes: u32,
    pub max_interruptions: u32,
    pub grace_secs: u64,
    /// How long the agent gets to deliver a forced failure before the session ends anyway
    pub forced_failure_secs: u64,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            duration_secs: 300,
            silence_timeout_secs: 8,
            max_strikes: 3,
            max_interruptions: 3,
            grace_secs: 10,
            forced_failure_secs: 10,
        }
    }
}

impl InterviewConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn forced_failure_timeout(&self) -> Duration {
        Duration::from_secs(self.forced_failure_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            max_retries: 5,
        }
    }
}

/// Persona and contact details presented to the candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecruiterConfig {
    pub name: String,
    pub company: String,
    pub ceo_name: String,
    pub phone: String,
    pub email: String,
}

impl Default for RecruiterConfig {
    fn default() -> Self {
        Self {
            name: "Sarah".to_string(),
            company: "Cehpoint".to_string(),
            ceo_name: "Mr. Banerjee".to_string(),
            phone: "9091156095".to_string(),
            email: "hr@cehpoint.co.in".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Webhook receiving the flat interview record; disabled when unset
    pub webhook_url: Option<String>,
    /// Directory for exported interview logs
    pub log_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            log_dir: "interviews".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LIVE_INTERVIEW").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
