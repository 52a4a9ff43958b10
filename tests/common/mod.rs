// Shared fakes for the integration tests: an in-memory agent transport and a
// scripted capture backend.

#![allow(dead_code)]

use anyhow::{bail, Result};
use live_interview::agent::{AgentLink, AgentTransport, LinkEvent, LinkPeer, SetupConfig};
use live_interview::agent::messages::{
    Blob, Content, FunctionCall, Part, ServerContent, ServerMessage, ToolCall, Transcription,
};
use live_interview::audio::{
    AudioFrame, AudioSink, CaptureConfig, CaptureTrack, ClockSink, MediaDevices, MediaStream,
};
use live_interview::session::{self, SessionDeps, SessionHandle, SessionSettings, SinkFactory};
use live_interview::{JobRole, Language, SessionConfig};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Transport whose links are plain channel pairs handed to the test
pub struct MockTransport {
    connects: AtomicU32,
    failures: u32,
    delay: Duration,
    peers: mpsc::UnboundedSender<LinkPeer>,
}

impl MockTransport {
    /// Fails the first `failures` attempts, then succeeds
    pub fn new(failures: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<LinkPeer>) {
        Self::with_delay(failures, Duration::ZERO)
    }

    /// Never connects
    pub fn unreachable() -> Arc<Self> {
        Self::new(u32::MAX).0
    }

    pub fn with_delay(
        failures: u32,
        delay: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LinkPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                connects: AtomicU32::new(0),
                failures,
                delay,
                peers: tx,
            }),
            rx,
        )
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AgentTransport for MockTransport {
    async fn connect(&self, _setup: &SetupConfig) -> Result<AgentLink> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if attempt <= self.failures {
            bail!("connection refused (attempt {})", attempt);
        }

        let (link, peer) = AgentLink::pair();
        let _ = self.peers.send(peer);
        Ok(link)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Capture backend that hands out a stream the test can feed
pub struct MockMedia {
    delay: Duration,
    fail: bool,
    acquisitions: AtomicU32,
    stopped: Arc<AtomicBool>,
    frames: Mutex<Option<mpsc::Sender<AudioFrame>>>,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Self::build(Duration::ZERO, false)
    }

    pub fn denied() -> Arc<Self> {
        Self::build(Duration::ZERO, true)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(delay, false)
    }

    fn build(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail,
            acquisitions: AtomicU32::new(0),
            stopped: Arc::new(AtomicBool::new(false)),
            frames: Mutex::new(None),
        })
    }

    pub fn acquisitions(&self) -> u32 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Feed side of the most recently acquired stream
    pub fn sender(&self) -> Option<mpsc::Sender<AudioFrame>> {
        self.frames.lock().unwrap().clone()
    }
}

struct FlagTrack(Arc<AtomicBool>);

impl CaptureTrack for FlagTrack {
    fn stop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MediaDevices for MockMedia {
    async fn acquire(&self, _config: &CaptureConfig) -> Result<MediaStream> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            bail!("permission denied");
        }

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        *self.frames.lock().unwrap() = Some(tx);
        Ok(MediaStream::new(rx, Box::new(FlagTrack(Arc::clone(&self.stopped)))))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn candidate() -> SessionConfig {
    SessionConfig::new("Asha Rao", JobRole::SdeIntern, Language::English).unwrap()
}

pub fn clock_sinks() -> SinkFactory {
    Arc::new(|| -> Result<Box<dyn AudioSink>> { Ok(Box::new(ClockSink::new())) })
}

pub fn start_session(
    settings: SessionSettings,
    transport: Arc<MockTransport>,
    media: Arc<MockMedia>,
) -> SessionHandle {
    session::start(
        candidate(),
        settings,
        SessionDeps {
            transport,
            media,
            sink: Box::new(ClockSink::new()),
        },
    )
}

// ============================================================================
// Agent-side message builders
// ============================================================================

pub async fn say(peer: &LinkPeer, msg: ServerMessage) {
    peer.events
        .send(LinkEvent::Message(msg))
        .await
        .expect("session dropped its link");
}

pub fn user_said(text: &str) -> ServerMessage {
    ServerMessage {
        server_content: Some(ServerContent {
            input_transcription: Some(Transcription {
                text: Some(text.to_string()),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn agent_said(text: &str) -> ServerMessage {
    ServerMessage {
        server_content: Some(ServerContent {
            output_transcription: Some(Transcription {
                text: Some(text.to_string()),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn turn_complete() -> ServerMessage {
    ServerMessage {
        server_content: Some(ServerContent {
            turn_complete: true,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Agent audio at 24kHz; `samples` of a constant tone
pub fn agent_audio(samples: usize) -> ServerMessage {
    use base64::Engine;
    let bytes: Vec<u8> = std::iter::repeat(1000i16)
        .take(samples)
        .flat_map(|s| s.to_le_bytes())
        .collect();
    ServerMessage {
        server_content: Some(ServerContent {
            model_turn: Some(Content {
                role: Some("model".to_string()),
                parts: vec![Part {
                    text: None,
                    inline_data: Some(Blob {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    }),
                }],
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn decision(id: &str, passed: bool, reason: &str) -> ServerMessage {
    ServerMessage {
        tool_call: Some(ToolCall {
            function_calls: vec![FunctionCall {
                id: id.to_string(),
                name: "notifyResult".to_string(),
                args: json!({ "passed": passed, "reason": reason }),
            }],
        }),
        ..Default::default()
    }
}

/// Drain everything the session has sent so far
pub fn drain(peer: &mut LinkPeer) -> Vec<live_interview::agent::ClientMessage> {
    let mut sent = Vec::new();
    while let Ok(msg) = peer.outgoing.try_recv() {
        sent.push(msg);
    }
    sent
}

/// Directive texts among the sent messages
pub fn directives(sent: &[live_interview::agent::ClientMessage]) -> Vec<String> {
    sent.iter()
        .filter_map(|m| m.directive_text().map(str::to_string))
        .collect()
}
