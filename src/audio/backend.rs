use anyhow::Result;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for the agent's speech input
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// A live capture track that can be released
pub trait CaptureTrack: Send {
    /// Stop capturing. Must be idempotent.
    fn stop(&mut self);
}

/// An acquired input stream: captured frames plus the track that produces them.
///
/// Dropping the stream stops the track, so a stream acquired for a session that
/// has already closed is released even if nobody installs it.
pub struct MediaStream {
    pub frames: mpsc::Receiver<AudioFrame>,
    track: Option<Box<dyn CaptureTrack>>,
}

impl MediaStream {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, track: Box<dyn CaptureTrack>) -> Self {
        Self {
            frames,
            track: Some(track),
        }
    }

    /// Split into the frame receiver and a guard that stops the track when dropped
    pub fn into_parts(mut self) -> (mpsc::Receiver<AudioFrame>, TrackGuard) {
        let track = self.track.take();
        let (dummy_tx, dummy_rx) = mpsc::channel(1);
        drop(dummy_tx);
        let frames = std::mem::replace(&mut self.frames, dummy_rx);
        (frames, TrackGuard { track })
    }

    pub fn stop(&mut self) {
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns an installed capture track
pub struct TrackGuard {
    track: Option<Box<dyn CaptureTrack>>,
}

impl TrackGuard {
    pub fn stop(&mut self) {
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
    }
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Media acquisition backend
///
/// Implementations:
/// - File: paced playback of a WAV file (rehearsal/testing)
/// - Device: default microphone via cpal (`device` feature)
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire the input stream. May suspend while permissions or devices are negotiated.
    async fn acquire(&self, config: &CaptureConfig) -> Result<MediaStream>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Media backend factory
pub struct MediaBackendFactory;

impl MediaBackendFactory {
    /// Create media backend based on platform and configuration
    pub fn create(source: AudioSource) -> Result<Box<dyn MediaDevices>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "device")]
                {
                    Ok(Box::new(super::device::DeviceMedia::new()))
                }

                #[cfg(not(feature = "device"))]
                {
                    anyhow::bail!(
                        "Microphone capture requires the `device` feature; use a WAV input file instead"
                    )
                }
            }

            AudioSource::File(path) => Ok(Box::new(super::file::WavFileMedia::new(path))),
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default microphone (`device` feature)
    Microphone,
    /// WAV file input (for rehearsal/testing)
    File(String),
}
