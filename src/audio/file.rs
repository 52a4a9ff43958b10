use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioFrame, CaptureConfig, CaptureTrack, MediaDevices, MediaStream};
use super::convert::normalize_frame;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Convert to the capture format in one pass
    pub fn to_capture_format(&self, config: &CaptureConfig) -> Vec<i16> {
        let frame = AudioFrame {
            samples: self.samples.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp_ms: 0,
        };
        normalize_frame(frame, config.target_sample_rate, config.target_channels).samples
    }
}

/// Media backend that replays a WAV file as if it were a microphone.
///
/// Frames are paced in real time; once the file is exhausted the stream keeps
/// delivering silence so silence handling can be rehearsed.
pub struct WavFileMedia {
    path: String,
}

impl WavFileMedia {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl MediaDevices for WavFileMedia {
    async fn acquire(&self, config: &CaptureConfig) -> Result<MediaStream> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("WAV loader panicked")??;

        let samples = file.to_capture_format(config);
        let buffer_ms = config.buffer_duration_ms.max(1);
        let frame_len =
            (config.target_sample_rate as u64 * buffer_ms / 1000).max(1) as usize * config.target_channels as usize;
        let sample_rate = config.target_sample_rate;
        let channels = config.target_channels;

        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(buffer_ms));
            let mut offset = 0usize;
            let mut timestamp_ms = 0u64;
            let mut announced_eof = false;

            loop {
                ticker.tick().await;

                let chunk = if offset < samples.len() {
                    let end = (offset + frame_len).min(samples.len());
                    let mut chunk = samples[offset..end].to_vec();
                    chunk.resize(frame_len, 0);
                    offset = end;
                    chunk
                } else {
                    if !announced_eof {
                        info!("Input file exhausted, continuing with silence");
                        announced_eof = true;
                    }
                    vec![0; frame_len]
                };

                let frame = AudioFrame {
                    samples: chunk,
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms += buffer_ms;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        info!(
            "File capture started: {} ({:.1}s @ {}Hz)",
            self.path, file.duration_seconds, sample_rate
        );

        Ok(MediaStream::new(rx, Box::new(FileTrack { task: Some(task) })))
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

struct FileTrack {
    task: Option<JoinHandle<()>>,
}

impl CaptureTrack for FileTrack {
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped");
        }
    }
}
