// Microphone capture (cpal) and speaker playback (rodio)
//
// Both cpal streams and rodio output streams are !Send, so each lives on a
// dedicated thread and is driven through channels.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::time::Instant as StdInstant;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureConfig, CaptureTrack, MediaDevices, MediaStream};
use super::playback::{AudioSink, SegmentId};

/// Default input device
pub struct DeviceMedia;

impl DeviceMedia {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeviceMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaDevices for DeviceMedia {
    async fn acquire(&self, _config: &CaptureConfig) -> Result<MediaStream> {
        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(frame_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Park until stopped or the track is dropped
                let _ = stop_rx.recv();
                drop(stream);
                info!("Microphone capture stopped");
            })
            .context("Failed to spawn capture thread")?;

        ready_rx.await.context("Capture thread exited early")??;

        Ok(MediaStream::new(
            frame_rx,
            Box::new(DeviceTrack { stop: Some(stop_tx) }),
        ))
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn build_input_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_input_device()
        .context("No input device available")?;

    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .default_input_config()
        .context("Failed to query input config")?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let stream_config: cpal::StreamConfig = supported.config();
    let started = StdInstant::now();

    let err_fn = |err| warn!("Audio stream error: {}", err);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = data
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                let _ = frame_tx.try_send(AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                });
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = frame_tx.try_send(AudioFrame {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                });
            },
            err_fn,
            None,
        )?,
        other => bail!("Unsupported input sample format: {:?}", other),
    };

    stream.play().context("Failed to start input stream")?;
    info!("Microphone capture started ({}Hz, {} channels)", sample_rate, channels);

    Ok(stream)
}

struct DeviceTrack {
    stop: Option<std_mpsc::Sender<()>>,
}

impl CaptureTrack for DeviceTrack {
    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

enum SinkCommand {
    Play { samples: Vec<i16>, sample_rate: u32 },
    StopAll,
    Close,
}

/// Default output device.
///
/// rodio plays appended buffers back to back, which matches the queue's
/// contiguous schedule; the output clock is wall time since the sink opened.
pub struct DeviceSink {
    commands: std_mpsc::Sender<SinkCommand>,
    origin: Instant,
}

impl DeviceSink {
    pub fn open() -> Result<Self> {
        let (commands, rx) = std_mpsc::channel::<SinkCommand>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("speaker".to_string())
            .spawn(move || {
                let (_stream, handle) = match rodio::OutputStream::try_default() {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::anyhow!("No output device: {}", e)));
                        return;
                    }
                };
                let new_sink = || rodio::Sink::try_new(&handle);
                let mut sink = match new_sink() {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::anyhow!("Failed to open sink: {}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while let Ok(command) = rx.recv() {
                    match command {
                        SinkCommand::Play { samples, sample_rate } => {
                            sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, samples));
                        }
                        SinkCommand::StopAll => {
                            sink.stop();
                            match new_sink() {
                                Ok(fresh) => sink = fresh,
                                Err(e) => {
                                    error!("Failed to reopen output sink: {}", e);
                                    break;
                                }
                            }
                        }
                        SinkCommand::Close => break,
                    }
                }
                info!("Speaker output closed");
            })
            .context("Failed to spawn output thread")?;

        ready_rx.recv().context("Output thread exited early")??;

        Ok(Self {
            commands,
            origin: Instant::now(),
        })
    }
}

impl AudioSink for DeviceSink {
    fn clock(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn play(&mut self, _id: SegmentId, samples: &[i16], sample_rate: u32, _start_at: f64) {
        let _ = self.commands.send(SinkCommand::Play {
            samples: samples.to_vec(),
            sample_rate,
        });
    }

    fn stop_all(&mut self) {
        let _ = self.commands.send(SinkCommand::StopAll);
    }

    fn close(&mut self) {
        let _ = self.commands.send(SinkCommand::Close);
    }
}
