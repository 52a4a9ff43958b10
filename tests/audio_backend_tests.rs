// Unit tests for audio backend abstractions
//
// These tests verify the capture types, stream ownership and the backend factory.

use live_interview::audio::{
    AudioFrame, AudioSource, CaptureConfig, CaptureTrack, MediaBackendFactory, MediaDevices,
    MediaStream, PlaybackQueue,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct CountingTrack(Arc<AtomicU32>);

impl CaptureTrack for CountingTrack {
    fn stop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn stream() -> (MediaStream, Arc<AtomicU32>, mpsc::Sender<AudioFrame>) {
    let stops = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::channel(4);
    (
        MediaStream::new(rx, Box::new(CountingTrack(Arc::clone(&stops)))),
        stops,
        tx,
    )
}

#[test]
fn test_capture_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.target_sample_rate, 16000, "Default should be 16kHz for the agent");
    assert_eq!(config.target_channels, 1, "Default should be mono");
    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
}

#[test]
fn test_audio_frame_timing_calculation() {
    let frame = AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    // Duration in seconds = samples / (sample_rate * channels)
    let duration_secs = frame.samples.len() as f64 / (frame.sample_rate as f64 * frame.channels as f64);
    assert!((duration_secs - 0.1).abs() < 0.001, "Duration should be 100ms");
}

#[test]
fn test_dropping_stream_stops_track() {
    let (stream, stops, _tx) = stream();
    drop(stream);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_is_idempotent() {
    let (mut stream, stops, _tx) = stream();
    stream.stop();
    stream.stop();
    drop(stream);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_installed_stream_is_stopped_by_guard() {
    let (stream, stops, tx) = stream();
    let (mut frames, guard) = stream.into_parts();

    // Splitting neither stops the track nor disconnects the frames
    assert_eq!(stops.load(Ordering::SeqCst), 0);
    tx.send(AudioFrame {
        samples: vec![1, 2, 3],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    })
    .await
    .unwrap();
    assert_eq!(frames.recv().await.unwrap().samples, vec![1, 2, 3]);

    drop(guard);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_factory_creates_file_backend() {
    let media = MediaBackendFactory::create(AudioSource::File("answer.wav".to_string())).unwrap();
    assert_eq!(media.name(), "wav-file");
}

#[cfg(not(feature = "device"))]
#[test]
fn test_factory_microphone_requires_device_feature() {
    let err = MediaBackendFactory::create(AudioSource::Microphone).err().unwrap();
    assert!(err.to_string().contains("device"));
}

#[test]
fn test_playback_queue_clear_rewinds_cursor() {
    let mut queue = PlaybackQueue::new();
    queue.schedule(1.0, 0.0);
    queue.schedule(1.0, 0.0);
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.cursor(), 2.0);

    assert_eq!(queue.clear(0.5), 2);
    assert!(queue.is_empty());
    // The next segment starts now, not after the discarded ones
    assert_eq!(queue.schedule(1.0, 0.5).start, 0.5);
}
