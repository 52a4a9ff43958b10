pub mod backend;
pub mod codec;
pub mod convert;
pub mod file;
pub mod level;
pub mod playback;

#[cfg(feature = "device")]
pub mod device;

pub use backend::{
    AudioFrame, AudioSource, CaptureConfig, CaptureTrack, MediaBackendFactory, MediaDevices,
    MediaStream, TrackGuard,
};
pub use codec::FrameSlicer;
pub use file::{AudioFile, WavFileMedia};
pub use level::VolumeMeter;
pub use playback::{AudioSink, ClockSink, PlaybackQueue, ScheduledSegment, SegmentId};
