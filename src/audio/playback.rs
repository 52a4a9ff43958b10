// Gapless playback scheduling for agent audio
//
// Segments are placed on the output clock back to back: each one starts at
// max(clock_now, cursor) and pushes the cursor forward by its duration. A
// segment that arrives late plays immediately instead of stalling the queue.

use tokio::time::Instant;
use tracing::debug;

pub type SegmentId = u64;

/// A segment placed on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSegment {
    pub id: SegmentId,
    /// Start offset on the output clock, in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl ScheduledSegment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// In-flight agent audio and the next start offset
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    cursor: f64,
    segments: Vec<ScheduledSegment>,
    next_id: SegmentId,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a segment of `duration` seconds given the output clock reading `now`
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledSegment {
        if self.cursor < now {
            self.cursor = now;
        }

        let segment = ScheduledSegment {
            id: self.next_id,
            start: self.cursor,
            duration,
        };
        self.next_id += 1;
        self.cursor += duration;
        self.segments.push(segment);

        debug!(
            "Scheduled segment {} at {:.3}s ({:.3}s long, {} in flight)",
            segment.id,
            segment.start,
            segment.duration,
            self.segments.len()
        );

        segment
    }

    /// Drop segments whose end has passed; returns how many finished
    pub fn reap(&mut self, now: f64) -> usize {
        let before = self.segments.len();
        self.segments.retain(|s| s.end() > now);
        before - self.segments.len()
    }

    /// Discard every segment (barge-in or teardown); returns how many were discarded.
    ///
    /// The cursor falls back to `now` so the next segment is not delayed by
    /// audio that will never play.
    pub fn clear(&mut self, now: f64) -> usize {
        let discarded = self.segments.len();
        self.segments.clear();
        if self.cursor > now {
            self.cursor = now;
        }
        discarded
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }
}

/// Output device abstraction
pub trait AudioSink: Send {
    /// Current output clock reading, in seconds
    fn clock(&self) -> f64;

    /// Play mono PCM16 samples starting at `start_at` on the output clock
    fn play(&mut self, id: SegmentId, samples: &[i16], sample_rate: u32, start_at: f64);

    /// Stop everything queued or playing
    fn stop_all(&mut self);

    /// Release the output device
    fn close(&mut self);
}

/// Sink that keeps an output clock but discards audio (headless runs, tests)
pub struct ClockSink {
    origin: Instant,
    closed: bool,
}

impl ClockSink {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            closed: false,
        }
    }
}

impl Default for ClockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for ClockSink {
    fn clock(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn play(&mut self, id: SegmentId, samples: &[i16], sample_rate: u32, start_at: f64) {
        if self.closed {
            return;
        }
        debug!(
            "Discarding segment {} ({} samples @ {}Hz, start {:.3}s)",
            id,
            samples.len(),
            sample_rate,
            start_at
        );
    }

    fn stop_all(&mut self) {}

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_back_segments_have_no_gap() {
        let mut queue = PlaybackQueue::new();
        let first = queue.schedule(0.5, 0.0);
        // Arrives 200ms later, while the first is still playing
        let second = queue.schedule(0.25, 0.2);

        assert_eq!(first.start, 0.0);
        assert_eq!(second.start, first.start + first.duration);
        assert_eq!(queue.cursor(), 0.75);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_late_segment_plays_immediately() {
        let mut queue = PlaybackQueue::new();
        queue.schedule(0.5, 0.0);
        let late = queue.schedule(0.5, 3.0);
        assert_eq!(late.start, 3.0);
        assert_eq!(queue.cursor(), 3.5);
    }

    #[test]
    fn test_reap_removes_finished_segments() {
        let mut queue = PlaybackQueue::new();
        queue.schedule(1.0, 0.0);
        queue.schedule(1.0, 0.0);

        assert_eq!(queue.reap(0.5), 0);
        assert_eq!(queue.reap(1.0), 1);
        assert!(!queue.is_empty());
        assert_eq!(queue.reap(2.5), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_discards_and_rewinds_cursor() {
        let mut queue = PlaybackQueue::new();
        queue.schedule(2.0, 0.0);
        queue.schedule(2.0, 0.0);

        assert_eq!(queue.clear(1.0), 2);
        assert!(queue.is_empty());
        let next = queue.schedule(0.5, 1.2);
        assert_eq!(next.start, 1.2);
    }

    #[test]
    fn test_segment_ids_are_unique() {
        let mut queue = PlaybackQueue::new();
        let a = queue.schedule(0.1, 0.0);
        let b = queue.schedule(0.1, 0.0);
        assert_ne!(a.id, b.id);
    }
}
