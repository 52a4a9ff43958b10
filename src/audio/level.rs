// Rolling input level meter
//
// The level is the RMS of the most recent window of samples, expressed in
// dBFS and mapped linearly onto 0-255 over the -60..0 dB range. Anything
// quieter than -60 dBFS reads as 0.

use std::collections::VecDeque;

const FLOOR_DB: f32 = -60.0;
const MAX_LEVEL: f32 = 255.0;

/// Default window: 64ms at 16kHz
pub const DEFAULT_WINDOW: usize = 1024;

#[derive(Debug, Clone)]
pub struct VolumeMeter {
    window: VecDeque<i16>,
    capacity: usize,
}

impl VolumeMeter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Feed newly captured samples
    pub fn push(&mut self, samples: &[i16]) {
        let skip = samples.len().saturating_sub(self.capacity);
        for &s in &samples[skip..] {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(s);
        }
    }

    /// Current level on the 0-255 scale
    pub fn level(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }

        let sum_sq: f64 = self
            .window
            .iter()
            .map(|&s| {
                let v = s as f64 / i16::MAX as f64;
                v * v
            })
            .sum();
        let rms = (sum_sq / self.window.len() as f64).sqrt();
        if rms <= 0.0 {
            return 0.0;
        }

        let db = 20.0 * rms.log10() as f32;
        ((db - FLOOR_DB) / -FLOOR_DB * MAX_LEVEL).clamp(0.0, MAX_LEVEL)
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
