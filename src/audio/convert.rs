//! Sample-rate and channel conversion for captured frames

use super::backend::AudioFrame;

/// Process audio frame: downsample and convert to target format
pub fn normalize_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    // Mix down first so resampling works on fewer samples
    if processed.channels != target_channels && target_channels == 1 {
        processed = to_mono(processed);
    }

    if processed.sample_rate != target_sample_rate {
        processed = resample_frame(processed, target_sample_rate);
    }

    processed
}

/// Resample by decimation when the ratio is an exact integer, linear interpolation otherwise.
/// Frames with an unknown (zero) rate on either side pass through unchanged.
pub fn resample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate
        || frame.sample_rate == 0
        || target_rate == 0
        || frame.samples.is_empty()
    {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;

    let resampled = if frame.sample_rate % target_rate == 0 && channels == 1 {
        // Decimate: take every Nth sample
        let ratio = (frame.sample_rate / target_rate) as usize;
        frame.samples.iter().step_by(ratio).copied().collect()
    } else {
        interpolate(&frame.samples, channels, frame.sample_rate, target_rate)
    };

    AudioFrame {
        samples: resampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

fn interpolate(samples: &[i16], channels: usize, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let in_frames = samples.len() / channels;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = (in_frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let mut out = Vec::with_capacity(out_frames * channels);

    for i in 0..out_frames {
        let pos = i as f64 * step;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let next = (idx + 1).min(in_frames - 1);

        for ch in 0..channels {
            let a = samples[idx * channels + ch] as f64;
            let b = samples[next * channels + ch] as f64;
            out.push((a + (b - a) * frac).round() as i16);
        }
    }

    out
}

/// Convert interleaved multi-channel audio to mono by averaging channels
pub fn to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels <= 1 {
        return frame;
    }

    let channels = frame.channels as usize;
    let mono_samples = frame
        .samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect();

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
