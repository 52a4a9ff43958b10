use anyhow::{Context, Result};
use base64::Engine;

use crate::agent::messages::Blob;

const PCM_MIME: &str = "audio/pcm";

/// Slices captured samples into fixed-size frames for transmission
#[derive(Debug, Clone)]
pub struct FrameSlicer {
    frame_samples: usize,
    pending: Vec<i16>,
}

impl FrameSlicer {
    pub fn new(frame_samples: usize) -> Self {
        let frame_samples = frame_samples.max(1);
        Self {
            frame_samples,
            pending: Vec::with_capacity(frame_samples),
        }
    }

    /// Append samples, returning every frame that is now complete
    pub fn push(&mut self, samples: &[i16]) -> Vec<Vec<i16>> {
        self.pending.extend_from_slice(samples);

        let complete = self.pending.len() / self.frame_samples;
        if complete == 0 {
            return Vec::new();
        }

        let rest = self.pending.split_off(complete * self.frame_samples);
        let full = std::mem::replace(&mut self.pending, rest);
        full.chunks_exact(self.frame_samples)
            .map(|c| c.to_vec())
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Encode mono PCM16 samples as a transport blob
pub fn encode_pcm_blob(samples: &[i16], sample_rate: u32) -> Blob {
    let pcm_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

    Blob {
        mime_type: format!("{PCM_MIME};rate={sample_rate}"),
        data: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
    }
}

/// Decode a base64 PCM16 payload into samples
pub fn decode_pcm(data: &str) -> Result<Vec<i16>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Invalid base64 audio payload")?;

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Whether a mime type denotes raw PCM audio
pub fn is_pcm(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with(PCM_MIME)
}

/// Extract the `rate=` parameter from a mime type such as `audio/pcm;rate=24000`
pub fn parse_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Duration in seconds of a mono sample buffer
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}
