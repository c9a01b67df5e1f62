use std::collections::VecDeque;

/// Decode a binary payload of little-endian `f32` PCM samples.
///
/// Returns `None` for empty payloads and byte counts that are not a whole
/// number of samples. Non-finite samples are zeroed.
pub fn decode_pcm(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                if sample.is_finite() { sample } else { 0.0 }
            })
            .collect(),
    )
}

/// Root mean square of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy = samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Buffers fragments of arbitrary size into fixed-size hops.
#[derive(Debug, Clone)]
pub struct HopAccumulator {
    hop_size: usize,
    pending: VecDeque<f32>,
}

impl HopAccumulator {
    pub fn new(hop_size: usize) -> Self {
        Self {
            hop_size,
            pending: VecDeque::with_capacity(hop_size * 2),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend(samples.iter().copied());
    }

    /// Removes exactly one hop from the front once enough samples are pending.
    pub fn try_take_hop(&mut self) -> Option<Vec<f32>> {
        if self.hop_size == 0 || self.pending.len() < self.hop_size {
            return None;
        }
        Some(self.pending.drain(..self.hop_size).collect())
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }
}
