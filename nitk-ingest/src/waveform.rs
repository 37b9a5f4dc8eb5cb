//! Canonical waveform model
//!
//! The single in-memory signal representation every metrics computation
//! consumes, regardless of which container the recording arrived in.

use crate::error::IngestError;

/// Decoded signal
///
/// `samples` is the mono mixdown of the source; `channels` records how many
/// channels the source had. Owned by the processing call that decoded it and
/// dropped once metrics are extracted.
#[derive(Debug, Clone)]
pub struct CanonicalWaveform {
    samples: Vec<f64>,
    sample_rate: u32,
    channels: usize,
}

impl CanonicalWaveform {
    /// Build a waveform, enforcing `sample_rate > 0` and at least one sample
    pub fn new(samples: Vec<f64>, sample_rate: u32, channels: usize) -> Result<Self, IngestError> {
        if sample_rate == 0 {
            return Err(IngestError::Decode("sample rate must be positive".to_string()));
        }
        if samples.is_empty() {
            return Err(IngestError::Decode("waveform contains no samples".to_string()));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; construction rejects empty waveforms
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
