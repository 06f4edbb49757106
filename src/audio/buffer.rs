//! Canonical in-memory audio representation
//!
//! Every stage of the conversion pipeline operates on [`AudioBuffer`]:
//! mono f32 PCM at a known sample rate. The constructor enforces the
//! invariants; downstream code can rely on them without re-checking.

use crate::core::error::{Result, VcError};

/// Mono PCM audio at a known sample rate
///
/// Invariants, enforced at construction:
/// - at least one sample
/// - sample rate > 0
/// - every sample is finite (no NaN/infinity)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer, validating the invariants
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VcError::Decode {
                message: "sample rate must be positive".to_string(),
                path: None,
            });
        }
        if samples.is_empty() {
            return Err(VcError::Decode {
                message: "audio stream decoded to zero samples".to_string(),
                path: None,
            });
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(VcError::Decode {
                message: format!("non-finite sample at index {}", pos),
                path: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Audio samples (mono, f32)
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; empty buffers cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Maximum absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square level
    pub fn rms(&self) -> f32 {
        let sum_sq: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_sq / self.samples.len() as f32).sqrt()
    }
}
