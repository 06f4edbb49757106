//! Spectral fallback converter
//!
//! Best-effort in-process approximation used when the external neural
//! tool is absent or fails. It transfers the target's spectral
//! envelope onto the source's temporal structure: blend the two STFT
//! magnitudes, keep the source phase, invert. Keeping the source
//! phase preserves the timing and prosody of the synthesized speech
//! while the magnitude blend biases timbre toward the target.
//!
//! Purely functional over its inputs; safe to run concurrently
//! without locking, with cost proportional to input length.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::debug;

use crate::audio::{AudioBuffer, Resampler};
use crate::core::error::{Result, VcError};
use crate::engine::config::BlendConfig;

/// Peak values below this are treated as silence
const SILENCE_THRESHOLD: f32 = 1e-8;

/// In-process voice converter based on short-time spectral blending
pub struct SpectralConverter {
    config: BlendConfig,
    transform: ShortTimeTransform,
}

impl SpectralConverter {
    /// Create a converter with the given blend parameters
    pub fn new(config: BlendConfig) -> Self {
        let transform = ShortTimeTransform::new(config.n_fft, config.hop_length);
        Self { config, transform }
    }

    /// Blend the target's spectral envelope onto the source signal
    ///
    /// The result has exactly the source's sample count and rate, and
    /// is peak-normalized to the configured level (0.9 by default).
    /// A silent blend yields `VcError::SilentSignal` rather than a
    /// division by zero.
    pub fn convert(&self, source: &AudioBuffer, target: &AudioBuffer) -> Result<AudioBuffer> {
        // Both signals must share a rate before spectral analysis
        let target_samples = if target.sample_rate() == source.sample_rate() {
            target.samples().to_vec()
        } else {
            Resampler::resample(
                target.samples(),
                target.sample_rate(),
                source.sample_rate(),
            )?
        };

        // Reconcile lengths: truncate a long target, zero-pad a short
        // one (silence, never wrapping)
        let target_samples = resize_to(target_samples, source.len());
        if target_samples.len() != source.len() {
            return Err(VcError::LengthMismatch {
                source_len: source.len(),
                target_len: target_samples.len(),
            });
        }

        let source_spectra = self.transform.analyze(source.samples());
        let target_spectra = self.transform.analyze(&target_samples);
        if source_spectra.len() != target_spectra.len() {
            return Err(VcError::LengthMismatch {
                source_len: source_spectra.len(),
                target_len: target_spectra.len(),
            });
        }

        debug!(
            frames = source_spectra.len(),
            alpha = self.config.alpha,
            "blending spectra"
        );

        let alpha = self.config.alpha;
        let blended: Vec<Vec<Complex<f32>>> = source_spectra
            .iter()
            .zip(&target_spectra)
            .map(|(s_frame, t_frame)| {
                s_frame
                    .iter()
                    .zip(t_frame)
                    .map(|(s, t)| {
                        let magnitude = alpha * t.norm() + (1.0 - alpha) * s.norm();
                        let s_norm = s.norm();
                        if s_norm > f32::EPSILON {
                            // Source phase retained
                            *s * (magnitude / s_norm)
                        } else {
                            Complex::new(magnitude, 0.0)
                        }
                    })
                    .collect()
            })
            .collect();

        let mut converted = self.transform.synthesize(&blended, source.len());

        let peak = converted.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak <= SILENCE_THRESHOLD {
            return Err(VcError::SilentSignal);
        }
        let scale = self.config.peak_level / peak;
        for sample in &mut converted {
            *sample *= scale;
        }

        AudioBuffer::new(converted, source.sample_rate())
    }
}

/// Truncate or zero-pad to exactly `len` samples
fn resize_to(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}

/// Fixed-window STFT/ISTFT pair
///
/// Full-spectrum frames (all `n_fft` bins) keep the inverse trivial:
/// magnitude edits preserve conjugate symmetry, so the inverse FFT of
/// each frame is real up to rounding. Synthesis is windowed
/// overlap-add normalized by the accumulated squared window.
struct ShortTimeTransform {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl ShortTimeTransform {
    fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    /// Frame count for a signal of `len` samples (after center padding)
    fn frame_count(&self, len: usize) -> usize {
        let padded = len + self.n_fft;
        if padded <= self.n_fft {
            1
        } else {
            (padded - self.n_fft).div_ceil(self.hop) + 1
        }
    }

    /// Forward transform: center-padded, Hann-windowed frames of full
    /// complex spectra, shape `[n_frames][n_fft]`
    fn analyze(&self, samples: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let pad = self.n_fft / 2;
        let num_frames = self.frame_count(samples.len());
        let needed = (num_frames - 1) * self.hop + self.n_fft;

        let mut padded = vec![0.0f32; needed];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut frames = Vec::with_capacity(num_frames);
        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.n_fft];

        for i in 0..num_frames {
            let start = i * self.hop;
            for j in 0..self.n_fft {
                buffer[j] = Complex::new(padded[start + j] * self.window[j], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer.clone());
        }

        frames
    }

    /// Inverse transform via windowed overlap-add, returning exactly
    /// `out_len` samples
    fn synthesize(&self, frames: &[Vec<Complex<f32>>], out_len: usize) -> Vec<f32> {
        let pad = self.n_fft / 2;
        let total = if frames.is_empty() {
            0
        } else {
            (frames.len() - 1) * self.hop + self.n_fft
        };

        let mut signal = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let fft_scale = 1.0 / self.n_fft as f32;

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.n_fft];
        for (i, frame) in frames.iter().enumerate() {
            buffer.copy_from_slice(frame);
            self.inverse.process(&mut buffer);

            let start = i * self.hop;
            for j in 0..self.n_fft {
                let sample = buffer[j].re * fft_scale;
                signal[start + j] += sample * self.window[j];
                window_sum[start + j] += self.window[j] * self.window[j];
            }
        }

        for (s, w) in signal.iter_mut().zip(&window_sum) {
            if *w > 1e-8 {
                *s /= w;
            }
        }

        let mut out = vec![0.0f32; out_len];
        let available = signal.len().saturating_sub(pad).min(out_len);
        out[..available].copy_from_slice(&signal[pad..pad + available]);
        out
    }
}

/// Periodic Hann window
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}
