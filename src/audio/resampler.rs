//! Band-limited sample rate conversion using rubato
//!
//! Sinc interpolation keeps the conversion deterministic for a given
//! input, which the normalizer's idempotence contract depends on.

use anyhow::Context;
use rubato::{
    calculate_cutoff, Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::core::error::{AudioOperation, Result, VcError};

/// Chunk size for incremental processing of long signals
const CHUNK_SIZE: usize = 1024;

/// Mono audio resampler built on sinc interpolation
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from one rate to another
    ///
    /// Returns the input unchanged when the rates already match.
    pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
        if from_sr == to_sr {
            return Ok(samples.to_vec());
        }
        if samples.is_empty() {
            return Ok(vec![]);
        }

        let result = if samples.len() <= CHUNK_SIZE * 2 {
            Self::resample_whole(samples, from_sr, to_sr)
        } else {
            Self::resample_chunked(samples, from_sr, to_sr)
        };

        result.map_err(|e| VcError::Audio {
            message: format!("{:#}", e),
            operation: AudioOperation::Resampling,
        })
    }

    /// Single-pass resampling for short signals
    fn resample_whole(samples: &[f32], from_sr: u32, to_sr: u32) -> anyhow::Result<Vec<f32>> {
        let sinc_len = 256;
        let window = WindowFunction::BlackmanHarris2;
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window,
        };

        let mut resampler = SincFixedIn::<f32>::new(
            to_sr as f64 / from_sr as f64,
            2.0,
            params,
            samples.len(),
            1, // mono
        )
        .context("failed to create resampler")?;

        let output = resampler
            .process(&[samples.to_vec()], None)
            .context("resampling failed")?;

        Ok(output.into_iter().next().unwrap_or_default())
    }

    /// Chunked resampling for longer signals (bounded memory)
    fn resample_chunked(samples: &[f32], from_sr: u32, to_sr: u32) -> anyhow::Result<Vec<f32>> {
        let sinc_len = 128;
        let window = WindowFunction::Blackman2;
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation: SincInterpolationType::Quadratic,
            oversampling_factor: 256,
            window,
        };

        let mut resampler = SincFixedIn::<f32>::new(
            to_sr as f64 / from_sr as f64,
            1.1,
            params,
            CHUNK_SIZE,
            1, // mono
        )
        .context("failed to create chunked resampler")?;

        let ratio = to_sr as f64 / from_sr as f64;
        let mut output = Vec::with_capacity((samples.len() as f64 * ratio * 1.1) as usize);

        let mut pos = 0;
        while pos + CHUNK_SIZE <= samples.len() {
            let chunk = vec![samples[pos..pos + CHUNK_SIZE].to_vec()];
            let processed = resampler.process(&chunk, None)?;
            if let Some(out_chunk) = processed.into_iter().next() {
                output.extend(out_chunk);
            }
            pos += CHUNK_SIZE;
        }

        if pos < samples.len() {
            let remaining = [samples[pos..].to_vec()];
            let slices: Vec<&[f32]> = remaining.iter().map(|v| v.as_slice()).collect();
            let processed = resampler.process_partial(Some(&slices), None)?;
            if let Some(out_chunk) = processed.into_iter().next() {
                output.extend(out_chunk);
            }
        }

        Ok(output)
    }
}
