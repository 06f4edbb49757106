//! WAV file output
//!
//! The external tool consumes 16-bit PCM WAV; the final conversion
//! result is written the same way. Atomic writes go through a unique
//! temporary name so a failed write never leaves a partial file at the
//! destination.

use std::path::Path;

use uuid::Uuid;

use crate::audio::AudioBuffer;
use crate::core::error::{Result, VcError};

/// Audio output handler for WAV persistence
pub struct AudioOutput;

impl AudioOutput {
    /// Save a buffer to a WAV file (16-bit PCM, mono)
    pub fn save<P: AsRef<Path>>(buffer: &AudioBuffer, path: P) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer =
            hound::WavWriter::create(path.as_ref(), spec).map_err(|e| VcError::Io {
                message: format!("failed to create WAV file: {}", e),
                path: Some(path.as_ref().to_path_buf()),
            })?;

        for &sample in buffer.samples() {
            let scaled = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(scaled)?;
        }

        writer.finalize()?;
        Ok(())
    }

    /// Save a buffer to `path` atomically: write to a uniquely named
    /// sibling first, then rename into place
    pub fn save_atomic<P: AsRef<Path>>(buffer: &AudioBuffer, path: P) -> Result<()> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VcError::Io {
                message: "destination path has no file name".to_string(),
                path: Some(path.to_path_buf()),
            })?;

        let tmp = path.with_file_name(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()));

        Self::save(buffer, &tmp)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            VcError::Io {
                message: format!("failed to move output into place: {}", e),
                path: Some(path.to_path_buf()),
            }
        })?;
        Ok(())
    }
}
