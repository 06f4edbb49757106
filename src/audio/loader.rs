//! Audio decoding and normalization
//!
//! Turns arbitrary input audio into the canonical format the rest of
//! the pipeline expects: mono f32 at a fixed sample rate. Formats
//! supported via symphonia (MP3, FLAC, OGG) with a hound fast path
//! for WAV.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::{AudioBuffer, Resampler};
use crate::core::error::{Result, VcError};

/// Default canonical rate; the external conversion tool expects
/// 16 kHz mono input
pub const CANONICAL_SAMPLE_RATE: u32 = 16000;

/// Normalizes arbitrary audio into mono fixed-rate [`AudioBuffer`]s
///
/// Multi-channel input is downmixed by arithmetic mean across channels,
/// never by dropping channels. Resampling is band-limited sinc, so
/// normalizing the same input twice yields the same buffer.
pub struct AudioNormalizer {
    target_rate: u32,
}

impl AudioNormalizer {
    /// Create a normalizer targeting the given sample rate
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    /// The rate this normalizer converges everything to
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decode a file and normalize it to mono at the target rate
    pub fn normalize_file<P: AsRef<Path>>(&self, path: P) -> Result<AudioBuffer> {
        let path = path.as_ref();

        let (samples, channels, rate) = if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        {
            Self::decode_wav(path)?
        } else {
            Self::decode_with_symphonia(path)?
        };

        self.normalize_interleaved(&samples, channels, rate)
            .map_err(|e| match e {
                VcError::Decode { message, .. } => VcError::Decode {
                    message,
                    path: Some(path.to_path_buf()),
                },
                other => other,
            })
    }

    /// Normalize interleaved multi-channel samples
    pub fn normalize_interleaved(
        &self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<AudioBuffer> {
        if channels == 0 {
            return Err(VcError::Decode {
                message: "audio stream reports zero channels".to_string(),
                path: None,
            });
        }
        let mono = downmix(samples, channels as usize);
        let resampled = Resampler::resample(&mono, sample_rate, self.target_rate)?;
        AudioBuffer::new(resampled, self.target_rate)
    }

    /// Normalize an existing mono buffer (resample-only)
    ///
    /// A no-op copy when the buffer is already at the target rate, so
    /// re-normalizing a normalized buffer is exactly idempotent.
    pub fn normalize(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        if buffer.sample_rate() == self.target_rate {
            return Ok(buffer.clone());
        }
        let resampled = Resampler::resample(buffer.samples(), buffer.sample_rate(), self.target_rate)?;
        AudioBuffer::new(resampled, self.target_rate)
    }

    /// WAV fast path via hound
    fn decode_wav(path: &Path) -> Result<(Vec<f32>, u16, u32)> {
        let reader = hound::WavReader::open(path).map_err(|e| VcError::Decode {
            message: format!("failed to open WAV: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                reader.into_samples::<f32>().filter_map(|s| s.ok()).collect()
            }
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .filter_map(|s| s.ok())
                    .map(|s| s as f32 / max_value)
                    .collect()
            }
        };

        Ok((samples, spec.channels, spec.sample_rate))
    }

    /// Generic path via symphonia (MP3, FLAC, OGG, ...)
    fn decode_with_symphonia(path: &Path) -> Result<(Vec<f32>, u16, u32)> {
        let src = File::open(path).map_err(|e| VcError::Decode {
            message: format!("failed to open audio file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| VcError::Decode {
                message: format!("unsupported audio format: {}", e),
                path: Some(path.to_path_buf()),
            })?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| VcError::Decode {
                message: "no supported audio tracks found".to_string(),
                path: Some(path.to_path_buf()),
            })?;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| VcError::Decode {
            message: "unknown sample rate".to_string(),
            path: Some(path.to_path_buf()),
        })?;
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &dec_opts)
            .map_err(|e| VcError::Decode {
                message: format!("unsupported codec: {}", e),
                path: Some(path.to_path_buf()),
            })?;

        let track_id = track.id;

        let mut all_samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break; // end of stream
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(VcError::Decode {
                        message: format!("error reading packet: {}", e),
                        path: Some(path.to_path_buf()),
                    });
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    if sample_buf.is_none() {
                        let spec = *decoded.spec();
                        let duration = decoded.capacity() as u64;
                        sample_buf = Some(SampleBuffer::new(duration, spec));
                    }
                    if let Some(ref mut buf) = sample_buf {
                        buf.copy_interleaved_ref(decoded);
                        all_samples.extend_from_slice(buf.samples());
                    }
                }
                // Skip corrupted packets
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => {
                    return Err(VcError::Decode {
                        message: format!("decode error: {}", e),
                        path: Some(path.to_path_buf()),
                    });
                }
            }
        }

        Ok((all_samples, channels as u16, sample_rate))
    }
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self::new(CANONICAL_SAMPLE_RATE)
    }
}

/// Arithmetic-mean downmix of interleaved samples to mono
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
