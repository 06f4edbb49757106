//! Audio processing modules
//!
//! - Canonical mono buffer type with validated invariants
//! - Audio file loading and decoding (WAV, MP3, FLAC, OGG)
//! - Band-limited sample rate conversion to the canonical rate
//! - WAV file output for subprocess interchange and final results

mod buffer;
mod loader;
mod output;
mod resampler;

pub use buffer::AudioBuffer;
pub use loader::{AudioNormalizer, CANONICAL_SAMPLE_RATE};
pub use output::AudioOutput;
pub use resampler::Resampler;
