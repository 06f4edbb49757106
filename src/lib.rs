//! # VoiceMorph - Tiered Voice-Conversion Pipeline
//!
//! Converts the timbre of synthesized speech toward a target speaker's
//! voice, with or without a full neural voice-conversion model
//! installed.
//!
//! ## Features
//!
//! - **Audio Normalization**: arbitrary input audio to canonical mono
//!   16 kHz buffers (symphonia decode, rubato sinc resampling)
//! - **Engine Probing**: typed capability detection for the external
//!   tool and its trained weights, with an optional one-time fetch
//! - **External Invocation**: per-request manifest interchange,
//!   isolated subprocess with a wall-clock bound, strict output
//!   validation, atomic destination writes
//! - **Spectral Fallback**: in-process STFT magnitude blend that
//!   transfers the target's spectral envelope onto the source's
//!   phase/timing when the neural tool cannot run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voicemorph::{ConversionRequest, ConverterConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(ConverterConfig::default());
//! let request = ConversionRequest::new("speech.wav", "voice.wav", "converted.wav");
//!
//! let result = orchestrator.convert(&request);
//! if result.is_success() {
//!     println!("{}", result.message);
//! }
//! ```
//!
//! ## Conversion Tiers
//!
//! | Tier | Engine | Used when |
//! |------|--------|-----------|
//! | 1 | External neural tool | tool + weight artifact present |
//! | 2 | Spectral fallback | tool/weights absent, or tier 1 failed |
//!
//! A tier-1 failure gets exactly one tier-2 attempt; decode failures
//! and silent signals are terminal.

pub mod audio;
pub mod core;
pub mod engine;

// Re-exports for convenience
pub use audio::{AudioBuffer, AudioNormalizer, AudioOutput, Resampler};
pub use core::error::{AudioOperation, Result, VcError};
pub use engine::{
    BlendConfig, ConversionManifest, ConversionRequest, ConversionResult, ConversionStatus,
    ConverterConfig, EngineAvailability, EngineProber, ExternalEngine, Orchestrator,
    SpectralConverter,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Canonical sample rate both engines operate at (Hz)
pub const CANONICAL_SAMPLE_RATE: u32 = audio::CANONICAL_SAMPLE_RATE;
