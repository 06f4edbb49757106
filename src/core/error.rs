//! Structured error handling for VoiceMorph
//!
//! Every failure in the conversion pipeline maps to one of these
//! variants; nothing is silently swallowed. Subprocess diagnostics
//! (captured stdout/stderr) travel inside the error value.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with VcError
pub type Result<T> = std::result::Result<T, VcError>;

/// Main error type for the voice-conversion pipeline
#[derive(Error, Debug, Clone)]
pub enum VcError {
    /// Input bytes could not be parsed as audio
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        path: Option<PathBuf>,
    },

    /// External conversion tool is not installed and could not be fetched
    #[error("External tool unavailable: {message}")]
    ToolUnavailable { message: String },

    /// External tool exceeded its wall-clock bound
    #[error("External tool timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// External tool exited nonzero, or exited zero without producing
    /// its declared output file
    #[error("External tool failed: {message}")]
    ExternalTool {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// Fallback conversion produced a silent signal; peak normalization
    /// would divide by zero
    #[error("Signal is silent; cannot peak-normalize")]
    SilentSignal,

    /// Source/target frame counts diverged inside the spectral blend.
    /// Reconciled before the transform; surfacing this is a bug.
    /// Field names avoid `source`, which thiserror reserves for the
    /// error cause.
    #[error("Length mismatch: source {source_len} samples, target {target_len} samples")]
    LengthMismatch {
        source_len: usize,
        target_len: usize,
    },

    /// Audio processing errors
    #[error("Audio processing error ({operation}): {message}")]
    Audio {
        message: String,
        operation: AudioOperation,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },
}

impl VcError {
    /// Whether the orchestrator may retry this failure through the
    /// fallback converter. Decode and silent-signal failures are
    /// terminal; tool-side failures get exactly one fallback attempt.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            VcError::ToolUnavailable { .. }
                | VcError::Timeout { .. }
                | VcError::ExternalTool { .. }
        )
    }
}

/// Audio operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOperation {
    Resampling,
    Saving,
}

impl fmt::Display for AudioOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOperation::Resampling => write!(f, "resampling"),
            AudioOperation::Saving => write!(f, "saving"),
        }
    }
}

impl From<std::io::Error> for VcError {
    fn from(err: std::io::Error) -> Self {
        VcError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<hound::Error> for VcError {
    fn from(err: hound::Error) -> Self {
        VcError::Audio {
            message: err.to_string(),
            operation: AudioOperation::Saving,
        }
    }
}
