//! Conversion manifest interchange
//!
//! The external tool takes its work order from a one-line manifest
//! file: `<source>|<target>|<output>`, newline-terminated, absolute
//! paths. Each request writes its own uniquely named manifest so
//! concurrent conversions never clobber each other's work orders.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::core::error::{Result, VcError};

/// Single-request work order for the external conversion tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionManifest {
    /// Absolute path to the normalized source audio
    pub source: PathBuf,
    /// Absolute path to the normalized target-voice audio
    pub target: PathBuf,
    /// Absolute path the tool must write its output to
    pub output: PathBuf,
}

impl ConversionManifest {
    /// Create a manifest from three absolute paths
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            output: output.into(),
        }
    }

    /// Generate a fresh, unique manifest file name
    ///
    /// Uniqueness is a correctness requirement: a fixed shared name
    /// would let overlapping requests corrupt each other.
    pub fn unique_file_name() -> String {
        format!("convert_{}.txt", Uuid::new_v4().simple())
    }

    /// Render the one-line pipe-delimited wire format
    pub fn render(&self) -> String {
        format!(
            "{}|{}|{}\n",
            self.source.display(),
            self.target.display(),
            self.output.display()
        )
    }

    /// Write the manifest into `dir` under a unique name, returning
    /// the manifest file path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(Self::unique_file_name());
        std::fs::write(&path, self.render()).map_err(|e| VcError::Io {
            message: format!("failed to write manifest: {}", e),
            path: Some(path.clone()),
        })?;
        Ok(path)
    }

    /// Parse the wire format back into a manifest
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.trim_end_matches('\n').split('|').collect();
        if parts.len() != 3 {
            return Err(VcError::Config {
                message: format!("manifest line has {} fields, expected 3", parts.len()),
            });
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}
