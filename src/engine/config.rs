//! Conversion pipeline configuration
//!
//! One config struct covers both tiers: where the external tool lives
//! and how it is invoked, plus the spectral-blend parameters for the
//! in-process fallback.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall-clock bound for one external conversion
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

/// Default bound for the one-time tool fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Installation directory of the external conversion tool
    pub tool_dir: PathBuf,
    /// Command line that runs one conversion, executed with
    /// `tool_dir` as working directory. The manifest file name is
    /// appended as the final argument.
    pub tool_command: Vec<String>,
    /// Subdirectory of `tool_dir` holding trained weight artifacts
    pub model_subdir: PathBuf,
    /// Weight artifact file name prefix
    pub model_prefix: String,
    /// Weight artifact file name suffix
    pub model_suffix: String,
    /// Git URL to clone when the tool directory is missing
    pub fetch_url: Option<String>,
    /// Attempt the one-time fetch when the tool is missing
    pub auto_fetch: bool,
    /// Bound on the fetch subprocess, in seconds
    pub fetch_timeout_secs: u64,
    /// Canonical sample rate both engines operate at
    pub sample_rate: u32,
    /// Bound on one external conversion, in seconds
    pub tool_timeout_secs: u64,
    /// Scratch directory for per-request interchange files
    pub work_dir: PathBuf,
    /// Spectral fallback parameters
    pub blend: BlendConfig,
}

/// Spectral-blend parameters for the fallback converter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Target-magnitude weight per time-frequency bin.
    /// 0.7 is inherited from the reference policy; it is a heuristic,
    /// not a tuned optimum.
    pub alpha: f32,
    /// FFT size (also the analysis window length)
    pub n_fft: usize,
    /// Hop between analysis frames
    pub hop_length: usize,
    /// Peak level the output is normalized to
    pub peak_level: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            n_fft: 1024,
            hop_length: 256,
            peak_level: 0.9,
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            tool_dir: PathBuf::from("QuickVC-VoiceConversion"),
            tool_command: vec!["python".to_string(), "convert.py".to_string()],
            model_subdir: PathBuf::from("logs/quickvc"),
            model_prefix: "G_".to_string(),
            model_suffix: ".pth".to_string(),
            fetch_url: Some(
                "https://github.com/quickvc/QuickVC-VoiceConversion.git".to_string(),
            ),
            auto_fetch: true,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            sample_rate: crate::audio::CANONICAL_SAMPLE_RATE,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            work_dir: std::env::temp_dir().join("voicemorph"),
            blend: BlendConfig::default(),
        }
    }
}

impl ConverterConfig {
    /// Set the tool installation directory
    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir = dir.into();
        self
    }

    /// Set the conversion command line
    pub fn with_tool_command(mut self, command: Vec<String>) -> Self {
        self.tool_command = command;
        self
    }

    /// Set the blend factor for the fallback converter
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.blend.alpha = alpha;
        self
    }

    /// Set the external tool timeout
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_secs = timeout.as_secs();
        self
    }

    /// Disable the one-time fetch attempt
    pub fn without_auto_fetch(mut self) -> Self {
        self.auto_fetch = false;
        self
    }

    /// Set the scratch directory
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// External tool timeout as a `Duration`
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Fetch timeout as a `Duration`
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Directory expected to contain weight artifacts
    pub fn model_dir(&self) -> PathBuf {
        self.tool_dir.join(&self.model_subdir)
    }
}
