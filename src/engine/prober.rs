//! External engine capability probing
//!
//! Determines, fresh on every call, whether the external conversion
//! tool and a trained weight artifact are present. Filesystem absence
//! is a normal outcome here, never an error; the only side effect is
//! an optional one-time clone of the tool repository.

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::engine::config::ConverterConfig;
use crate::engine::external::run_with_timeout;

/// Result of probing for the external conversion engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAvailability {
    /// Tool directory missing (and fetch failed or was disabled)
    Unavailable,
    /// Tool present but no trained weight artifact found
    AvailableNoModel,
    /// Tool and weights present; holds the chosen artifact path
    AvailableWithModel(PathBuf),
}

impl EngineAvailability {
    /// True only when the external engine can actually run
    pub fn is_usable(&self) -> bool {
        matches!(self, EngineAvailability::AvailableWithModel(_))
    }
}

/// Probes for the external tool installation and its weights
///
/// The fetch attempt happens at most once per prober instance; a
/// failed clone is reported and not silently retried.
pub struct EngineProber {
    config: ConverterConfig,
    fetch_attempted: AtomicBool,
}

impl EngineProber {
    /// Create a prober over the given configuration
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            fetch_attempted: AtomicBool::new(false),
        }
    }

    /// Compute availability fresh; nothing is cached between calls
    /// except the fetch-attempted latch
    pub fn probe(&self) -> EngineAvailability {
        if !self.config.tool_dir.is_dir() {
            self.try_fetch_once();
            if !self.config.tool_dir.is_dir() {
                debug!(tool_dir = %self.config.tool_dir.display(), "external tool not installed");
                return EngineAvailability::Unavailable;
            }
        }

        match self.find_model() {
            Some(path) => {
                debug!(model = %path.display(), "external engine usable");
                EngineAvailability::AvailableWithModel(path)
            }
            None => {
                debug!(
                    model_dir = %self.config.model_dir().display(),
                    "external tool present but no weight artifact found"
                );
                EngineAvailability::AvailableNoModel
            }
        }
    }

    /// First weight artifact matching `<prefix>*<suffix>` under the
    /// model directory, in lexicographic path order
    fn find_model(&self) -> Option<PathBuf> {
        let model_dir = self.config.model_dir();
        let entries = std::fs::read_dir(&model_dir).ok()?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| {
                            name.starts_with(&self.config.model_prefix)
                                && name.ends_with(&self.config.model_suffix)
                        })
            })
            .collect();

        matches.sort();
        matches.into_iter().next()
    }

    /// Clone the tool repository, at most once per prober lifetime
    fn try_fetch_once(&self) {
        if !self.config.auto_fetch {
            return;
        }
        let Some(url) = self.config.fetch_url.as_deref() else {
            return;
        };
        if self.fetch_attempted.swap(true, Ordering::SeqCst) {
            debug!("tool fetch already attempted; not retrying");
            return;
        }

        info!(url, dest = %self.config.tool_dir.display(), "fetching external conversion tool");

        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .arg(url)
            .arg(&self.config.tool_dir);

        match run_with_timeout(cmd, self.config.fetch_timeout()) {
            Ok(output) if output.success() => {
                info!("external tool fetched");
            }
            Ok(output) => {
                warn!(stderr = %output.stderr.trim(), "tool fetch failed");
            }
            Err(e) => {
                warn!(error = %e, "tool fetch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> ConverterConfig {
        ConverterConfig::default()
            .with_tool_dir(dir.join("QuickVC-VoiceConversion"))
            .without_auto_fetch()
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let prober = EngineProber::new(config_in(tmp.path()));
        assert_eq!(prober.probe(), EngineAvailability::Unavailable);
    }

    #[test]
    fn test_tool_without_model() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        std::fs::create_dir_all(config.model_dir()).unwrap();

        let prober = EngineProber::new(config);
        assert_eq!(prober.probe(), EngineAvailability::AvailableNoModel);
    }

    #[test]
    fn test_model_found_lexicographically_first() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let model_dir = config.model_dir();
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("G_9000.pth"), b"w").unwrap();
        std::fs::write(model_dir.join("G_0100.pth"), b"w").unwrap();
        std::fs::write(model_dir.join("D_0100.pth"), b"w").unwrap();
        std::fs::write(model_dir.join("G_0100.txt"), b"w").unwrap();

        let prober = EngineProber::new(config);
        match prober.probe() {
            EngineAvailability::AvailableWithModel(path) => {
                assert_eq!(path.file_name().unwrap(), "G_0100.pth");
            }
            other => panic!("expected model, got {:?}", other),
        }
    }

    #[test]
    fn test_probe_recomputes_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let prober = EngineProber::new(config.clone());

        assert_eq!(prober.probe(), EngineAvailability::Unavailable);

        // Install the tool between calls; the next probe must see it
        let model_dir = config.model_dir();
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("G_0.pth"), b"w").unwrap();

        assert!(prober.probe().is_usable());
    }
}
