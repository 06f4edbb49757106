//! Conversion orchestration
//!
//! Small state machine sequencing Prober -> (External | Fallback):
//! `Start -> Probed -> Converting -> Done`. An external-tool failure
//! transitions back into `Converting` exactly once more on the
//! fallback tier; decode and silent-signal failures are terminal.
//! Every request produces exactly one terminal result.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::audio::{AudioNormalizer, AudioOutput};
use crate::core::error::{Result, VcError};
use crate::engine::config::ConverterConfig;
use crate::engine::external::ExternalEngine;
use crate::engine::fallback::SpectralConverter;
use crate::engine::prober::{EngineAvailability, EngineProber};

/// One voice-conversion request
///
/// Immutable once created; owned by exactly one orchestration call.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Synthesized speech to convert
    pub source: PathBuf,
    /// Target-voice sample whose timbre is wanted
    pub target: PathBuf,
    /// Where the converted audio must land
    pub destination: PathBuf,
}

impl ConversionRequest {
    /// Create a request from three paths
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            destination: destination.into(),
        }
    }
}

/// Terminal status of a conversion
#[derive(Debug, Clone)]
pub enum ConversionStatus {
    /// Conversion succeeded; output written here
    Success(PathBuf),
    /// Conversion failed on all attempted tiers
    Failure(VcError),
}

/// Terminal result of one request: status plus a human-readable
/// message describing which tier produced it
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub status: ConversionStatus,
    pub message: String,
}

impl ConversionResult {
    /// True when the conversion produced an output file
    pub fn is_success(&self) -> bool {
        matches!(self.status, ConversionStatus::Success(_))
    }

    /// Output path on success
    pub fn output_path(&self) -> Option<&Path> {
        match &self.status {
            ConversionStatus::Success(path) => Some(path),
            ConversionStatus::Failure(_) => None,
        }
    }

    fn success(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Success(path),
            message: message.into(),
        }
    }

    fn failure(error: VcError, message: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Failure(error),
            message: message.into(),
        }
    }
}

/// Which tier the `Converting` state is on
#[derive(Debug)]
enum Tier {
    External(PathBuf),
    /// Fallback, possibly carrying the external error that routed here
    Fallback(Option<VcError>),
}

/// Orchestrator states; terminal `Done` is represented by returning
#[derive(Debug)]
enum State {
    Start,
    Probed(EngineAvailability),
    Converting(Tier),
}

/// Sequences probing, external invocation, and the spectral fallback
///
/// Holds no per-request state; one instance serves any number of
/// concurrent, independent requests.
pub struct Orchestrator {
    prober: EngineProber,
    external: ExternalEngine,
    fallback: SpectralConverter,
    normalizer: AudioNormalizer,
}

impl Orchestrator {
    /// Build an orchestrator (and both engines) from one config
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            prober: EngineProber::new(config.clone()),
            external: ExternalEngine::new(config.clone()),
            fallback: SpectralConverter::new(config.blend.clone()),
            normalizer: AudioNormalizer::new(config.sample_rate),
        }
    }

    /// Drive one request to its terminal result
    pub fn convert(&self, request: &ConversionRequest) -> ConversionResult {
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => State::Probed(self.prober.probe()),

                State::Probed(availability) => match availability {
                    EngineAvailability::AvailableWithModel(model) => {
                        State::Converting(Tier::External(model))
                    }
                    EngineAvailability::AvailableNoModel => {
                        info!("external tool present without weights; using spectral fallback");
                        State::Converting(Tier::Fallback(None))
                    }
                    EngineAvailability::Unavailable => {
                        info!("external tool unavailable; using spectral fallback");
                        State::Converting(Tier::Fallback(None))
                    }
                },

                State::Converting(Tier::External(model)) => {
                    match self.external.invoke(request, &model) {
                        Ok(path) => {
                            return ConversionResult::success(
                                path,
                                "converted with external neural engine",
                            );
                        }
                        Err(e) if e.is_fallback_eligible() => {
                            warn!(error = %e, "external engine failed; retrying on fallback tier");
                            State::Converting(Tier::Fallback(Some(e)))
                        }
                        Err(e) => {
                            // Decode and I/O failures are terminal
                            let message = format!("conversion failed: {}", e);
                            return ConversionResult::failure(e, message);
                        }
                    }
                }

                State::Converting(Tier::Fallback(prior)) => {
                    return match self.convert_fallback(request) {
                        Ok(path) => {
                            let message = match &prior {
                                Some(e) => format!(
                                    "converted with spectral fallback after external engine failure ({})",
                                    e
                                ),
                                None => "converted with spectral fallback".to_string(),
                            };
                            ConversionResult::success(path, message)
                        }
                        Err(e) => {
                            // The fallback's own failure is surfaced,
                            // with the external error kept as context
                            let message = match &prior {
                                Some(external_err) => format!(
                                    "fallback conversion failed: {} (external engine previously failed: {})",
                                    e, external_err
                                ),
                                None => format!("fallback conversion failed: {}", e),
                            };
                            ConversionResult::failure(e, message)
                        }
                    };
                }
            };
        }
    }

    /// Run the in-process spectral blend and persist the result
    fn convert_fallback(&self, request: &ConversionRequest) -> Result<PathBuf> {
        let source = self.normalizer.normalize_file(&request.source)?;
        let target = self.normalizer.normalize_file(&request.target)?;

        let converted = self.fallback.convert(&source, &target)?;

        AudioOutput::save_atomic(&converted, &request.destination)?;
        info!(destination = %request.destination.display(), "fallback conversion complete");
        Ok(request.destination.clone())
    }
}
