//! Voice-conversion engines and orchestration
//!
//! Two conversion tiers behind one orchestrator:
//! - the external neural tool, invoked as an isolated subprocess via
//!   file-based manifest interchange
//! - the in-process spectral fallback, used when the tool or its
//!   weights are absent, or when the tool fails

pub mod config;
pub mod external;
pub mod fallback;
pub mod manifest;
pub mod orchestrator;
pub mod prober;

pub use config::{BlendConfig, ConverterConfig};
pub use external::{run_with_timeout, ExternalEngine, ProcessOutput};
pub use fallback::SpectralConverter;
pub use manifest::ConversionManifest;
pub use orchestrator::{ConversionRequest, ConversionResult, ConversionStatus, Orchestrator};
pub use prober::{EngineAvailability, EngineProber};
