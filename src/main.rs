//! VoiceMorph CLI - Command-line interface for voice conversion
//!
//! Converts the timbre of a speech recording toward a target speaker's
//! voice, using the external neural tool when installed and the
//! in-process spectral fallback otherwise.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use voicemorph::{
    ConversionRequest, ConverterConfig, EngineAvailability, EngineProber, Orchestrator, VERSION,
};

/// VoiceMorph - voice conversion with a tiered engine policy
#[derive(Parser, Debug)]
#[command(name = "voicemorph")]
#[command(author, version, about, long_about = None)]
#[command(about = "Convert the timbre of speech audio toward a target voice")]
#[command(long_about = "
VoiceMorph converts a speech recording toward a target speaker's voice.

When the external neural conversion tool and a trained model are
installed, conversion runs through the tool as an isolated subprocess.
Otherwise (or when the tool fails) an in-process spectral blend
approximates the conversion.

Examples:
  # Convert speech.wav toward the voice in sample.wav
  voicemorph convert --source speech.wav --target sample.wav --output converted.wav

  # Force the spectral fallback, with a custom blend factor
  voicemorph convert --source speech.wav --target sample.wav --output out.wav \\
      --no-external --alpha 0.5

  # Report what the engine probe sees
  voicemorph probe
")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// External conversion tool installation directory
    #[arg(long, global = true)]
    tool_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a speech recording toward a target voice
    Convert {
        /// Speech audio to convert (WAV/MP3/FLAC/OGG)
        #[arg(short, long)]
        source: PathBuf,

        /// Target-voice sample audio
        #[arg(short, long)]
        target: PathBuf,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Blend factor for the spectral fallback (0.0 - 1.0,
        /// weight of the target's spectral envelope)
        #[arg(long, default_value_t = 0.7)]
        alpha: f32,

        /// Skip the external tool and use the spectral fallback
        #[arg(long)]
        no_external: bool,

        /// External tool timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },

    /// Probe for the external conversion tool and its weights
    Probe {
        /// Do not attempt to fetch the tool when missing
        #[arg(long)]
        no_fetch: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VoiceMorph v{}", VERSION);

    let mut config = ConverterConfig::default();
    if let Some(dir) = cli.tool_dir {
        config = config.with_tool_dir(dir);
    }

    match cli.command {
        Commands::Convert {
            source,
            target,
            output,
            alpha,
            no_external,
            timeout,
        } => {
            if !(0.0..=1.0).contains(&alpha) {
                bail!("--alpha must be within [0.0, 1.0], got {}", alpha);
            }
            config = config
                .with_alpha(alpha)
                .with_tool_timeout(std::time::Duration::from_secs(timeout));
            if no_external {
                // An unusable tool dir routes every request to the fallback
                config = config.with_tool_dir("").without_auto_fetch();
            }

            let orchestrator = Orchestrator::new(config);
            let request = ConversionRequest::new(source, target, &output);

            let start = Instant::now();
            let result = orchestrator.convert(&request);

            if result.is_success() {
                println!("{} ({:.1}s)", result.message, start.elapsed().as_secs_f32());
                println!("Output: {}", output.display());
                Ok(())
            } else {
                bail!("{}", result.message);
            }
        }

        Commands::Probe { no_fetch } => {
            if no_fetch {
                config = config.without_auto_fetch();
            }
            let prober = EngineProber::new(config.clone());
            match prober.probe() {
                EngineAvailability::AvailableWithModel(path) => {
                    println!("External engine: available");
                    println!("Model artifact: {}", path.display());
                }
                EngineAvailability::AvailableNoModel => {
                    println!("External engine: tool installed, no weight artifact");
                    println!(
                        "Place a trained model ({}*{}) under {}",
                        config.model_prefix,
                        config.model_suffix,
                        config.model_dir().display()
                    );
                }
                EngineAvailability::Unavailable => {
                    println!("External engine: unavailable");
                    println!("Conversions will use the spectral fallback");
                }
            }
            Ok(())
        }
    }
}
