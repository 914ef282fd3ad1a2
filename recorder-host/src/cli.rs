//! Command-line interface for wav-recorder
//!
//! Handles argument parsing, config loading and logging setup.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use recorder_core::{NamingScheme, RecorderConfig, RecorderError};

use crate::error::HostError;

/// wav-recorder - record and play 16-bit PCM WAV files from a command prompt
#[derive(Parser, Debug)]
#[command(name = "wav-recorder")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the recordings
    #[arg(short, long, default_value = "recordings")]
    pub store_dir: PathBuf,

    /// JSON config file; missing fields take their defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File naming scheme (overrides the config file)
    #[arg(long, value_enum)]
    pub naming: Option<NamingArg>,

    /// Run the simulated microphone and speaker as fast as possible instead
    /// of at the configured sample rate
    #[arg(long)]
    pub fast: bool,

    /// Frequency of the simulated microphone tone
    #[arg(long, default_value_t = 440.0)]
    pub tone_hz: f64,

    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamingArg {
    Counter,
    Timestamp,
}

impl From<NamingArg> for NamingScheme {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Counter => NamingScheme::Counter,
            NamingArg::Timestamp => NamingScheme::Timestamp,
        }
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Whether the simulated devices run at the sample rate. On by default.
    pub fn realtime(&self) -> bool {
        !self.fast
    }

    /// Load the config file (if any) and apply command-line overrides.
    pub fn recorder_config(&self) -> Result<RecorderConfig, HostError> {
        let mut config = match &self.config {
            Some(path) => RecorderConfig::from_json(&fs::read_to_string(path)?)?,
            None => RecorderConfig::default(),
        };
        if let Some(naming) = self.naming {
            config.naming.scheme = naming.into();
        }
        config.validate().map_err(RecorderError::ConfigurationFailed)?;
        Ok(config)
    }
}

/// Initialize the logging system based on CLI arguments
///
/// `RUST_LOG` still applies on top of the flags.
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    builder.filter_level(LevelFilter::Warn);
    for module in ["recorder_core", "recorder_host", "wav_recorder"] {
        builder.filter_module(module, args.log_level());
    }
    builder.parse_default_env();

    builder.format_timestamp_millis().init();
}
