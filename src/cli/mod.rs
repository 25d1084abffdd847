use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

pub mod status;
pub use status::StatusDisplay;


/// Streaming audio player with a volume filter stage
#[derive(Debug, Parser)]
#[command(name = "filterplay")]
#[command(about = "Decode, filter, resample and play one audio input")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a file path or http(s) URL
    Play(PlayArgs),
    /// Print the streams of an input and the one that would be played
    Probe {
        /// File path or http(s) URL
        url: String,
    },
    /// List output devices
    #[command(alias = "device")]
    Devices,
}

#[derive(Debug, Clone, clap::Args)]
pub struct PlayArgs {
    /// File path or http(s) URL
    pub url: String,

    /// Linear gain applied by the volume filter
    #[arg(long, value_name = "G")]
    pub gain: Option<f64>,

    /// Output sample rate in Hz
    #[arg(long = "output-rate", value_name = "HZ")]
    pub output_rate: Option<u32>,

    /// Sleep this long after every write instead of relying on backpressure
    #[arg(long = "fixed-delay-ms", value_name = "MS")]
    pub fixed_delay_ms: Option<u64>,

    /// Skip corrupt packets instead of stopping
    #[arg(long = "skip-decode-errors")]
    pub skip_decode_errors: bool,

    /// Output device name
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Discard output instead of opening a device
    #[arg(long = "null-output")]
    pub null_output: bool,
}

impl PlayArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            gain: self.gain,
            output_sample_rate: self.output_rate,
            fixed_delay_ms: self.fixed_delay_ms,
            skip_decode_errors: self.skip_decode_errors,
            device: self.device.clone(),
        }
    }
}
