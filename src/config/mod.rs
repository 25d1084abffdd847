use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::output::CpalSinkConfig;
use crate::audio::pipeline::{DecodeErrorPolicy, Pacing, PipelineOptions};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    Backpressure,
    FixedDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorMode {
    Fatal,
    Skip,
}

/// Player configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Linear gain applied by the volume filter.
    pub gain: f64,
    /// Output rate; the input rate is kept when unset.
    pub output_sample_rate: Option<u32>,
    pub output_buffer_bytes: usize,
    pub pacing: PacingMode,
    pub pacing_delay_ms: u64,
    pub sink_queue_depth: usize,
    pub decode_errors: DecodeErrorMode,
    pub max_consecutive_decode_errors: u32,
    pub preferred_device: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            gain: 0.5,
            output_sample_rate: None,
            output_buffer_bytes: 192_000,
            pacing: PacingMode::Backpressure,
            pacing_delay_ms: 16,
            sink_queue_depth: 8,
            decode_errors: DecodeErrorMode::Fatal,
            max_consecutive_decode_errors: 3,
            preferred_device: None,
        }
    }
}

/// Per-session values taken from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub gain: Option<f64>,
    pub output_sample_rate: Option<u32>,
    pub fixed_delay_ms: Option<u64>,
    pub skip_decode_errors: bool,
    pub device: Option<String>,
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(invalid("gain", "must be a finite, non-negative number"));
        }
        if self.output_sample_rate == Some(0) {
            return Err(invalid("output_sample_rate", "must be greater than zero"));
        }
        if self.output_buffer_bytes == 0 {
            return Err(invalid("output_buffer_bytes", "must be greater than zero"));
        }
        if self.sink_queue_depth == 0 {
            return Err(invalid("sink_queue_depth", "must be at least 1"));
        }
        Ok(())
    }

    /// Apply command-line overrides for one session.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(gain) = overrides.gain {
            self.gain = gain;
        }
        if let Some(rate) = overrides.output_sample_rate {
            self.output_sample_rate = Some(rate);
        }
        if let Some(ms) = overrides.fixed_delay_ms {
            self.pacing = PacingMode::FixedDelay;
            self.pacing_delay_ms = ms;
        }
        if overrides.skip_decode_errors {
            self.decode_errors = DecodeErrorMode::Skip;
        }
        if let Some(device) = &overrides.device {
            self.preferred_device = Some(device.clone());
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            gain: self.gain,
            output_sample_rate: self.output_sample_rate,
            output_buffer_bytes: self.output_buffer_bytes,
            pacing: match self.pacing {
                PacingMode::Backpressure => Pacing::Backpressure,
                PacingMode::FixedDelay => {
                    Pacing::FixedDelay(Duration::from_millis(self.pacing_delay_ms))
                }
            },
            decode_errors: match self.decode_errors {
                DecodeErrorMode::Fatal => DecodeErrorPolicy::Fatal,
                DecodeErrorMode::Skip => DecodeErrorPolicy::Skip {
                    max_consecutive: self.max_consecutive_decode_errors,
                },
            },
        }
    }

    pub fn sink_config(&self) -> CpalSinkConfig {
        CpalSinkConfig {
            device: self.preferred_device.clone(),
            queue_depth: self.sink_queue_depth,
            ..CpalSinkConfig::default()
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load `~/.config/filterplay/config.toml`, or defaults when it does not exist.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(config_path)
    }

    /// Load an explicit configuration file. A missing file yields defaults.
    pub fn load_from(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let config = Self::load_config(&config_path)?;
        config.validate()?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.config.validate()?;
        self.save_config()
    }

    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("filterplay")
            .join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }
}
