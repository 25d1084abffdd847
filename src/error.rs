use thiserror::Error;

use crate::models::AudioFormat;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Device error: {0}")]
    Device(#[from] WriteError),
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Playback(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Device(err) => err.user_message(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Playback(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Device(err) => err.recovery_suggestions(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Playback(PlaybackError::NoAudioStream { .. }) => ErrorSeverity::Warning,
            PlayerError::Playback(err) if err.is_construction() => ErrorSeverity::Error,
            PlayerError::Playback(_) => ErrorSeverity::Critical,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Device(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Everything that can end a playback session early.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Cannot open '{url}': {reason}")]
    Open { url: String, reason: String },

    #[error("No audio stream in '{url}'")]
    NoAudioStream { url: String },

    #[error("No decoder found for codec {codec}")]
    NoDecoderFound { codec: String },

    #[error("Failed to open decoder: {0}")]
    OpenDecoderFailed(String),

    #[error("Filter graph construction failed: {0}")]
    GraphBuild(#[from] GraphBuildError),

    #[error("Resampler initialization failed: {0}")]
    ResamplerInit(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Filter graph error: {0}")]
    GraphRuntime(#[from] GraphRuntimeError),

    #[error("Resample error: {0}")]
    Resample(#[from] ResampleError),

    #[error("Output error: {0}")]
    Write(#[from] WriteError),
}

impl PlaybackError {
    /// Errors raised before the packet loop starts.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            PlaybackError::Open { .. }
                | PlaybackError::NoAudioStream { .. }
                | PlaybackError::NoDecoderFound { .. }
                | PlaybackError::OpenDecoderFailed(_)
                | PlaybackError::GraphBuild(_)
                | PlaybackError::ResamplerInit(_)
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::Open { url, reason } => {
                format!("Could not open '{}': {}", url, reason)
            }
            PlaybackError::NoAudioStream { url } => {
                format!("'{}' does not contain an audio stream", url)
            }
            PlaybackError::NoDecoderFound { codec } => {
                format!("No decoder is available for codec '{}'", codec)
            }
            PlaybackError::OpenDecoderFailed(msg) => {
                format!("The audio decoder could not be started: {}", msg)
            }
            PlaybackError::GraphBuild(err) => {
                format!("The volume filter could not be set up: {}", err)
            }
            PlaybackError::ResamplerInit(msg) => {
                format!("Audio conversion could not be set up: {}", msg)
            }
            PlaybackError::Decode(err) => err.user_message(),
            PlaybackError::GraphRuntime(err) => {
                format!("Audio filtering stopped: {}", err)
            }
            PlaybackError::Resample(err) => {
                format!("Audio conversion stopped: {}", err)
            }
            PlaybackError::Write(err) => err.user_message(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlaybackError::Open { .. } => vec![
                "Check that the path or URL is correct".to_string(),
                "For network streams, check connectivity and that the server allows range requests".to_string(),
            ],
            PlaybackError::NoAudioStream { .. } => vec![
                "Use 'filterplay probe <url>' to list the streams in the file".to_string(),
            ],
            PlaybackError::NoDecoderFound { .. } | PlaybackError::OpenDecoderFailed(_) => vec![
                "Supported codecs: FLAC, WAV/PCM, ALAC, MP3, AAC, OGG/Vorbis".to_string(),
                "Convert the file to a supported format".to_string(),
            ],
            PlaybackError::GraphBuild(_) => vec![
                "Check the configured gain is a finite, non-negative number".to_string(),
            ],
            PlaybackError::ResamplerInit(_) => vec![
                "Check the configured output sample rate".to_string(),
            ],
            PlaybackError::Decode(err) => err.recovery_suggestions(),
            PlaybackError::GraphRuntime(_) => vec!["Try playing the file again".to_string()],
            PlaybackError::Resample(ResampleError::BufferTooSmall { .. }) => vec![
                "Increase 'output_buffer_bytes' in the configuration file".to_string(),
            ],
            PlaybackError::Resample(_) => vec!["Try playing the file again".to_string()],
            PlaybackError::Write(err) => err.recovery_suggestions(),
        }
    }
}

/// Failure at one step of filter graph construction.
#[derive(Debug, Error, PartialEq)]
pub enum GraphBuildError {
    #[error("no filter named '{name}'")]
    FilterNotFound { name: String },

    #[error("could not initialize filter '{instance}': {reason}")]
    InitFailed { instance: String, reason: String },

    #[error("could not link '{from}' to '{to}': {reason}")]
    LinkFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("could not configure graph: {0}")]
    ConfigureFailed(String),
}

/// Failure while frames flow through a configured graph.
#[derive(Debug, Error, PartialEq)]
pub enum GraphRuntimeError {
    #[error("graph is not configured")]
    NotConfigured,

    #[error("frame format {actual} does not match source format {expected}")]
    FormatMismatch {
        expected: AudioFormat,
        actual: AudioFormat,
    },

    #[error("graph already received end of stream")]
    EndOfStream,
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Corrupt packet: {0}")]
    CorruptPacket(String),

    #[error("Stream format changed mid-stream: expected {expected}, got {actual}")]
    FormatChanged { expected: String, actual: String },

    #[error("Decoder reset required")]
    ResetRequired,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::CorruptPacket(msg) => {
                format!("Audio data appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::FormatChanged { .. } => {
                "The audio format changed in the middle of the stream".to_string()
            }
            DecodeError::ResetRequired => {
                "The stream requires a decoder reset, which is not supported".to_string()
            }
            DecodeError::DecodeFailed(msg) => {
                format!("Failed to decode audio data: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::CorruptPacket(_) => vec![
                "Use --skip-decode-errors to continue past damaged packets".to_string(),
                "Try re-downloading or re-copying the file".to_string(),
            ],
            DecodeError::FormatChanged { .. } | DecodeError::ResetRequired => vec![
                "Re-encode the file with a constant format".to_string(),
            ],
            DecodeError::DecodeFailed(_) => vec![
                "Check if the file is completely downloaded".to_string(),
                "Verify the file is not corrupted".to_string(),
            ],
        }
    }

    /// Whether skipping the offending packet can let playback continue.
    pub fn is_skippable(&self) -> bool {
        matches!(self, DecodeError::CorruptPacket(_))
    }
}

/// Format conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("output needs {needed} bytes but buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("frame format {actual} does not match resampler input {expected}")]
    FormatMismatch {
        expected: AudioFormat,
        actual: AudioFormat,
    },
}

/// Output device errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Unsupported output configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Write range {offset}+{len} exceeds buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Output sink is closed")]
    Closed,
}

impl WriteError {
    pub fn user_message(&self) -> String {
        match self {
            WriteError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            WriteError::UnsupportedConfig(msg) => {
                format!("The audio device rejected the output format: {}", msg)
            }
            WriteError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            WriteError::OutOfBounds { .. } => "Internal output buffer error".to_string(),
            WriteError::Closed => "The audio device stopped accepting data".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            WriteError::DeviceNotFound { .. } => vec![
                "Use 'filterplay devices' to see available audio devices".to_string(),
                "Check that your audio device is connected and powered on".to_string(),
            ],
            WriteError::UnsupportedConfig(_) => vec![
                "Try a different output sample rate with --output-rate".to_string(),
                "Try selecting a different audio device with --device".to_string(),
            ],
            WriteError::StreamError(_) | WriteError::Closed => vec![
                "Check audio device connections".to_string(),
                "Close other applications using exclusive audio access".to_string(),
            ],
            WriteError::OutOfBounds { .. } => vec!["Please report this as a bug".to_string()],
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::InvalidValue { key, reason } => {
                format!("Configuration value '{}' is invalid: {}", key, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Pass an explicit file with --config".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
            ConfigError::InvalidValue { key, .. } => vec![
                format!("Fix or remove '{}' in the configuration file", key),
            ],
        }
    }
}
