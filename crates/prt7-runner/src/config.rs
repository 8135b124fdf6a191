//! Decoder and run configuration.
//!
//! [`DecoderConfig`] controls the driver loop itself. [`RunConfig`] describes a
//! whole session (where frames come from, how results are printed) and can be
//! loaded from YAML:
//!
//! ```yaml
//! source:
//!   serial: /dev/ttyUSB0
//! baud: 9600
//! read_timeout_ms: 50
//! idle_threshold: 10
//! strict_numeric: false
//! output: text
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use prt7_protocol::NumericPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};

/// Consecutive empty reads that end a session.
pub const DEFAULT_IDLE_THRESHOLD: u32 = 10;

/// Configuration for the decode loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Consecutive empty reads before the session ends normally. At least 1.
    pub idle_threshold: u32,
    /// How map payloads are converted to rotations.
    pub numeric_policy: NumericPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            numeric_policy: NumericPolicy::Lenient,
        }
    }
}

impl DecoderConfig {
    /// Set the idle threshold. Zero is treated as one.
    pub fn with_idle_threshold(mut self, threshold: u32) -> Self {
        self.idle_threshold = threshold.max(1);
        self
    }

    /// Set the numeric policy for map frames.
    pub fn with_numeric_policy(mut self, policy: NumericPolicy) -> Self {
        self.numeric_policy = policy;
        self
    }
}

/// Where frames are read from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Standard input.
    #[default]
    Stdin,
    /// A regular file.
    File(PathBuf),
    /// A serial device, opened 8N1 at the configured baud rate.
    Serial(PathBuf),
    /// A serial-over-TCP bridge (`host:port`).
    Tcp(String),
}

/// How the end-of-session summary is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable report.
    #[default]
    Text,
    /// Single JSON object.
    Json,
}

/// Configuration for a decoding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Frame source.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: SourceConfig,
    /// Read timeout in milliseconds for stdin, serial and socket sources.
    pub read_timeout_ms: u64,
    /// Serial line speed.
    pub baud: u32,
    /// Consecutive empty reads that end the session.
    pub idle_threshold: u32,
    /// Reject map frames whose payload is not a valid integer.
    pub strict_numeric: bool,
    /// Summary format.
    pub output: OutputFormat,
    /// Print a line for every frame.
    pub echo_frames: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            source: SourceConfig::Stdin,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            baud: DEFAULT_BAUD_RATE,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            strict_numeric: false,
            output: OutputFormat::Text,
            echo_frames: true,
        }
    }
}

impl RunConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML configuration text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "idle_threshold",
                message: "must be at least 1".to_string(),
            });
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "read_timeout_ms",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.baud == 0 {
            return Err(ConfigError::InvalidValue {
                field: "baud",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Read timeout for sources that wait on a device or socket.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Decoder settings derived from this run configuration.
    pub fn decoder_config(&self) -> DecoderConfig {
        let policy = if self.strict_numeric {
            NumericPolicy::Strict
        } else {
            NumericPolicy::Lenient
        };
        DecoderConfig::default()
            .with_idle_threshold(self.idle_threshold)
            .with_numeric_policy(policy)
    }
}
