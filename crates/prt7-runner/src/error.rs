//! Error types for the decoder runner.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`LineSource`](crate::LineSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying transport failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The source could not be opened.
    #[error("failed to open {target}: {source}")]
    Open {
        /// Path or address that was being opened.
        target: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A scripted failure (test and replay sources).
    #[error("{0}")]
    Scripted(String),
}

/// Errors loading a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`RunConfig`](crate::RunConfig).
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {message}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level errors for runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Line source failure.
    #[error("line source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Message could not be encoded into frames.
    #[error("encode error: {0}")]
    Encode(#[from] prt7_protocol::EncodeError),

    /// Summary serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
