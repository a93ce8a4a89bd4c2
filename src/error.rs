//! Error types for segment-dl
//!
//! Per-index failures (timeouts, unexpected statuses, storage problems) are
//! represented here too, but the pipeline contains them at index granularity:
//! they surface as skipped indices in the run report, not as a failed run.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SegmentIndex;

/// Result type alias for segment-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for segment-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Network error reported by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request did not complete within its timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// Address of the resource that timed out
        url: String,
    },

    /// The remote end reset or refused the connection
    #[error("connection to {url} failed: {reason}")]
    Connection {
        /// Address of the resource
        url: String,
        /// Transport-level reason
        reason: String,
    },

    /// The server answered with a status other than 200/404
    #[error("segment {index} returned unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// Index of the affected segment
        index: SegmentIndex,
        /// HTTP status code (0 when no response was received)
        status: u16,
    },

    /// A segment could not be written to local storage
    #[error("failed to store segment at {path}: {source}")]
    Storage {
        /// Destination path of the segment
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A resource address could not be parsed
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        /// The offending address
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (ffmpeg, mpv, ...)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, ...)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Discovery finished without a single usable segment
    #[error("no segments found")]
    NoSegments,
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Machine-readable error code, used in logs and by the CLI exit path
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Timeout { .. } => "timeout",
            Error::Connection { .. } => "connection_error",
            Error::UnexpectedStatus { .. } => "unexpected_status",
            Error::Storage { .. } => "storage_error",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::NoSegments => "no_segments",
        }
    }
}
