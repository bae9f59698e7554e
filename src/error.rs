//! Error types for channel-archiver
//!
//! Errors are split by how the pipeline reacts to them:
//! - configuration problems are reported before any network traffic happens
//! - transport, decode and page-write failures abort the run
//! - failures local to a single attachment are not errors at all; they are
//!   reported as [`DownloadOutcome::Failed`](crate::types::DownloadOutcome)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for channel-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for channel-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "channel")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (request construction, connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body or page file was not valid JSON for the expected shape
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote service answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// The remote service asked us to slow down (HTTP 429)
    #[error("throttled by remote service (retry after {retry_after:?})")]
    Throttled {
        /// Delay requested by the service, if it sent one
        retry_after: Option<Duration>,
    },

    /// A persisted page file could not be used
    #[error("invalid page file {path}: {reason}")]
    InvalidPage {
        /// Path of the offending page file
        path: PathBuf,
        /// Why the page was rejected
        reason: String,
    },

    /// The service returned a page that does not move the cursor backwards
    #[error("pagination did not advance past message {cursor}")]
    CursorStalled {
        /// Cursor that was sent with the request
        cursor: String,
    },

    /// A download task panicked or was cancelled
    #[error("download task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this is a request timeout (per-transfer deadline exceeded)
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(e) if e.is_timeout())
    }
}
