//! Error types for planesource and planecache

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum Error {
    /// Position arity disagrees with the strategy's axis count
    #[error("Dimension mismatch: expected {expected} axes, got {actual}")]
    DimensionMismatch {
        /// Number of axes the strategy declares
        expected: usize,
        /// Number of coordinates supplied
        actual: usize,
    },

    /// Inconsistent lengths, position, raster index or axis number
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    /// The underlying decoder failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Cache used before both a source and a strategy were installed
    #[error("Cache not configured: no {0}")]
    NotConfigured(&'static str),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error outside a source fetch (config files, worker threads)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure reported by a [`Source`](crate::Source) while decoding an object
#[derive(Debug, Error)]
#[error("Source error: {message}{}", cause_suffix(.cause))]
pub struct SourceError {
    message: String,
    #[source]
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

fn cause_suffix(cause: &Option<Box<dyn StdError + Send + Sync>>) -> String {
    cause
        .as_ref()
        .map(|cause| format!(": {}", cause))
        .unwrap_or_default()
}

impl SourceError {
    /// Create an error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Create an error wrapping an underlying failure
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// The message describing the failed request
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        SourceError::with_cause("I/O error", err)
    }
}
