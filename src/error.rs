use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a wait before the workers settle
#[derive(Error, Debug)]
pub enum WaitError {
    /// The stats socket could not be opened
    #[error("connect() on {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The connection broke while reading the stats document
    #[error("read from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stats document is not UTF-8 text
    #[error("stats response is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The stats document is not JSON
    #[error("stats response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The stats document is JSON but not shaped like a uWSGI stats dump
    #[error("{0}")]
    Schema(String),

    /// Error reading or parsing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl WaitError {
    /// Process exit code for this error.
    ///
    /// Every error is fatal and shares one code; `2` is reserved for a timeout.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Whether the error came from the socket rather than from the payload
    pub fn is_connection(&self) -> bool {
        matches!(self, WaitError::Connect { .. } | WaitError::Read { .. })
    }
}

/// Result type alias for wait operations
pub type Result<T> = std::result::Result<T, WaitError>;
