//! Error types for TideKV
//!
//! Provides a unified error type for the storage layers, plus the fatal path
//! used by the database facade when local storage fails.

use thiserror::Error;

/// Result type alias using TideError
pub type Result<T> = std::result::Result<T, TideError>;

/// Unified error type for TideKV operations
#[derive(Debug, Error)]
pub enum TideError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Key codec error: {0}")]
    Codec(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TideError {
    fn from(e: bincode::Error) -> Self {
        TideError::Serialization(e.to_string())
    }
}

/// Terminate the process after an unrecoverable local storage failure.
///
/// Callers above the engine never observe a half-written database: once the
/// engine reports an error the only way out is through here.
#[cold]
pub(crate) fn fatal(context: &str, err: TideError) -> ! {
    tracing::error!(error = %err, "fatal storage failure during {}", context);
    std::process::abort()
}

/// Unwrap an engine result, aborting the process on failure.
pub(crate) trait OrFatal<T> {
    fn or_fatal(self, context: &str) -> T;
}

impl<T> OrFatal<T> for Result<T> {
    #[inline]
    fn or_fatal(self, context: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => fatal(context, e),
        }
    }
}
