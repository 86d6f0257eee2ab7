//! Error types for devtrack-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for devtrack-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error at line {line_number}: {source}")]
    Json {
        /// 1-based line the error was reported for (0 when writing).
        line_number: usize,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid JSONL format.
    #[error("Invalid JSONL format: {0}")]
    InvalidFormat(String),
}

/// A specialized Result type for devtrack-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
