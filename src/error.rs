//! Error type shared by the loader, aggregator and renderer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Input backup missing or unreadable. Always fatal.
    #[error("failed to read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input is not well-formed XML (byte {position}): {message}")]
    Parse { position: u64, message: String },

    #[error("timestamp {text:?} does not match DD/mon/YYYY HH:mm:ss")]
    Timestamp { text: String },

    #[error("failed to write report to {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {message}")]
    Settings { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, ReportError>;
