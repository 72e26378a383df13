use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid format version {input:?}: {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("unknown format identifier: {0}")]
    UnknownFormat(String),

    #[error("invalid channel mapping: {0}")]
    InvalidMapping(String),

    #[error("invalid history entry: {0}")]
    InvalidHistoryEntry(String),
}
