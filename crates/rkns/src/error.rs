use rkns_adapter::AdapterError;
use rkns_store::StoreError;
use rkns_types::{FormatId, FormatVersion, TypeError};
use thiserror::Error;

/// Errors from document operations.
///
/// Every variant names the violated condition; none is retried or
/// downgraded internally.
#[derive(Debug, Error)]
pub enum RknsError {
    /// Neither the RKNS check nor any registered adapter recognized the input.
    #[error("unsupported format: {path}")]
    UnsupportedFormat { path: String },

    /// The root's `format_version` is missing or differs from this build's.
    #[error(
        "format version mismatch: expected {expected}, found {}",
        found.as_deref().unwrap_or("no format_version")
    )]
    VersionMismatch {
        expected: FormatVersion,
        found: Option<String>,
    },

    /// `/rkns` already exists; use reset to derive it again.
    #[error("{group} already exists; reset the document to derive it again")]
    AlreadyPopulated { group: String },

    /// A read needed `/rkns`, which has not been derived yet.
    #[error("{group} is absent; populate the document first")]
    NotPopulated { group: String },

    /// No adapter is registered for the raw blob's format.
    #[error("no adapter registered for source format {0}")]
    NoAdapterForFormat(FormatId),

    /// The adapter rejected bytes it had detected as its own format.
    #[error("corrupt {format} source: {reason}")]
    CorruptSource { format: FormatId, reason: String },

    #[error("storage error: {0}")]
    Backend(#[from] StoreError),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("invalid attribute: {0}")]
    Type(#[from] TypeError),

    /// Reading the source file or writing a reconstructed copy failed.
    #[error("I/O error on {path}: {source}")]
    SourceIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The target location already holds data.
    #[error("target already exists: {0}")]
    TargetExists(String),

    /// The store is not a well-formed RKNS document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The raw blob no longer matches the digest recorded at embedding time.
    #[error("raw blob digest mismatch: recorded {expected}, computed {computed}")]
    RawDigestMismatch { expected: String, computed: String },

    /// A remapping would add or drop original labels.
    #[error("invalid channel mapping: {0}")]
    InvalidChannelMapping(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RknsError {
    pub(crate) fn source_io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::SourceIo {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result alias for document operations.
pub type RknsResult<T> = Result<T, RknsError>;
