use rkns_store::StoreError;
use rkns_types::FormatId;

/// Errors from adapters and the adapter registry.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The bytes passed detection but do not parse as the adapter's format.
    #[error("corrupt source: {reason}")]
    CorruptSource { reason: String },

    /// `Rkns` and `Unknown` cannot have adapters.
    #[error("format {0} cannot have an adapter")]
    ReservedFormat(FormatId),

    /// No adapter is registered for the format.
    #[error("no adapter registered for {0}")]
    NotFound(FormatId),

    /// Writing a record into a store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AdapterError {
    /// Create a `CorruptSource` error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptSource {
            reason: reason.into(),
        }
    }
}

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
