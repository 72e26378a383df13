/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested group, array, or key was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A node or store already exists where a new one was requested.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A node exists but has the wrong kind.
    #[error("{path} is not {expected}")]
    WrongNodeKind { path: String, expected: &'static str },

    /// Invalid node name or path.
    #[error("invalid node name {0:?}")]
    InvalidName(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk failed its CRC check or could not be decoded.
    #[error("corrupt chunk {key}: {reason}")]
    CorruptChunk { key: String, reason: String },

    /// Decoded array content does not match the recorded digest.
    #[error("corrupt array {path}: expected digest {expected}, computed {computed}")]
    CorruptArray {
        path: String,
        expected: String,
        computed: String,
    },

    /// Data does not match the declared shape.
    #[error("shape mismatch for {path}: shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        path: String,
        shape: Vec<u64>,
        expected: u64,
        actual: u64,
    },

    /// Typed read of an array with a different element type.
    #[error("dtype mismatch for {path}: stored {stored}, requested {requested}")]
    DtypeMismatch {
        path: String,
        stored: String,
        requested: String,
    },

    /// Row range outside the array.
    #[error("rows {start}..{end} out of bounds for {path} with {rows} rows")]
    OutOfBounds {
        path: String,
        start: u64,
        end: u64,
        rows: u64,
    },

    /// Compression or decompression failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// The location string names a backend this build cannot open.
    #[error("unsupported store location: {0}")]
    UnsupportedLocation(String),

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
