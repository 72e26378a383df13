use rkns_adapter::AdapterError;

/// Errors from parsing or writing EDF-family files.
#[derive(Debug, thiserror::Error)]
pub enum EdfError {
    /// The input ends before a required field or data record.
    #[error("truncated input: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    /// The version field is neither the EDF nor the BDF magic.
    #[error("unrecognized version field {0:?}")]
    InvalidMagic(String),

    /// A main-header field does not parse.
    #[error("invalid header field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// A signal header is malformed or inconsistent.
    #[error("invalid signal {index} ({label:?}): {reason}")]
    InvalidSignal {
        index: usize,
        label: String,
        reason: String,
    },

    /// The declared header size disagrees with the signal count.
    #[error("header declares {declared} bytes, {signals} signals need {expected}")]
    HeaderSize {
        declared: usize,
        signals: usize,
        expected: usize,
    },

    /// A time-stamped annotation list does not parse.
    #[error("invalid annotation in record {record}: {reason}")]
    Annotation { record: u64, reason: String },

    /// The writer was given inconsistent input.
    #[error("writer: {0}")]
    Writer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EdfError> for AdapterError {
    fn from(err: EdfError) -> Self {
        AdapterError::corrupt(err.to_string())
    }
}

/// Result alias for EDF operations.
pub type EdfResult<T> = Result<T, EdfError>;
