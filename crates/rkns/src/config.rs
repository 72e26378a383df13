use std::path::Path;

use rkns_store::{ArrayOptions, Compression};
use serde::{Deserialize, Serialize};

use crate::error::{RknsError, RknsResult};

/// Tunables for opening and populating documents.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// detect_prefix_len = 512
/// populate_on_open = false
/// compression = { codec = "none" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RknsConfig {
    /// Bytes of a source file handed to adapter signature checks.
    pub detect_prefix_len: usize,
    /// Uncompressed chunk size of the raw blob array.
    pub raw_chunk_bytes: u64,
    /// Rows per chunk of standardized arrays. Derived from a 1 MiB target
    /// when unset.
    pub signal_chunk_rows: Option<u64>,
    /// Codec for every array chunk.
    pub compression: Compression,
    /// Derive `/rkns` right after embedding a foreign file.
    pub populate_on_open: bool,
}

impl Default for RknsConfig {
    fn default() -> Self {
        Self {
            detect_prefix_len: 256,
            raw_chunk_bytes: 1024 * 1024,
            signal_chunk_rows: None,
            compression: Compression::default(),
            populate_on_open: true,
        }
    }
}

impl RknsConfig {
    pub fn from_toml_str(text: &str) -> RknsResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RknsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> RknsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RknsError::source_io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> RknsResult<()> {
        if self.detect_prefix_len < 8 {
            return Err(RknsError::Config(format!(
                "detect_prefix_len must be at least 8, got {}",
                self.detect_prefix_len
            )));
        }
        if self.raw_chunk_bytes == 0 {
            return Err(RknsError::Config("raw_chunk_bytes must be positive".into()));
        }
        if self.signal_chunk_rows == Some(0) {
            return Err(RknsError::Config("signal_chunk_rows must be positive".into()));
        }
        Ok(())
    }

    /// Layout of the raw blob array.
    pub fn raw_array_options(&self) -> ArrayOptions {
        ArrayOptions {
            chunk_rows: Some(self.raw_chunk_bytes),
            target_chunk_bytes: self.raw_chunk_bytes,
            compression: self.compression,
        }
    }

    /// Layout of standardized arrays.
    pub fn signal_array_options(&self) -> ArrayOptions {
        ArrayOptions {
            chunk_rows: self.signal_chunk_rows,
            compression: self.compression,
            ..ArrayOptions::default()
        }
    }
}
