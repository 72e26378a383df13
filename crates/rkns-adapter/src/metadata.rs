use serde::{Deserialize, Serialize};

use rkns_types::{ChannelMapping, FormatId};

/// What a document knows about its embedded source file, read back from
/// the raw blob's attributes and handed to [`FormatAdapter::transform`].
///
/// [`FormatAdapter::transform`]: crate::FormatAdapter::transform
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub path_basename: String,
    pub source_format: FormatId,
    pub size_bytes: u64,
    /// BLAKE3 hex digest of the raw bytes.
    pub blake3: String,
    /// RFC 3339 modification time of the source file, when known.
    #[serde(default)]
    pub modification_time: Option<String>,
    /// Current `/popis` mapping. Labels missing from it fall back to the
    /// default standardization.
    #[serde(default)]
    pub channel_mapping: ChannelMapping,
}

impl SourceMetadata {
    /// Metadata for bytes that did not come from a file on disk.
    pub fn for_bytes(name: impl Into<String>, format: FormatId, raw: &[u8]) -> Self {
        Self {
            path_basename: name.into(),
            source_format: format,
            size_bytes: raw.len() as u64,
            blake3: rkns_store::content_digest(raw),
            modification_time: None,
            channel_mapping: ChannelMapping::new(),
        }
    }
}
