use std::fs::File;
use std::io::Read;
use std::path::Path;

use rkns_adapter::AdapterRegistry;
use rkns_store::{LocalStore, StoreBackend, StoreError};
use rkns_types::layout::attrs;
use rkns_types::FormatId;
use tracing::debug;

use crate::error::{RknsError, RknsResult};

/// Decides whether an input is an RKNS document, a registered foreign
/// format, or unknown.
///
/// The RKNS check runs first and is authoritative. Otherwise adapters are
/// asked in registration order and the first match wins.
#[derive(Debug, Clone, Copy)]
pub struct FormatDetector<'a> {
    registry: &'a AdapterRegistry,
    prefix_len: usize,
}

impl<'a> FormatDetector<'a> {
    pub fn new(registry: &'a AdapterRegistry, prefix_len: usize) -> Self {
        Self {
            registry,
            prefix_len,
        }
    }

    /// Classify a path. Directories can only be RKNS stores.
    pub fn detect_path(&self, path: &Path) -> RknsResult<FormatId> {
        if path.is_dir() {
            let store = LocalStore::open_read_only(path)?;
            let format = if is_rkns_store(&store)? {
                FormatId::Rkns
            } else {
                FormatId::Unknown
            };
            debug!(path = %path.display(), format = %format, "directory classified");
            return Ok(format);
        }

        let file = File::open(path).map_err(|e| RknsError::source_io(path, e))?;
        let mut prefix = Vec::with_capacity(self.prefix_len);
        file.take(self.prefix_len as u64)
            .read_to_end(&mut prefix)
            .map_err(|e| RknsError::source_io(path, e))?;
        let format = self.detect_bytes(&prefix);
        debug!(path = %path.display(), format = %format, prefix_len = prefix.len(), "file classified");
        Ok(format)
    }

    /// Classify the leading bytes of a foreign file.
    pub fn detect_bytes(&self, bytes: &[u8]) -> FormatId {
        let prefix = &bytes[..bytes.len().min(self.prefix_len)];
        self.registry.detect(prefix).unwrap_or(FormatId::Unknown)
    }

    /// Classify an already opened store.
    pub fn detect_store(&self, store: &dyn StoreBackend) -> RknsResult<FormatId> {
        Ok(if is_rkns_store(store)? {
            FormatId::Rkns
        } else {
            FormatId::Unknown
        })
    }
}

/// A store is RKNS when its root group declares `format_version`.
pub fn is_rkns_store(store: &dyn StoreBackend) -> RknsResult<bool> {
    let attrs_key = ".zattrs";
    if !store.exists(".zgroup")? {
        return Ok(false);
    }
    let Some(raw) = store.get(attrs_key)? else {
        return Ok(false);
    };
    let attrs: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&raw)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(attrs.contains_key(attrs::FORMAT_VERSION))
}
