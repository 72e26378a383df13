//! RKNS documents.
//!
//! A document embeds a foreign time-series file (EDF, BDF and their "+"
//! variants) byte for byte and derives a standardized, chunked
//! representation from it. This is the main entry point for applications
//! embedding RKNS.
//!
//! ```no_run
//! use rkns::{default_registry, Document, RknsConfig};
//!
//! # fn main() -> rkns::RknsResult<()> {
//! let registry = default_registry()?;
//! let document = Document::open("night.edf", &registry, &RknsConfig::default())?;
//! println!("{}", document.tree()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod document;
pub mod error;

pub use config::RknsConfig;
pub use detector::{is_rkns_store, FormatDetector};
pub use document::{
    Document, DocumentInfo, DocumentState, FrequencyGroupInfo, OpenOptions, PhysicalSignal,
};
pub use error::{RknsError, RknsResult};

// Re-export key types
pub use rkns_adapter::{AdapterRegistry, FormatAdapter, SourceMetadata};
pub use rkns_store::{InMemoryStore, LocalStore, StoreBackend, StoreLocation};
pub use rkns_types::{ChannelMapping, FormatId, FormatVersion, HistoryEntry, HistoryOperation};

/// A registry holding the adapters shipped with this crate family.
pub fn default_registry() -> RknsResult<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    for adapter in rkns_edf::EdfAdapter::all() {
        registry.register(adapter)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_foreign_format() {
        let registry = default_registry().unwrap();
        let foreign: Vec<FormatId> = FormatId::ALL.into_iter().filter(FormatId::is_foreign).collect();
        assert_eq!(registry.formats(), foreign);
    }
}
