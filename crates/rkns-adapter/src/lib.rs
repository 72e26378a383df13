//! Format adapter contract for RKNS documents.
//!
//! A foreign format (EDF, BDF, ...) plugs into an RKNS document through a
//! [`FormatAdapter`]: a cheap signature check, a lenient channel-label
//! extraction, and a deterministic transform from raw bytes into a
//! [`StandardizedRecord`]. Adapters are collected in an explicitly
//! constructed [`AdapterRegistry`] that the document layer takes as a
//! parameter; there is no global registry.

pub mod adapter;
pub mod error;
pub mod metadata;
pub mod record;
pub mod registry;

pub use adapter::FormatAdapter;
pub use error::{AdapterError, AdapterResult};
pub use metadata::SourceMetadata;
pub use record::{RecordArray, RecordGroup, StandardizedRecord};
pub use registry::AdapterRegistry;
