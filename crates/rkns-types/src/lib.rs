//! Foundation types for RKNS documents.
//!
//! Every other RKNS crate depends on `rkns-types`. Nothing in here touches
//! storage; these are the vocabulary types shared between the storage
//! engine, the format adapters, and the document lifecycle.
//!
//! # Key Types
//!
//! - [`FormatId`] - tag for the RKNS container and each supported foreign format
//! - [`FormatVersion`] - semantic version stamped on every RKNS root
//! - [`ChannelMapping`] - original channel label to standardized identifier
//! - [`HistoryEntry`] - one immutable record in a document's history log
//! - [`layout`] - the persisted node and attribute names

pub mod channel;
pub mod error;
pub mod format;
pub mod history;
pub mod layout;
pub mod version;

pub use channel::{standardize_label, standardized_ids, ChannelMapping};
pub use error::TypeError;
pub use format::FormatId;
pub use history::{HistoryEntry, HistoryOperation};
pub use version::FormatVersion;
