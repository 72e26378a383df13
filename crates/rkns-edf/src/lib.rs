//! EDF-family support for RKNS.
//!
//! Covers the European Data Format (16-bit samples), BioSemi's BDF (24-bit
//! samples), and their "+" variants with time-stamped annotation lists.
//!
//! - [`sniff_variant`] classifies a byte prefix without parsing it.
//! - [`EdfHeader::parse`] is the strict, authoritative header parser;
//!   [`EdfHeader::read_labels`] is its lenient counterpart for channel
//!   mapping.
//! - [`EdfWriter`] produces complete files, mostly for fixtures.
//! - [`EdfAdapter`] plugs each variant into an
//!   [`AdapterRegistry`](rkns_adapter::AdapterRegistry).

pub mod adapter;
pub mod annotation;
pub mod error;
pub mod header;
pub mod samples;
pub mod variant;
pub mod writer;

pub use adapter::EdfAdapter;
pub use annotation::Annotation;
pub use error::{EdfError, EdfResult};
pub use header::{physical_value, EdfHeader, SignalHeader};
pub use variant::{sniff_variant, EdfVariant};
pub use writer::{EdfWriter, SignalSpec};
