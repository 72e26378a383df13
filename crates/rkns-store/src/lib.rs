//! Hierarchical storage for RKNS documents.
//!
//! A store holds named groups, each with nested groups, chunked
//! N-dimensional arrays, and a JSON attribute map. The layout follows the
//! Zarr v2 conventions closely enough to be recognizable: `.zgroup` marks a
//! group, `.zarray` describes an array, `.zattrs` carries attributes, and
//! array chunks live under `<array>/c/<n>`.
//!
//! # Backends
//!
//! All backends implement the [`StoreBackend`] key/value trait:
//!
//! - [`InMemoryStore`] -- `BTreeMap`-based store for tests and scratch documents
//! - [`LocalStore`] -- one file per key under a directory
//!
//! # Design Rules
//!
//! 1. Backends never interpret values -- they are pure key/value stores.
//! 2. A node is visible once its marker key exists. Writers that need
//!    all-or-nothing visibility write children first and the marker last
//!    (see [`Group::create_group_atomic`]).
//! 3. Chunks carry a CRC32 and arrays carry a BLAKE3 content digest; both
//!    are checked on read.
//! 4. All I/O errors are propagated, never retried or silently ignored.

pub mod array;
pub mod backend;
pub mod error;
pub mod group;
pub mod local;
pub mod location;
pub mod memory;

pub use array::{
    content_digest, Array, ArrayData, ArrayMeta, ArrayOptions, Compression, DataType,
};
pub use backend::StoreBackend;
pub use error::{StoreError, StoreResult};
pub use group::{Attributes, Group, Member, MemberKind};
pub use local::LocalStore;
pub use location::StoreLocation;
pub use memory::InMemoryStore;
