use rkns_types::{ChannelMapping, FormatId};

use crate::error::AdapterResult;
use crate::metadata::SourceMetadata;
use crate::record::StandardizedRecord;

/// Transforms one foreign file format into the standardized representation.
///
/// The trait is object-safe and `Send + Sync` so adapters can be shared as
/// `Arc<dyn FormatAdapter>` in an [`AdapterRegistry`](crate::AdapterRegistry).
///
/// Contract:
/// - `detect` looks only at a byte prefix and never fully parses.
/// - `extract_channel_mapping` never fails for input that passed `detect`;
///   every original label appears exactly once as a key.
/// - `transform` is deterministic: identical bytes yield an identical record.
///   It may reject bytes that `detect` accepted with `CorruptSource`.
pub trait FormatAdapter: Send + Sync {
    /// Short name for logs (e.g., "edf").
    fn name(&self) -> &str;

    /// The format this adapter handles.
    fn format(&self) -> FormatId;

    /// Cheap signature check on the first bytes of a file.
    fn detect(&self, prefix: &[u8]) -> bool;

    /// Channel labels from the native header, mapped to standardized ids.
    fn extract_channel_mapping(&self, raw: &[u8]) -> ChannelMapping;

    /// Parse and convert the whole file.
    fn transform(&self, raw: &[u8], source: &SourceMetadata) -> AdapterResult<StandardizedRecord>;
}
