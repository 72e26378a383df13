//! Persisted node and attribute names of an RKNS document.
//!
//! ```text
//! /                 attrs: format_version, rkns_implementation, created_at
//! /_raw             attrs: path_basename, source_format, size_bytes, blake3, modification_time
//! /_raw/signal      u8 array, the verbatim source file
//! /history          one child group per entry, append-only
//! /popis            attrs: original label -> standardized id
//! /rkns             absent until populated
//! /rkns/signals/fg_<rate>/{signal, signal_minmaxs}
//! /rkns/annotations/{onset, duration}
//! ```

/// Raw blob group.
pub const RAW: &str = "_raw";
/// Array holding the verbatim source bytes, inside [`RAW`].
pub const RAW_SIGNAL: &str = "signal";
/// History log group.
pub const HISTORY: &str = "history";
/// Channel mapping group.
pub const POPIS: &str = "popis";
/// Standardized record group.
pub const RKNS: &str = "rkns";
/// Signal container inside [`RKNS`].
pub const SIGNALS: &str = "signals";
/// Annotation container inside [`RKNS`].
pub const ANNOTATIONS: &str = "annotations";
/// Prefix of every frequency group inside [`SIGNALS`].
pub const FREQUENCY_GROUP_PREFIX: &str = "fg_";
/// Digital samples of a frequency group.
pub const SIGNAL: &str = "signal";
/// Physical/digital ranges of a frequency group.
pub const SIGNAL_MINMAXS: &str = "signal_minmaxs";

/// Attribute keys.
pub mod attrs {
    pub const FORMAT_VERSION: &str = "format_version";
    pub const IMPLEMENTATION: &str = "rkns_implementation";
    pub const CREATED_AT: &str = "created_at";
    pub const PATH_BASENAME: &str = "path_basename";
    pub const SOURCE_FORMAT: &str = "source_format";
    pub const SIZE_BYTES: &str = "size_bytes";
    pub const BLAKE3: &str = "blake3";
    pub const MODIFICATION_TIME: &str = "modification_time";

    // Standardized record.
    pub const CHANNELS: &str = "channels";
    pub const CHANNEL_LABELS: &str = "channel_labels";
    pub const SAMPLE_RATE: &str = "sample_rate";
    pub const UNITS: &str = "units";
    pub const DESCRIPTIONS: &str = "descriptions";
}

/// Value of [`attrs::IMPLEMENTATION`] written by this crate family.
pub const IMPLEMENTATION_NAME: &str = "rust";

/// Name of the frequency group holding channels sampled at `rate` Hz.
pub fn frequency_group_name(rate: f64) -> String {
    format!("{FREQUENCY_GROUP_PREFIX}{rate}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_rates_have_no_fraction() {
        assert_eq!(frequency_group_name(256.0), "fg_256");
        assert_eq!(frequency_group_name(0.5), "fg_0.5");
    }
}
