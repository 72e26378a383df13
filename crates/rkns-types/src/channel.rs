use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Mapping from a source file's channel labels to standardized identifiers.
///
/// Label-preserving: every original label is a key exactly once. Insertion
/// order follows the source header, so iteration reproduces channel order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    entries: Vec<(String, String)>,
}

impl ChannelMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from labels in header order, standardizing each.
    ///
    /// Duplicate labels keep their first occurrence.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for label in labels {
            let label = label.as_ref();
            if !mapping.contains(label) {
                mapping
                    .entries
                    .push((label.to_string(), standardize_label(label)));
            }
        }
        mapping
    }

    /// Insert or replace the standardized id for `label`.
    pub fn insert(&mut self, label: impl Into<String>, standardized: impl Into<String>) {
        let label = label.into();
        let standardized = standardized.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = standardized,
            None => self.entries.push((label, standardized)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| s.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original labels, in header order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, s)| (l.as_str(), s.as_str()))
    }

    /// Returns `true` if both mappings cover exactly the same labels.
    pub fn same_labels(&self, other: &Self) -> bool {
        let mine: HashSet<&str> = self.labels().collect();
        let theirs: HashSet<&str> = other.labels().collect();
        mine == theirs
    }

    /// Attribute form: `{original_label: standardized_id}`.
    pub fn to_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(l, s)| (l.clone(), serde_json::Value::String(s.clone())))
            .collect()
    }

    /// Rebuild from an attribute map. Attribute maps carry no order, so the
    /// result is ordered by label.
    pub fn from_attributes(
        attrs: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, TypeError> {
        let mut mapping = Self::new();
        for (label, value) in attrs {
            let standardized = value.as_str().ok_or_else(|| {
                TypeError::InvalidMapping(format!("value for {label:?} is not a string"))
            })?;
            mapping.insert(label.clone(), standardized);
        }
        Ok(mapping)
    }
}

impl FromIterator<(String, String)> for ChannelMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut mapping = Self::new();
        for (label, standardized) in iter {
            mapping.insert(label, standardized);
        }
        mapping
    }
}

// ---------------------------------------------------------------------------
// Standardization table
// ---------------------------------------------------------------------------

/// Electrode names of the extended 10-20 system, in canonical case.
const ELECTRODES: &[&str] = &[
    "Fp1", "Fp2", "Fpz", "AF3", "AF4", "AF7", "AF8", "AFz", "F1", "F2", "F3", "F4", "F5", "F6",
    "F7", "F8", "Fz", "FC1", "FC2", "FC3", "FC4", "FC5", "FC6", "FCz", "FT7", "FT8", "FT9",
    "FT10", "C1", "C2", "C3", "C4", "C5", "C6", "Cz", "CP1", "CP2", "CP3", "CP4", "CP5", "CP6",
    "CPz", "T3", "T4", "T5", "T6", "T7", "T8", "T9", "T10", "TP7", "TP8", "TP9", "TP10", "P1",
    "P2", "P3", "P4", "P5", "P6", "P7", "P8", "Pz", "PO3", "PO4", "PO7", "PO8", "POz", "O1",
    "O2", "Oz", "A1", "A2", "M1", "M2",
];

/// Whole-label aliases seen in polysomnography exports.
const ALIASES: &[(&str, &str)] = &[
    ("EEG", "EEG"),
    ("EEG(SEC)", "EEG2"),
    ("EEG 2", "EEG2"),
    ("EEG2", "EEG2"),
    ("ECG", "ECG"),
    ("EKG", "ECG"),
    ("EMG", "EMG-Chin"),
    ("CHIN", "EMG-Chin"),
    ("CHIN EMG", "EMG-Chin"),
    ("EOG(L)", "EOG-L"),
    ("EOG L", "EOG-L"),
    ("LOC", "EOG-L"),
    ("EOG(R)", "EOG-R"),
    ("EOG R", "EOG-R"),
    ("ROC", "EOG-R"),
    ("SAO2", "SpO2"),
    ("SPO2", "SpO2"),
    ("H.R.", "HR"),
    ("HR", "HR"),
    ("PULSE", "HR"),
    ("THOR RES", "Resp-Thorax"),
    ("THORAX", "Resp-Thorax"),
    ("ABDO RES", "Resp-Abdomen"),
    ("ABDOMEN", "Resp-Abdomen"),
    ("AIRFLOW", "Resp-Airflow"),
    ("NEW AIR", "Resp-Nasal"),
    ("NASAL PRESSURE", "Resp-Nasal"),
    ("POSITION", "Position"),
    ("LIGHT", "Light"),
    ("OX STAT", "SpO2-Status"),
];

/// Modality prefixes stripped before electrode lookup.
const MODALITY_PREFIXES: &[&str] = &["EEG ", "EOG ", "EMG ", "ECG "];

/// Map a source channel label to its standardized identifier.
///
/// Lookup order: whole-label alias, then electrode or electrode derivation
/// (`C3-A2`) after stripping a modality prefix. Anything else is trimmed
/// and has inner whitespace collapsed to `-`.
pub fn standardize_label(label: &str) -> String {
    let trimmed = label.trim();
    let upper = trimmed.to_ascii_uppercase();

    if let Some((_, id)) = ALIASES.iter().find(|(alias, _)| *alias == upper) {
        return (*id).to_string();
    }

    let body = MODALITY_PREFIXES
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix).map(|_| &trimmed[prefix.len()..]))
        .unwrap_or(trimmed)
        .trim();

    let parts: Vec<&str> = body.split('-').map(str::trim).collect();
    let canonical: Option<Vec<&str>> = parts.iter().map(|p| canonical_electrode(p)).collect();
    if let Some(names) = canonical {
        return names.join("-");
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join("-")
}

fn canonical_electrode(name: &str) -> Option<&'static str> {
    ELECTRODES
        .iter()
        .copied()
        .find(|e| e.eq_ignore_ascii_case(name))
}

/// Standardized ids of an attribute-ordered mapping, checked for labels.
pub fn standardized_ids<'a>(
    mapping: &'a ChannelMapping,
    labels: &[String],
) -> Result<Vec<&'a str>, TypeError> {
    labels
        .iter()
        .map(|l| {
            mapping
                .get(l)
                .ok_or_else(|| TypeError::InvalidMapping(format!("no mapping for label {l:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn as_sorted(mapping: &ChannelMapping) -> BTreeMap<String, String> {
        mapping
            .iter()
            .map(|(l, s)| (l.to_string(), s.to_string()))
            .collect()
    }

    #[test]
    fn electrode_labels_are_canonicalized() {
        assert_eq!(standardize_label("EEG Fp1"), "Fp1");
        assert_eq!(standardize_label("EEG FP2"), "Fp2");
        assert_eq!(standardize_label("cz"), "Cz");
    }

    #[test]
    fn derivations_are_canonicalized_per_electrode() {
        assert_eq!(standardize_label("EEG C3-A2"), "C3-A2");
        assert_eq!(standardize_label("c4 - m1"), "C4-M1");
    }

    #[test]
    fn psg_aliases_are_resolved() {
        assert_eq!(standardize_label("SaO2"), "SpO2");
        assert_eq!(standardize_label("EEG(sec)"), "EEG2");
        assert_eq!(standardize_label(" H.R. "), "HR");
        assert_eq!(standardize_label("EOG(L)"), "EOG-L");
    }

    #[test]
    fn unknown_labels_fall_back_to_collapsed_whitespace() {
        assert_eq!(standardize_label("  Leg  Left "), "Leg-Left");
        assert_eq!(standardize_label("EDF Annotations"), "EDF-Annotations");
    }

    #[test]
    fn from_labels_keeps_every_label_once_in_order() {
        let mapping = ChannelMapping::from_labels(["EEG Fp1", "EEG Fp2", "EEG Fp1"]);
        assert_eq!(mapping.len(), 2);
        let labels: Vec<&str> = mapping.labels().collect();
        assert_eq!(labels, vec!["EEG Fp1", "EEG Fp2"]);
        assert_eq!(mapping.get("EEG Fp2"), Some("Fp2"));
    }

    #[test]
    fn attribute_roundtrip_preserves_pairs() {
        let mapping = ChannelMapping::from_labels(["ECG", "EEG C3-A2"]);
        let attrs = mapping.to_attributes();
        let back = ChannelMapping::from_attributes(&attrs).unwrap();
        assert_eq!(as_sorted(&back), as_sorted(&mapping));
    }

    #[test]
    fn from_attributes_rejects_non_string_values() {
        let mut attrs = serde_json::Map::new();
        attrs.insert("ECG".into(), serde_json::json!(3));
        assert!(ChannelMapping::from_attributes(&attrs).is_err());
    }

    #[test]
    fn same_labels_ignores_targets_and_order() {
        let a = ChannelMapping::from_labels(["A", "B"]);
        let mut b = ChannelMapping::new();
        b.insert("B", "x");
        b.insert("A", "y");
        assert!(a.same_labels(&b));
        b.insert("C", "z");
        assert!(!a.same_labels(&b));
    }

    #[test]
    fn standardized_ids_follow_label_order() {
        let mapping = ChannelMapping::from_labels(["EEG Fp1", "ECG"]);
        let ids = standardized_ids(&mapping, &["ECG".into(), "EEG Fp1".into()]).unwrap();
        assert_eq!(ids, vec!["ECG", "Fp1"]);
        assert!(standardized_ids(&mapping, &["EMG".into()]).is_err());
    }
}
