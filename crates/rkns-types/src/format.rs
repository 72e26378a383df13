use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifies the container itself or one of the foreign formats it embeds.
///
/// The string tag is what gets persisted (`/_raw` attribute `source_format`).
/// The numeric code is kept for interoperability with documents written by
/// the first implementation, which stored the enum discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FormatId {
    /// An RKNS container (root declares `format_version`).
    Rkns,
    /// European Data Format, 16-bit samples.
    Edf,
    /// EDF+ (continuous or discontinuous), 16-bit samples.
    EdfPlus,
    /// BioSemi Data Format, 24-bit samples.
    Bdf,
    /// BDF+, 24-bit samples.
    BdfPlus,
    /// Nothing recognized the input.
    Unknown,
}

impl FormatId {
    /// All identifiers, in code order.
    pub const ALL: [FormatId; 6] = [
        Self::Rkns,
        Self::Edf,
        Self::EdfPlus,
        Self::Bdf,
        Self::BdfPlus,
        Self::Unknown,
    ];

    /// Persisted string tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Rkns => "RKNS",
            Self::Edf => "EDF",
            Self::EdfPlus => "EDF+",
            Self::Bdf => "BDF",
            Self::BdfPlus => "BDF+",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Legacy numeric code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Rkns => 0,
            Self::Edf => 1,
            Self::EdfPlus => 2,
            Self::Bdf => 3,
            Self::BdfPlus => 4,
            Self::Unknown => -1,
        }
    }

    /// Look up an identifier by its legacy numeric code.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|f| i64::from(f.code()) == code)
    }

    /// Returns `true` for formats that can be embedded as a raw blob.
    pub fn is_foreign(&self) -> bool {
        !matches!(self, Self::Rkns | Self::Unknown)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FormatId {
    type Err = TypeError;

    /// Accepts the string tag (case-insensitive, `PLUS`/`_PLUS` spelled out
    /// or as `+`) or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| TypeError::UnknownFormat(s.into()));
        }
        let normalized = trimmed
            .to_ascii_uppercase()
            .replace("_PLUS", "+")
            .replace("PLUS", "+");
        Self::ALL
            .into_iter()
            .find(|f| f.tag() == normalized)
            .ok_or_else(|| TypeError::UnknownFormat(s.into()))
    }
}

impl From<FormatId> for String {
    fn from(id: FormatId) -> Self {
        id.tag().to_string()
    }
}

impl TryFrom<String> for FormatId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
