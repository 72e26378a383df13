use std::fmt;

use rkns_types::FormatId;

/// Version field of an EDF file.
pub const EDF_MAGIC: &[u8; 8] = b"0       ";
/// Version field of a BDF file.
pub const BDF_MAGIC: &[u8; 8] = b"\xFFBIOSEMI";

/// Offset and width of the main header's reserved field.
pub(crate) const RESERVED_OFFSET: usize = 192;
pub(crate) const RESERVED_LEN: usize = 44;

/// The four members of the EDF family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdfVariant {
    Edf,
    EdfPlus,
    Bdf,
    BdfPlus,
}

impl EdfVariant {
    pub const ALL: [EdfVariant; 4] = [Self::Edf, Self::EdfPlus, Self::Bdf, Self::BdfPlus];

    pub fn format_id(&self) -> FormatId {
        match self {
            Self::Edf => FormatId::Edf,
            Self::EdfPlus => FormatId::EdfPlus,
            Self::Bdf => FormatId::Bdf,
            Self::BdfPlus => FormatId::BdfPlus,
        }
    }

    pub fn from_format_id(id: FormatId) -> Option<Self> {
        match id {
            FormatId::Edf => Some(Self::Edf),
            FormatId::EdfPlus => Some(Self::EdfPlus),
            FormatId::Bdf => Some(Self::Bdf),
            FormatId::BdfPlus => Some(Self::BdfPlus),
            FormatId::Rkns | FormatId::Unknown => None,
        }
    }

    /// True for the 24-bit BioSemi variants.
    pub fn is_bdf(&self) -> bool {
        matches!(self, Self::Bdf | Self::BdfPlus)
    }

    /// True for the variants that carry annotation signals.
    pub fn is_plus(&self) -> bool {
        matches!(self, Self::EdfPlus | Self::BdfPlus)
    }

    /// Bytes per stored sample: 2 for EDF, 3 for BDF.
    pub fn sample_bytes(&self) -> usize {
        if self.is_bdf() {
            3
        } else {
            2
        }
    }

    /// Smallest and largest representable digital value.
    pub fn digital_limits(&self) -> (i32, i32) {
        if self.is_bdf() {
            (-8_388_608, 8_388_607)
        } else {
            (i32::from(i16::MIN), i32::from(i16::MAX))
        }
    }

    pub fn magic(&self) -> &'static [u8; 8] {
        if self.is_bdf() {
            BDF_MAGIC
        } else {
            EDF_MAGIC
        }
    }

    /// Label of the annotation signal in the "+" variants.
    pub fn annotation_label(&self) -> &'static str {
        if self.is_bdf() {
            "BDF Annotations"
        } else {
            "EDF Annotations"
        }
    }

    /// Reserved-field content written for a continuous recording.
    pub fn reserved_tag(&self) -> &'static str {
        match self {
            Self::Edf => "",
            Self::EdfPlus => "EDF+C",
            Self::Bdf => "24BIT",
            Self::BdfPlus => "BDF+C",
        }
    }

    /// Classify from the version field and the reserved field.
    pub(crate) fn classify(magic: &[u8], reserved: &[u8]) -> Option<Self> {
        let bdf = if magic == EDF_MAGIC {
            false
        } else if magic == BDF_MAGIC {
            true
        } else {
            return None;
        };
        let plus = reserved.starts_with(if bdf { b"BDF+" } else { b"EDF+" });
        Some(match (bdf, plus) {
            (false, false) => Self::Edf,
            (false, true) => Self::EdfPlus,
            (true, false) => Self::Bdf,
            (true, true) => Self::BdfPlus,
        })
    }
}

impl fmt::Display for EdfVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_id())
    }
}

/// Guess the variant from the first bytes of a file without parsing it.
///
/// Needs the 8-byte version field. When the prefix also reaches the
/// reserved field, `EDF+`/`BDF+` there selects the "+" variant; a shorter
/// prefix is classified as the plain variant.
pub fn sniff_variant(prefix: &[u8]) -> Option<EdfVariant> {
    let magic = prefix.get(..EDF_MAGIC.len())?;
    let reserved = prefix
        .get(RESERVED_OFFSET..)
        .map(|rest| &rest[..rest.len().min(RESERVED_LEN)])
        .unwrap_or(&[]);
    EdfVariant::classify(magic, reserved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_prefix(magic: &[u8; 8], reserved: &str) -> Vec<u8> {
        let mut prefix = vec![b' '; 256];
        prefix[..8].copy_from_slice(magic);
        prefix[RESERVED_OFFSET..RESERVED_OFFSET + reserved.len()].copy_from_slice(reserved.as_bytes());
        prefix
    }

    #[test]
    fn sniffs_all_variants() {
        assert_eq!(sniff_variant(&header_prefix(EDF_MAGIC, "")), Some(EdfVariant::Edf));
        assert_eq!(
            sniff_variant(&header_prefix(EDF_MAGIC, "EDF+C")),
            Some(EdfVariant::EdfPlus)
        );
        assert_eq!(sniff_variant(&header_prefix(BDF_MAGIC, "24BIT")), Some(EdfVariant::Bdf));
        assert_eq!(
            sniff_variant(&header_prefix(BDF_MAGIC, "BDF+D")),
            Some(EdfVariant::BdfPlus)
        );
    }

    #[test]
    fn short_or_foreign_prefixes() {
        assert_eq!(sniff_variant(b"0   "), None);
        assert_eq!(sniff_variant(b"0       "), Some(EdfVariant::Edf));
        assert_eq!(sniff_variant(b"PK\x03\x04zip file"), None);
        // EDF+ marker under a BDF magic is not a "+" variant.
        assert_eq!(sniff_variant(&header_prefix(BDF_MAGIC, "EDF+C")), Some(EdfVariant::Bdf));
    }

    #[test]
    fn sample_widths() {
        assert_eq!(EdfVariant::EdfPlus.sample_bytes(), 2);
        assert_eq!(EdfVariant::Bdf.sample_bytes(), 3);
        assert_eq!(EdfVariant::Bdf.digital_limits().1, 8_388_607);
    }

    #[test]
    fn format_ids_roundtrip() {
        for variant in EdfVariant::ALL {
            assert_eq!(EdfVariant::from_format_id(variant.format_id()), Some(variant));
        }
        assert_eq!(EdfVariant::from_format_id(FormatId::Rkns), None);
    }
}
