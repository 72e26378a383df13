use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Semantic version stamped on every RKNS root as `format_version`.
///
/// Compatibility is exact equality: the container schema is still moving,
/// so a document written by any other version is refused rather than read
/// with guessed semantics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    /// The version written and accepted by this build.
    pub const CURRENT: Self = Self::new(0, 1, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` if a document stamped with `other` can be opened by
    /// an implementation at `self`.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Debug for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormatVersion({self})")
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FormatVersion {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidVersion {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| invalid("components must be non-negative integers"))?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl From<FormatVersion> for String {
    fn from(v: FormatVersion) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for FormatVersion {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn current_matches_package_version() {
        let pkg: FormatVersion = env!("CARGO_PKG_VERSION").parse().unwrap();
        assert_eq!(FormatVersion::CURRENT, pkg);
    }

    #[test]
    fn compatibility_is_exact_match() {
        let v = FormatVersion::new(0, 1, 0);
        assert!(v.is_compatible_with(&FormatVersion::new(0, 1, 0)));
        assert!(!v.is_compatible_with(&FormatVersion::new(0, 1, 1)));
        assert!(!v.is_compatible_with(&FormatVersion::new(0, 2, 0)));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("1.2".parse::<FormatVersion>().is_err());
        assert!("1.2.x".parse::<FormatVersion>().is_err());
        assert!("-1.0.0".parse::<FormatVersion>().is_err());
        assert!("".parse::<FormatVersion>().is_err());
    }

    #[test]
    fn ordering_is_lexicographic_by_component() {
        assert!(FormatVersion::new(0, 9, 9) < FormatVersion::new(1, 0, 0));
        assert!(FormatVersion::new(1, 0, 1) > FormatVersion::new(1, 0, 0));
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000) {
            let v = FormatVersion::new(major, minor, patch);
            let parsed: FormatVersion = v.to_string().parse().unwrap();
            prop_assert_eq!(parsed, v);
        }
    }
}
