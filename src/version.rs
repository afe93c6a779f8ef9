//! Schema version numbers recorded in model files.
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The schema version produced by the translator
pub const CURRENT_VERSION: VersionString = VersionString::new(3, 2, 0);

/// The oldest schema version the translator can start from
pub const OLDEST_VERSION: VersionString = VersionString::new(2, 6, 0);

/// The version assumed for files which carry no `OS:Version` object
pub const DEFAULT_FILE_VERSION: VersionString = OLDEST_VERSION;

/// A `major.minor.patch` version number.
///
/// Any pre-release suffix (e.g. `3.1.0-rc1`) is accepted when parsing but ignored for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionString {
    major: u32,
    minor: u32,
    patch: u32,
}

impl VersionString {
    /// Create a new version number
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The major version number
    pub fn major(&self) -> u32 {
        self.major
    }

    /// The minor version number
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The patch version number
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Whether `other` is exactly one increment ahead of `self`.
    ///
    /// Incrementing a component resets the components after it, so 3.1.0 follows 3.0.4 and 4.0.0
    /// follows 3.2.1.
    pub fn is_next_version(&self, other: &VersionString) -> bool {
        if other.major == self.major {
            if other.minor == self.minor {
                return other.patch == self.patch + 1;
            }

            return other.minor == self.minor + 1 && other.patch == 0;
        }

        other.major == self.major + 1 && other.minor == 0 && other.patch == 0
    }
}

impl FromStr for VersionString {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        // Strip pre-release or build suffixes
        let core = s.split(['-', '+']).next().unwrap_or_default();
        let parts: Vec<_> = core.split('.').collect();
        ensure!(
            (2..=3).contains(&parts.len()),
            "Invalid version string '{s}': expected major.minor[.patch]"
        );

        let parse_part = |part: &str| {
            part.parse::<u32>()
                .with_context(|| format!("Invalid version string '{s}'"))
        };
        let major = parse_part(parts[0])?;
        let minor = parse_part(parts[1])?;
        let patch = parts.get(2).map(|p| parse_part(p)).transpose()?.unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for VersionString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("3.1.0", VersionString::new(3, 1, 0))]
    #[case("2.9", VersionString::new(2, 9, 0))]
    #[case(" 3.0.1 ", VersionString::new(3, 0, 1))]
    #[case("3.1.0-rc1", VersionString::new(3, 1, 0))]
    #[case("3.2.0+develop", VersionString::new(3, 2, 0))]
    fn test_parse_version(#[case] input: &str, #[case] expected: VersionString) {
        assert_eq!(input.parse::<VersionString>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("3")]
    #[case("3.x.0")]
    #[case("1.2.3.4")]
    fn test_parse_version_invalid(#[case] input: &str) {
        assert!(input.parse::<VersionString>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        let v = |s: &str| s.parse::<VersionString>().unwrap();
        assert!(v("2.9.1") < v("3.0.0"));
        assert!(v("2.10.0") > v("2.9.1"));
        assert!(v("3.0.0") == v("3.0"));
        assert_eq!(v("3.0.1").to_string(), "3.0.1");
    }

    #[rstest]
    #[case("3.1.0", "3.1.1", true)]
    #[case("3.1.0", "3.2.0", true)]
    #[case("3.1.4", "3.2.0", true)]
    #[case("3.1.0", "4.0.0", true)]
    #[case("3.1.0", "3.1.2", false)]
    #[case("3.1.0", "3.2.1", false)]
    #[case("3.1.0", "3.1.0", false)]
    #[case("3.1.0", "4.1.0", false)]
    fn test_is_next_version(#[case] current: &str, #[case] other: &str, #[case] expected: bool) {
        let current: VersionString = current.parse().unwrap();
        let other: VersionString = other.parse().unwrap();
        assert_eq!(current.is_next_version(&other), expected);
    }
}
