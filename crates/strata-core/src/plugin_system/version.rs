use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("The version '{0}' has more than three parts")]
    TooManyParts(String),
    #[error("The version '{raw}' has a non-numeric part '{part}'")]
    NonNumericPart { raw: String, part: String },
    #[error("The version '{raw}' has a part '{part}' that does not fit in 64 bits")]
    PartOutOfRange { raw: String, part: String },
}

/// A three part `major.minor.revision` plugin version.
///
/// Missing trailing parts default to zero, so `"2"` and `"2.0.0"` are the same
/// version. Backed by [`semver::Version`] with no pre-release or build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    inner: Version,
}

impl SemanticVersion {
    /// Creates a version from its parts
    pub fn new(major: u64, minor: u64, revision: u64) -> Self {
        Self {
            inner: Version::new(major, minor, revision),
        }
    }

    /// The `0.0.0` version used when a manifest leaves the version out
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parses a version string like "1", "1.2" or "1.2.3".
    ///
    /// Empty or whitespace-only input yields `0.0.0`.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::zero());
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::TooManyParts(raw.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            // u64::from_str would also accept a leading '+'
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::NonNumericPart {
                    raw: raw.to_string(),
                    part: part.to_string(),
                });
            }
            *slot = part.parse::<u64>().map_err(|_| VersionError::PartOutOfRange {
                raw: raw.to_string(),
                part: part.to_string(),
            })?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    pub fn major(&self) -> u64 {
        self.inner.major
    }

    pub fn minor(&self) -> u64 {
        self.inner.minor
    }

    pub fn revision(&self) -> u64 {
        self.inner.patch
    }

    /// Compares major, then minor, then revision, stopping at the first difference.
    pub fn compare(&self, other: &SemanticVersion) -> Ordering {
        self.major()
            .cmp(&other.major())
            .then_with(|| self.minor().cmp(&other.minor()))
            .then_with(|| self.revision().cmp(&other.revision()))
    }

    /// Returns the underlying `semver::Version`.
    pub fn to_semver(&self) -> &Version {
        &self.inner
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.revision())
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SemanticVersion::parse(&raw).map_err(serde::de::Error::custom)
    }
}
