#![forbid(unsafe_code)]

//! MoQT draft version identifiers.
//!
//! Versions are written as `draft-NN`. Comparison always uses the numeric
//! ordinal so that `draft-9 < draft-10`; the label is kept verbatim for display.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ConfigError;

const PREFIX: &str = "draft-";

#[derive(Debug, Clone)]
pub struct DraftVersion {
    ordinal: u32,
    label: String,
}

impl DraftVersion {
    /// Build a version from its ordinal, labelled `draft-NN`.
    pub fn new(ordinal: u32) -> Self {
        Self { ordinal, label: format!("{PREFIX}{ordinal:02}") }
    }

    /// Numeric ordinal used for every comparison.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Label exactly as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl FromStr for DraftVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(PREFIX)
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ConfigError::InvalidVersion(s.to_string()))?;
        let ordinal = digits
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidVersion(s.to_string()))?;
        Ok(Self { ordinal, label: s.to_string() })
    }
}

impl PartialEq for DraftVersion {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal
    }
}

impl Eq for DraftVersion {}

impl Hash for DraftVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordinal.hash(state);
    }
}

impl PartialOrd for DraftVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DraftVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal.cmp(&other.ordinal)
    }
}

impl fmt::Display for DraftVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for DraftVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

impl<'de> Deserialize<'de> for DraftVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
