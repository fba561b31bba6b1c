#![forbid(unsafe_code)]

//! Negotiated version prediction.
//!
//! The predicted version is the highest draft both implementations list. It is a label for sorting
//! and filtering only; nothing downstream hands it to the process under test.

use std::fmt;
use std::str::FromStr;

use interop_core::{ConfigError, ConfigIssue, DraftVersion, Implementation};
use serde::{Deserialize, Serialize};

/// Position of a predicted version relative to the target version.
///
/// Declaration order is the plan priority: `At < Ahead < Behind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    At,
    Ahead,
    Behind,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::At => "at",
            Classification::Ahead => "ahead",
            Classification::Behind => "behind",
        }
    }

    /// Sort rank; lower runs first.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at" => Ok(Classification::At),
            "ahead" => Ok(Classification::Ahead),
            "behind" => Ok(Classification::Behind),
            other => Err(ConfigError::Invalid(vec![ConfigIssue::new(
                "classification",
                format!("unknown classification {other:?} (expected `at`, `ahead` or `behind`)"),
            )])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub version: DraftVersion,
    pub classification: Classification,
}

/// Classify `version` against `target` by ordinal.
#[must_use]
pub fn classify(version: &DraftVersion, target: &DraftVersion) -> Classification {
    use std::cmp::Ordering::*;
    match version.cmp(target) {
        Equal => Classification::At,
        Greater => Classification::Ahead,
        Less => Classification::Behind,
    }
}

/// Highest version present in both sets, if any.
pub fn highest_common<'a>(
    a: impl IntoIterator<Item = &'a DraftVersion>,
    b: &std::collections::BTreeSet<DraftVersion>,
) -> Option<&'a DraftVersion> {
    a.into_iter().filter(|v| b.contains(*v)).max()
}

/// Predict the version `client` and `relay` will negotiate and classify it against `target`.
///
/// Returns `None` when the version sets are disjoint.
pub fn predict(client: &Implementation, relay: &Implementation, target: &DraftVersion) -> Option<Prediction> {
    let version = highest_common(&client.draft_versions, &relay.draft_versions)?.clone();
    let classification = classify(&version, target);
    Some(Prediction { version, classification })
}
