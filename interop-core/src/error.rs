#![forbid(unsafe_code)]

//! Common error types for the interop runner crates.

use std::fmt;

use thiserror::Error;

/// A single problem found while validating a registry document.
///
/// `path` points at the offending value using a dotted JSON path such as
/// `implementations.moq-rs.draft_versions[1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Fatal configuration failures. Any of these aborts a run before planning.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O related failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry document is not valid JSON.
    #[error("Registry parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runner configuration is not valid TOML.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Well-formed input that violates the schema. Holds every issue found.
    #[error("invalid configuration ({} issue(s)):\n{}", .0.len(), format_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    /// A version string outside of a registry (e.g. a target override).
    #[error("invalid draft version {0:?}: expected `draft-NN`")]
    InvalidVersion(String),

    /// More than one mutually exclusive filter was requested.
    #[error("conflicting filters: {0}")]
    ConflictingFilters(String),

    /// A client/relay filter names an implementation the registry does not know.
    #[error("unknown implementation {id:?} for role {role}")]
    UnknownImplementation { id: String, role: String },
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenient alias for results throughout the interop crates.
pub type ConfigResult<T> = Result<T, ConfigError>;
