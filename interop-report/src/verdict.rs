#![forbid(unsafe_code)]

//! Parsed result of one test process run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall status of a plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Pass => "pass",
            RunStatus::Fail => "fail",
            RunStatus::Skip => "skip",
        })
    }
}

/// Report format detected in the process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Dialect {
    /// `TAP version N` structured report.
    Tap { version: u32 },
    /// One `✓ name` / `✗ name` line per test.
    Legacy,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Tap { version } => write!(f, "TAP {version}"),
            Dialect::Legacy => f.write_str("legacy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Skip,
    Todo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Counted outcome of a single top-level test point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    pub name: String,
    /// Raw `ok` / `not ok` marker.
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<Directive>,
    /// `key: value` pairs from the YAML block following the test point.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub diagnostics: BTreeMap<String, String>,
}

impl TestCase {
    pub fn new(number: Option<u32>, name: impl Into<String>, ok: bool, directive: Option<Directive>) -> Self {
        Self { number, name: name.into(), ok, directive, diagnostics: BTreeMap::new() }
    }

    /// A skip directive wins over the marker; a todo directive always counts as passed.
    pub fn outcome(&self) -> CaseOutcome {
        match (self.ok, self.directive.as_ref().map(|d| d.kind)) {
            (_, Some(DirectiveKind::Skip)) => CaseOutcome::Skipped,
            (_, Some(DirectiveKind::Todo)) => CaseOutcome::Passed,
            (true, None) => CaseOutcome::Passed,
            (false, None) => CaseOutcome::Failed,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.diagnostics.get("duration_ms")?.parse().ok()
    }

    pub fn message(&self) -> Option<&str> {
        self.diagnostics.get("message").map(String::as_str)
    }
}

/// Normalized result of one test process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub dialect: Dialect,
    /// Count declared by the `1..N` plan line.
    pub planned: Option<u32>,
    /// Reason given by a `Bail out!` line.
    pub bail_out: Option<String>,
    /// Top-level test points only.
    pub cases: Vec<TestCase>,
}

impl RunVerdict {
    fn count(&self, outcome: CaseOutcome) -> u32 {
        self.cases.iter().filter(|c| c.outcome() == outcome).count() as u32
    }

    pub fn passed(&self) -> u32 {
        self.count(CaseOutcome::Passed)
    }

    pub fn failed(&self) -> u32 {
        self.count(CaseOutcome::Failed)
    }

    pub fn skipped(&self) -> u32 {
        self.count(CaseOutcome::Skipped)
    }

    pub fn total(&self) -> u32 {
        self.cases.len() as u32
    }

    /// Status derived from content alone; the exit code is never consulted.
    pub fn status(&self) -> RunStatus {
        if self.failure_reason().is_some() {
            RunStatus::Fail
        } else if self.skip_reason().is_some() {
            RunStatus::Skip
        } else {
            RunStatus::Pass
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        if let Some(reason) = &self.bail_out {
            return Some(if reason.is_empty() { "bailed out".to_string() } else { format!("bailed out: {reason}") });
        }
        let failed: Vec<&str> = self
            .cases
            .iter()
            .filter(|c| c.outcome() == CaseOutcome::Failed)
            .map(|c| c.name.as_str())
            .collect();
        if !failed.is_empty() {
            return Some(format!("{} test(s) failed: {}", failed.len(), failed.join(", ")));
        }
        match self.planned {
            Some(planned) if planned != self.total() => {
                Some(format!("planned {planned} test(s) but {} reported", self.total()))
            }
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<String> {
        if self.failure_reason().is_some() {
            return None;
        }
        match self.total() {
            0 => Some("no test cases".to_string()),
            n if self.skipped() == n => Some(format!("all {n} test(s) skipped")),
            _ => None,
        }
    }

    /// Sum of per-test `duration_ms` diagnostics, when any test reported one.
    pub fn reported_duration_ms(&self) -> Option<u64> {
        self.cases.iter().filter_map(TestCase::duration_ms).reduce(|a, b| a + b)
    }
}
