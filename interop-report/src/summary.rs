#![forbid(unsafe_code)]

//! Run records and the persisted run summary.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use interop_core::DraftVersion;
use interop_plan::{Classification, EndpointMode, PlanEntry};
use serde::{Deserialize, Serialize};

use crate::tap::ParseFailure;
use crate::verdict::{Dialect, RunStatus, RunVerdict, TestCase};
use crate::ReportResult;

/// Exit code recorded when the test process could not be started at all.
pub const EXIT_LAUNCH_FAILED: i32 = -1;

/// Everything that can happen to one plan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Output parsed into a verdict. `timed_out` marks a process killed after it started reporting.
    Completed { verdict: RunVerdict, exit_code: Option<i32>, timed_out: bool },
    /// The process ran (or timed out) but produced no verdict content.
    Unparseable { failure: ParseFailure, exit_code: Option<i32>, timed_out: bool },
    /// The process could not be invoked.
    LaunchFailed { message: String },
    /// Never executed, e.g. an unavailable image.
    Skipped { reason: String },
}

impl RunOutcome {
    /// Classify the captured stdout of a finished or killed process.
    pub fn from_process_output(stdout: &str, exit_code: Option<i32>, timed_out: bool) -> Self {
        match crate::tap::parse(stdout) {
            Ok(verdict) => RunOutcome::Completed { verdict, exit_code, timed_out },
            Err(failure) => RunOutcome::Unparseable { failure, exit_code, timed_out },
        }
    }
}

/// One persisted line of the summary. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub index: usize,
    pub client: String,
    pub relay: String,
    pub version: DraftVersion,
    pub classification: Classification,
    pub mode: EndpointMode,
    pub target: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Diagnostic for a `fail` status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestCase>,
}

impl RunRecord {
    /// Reduce an outcome to a record for `entry`. `elapsed` is the wall time of the execution.
    pub fn new(entry: &PlanEntry, outcome: RunOutcome, elapsed: Option<Duration>) -> Self {
        let mut record = RunRecord {
            index: entry.index,
            client: entry.client.clone(),
            relay: entry.relay.clone(),
            version: entry.version.clone(),
            classification: entry.classification,
            mode: entry.mode,
            target: entry.target.clone(),
            status: RunStatus::Fail,
            exit_code: None,
            skip_reason: None,
            reason: None,
            timed_out: false,
            passed: 0,
            failed: 0,
            skipped: 0,
            total: 0,
            dialect: None,
            duration_ms: elapsed.map(|d| d.as_millis() as u64),
            tests: Vec::new(),
        };

        match outcome {
            RunOutcome::Completed { verdict, exit_code, timed_out } => {
                record.status = verdict.status();
                record.exit_code = exit_code;
                record.reason = verdict.failure_reason();
                record.skip_reason = verdict.skip_reason();
                record.passed = verdict.passed();
                record.failed = verdict.failed();
                record.skipped = verdict.skipped();
                record.total = verdict.total();
                record.dialect = Some(verdict.dialect);
                if record.duration_ms.is_none() {
                    record.duration_ms = verdict.reported_duration_ms();
                }
                record.tests = verdict.cases;
                if timed_out {
                    record.timed_out = true;
                    if record.status != RunStatus::Fail {
                        record.status = RunStatus::Fail;
                        record.skip_reason = None;
                        record.reason = Some(format!("timed out after reporting {} test(s)", record.total));
                    }
                }
            }
            RunOutcome::Unparseable { failure, exit_code, timed_out } => {
                record.exit_code = exit_code;
                record.timed_out = timed_out;
                record.reason = Some(match (timed_out, failure) {
                    (true, ParseFailure::Empty) => "timed out with no output".to_string(),
                    (true, ParseFailure::NoVerdictContent) => "timed out before reporting results".to_string(),
                    (false, f) => f.to_string(),
                });
            }
            RunOutcome::LaunchFailed { message } => {
                record.exit_code = Some(EXIT_LAUNCH_FAILED);
                record.reason = Some(format!("failed to launch: {message}"));
            }
            RunOutcome::Skipped { reason } => {
                record.status = RunStatus::Skip;
                record.skip_reason = Some(reason);
            }
        }
        record
    }
}

/// Counts of plan entries by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for Totals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total {} / passed {} / failed {} / skipped {}",
            self.total, self.passed, self.failed, self.skipped
        )
    }
}

/// Aggregate of a single runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub target_version: DraftVersion,
    pub timestamp: DateTime<Utc>,
    /// Records in plan order.
    pub runs: Vec<RunRecord>,
}

impl RunSummary {
    pub fn new(target_version: DraftVersion, timestamp: DateTime<Utc>) -> Self {
        Self { target_version, timestamp, runs: Vec::new() }
    }

    /// Read a persisted summary.
    pub fn load<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn totals(&self) -> Totals {
        let mut t = Totals { total: self.runs.len(), ..Totals::default() };
        for run in &self.runs {
            match run.status {
                RunStatus::Pass => t.passed += 1,
                RunStatus::Fail => t.failed += 1,
                RunStatus::Skip => t.skipped += 1,
            }
        }
        t
    }

    /// Process exit status for the invocation: success iff nothing failed.
    pub fn success(&self) -> bool {
        self.totals().failed == 0
    }
}
