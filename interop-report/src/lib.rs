#![forbid(unsafe_code)]

//! Result side of the MoQT interop runner.
//!
//! [`tap::parse`] turns raw test-process output into a [`RunVerdict`], [`RunRecord::new`] folds
//! that together with the process exit into a persisted record, and the [`Aggregator`] keeps
//! `summary.json` valid on disk after every record.

pub mod aggregator;
pub mod error;
pub mod reorder;
pub mod summary;
pub mod tap;
pub mod verdict;

pub use aggregator::{Aggregator, JOURNAL_FILE, SUMMARY_FILE};
pub use error::{ReportError, ReportResult};
pub use reorder::ReorderBuffer;
pub use summary::{RunOutcome, RunRecord, RunSummary, Totals, EXIT_LAUNCH_FAILED};
pub use tap::{parse, ParseFailure};
pub use verdict::{CaseOutcome, Dialect, Directive, DirectiveKind, RunStatus, RunVerdict, TestCase};
