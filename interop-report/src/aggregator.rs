#![forbid(unsafe_code)]

//! Incremental run summary persistence.
//!
//! The aggregator is the single writer of a run directory:
//!
//! * `runs.jsonl`: one JSON record per line, appended as records are accepted;
//! * `summary.json`: the full [`RunSummary`], atomically replaced after every record.
//!
//! Both files are valid and loadable after every accepted record, so an interrupted run still
//! leaves a usable summary behind.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use interop_core::DraftVersion;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::reorder::ReorderBuffer;
use crate::summary::{RunRecord, RunSummary};
use crate::ReportResult;

pub const SUMMARY_FILE: &str = "summary.json";
pub const JOURNAL_FILE: &str = "runs.jsonl";

pub struct Aggregator {
    dir: PathBuf,
    summary: RunSummary,
    pending: ReorderBuffer<RunRecord>,
    journal: File,
}

impl Aggregator {
    /// Create `dir` and persist an empty summary in it. Fails with
    /// [`std::io::ErrorKind::AlreadyExists`] if `dir` already holds a run journal.
    pub fn create<P: AsRef<Path>>(dir: P, target_version: DraftVersion) -> ReportResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let journal = OpenOptions::new().create_new(true).append(true).open(dir.join(JOURNAL_FILE))?;
        let aggregator = Self {
            summary: RunSummary::new(target_version, Utc::now()),
            pending: ReorderBuffer::new(0),
            journal,
            dir,
        };
        aggregator.write_summary()?;
        debug!(dir = %aggregator.dir.display(), "run summary created");
        Ok(aggregator)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Accept a record that may arrive out of plan order.
    ///
    /// The record is held until every earlier plan index has been submitted, then persisted
    /// together with any later records it unblocks. Returns how many records were persisted.
    pub fn submit(&mut self, record: RunRecord) -> ReportResult<usize> {
        let ready = self.pending.push(record.index, record);
        let n = ready.len();
        for r in ready {
            self.record(r)?;
        }
        Ok(n)
    }

    /// Append one record and persist it immediately.
    pub fn record(&mut self, record: RunRecord) -> ReportResult<()> {
        {
            let mut line = BufWriter::new(&self.journal);
            serde_json::to_writer(&mut line, &record)?;
            line.write_all(b"\n")?;
            line.flush()?;
        }
        self.summary.runs.push(record);
        self.write_summary()
    }

    /// Persist anything still held back (gaps left by entries that never completed) and return
    /// the final summary.
    pub fn finalize(mut self) -> ReportResult<RunSummary> {
        let leftover = self.pending.drain_remaining();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "persisting records after missing plan entries");
        }
        for r in leftover {
            self.record(r)?;
        }
        self.journal.sync_all()?;
        self.write_summary()?;
        Ok(self.summary)
    }

    fn write_summary(&self) -> ReportResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.summary)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.summary_path()).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::RunOutcome;
    use crate::ReportError;
    use crate::verdict::RunStatus;
    use interop_core::Transport;
    use interop_plan::{Availability, Classification, EndpointMode, PlanEntry};

    fn sample(index: usize) -> RunRecord {
        let entry = PlanEntry {
            index,
            client: "c".into(),
            relay: format!("r{index}"),
            version: "draft-14".parse().unwrap(),
            classification: Classification::At,
            mode: EndpointMode::Remote(Transport::Quic),
            target: "moqt://relay.example:4443".into(),
            client_image: None,
            tls_disable_verify: false,
            availability: Availability::Runnable,
        };
        RunRecord::new(&entry, RunOutcome::Skipped { reason: "test".into() }, None)
    }

    #[test]
    fn summary_is_valid_after_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = Aggregator::create(dir.path().join("run"), "draft-14".parse().unwrap()).unwrap();
        let path = agg.summary_path();
        assert!(RunSummary::load(&path).unwrap().runs.is_empty());

        for i in 0..4 {
            agg.record(sample(i)).unwrap();
            let on_disk = RunSummary::load(&path).unwrap();
            assert_eq!(on_disk.runs.len(), i + 1);
            assert_eq!(on_disk.runs[i].status, RunStatus::Skip);
        }
        // Simulate an interruption: drop without finalize.
        drop(agg);
        let on_disk = RunSummary::load(&path).unwrap();
        assert_eq!(on_disk.runs.len(), 4);

        let journal = std::fs::read_to_string(dir.path().join("run").join(JOURNAL_FILE)).unwrap();
        assert_eq!(journal.lines().count(), 4);
        for line in journal.lines() {
            serde_json::from_str::<RunRecord>(line).unwrap();
        }
    }

    #[test]
    fn existing_run_directory_is_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = Aggregator::create(dir.path(), "draft-14".parse().unwrap()).unwrap();
        first.record(sample(0)).unwrap();

        let err = Aggregator::create(dir.path(), "draft-14".parse().unwrap()).err().unwrap();
        assert!(matches!(err, ReportError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));

        let journal = std::fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap();
        assert_eq!(journal.lines().count(), 1);
        assert_eq!(RunSummary::load(dir.path().join(SUMMARY_FILE)).unwrap().runs.len(), 1);
    }

    #[test]
    fn out_of_order_submissions_persist_in_plan_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = Aggregator::create(dir.path(), "draft-14".parse().unwrap()).unwrap();
        assert_eq!(agg.submit(sample(2)).unwrap(), 0);
        assert_eq!(agg.submit(sample(1)).unwrap(), 0);
        assert!(RunSummary::load(agg.summary_path()).unwrap().runs.is_empty());
        assert_eq!(agg.submit(sample(0)).unwrap(), 3);
        assert_eq!(agg.submit(sample(4)).unwrap(), 0);

        let summary = agg.finalize().unwrap();
        let order: Vec<_> = summary.runs.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2, 4]);
        let on_disk = RunSummary::load(dir.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(on_disk, summary);
    }
}
