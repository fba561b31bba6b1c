#![forbid(unsafe_code)]

//! Concurrent execution of a compiled plan.
//!
//! At most `workers` entries run at once. Every finished entry is reduced to a [`RunRecord`] and
//! sent to a single aggregator task, which is the only writer of the run directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use interop_plan::{Plan, PlanEntry};
use interop_report::{Aggregator, ReportResult, RunOutcome, RunRecord, RunStatus, RunSummary};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::launcher::{ExecOutput, Launcher};

/// Skip reason for entries never dispatched because of an interrupt.
pub const INTERRUPTED: &str = "interrupted before start";

pub struct Scheduler {
    launcher: Arc<dyn Launcher>,
    workers: usize,
    shutdown: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
    save_logs: bool,
}

impl Scheduler {
    pub fn new(launcher: Arc<dyn Launcher>, workers: usize) -> Self {
        Self { launcher, workers: workers.max(1), shutdown: Arc::new(AtomicBool::new(false)), progress: None, save_logs: true }
    }

    /// Flag that stops dispatching when set. Running entries still finish.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Write captured client output next to the summary (`<index>-<client>-<relay>.log`).
    pub fn with_logs(mut self, save_logs: bool) -> Self {
        self.save_logs = save_logs;
        self
    }

    /// Execute `plan`, persisting through `aggregator`, and return the final summary.
    pub async fn run(self, plan: Plan, aggregator: Aggregator) -> ReportResult<RunSummary> {
        let log_dir = self.save_logs.then(|| aggregator.dir().to_path_buf());
        let (tx, rx) = mpsc::channel::<RunRecord>(self.workers * 2);
        let writer = tokio::spawn(collect(rx, aggregator, self.progress.clone()));

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut running = JoinSet::new();

        for entry in plan.into_entries() {
            if !entry.is_runnable() {
                let reason = entry.availability.reason().unwrap_or_default().to_string();
                debug!(entry = %entry.label(), %reason, "skipping unavailable entry");
                send(&tx, RunRecord::new(&entry, RunOutcome::Skipped { reason }, None)).await;
                continue;
            }

            let permit = match permits.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            if self.shutdown.load(Ordering::Relaxed) {
                send(&tx, RunRecord::new(&entry, RunOutcome::Skipped { reason: INTERRUPTED.into() }, None)).await;
                continue;
            }

            let launcher = Arc::clone(&self.launcher);
            let tx = tx.clone();
            let log_dir = log_dir.clone();
            running.spawn(async move {
                let record = execute(launcher.as_ref(), &entry, log_dir.as_deref()).await;
                send(&tx, record).await;
                drop(permit);
            });
        }

        drop(tx);
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }

        match writer.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e).into()),
        }
    }
}

async fn send(tx: &mpsc::Sender<RunRecord>, record: RunRecord) {
    if tx.send(record).await.is_err() {
        error!("aggregator stopped; record dropped");
    }
}

/// Run one entry and reduce the result to a record.
pub async fn execute(launcher: &dyn Launcher, entry: &PlanEntry, log_dir: Option<&Path>) -> RunRecord {
    info!(entry = %entry.label(), version = %entry.version, "running");
    let record = match launcher.execute(entry).await {
        Ok(output) => {
            if let Some(dir) = log_dir {
                save_log(dir, entry, &output).await;
            }
            let outcome = RunOutcome::from_process_output(&output.stdout, output.exit_code, output.timed_out);
            RunRecord::new(entry, outcome, Some(output.elapsed))
        }
        Err(e) => {
            warn!(entry = %entry.label(), error = %e, "launch failed");
            RunRecord::new(entry, RunOutcome::LaunchFailed { message: e.to_string() }, None)
        }
    };
    match record.status {
        RunStatus::Fail => warn!(
            entry = %entry.label(),
            reason = record.reason.as_deref().unwrap_or_default(),
            "failed"
        ),
        status => info!(entry = %entry.label(), %status, passed = record.passed, total = record.total, "finished"),
    }
    record
}

fn log_path(dir: &Path, entry: &PlanEntry) -> PathBuf {
    dir.join(format!("{:03}-{}-{}.log", entry.index, entry.client, entry.relay))
}

async fn save_log(dir: &Path, entry: &PlanEntry, output: &ExecOutput) {
    let body = format!("# stdout\n{}\n# stderr\n{}", output.stdout, output.stderr);
    if let Err(e) = tokio::fs::write(log_path(dir, entry), body).await {
        warn!(entry = %entry.label(), error = %e, "failed to save client output");
    }
}

async fn collect(
    mut rx: mpsc::Receiver<RunRecord>,
    mut aggregator: Aggregator,
    progress: Option<ProgressBar>,
) -> ReportResult<RunSummary> {
    while let Some(record) = rx.recv().await {
        if let Some(pb) = &progress {
            pb.inc(1);
            pb.set_message(format!("{} -> {}: {}", record.client, record.relay, record.status));
        }
        aggregator.submit(record)?;
    }
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    aggregator.finalize()
}
