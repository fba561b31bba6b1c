#![forbid(unsafe_code)]

//! `moq-interop`: plan and run the MoQT client/relay interoperability matrix.
//!
//! Exit status is 0 when no plan entry failed, 1 when at least one did or the run could not be
//! persisted, and 2 for configuration errors.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use interop_core::{ConfigError, ConfigIssue, Registry, RunnerConfig};
use interop_plan::{compile, AssumeAvailable, ImageCatalog, KnownImages};
use interop_report::Aggregator;
use interop_runner::cli::{Cli, OutputFormat};
use interop_runner::launcher::{DockerLauncher, LaunchOptions};
use interop_runner::{render, Scheduler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURES: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILURES)
            }
        }
    }
}

fn init_tracing(config: &RunnerConfig) {
    let level = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = RunnerConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    init_tracing(&config);
    if config.workers == 0 {
        return Err(ConfigError::Invalid(vec![ConfigIssue::new("workers", "must be at least 1")]).into());
    }

    let registry = Registry::load(&config.registry)
        .with_context(|| format!("loading registry {}", config.registry.display()))?;

    if cli.list {
        match cli.format {
            OutputFormat::Table => println!("{}", render::registry_table(&registry)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry)?),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let target = cli.target.clone().unwrap_or_else(|| registry.current_target.clone());
    let filters = cli.filters()?;
    let launcher = DockerLauncher::new(
        config.docker.clone(),
        LaunchOptions {
            timeout: Duration::from_secs(config.timeout_secs),
            test_case: cli.test_case.clone(),
            verbose: cli.verbose,
        },
    );

    // A dry run never touches the container runtime.
    let probed: KnownImages;
    let images: &dyn ImageCatalog = if cli.dry_run {
        &AssumeAvailable
    } else {
        probed = launcher.probe_images(&registry).await;
        &probed
    };
    let plan = compile(&registry, &target, &filters, images)?;

    if cli.dry_run {
        match cli.format {
            OutputFormat::Table => {
                println!("{}", render::plan_table(&plan));
                println!("{} entries, target {}", plan.len(), plan.target_version);
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        }
        return Ok(ExitCode::SUCCESS);
    }

    if plan.is_empty() {
        warn!("plan is empty; nothing to run");
    }

    // Millisecond timestamp plus pid; the aggregator refuses a directory that already holds a run.
    let run_dir = config
        .results_dir
        .join(format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), std::process::id()));
    let aggregator = Aggregator::create(&run_dir, target.clone())
        .with_context(|| format!("creating run directory {}", run_dir.display()))?;
    info!(
        entries = plan.len(),
        runnable = plan.runnable_count(),
        workers = config.workers,
        dir = %run_dir.display(),
        "starting run"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing running entries");
            shutdown_signal.store(true, Ordering::Relaxed);
        }
    });

    let progress = ProgressBar::new(plan.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let summary = Scheduler::new(Arc::new(launcher), config.workers)
        .with_shutdown(shutdown)
        .with_progress(progress)
        .run(plan, aggregator)
        .await
        .context("persisting run summary")?;

    println!("{}", render::summary_table(&summary));
    println!("summary written to {}", run_dir.join(interop_report::SUMMARY_FILE).display());
    println!("{}", render::totals_line(&summary.totals()));

    Ok(if summary.success() { ExitCode::SUCCESS } else { ExitCode::from(EXIT_FAILURES) })
}
