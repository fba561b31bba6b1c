#![forbid(unsafe_code)]

//! Execution of a single plan entry as an isolated external process.
//!
//! The [`Launcher`] trait is the seam between the scheduler and the container runtime. The
//! production implementation, [`DockerLauncher`], drives the `docker` CLI:
//!
//! * remote entries run the client image once, pointed at the relay URL;
//! * docker entries get a private network, a detached relay container reachable as `relay`, and a
//!   client container on the same network. Relay and network are removed afterwards whatever the
//!   outcome.
//!
//! Client containers receive their parameters through the environment: `RELAY_URL`,
//! `TLS_DISABLE_VERIFY`, `TESTCASE` and `VERBOSE`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use interop_core::{DockerSettings, Registry};
use interop_plan::{EndpointMode, KnownImages, PlanEntry};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Network alias of the relay container inside a per-entry network.
pub const RELAY_ALIAS: &str = "relay";

/// Captured result of one test process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// The process could not be invoked at all.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan entry {0} has no client image")]
    MissingClientImage(String),

    #[error("{step} failed: {detail}")]
    Setup { step: &'static str, detail: String },
}

#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run the client (and relay, in docker mode) for `entry` and capture the client output.
    async fn execute(&self, entry: &PlanEntry) -> Result<ExecOutput, LaunchError>;

    /// Whether a launch reference can be started without building or pulling it first.
    async fn image_present(&self, image: &str) -> bool;
}

/// Per-invocation knobs forwarded to every client process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub timeout: Duration,
    /// Single test case forwarded as `TESTCASE`.
    pub test_case: Option<String>,
    /// Forward `VERBOSE=1`.
    pub verbose: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), test_case: None, verbose: false }
    }
}

pub struct DockerLauncher {
    settings: DockerSettings,
    options: LaunchOptions,
    /// Distinguishes container names of concurrent runner invocations.
    run_tag: String,
}

impl DockerLauncher {
    pub fn new(settings: DockerSettings, options: LaunchOptions) -> Self {
        let run_tag = format!("{}-{}", settings.network_prefix, std::process::id());
        Self { settings, options, run_tag }
    }

    /// Snapshot which registry images are present locally.
    pub async fn probe_images(&self, registry: &Registry) -> KnownImages {
        let mut known = KnownImages::new();
        for image in registry.images() {
            if self.image_present(image).await {
                known.insert(image);
            } else {
                debug!(image, "image not present");
            }
        }
        known
    }

    /// URL a client uses to reach the relay container of a docker-mode entry.
    pub fn local_relay_url(&self) -> String {
        format!("{}://{}:{}", self.settings.transport.scheme(), RELAY_ALIAS, self.settings.relay_port)
    }

    fn container_name(&self, entry: &PlanEntry, role: &str) -> String {
        format!("{}-{}-{}", self.run_tag, entry.index, role)
    }

    fn network_name(&self, entry: &PlanEntry) -> String {
        format!("{}-{}-net", self.run_tag, entry.index)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Arguments of the client `docker run` invocation.
    pub fn client_args(&self, entry: &PlanEntry, relay_url: &str, network: Option<&str>) -> Result<Vec<String>, LaunchError> {
        let image = entry
            .client_image
            .as_deref()
            .ok_or_else(|| LaunchError::MissingClientImage(entry.label()))?;

        let mut args = vec!["run".to_string(), "--rm".to_string()];
        args.push("--name".into());
        args.push(self.container_name(entry, "client"));
        if let Some(net) = network {
            args.push("--network".into());
            args.push(net.to_string());
        }
        let mut env = vec![format!("RELAY_URL={relay_url}")];
        if entry.tls_disable_verify {
            env.push("TLS_DISABLE_VERIFY=1".into());
        }
        if let Some(test) = &self.options.test_case {
            env.push(format!("TESTCASE={test}"));
        }
        if self.options.verbose {
            env.push("VERBOSE=1".into());
        }
        for var in env {
            args.push("-e".into());
            args.push(var);
        }
        args.push(image.to_string());
        Ok(args)
    }

    /// Run a short docker management command to completion.
    async fn docker(&self, step: &'static str, args: &[&str]) -> Result<(), LaunchError> {
        let output = self
            .command()
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| LaunchError::Spawn { program: self.settings.binary.clone(), source })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(LaunchError::Setup { step, detail: String::from_utf8_lossy(&output.stderr).trim().to_string() })
        }
    }

    async fn run_client(&self, entry: &PlanEntry, relay_url: &str, network: Option<&str>) -> Result<ExecOutput, LaunchError> {
        let args = self.client_args(entry, relay_url, network)?;
        debug!(entry = %entry.label(), ?args, "starting client");

        let started = Instant::now();
        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn { program: self.settings.binary.clone(), source })?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let (exit_code, timed_out) = match tokio::time::timeout(self.options.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                warn!(entry = %entry.label(), error = %e, "lost track of client process");
                (None, false)
            }
            Err(_) => {
                warn!(entry = %entry.label(), timeout = ?self.options.timeout, "client timed out");
                let name = self.container_name(entry, "client");
                if let Err(e) = self.docker("kill client", &["kill", &name]).await {
                    debug!(error = %e, "client container already gone");
                }
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "client process already exited");
                }
                (None, true)
            }
        };

        Ok(ExecOutput {
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
            exit_code,
            timed_out,
            elapsed: started.elapsed(),
        })
    }

    async fn run_with_local_relay(&self, entry: &PlanEntry) -> Result<ExecOutput, LaunchError> {
        let network = self.network_name(entry);
        let relay = self.container_name(entry, "relay");

        self.docker("network create", &["network", "create", &network]).await?;
        let started = self
            .docker(
                "relay start",
                &["run", "-d", "--rm", "--name", &relay, "--network", &network, "--network-alias", RELAY_ALIAS, &entry.target],
            )
            .await;

        let result = match started {
            Ok(()) => self.run_client(entry, &self.local_relay_url(), Some(&network)).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.docker("relay stop", &["rm", "-f", &relay]).await {
            debug!(error = %e, "relay container cleanup");
        }
        if let Err(e) = self.docker("network remove", &["network", "rm", &network]).await {
            warn!(network, error = %e, "failed to remove test network");
        }
        result
    }
}

#[async_trait]
impl Launcher for DockerLauncher {
    async fn execute(&self, entry: &PlanEntry) -> Result<ExecOutput, LaunchError> {
        match entry.mode {
            EndpointMode::Docker => self.run_with_local_relay(entry).await,
            EndpointMode::Remote(_) => self.run_client(entry, &entry.target, None).await,
        }
    }

    async fn image_present(&self, image: &str) -> bool {
        let status = self
            .command()
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        matches!(status, Ok(s) if s.success())
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        if let Err(e) = r.read_to_end(&mut buf).await {
            debug!(error = %e, "output stream closed early");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
