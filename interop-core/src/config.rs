#![forbid(unsafe_code)]

//! Runner configuration. Parses a TOML file into a strongly-typed structure; every field has a
//! default so an absent file behaves like an empty one.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{ConfigError, Transport};

/// Environment variable naming a configuration file when `--config` is not given.
pub const CONFIG_ENV: &str = "MOQ_INTEROP_CONFIG";

/// Primary configuration structure shared by the runner components.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Path of the implementation registry.
    pub registry: PathBuf,

    /// Directory under which one sub-directory per run is created.
    pub results_dir: PathBuf,

    /// Logging verbosity (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: Option<String>,

    /// Maximum number of plan entries executed concurrently.
    pub workers: usize,

    /// Wall-clock limit for a single plan entry, in seconds.
    pub timeout_secs: u64,

    pub docker: DockerSettings,
}

/// Settings for plan entries that run a relay container locally.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    /// Port the relay container listens on inside the test network.
    pub relay_port: u16,

    /// Transport the client uses to reach a containerized relay.
    pub transport: Transport,

    /// Prefix for the per-entry docker network name.
    pub network_prefix: String,

    /// Container runtime executable.
    pub binary: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("implementations.json"),
            results_dir: PathBuf::from("results"),
            log_level: Some("info".to_string()),
            workers: 1,
            timeout_secs: 60,
            docker: DockerSettings::default(),
        }
    }
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            relay_port: 4443,
            transport: Transport::Webtransport,
            network_prefix: "moq-interop".to_string(),
            binary: "docker".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load a configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::ConfigResult<Self> {
        let data = std::fs::read_to_string(&path)?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> crate::ConfigResult<Self> {
        let cfg = toml::from_str::<RunnerConfig>(data)?;
        if cfg.workers == 0 {
            return Err(ConfigError::Invalid(vec![crate::ConfigIssue::new(
                "workers",
                "must be at least 1",
            )]));
        }
        Ok(cfg)
    }

    /// Load `path` if given, else the file named by [`CONFIG_ENV`], else defaults.
    ///
    /// An explicitly requested file must exist; the environment fallback is optional.
    pub fn load_or_default(path: Option<&Path>) -> crate::ConfigResult<Self> {
        if let Some(path) = path {
            debug!(path = %path.display(), "loading runner config");
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            Some(env_path) if env_path.exists() => {
                debug!(path = %env_path.display(), "loading runner config from environment");
                Self::from_file(env_path)
            }
            _ => Ok(Self::default()),
        }
    }
}
