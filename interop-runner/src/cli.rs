#![forbid(unsafe_code)]

//! Command line arguments of `moq-interop`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use interop_core::{ConfigResult, DraftVersion, RunnerConfig, Transport};
use interop_plan::{Classification, PlanningFilters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "moq-interop", author, version, about = "Run the MoQT client/relay interoperability matrix", long_about = None)]
pub struct Cli {
    /// Implementation registry (JSON)
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Runner configuration (TOML). Falls back to $MOQ_INTEROP_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory receiving one sub-directory per run
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Only run against locally started relay containers
    #[arg(long)]
    pub docker_only: bool,

    /// Only run against remote relay endpoints
    #[arg(long)]
    pub remote_only: bool,

    /// Only remote endpoints using this transport (quic, webtransport)
    #[arg(long)]
    pub transport: Option<Transport>,

    /// Only pairs predicted to negotiate the target version
    #[arg(long)]
    pub only_at: bool,

    /// Only pairs predicted to negotiate a newer draft than the target
    #[arg(long)]
    pub only_ahead: bool,

    /// Only pairs predicted to negotiate an older draft than the target
    #[arg(long)]
    pub only_behind: bool,

    /// Target draft version (defaults to the registry's current target)
    #[arg(long)]
    pub target: Option<DraftVersion>,

    /// Restrict to these client ids (repeatable)
    #[arg(long = "client", value_name = "ID")]
    pub clients: Vec<String>,

    /// Restrict to these relay ids (repeatable)
    #[arg(long = "relay", value_name = "ID")]
    pub relays: Vec<String>,

    /// Run a single test case in every client
    #[arg(long = "test", value_name = "NAME")]
    pub test_case: Option<String>,

    /// Concurrent plan entries
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-entry timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Print the compiled plan without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Print the registry and exit
    #[arg(long)]
    pub list: bool,

    /// Output format for --list and --dry-run
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Debug logging and verbose client output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Fold command line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut RunnerConfig) {
        if let Some(registry) = &self.registry {
            config.registry = registry.clone();
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.verbose {
            config.log_level = Some("debug".to_string());
        }
    }

    pub fn filters(&self) -> ConfigResult<PlanningFilters> {
        let mut builder = PlanningFilters::builder()
            .docker_only(self.docker_only)
            .remote_only(self.remote_only)
            .transport(self.transport)
            .clients(self.clients.iter().cloned())
            .relays(self.relays.iter().cloned());
        for (set, class) in [
            (self.only_at, Classification::At),
            (self.only_ahead, Classification::Ahead),
            (self.only_behind, Classification::Behind),
        ] {
            if set {
                builder = builder.only(class);
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use interop_core::ConfigError;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeatable_filters() {
        let cli = Cli::parse_from([
            "moq-interop", "--client", "moq-rs", "--client", "moxygen", "--relay", "moq-rs", "--transport", "quic",
            "--only-at", "--target", "draft-13",
        ]);
        assert_eq!(cli.clients, vec!["moq-rs", "moxygen"]);
        assert_eq!(cli.target.as_ref().map(ToString::to_string).as_deref(), Some("draft-13"));
        let filters = cli.filters().unwrap();
        assert_eq!(filters.transport(), Some(Transport::Quic));
        assert_eq!(filters.classification(), Some(Classification::At));
        assert!(filters.allows_client("moxygen"));
        assert!(!filters.allows_relay("moxygen"));
    }

    #[test]
    fn conflicting_filters_are_config_errors() {
        let cli = Cli::parse_from(["moq-interop", "--only-at", "--only-behind"]);
        assert!(matches!(cli.filters(), Err(ConfigError::ConflictingFilters(_))));
        let cli = Cli::parse_from(["moq-interop", "--docker-only", "--remote-only"]);
        assert!(matches!(cli.filters(), Err(ConfigError::ConflictingFilters(_))));
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = Cli::parse_from(["moq-interop", "--workers", "4", "--timeout", "5", "--results-dir", "out", "-v"]);
        let mut config = RunnerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }
}
