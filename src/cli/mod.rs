//! Command-line interface for grdep.
//!
//! # Available Commands
//!
//! - `run` - Walk the roots read from stdin and print dependency records
//! - `configcheck` - Parse, merge and validate configurations, then print them
//! - `re` - Try a regular expression (and template) against stdin
//! - `skeleton` - Print a commented configuration to start from
//!
//! # Global Options
//!
//! - `--debug` - Enable debug logs
//! - `--metrics` - Log per-component call counts and durations on exit
//!
//! Logs go to stderr; `RUST_LOG` takes precedence over `--debug`.
//!
//! # Example
//!
//! ```bash
//! grdep skeleton > grdep.yml
//! grdep configcheck grdep.yml
//! git ls-files | grdep run grdep.yml > deps.jsonl
//! find . -maxdepth 1 -type d | grdep --metrics run grdep.yml --category
//! ```

mod configcheck;
mod re;
mod run;
mod skeleton;

pub use configcheck::ConfigCheckCommand;
pub use re::ReCommand;
pub use run::RunCommand;
pub use skeleton::{SKELETON, SkeletonCommand};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::metrics::{MetricsCollector, MetricsSnapshot};

/// Runtime configuration derived from the global flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Default log filter, used when `RUST_LOG` is not set
    pub log_level: String,

    /// Whether the metrics collector is enabled
    pub metrics: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics: false,
        }
    }
}

impl CliConfig {
    /// Create a configuration with the default log level and no metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the global tracing subscriber, writing to stderr.
    ///
    /// Only the first call has an effect.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Find dependencies by grep.
#[derive(Parser, Debug)]
#[command(
    name = "grdep",
    about = "Find dependencies by grep",
    version,
    long_about = "grdep walks the paths read from standard input, classifies every file \
                  into categories and extracts dependency nodes from its lines, using \
                  composable matcher rules."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Log metrics when the command completes
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find dependencies. Each line of standard input is a path to search.
    Run(RunCommand),

    /// Test configurations
    #[command(name = "configcheck")]
    ConfigCheck(ConfigCheckCommand),

    /// Test a regular expression, useful to debug matchers
    Re(ReCommand),

    /// Generate a configuration skeleton
    Skeleton(SkeletonCommand),
}

impl Cli {
    /// Sets up logging and runs the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Derives the runtime configuration from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            log_level: if self.debug { "debug" } else { "info" }.to_string(),
            metrics: self.metrics,
        }
    }

    /// Runs the selected command with an explicit configuration.
    ///
    /// Ctrl-C cancels the command. With metrics enabled every aggregate is
    /// logged once the command returns, whether it succeeded or not.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let collector = MetricsCollector::new(config.metrics);
        let cancel = CancellationToken::new();
        let interrupt = cancel_on_interrupt(cancel.clone());

        let result = match self.command {
            Commands::Run(cmd) => cmd.execute(&collector.handle(), &cancel).await,
            Commands::ConfigCheck(cmd) => cmd.execute(&collector.handle()),
            Commands::Re(cmd) => cmd.execute(&cancel).await,
            Commands::Skeleton(cmd) => cmd.execute(),
        };

        interrupt.abort();
        let snapshot = collector.close().await;
        if config.metrics {
            log_metrics(&snapshot);
        }
        result
    }
}

fn cancel_on_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping");
            cancel.cancel();
        }
    })
}

fn log_metrics(snapshot: &MetricsSnapshot) {
    snapshot.walk(|key, value| {
        let duration_ms = u64::try_from(value.duration_ms()).unwrap_or(u64::MAX);
        info!(key, count = value.count, duration_ms, "metrics");
    });
}
