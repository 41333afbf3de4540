//! Find dependencies under the roots read from stdin.

use anyhow::{Context, Result};
use clap::Args;
use std::io::{BufRead, BufReader, BufWriter, Write};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::load_configs;
use crate::metrics::Metrics;
use crate::pipeline::{Pipeline, RunSummary};

/// Arguments of `grdep run`.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Configuration files or inline configuration text, merged in order
    #[arg(value_name = "FILE_OR_TEXT", required = true)]
    configs: Vec<String>,

    /// Determine categories and stop, omitting nodes from the output
    #[arg(short = 'C', long)]
    category: bool,
}

impl RunCommand {
    /// Reads roots from stdin and writes records to stdout.
    pub async fn execute(self, metrics: &Metrics, cancel: &CancellationToken) -> Result<()> {
        let input = BufReader::new(std::io::stdin());
        let mut out = BufWriter::new(std::io::stdout());
        self.execute_with(input, &mut out, metrics, cancel).await.map(|_| ())
    }

    /// Runs against explicit input and output streams.
    pub async fn execute_with<R, W>(
        self,
        input: R,
        out: &mut W,
        metrics: &Metrics,
        cancel: &CancellationToken,
    ) -> Result<RunSummary>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let config = load_configs(&self.configs).context("failed to load configuration")?;
        let pipeline = Pipeline::build(&config, metrics)
            .context("failed to compile configuration")?
            .category_only(self.category);

        let result = pipeline.run(input, out, cancel).await;
        pipeline.close();
        let summary = result?;

        debug!(
            "walked {} roots, {} lines, {} records",
            summary.roots, summary.lines, summary.records
        );
        Ok(summary)
    }
}
