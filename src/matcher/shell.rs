//! External shell-script filter.
//!
//! The configured script body is written once to a temporary file on first
//! use and executed with `bash` for every candidate. The candidate is piped
//! to the script's stdin; stdout is split on newlines. A spawn failure, a
//! non-zero exit or exceeding the timeout all mean "the rule did not apply"
//! and are reported as [`MatchError::Unmatched`].

use anyhow::{Context, Result, anyhow, bail};
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::{MatchError, MatchResult};

/// Execution limit for a single script invocation.
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(3);

const DEFAULT_INTERPRETER: &str = "bash";

/// A shell script run once per candidate.
#[derive(Debug)]
pub struct ShellScript {
    body: String,
    interpreter: String,
    timeout: Duration,
    prepared: OnceCell<PreparedScript>,
}

/// Script file and resolved interpreter, created on first use.
#[derive(Debug)]
struct PreparedScript {
    interpreter: PathBuf,
    file: NamedTempFile,
}

impl ShellScript {
    /// Creates a script runner for `body`. Nothing touches the filesystem
    /// until the first call to [`ShellScript::run`].
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout: SHELL_TIMEOUT,
            prepared: OnceCell::new(),
        }
    }

    /// Overrides the execution limit.
    #[must_use]
    pub const fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Returns the script body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Runs the script with `src` on stdin.
    pub async fn run(&self, src: &str) -> MatchResult {
        match self.execute(src).await {
            Ok(lines) => Ok(lines),
            Err(e) => {
                tracing::debug!(target: "matcher::sh", "script did not apply: {e:#}");
                Err(MatchError::unmatched(format!("shell script: {e}")))
            }
        }
    }

    /// Deletes the temporary script file. A later [`ShellScript::run`]
    /// recreates it.
    pub fn close(&mut self) {
        self.prepared.take();
    }

    async fn prepare(&self) -> Result<&PreparedScript> {
        self.prepared
            .get_or_try_init(|| async {
                let interpreter = which::which(&self.interpreter)
                    .with_context(|| format!("{} not found in PATH", self.interpreter))?;
                let mut file = tempfile::Builder::new()
                    .prefix("grdep-")
                    .suffix(".sh")
                    .tempfile()
                    .context("Failed to create script file")?;
                file.write_all(self.body.as_bytes())?;
                file.flush()?;
                tracing::trace!(
                    target: "matcher::sh",
                    "prepared script {} for {}",
                    file.path().display(),
                    interpreter.display()
                );
                Ok::<_, anyhow::Error>(PreparedScript {
                    interpreter,
                    file,
                })
            })
            .await
    }

    async fn execute(&self, src: &str) -> Result<Vec<String>> {
        let script = self.prepare().await?;

        let mut child = Command::new(&script.interpreter)
            .arg(script.file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn script")?;

        let input = child.stdin.take();
        let invocation = async move {
            if let Some(mut stdin) = input {
                if let Err(e) = stdin.write_all(src.as_bytes()).await {
                    // Scripts are free to ignore their input.
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(anyhow::Error::from(e).context("Failed to write script stdin"));
                    }
                }
            }
            child.wait_with_output().await.context("Failed to wait for script")
        };

        let output = timeout(self.timeout, invocation)
            .await
            .map_err(|_| anyhow!("timed out after {}s", self.timeout.as_secs_f64()))??;

        if !output.status.success() {
            bail!("exited with {}", output.status);
        }

        Ok(String::from_utf8_lossy(&output.stdout).split('\n').map(str::to_string).collect())
    }
}
