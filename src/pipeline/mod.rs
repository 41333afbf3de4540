//! The scan pipeline.
//!
//! Wires the walker, selectors and normalizers together:
//!
//! ```text
//! root lines ─▶ walk ─▶ categories ─▶ category normalizers ─▶ nodes ─▶ node normalizers ─▶ records
//! ```
//!
//! Each line read from the input names a root. Every root is walked in
//! input order, every file line is classified by the category rules of its
//! file, and every (category, line) pair is passed to the node rules. Each
//! surviving combination is written as one JSON [`Record`].
//!
//! "Unmatched" results are skipped silently at every fan-out. A hard error
//! anywhere aborts the run, as does a read error on the input or on a
//! walked file. Cancellation is observed while waiting for input roots,
//! while waiting for walked lines and inside text-mode category scans. Category results are cached per file path and normalizer
//! results per input string for the lifetime of the pipeline.

pub mod record;

pub use record::{Record, Selected};

use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::Memoized;
use crate::config::{Config, ConfigError};
use crate::core::GrdepError;
use crate::matcher::{MatchError, MatcherChain};
use crate::metrics::Metrics;
use crate::selector::{
    NamedCategorySelectors, NamedNodeSelectors, NamedNormalizers, NormalizedResult,
    SelectionResult,
};
use crate::walk::{Line, ReadLine, Walker, read_lines};

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Roots walked
    pub roots: usize,
    /// File lines examined
    pub lines: usize,
    /// Records written
    pub records: usize,
}

/// Compiled configuration ready to scan roots.
#[derive(Debug)]
pub struct Pipeline {
    ignore: Arc<MatcherChain>,
    categories: Memoized<NamedCategorySelectors, Vec<SelectionResult>>,
    nodes: NamedNodeSelectors,
    category_normalizers: Memoized<NamedNormalizers, Vec<NormalizedResult>>,
    node_normalizers: Memoized<NamedNormalizers, Vec<NormalizedResult>>,
    category_only: bool,
}

impl Pipeline {
    /// Compiles `config`, reporting measurements to `metrics`.
    pub fn build(config: &Config, metrics: &Metrics) -> Result<Self, ConfigError> {
        let ignore = MatcherChain::compile(&config.ignore, metrics).map_err(|e| e.at("ignore"))?;
        let categories = NamedCategorySelectors::compile(&config.category, metrics)?;
        let nodes = NamedNodeSelectors::compile(&config.node, metrics)?;
        let category_normalizers = NamedNormalizers::compile(&config.normalizer.category, metrics)
            .map_err(|e| e.at("normalizer.category"))?;
        let node_normalizers = NamedNormalizers::compile(&config.normalizer.node, metrics)
            .map_err(|e| e.at("normalizer.node"))?;

        debug!(
            target: "pipeline",
            "compiled {} ignore matchers, {} category rules, {} node rules",
            config.ignore.len(),
            categories.len(),
            nodes.len()
        );

        Ok(Self {
            ignore: Arc::new(ignore),
            categories: Memoized::new(categories),
            nodes,
            category_normalizers: Memoized::new(category_normalizers),
            node_normalizers: Memoized::new(node_normalizers),
            category_only: false,
        })
    }

    /// Stops after category normalization, writing records without `node`.
    #[must_use]
    pub const fn category_only(mut self, category_only: bool) -> Self {
        self.category_only = category_only;
        self
    }

    /// Reads root paths from `input`, one per line, and writes one JSON
    /// record per line of output to `out`.
    ///
    /// Blank input lines are skipped. Returns on the first hard error, on
    /// cancellation, or once every root is processed.
    pub async fn run<R, W>(
        &self,
        input: R,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, GrdepError>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let mut summary = RunSummary::default();
        let mut roots = read_lines(input, cancel.clone());

        while let Some(root) = next_item(&mut roots, cancel).await? {
            if let Some(err) = root.err.clone() {
                return Err(GrdepError::from_stream(format!("input line {}", root.linum), err));
            }
            if root.text.trim().is_empty() {
                continue;
            }
            self.process_root(&root, out, cancel, &mut summary).await?;
        }

        out.flush()?;
        debug!(
            target: "pipeline",
            "processed {} roots, {} lines, wrote {} records",
            summary.roots,
            summary.lines,
            summary.records
        );
        Ok(summary)
    }

    async fn process_root<W: Write>(
        &self,
        root: &ReadLine,
        out: &mut W,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), GrdepError> {
        debug!(target: "pipeline", "root {root}");
        summary.roots += 1;

        let mut lines = Walker::new(&root.text, Arc::clone(&self.ignore)).walk(cancel.clone());
        while let Some(line) = next_item(&mut lines, cancel).await? {
            if let Some(err) = line.err.clone() {
                return Err(GrdepError::from_stream(line.to_string(), err));
            }
            summary.lines += 1;
            self.process_line(root, &line, out, cancel, summary).await?;
        }
        Ok(())
    }

    async fn process_line<W: Write>(
        &self,
        root: &ReadLine,
        line: &Line,
        out: &mut W,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), GrdepError> {
        let categories = self.categories.select(&line.path, cancel).await;
        if categories.iter().any(SelectionResult::is_cancelled) {
            return Err(GrdepError::Cancelled);
        }
        for category in categories {
            let Some(label) = selected(&category, "category", line)? else {
                continue;
            };
            debug!(target: "pipeline", "category {label} {line}");

            let normalized = self
                .category_normalizers
                .normalize(label)
                .await
                .map_err(|e| normalizer_error("category normalizer", line, &e))?;

            for normalized_category in &normalized {
                let category = Selected {
                    origin: &category,
                    normalized: normalized_category,
                };
                if self.category_only {
                    write_record(out, root, line, category, None, summary)?;
                    continue;
                }
                self.process_nodes(root, line, category, out, summary).await?;
            }
        }
        Ok(())
    }

    async fn process_nodes<W: Write>(
        &self,
        root: &ReadLine,
        line: &Line,
        category: Selected<'_>,
        out: &mut W,
        summary: &mut RunSummary,
    ) -> Result<(), GrdepError> {
        let label = &category.normalized.result;
        for node in self.nodes.select(label, &line.content).await {
            let Some(value) = selected(&node, "node", line)? else {
                continue;
            };
            debug!(target: "pipeline", "node {value} in category {label} {line}");

            let normalized = self
                .node_normalizers
                .normalize(value)
                .await
                .map_err(|e| normalizer_error("node normalizer", line, &e))?;

            for normalized_node in &normalized {
                let node = Selected {
                    origin: &node,
                    normalized: normalized_node,
                };
                write_record(out, root, line, category, Some(node), summary)?;
            }
        }
        Ok(())
    }

    /// Releases every script handle held by the compiled configuration.
    pub fn close(mut self) {
        match Arc::get_mut(&mut self.ignore) {
            Some(ignore) => ignore.close(),
            None => debug!(target: "pipeline", "ignore chain still shared; released on drop"),
        }
        self.categories.inner_mut().close();
        self.nodes.close();
        self.category_normalizers.inner_mut().close();
        self.node_normalizers.inner_mut().close();
    }
}

/// Returns the value of a selection, `None` for an unmatched rule, and an
/// error for a hard failure.
fn selected<'a>(
    result: &'a SelectionResult,
    stage: &str,
    line: &Line,
) -> Result<Option<&'a str>, GrdepError> {
    match &result.err {
        Some(err) if err.is_unmatched() => Ok(None),
        Some(err) => Err(GrdepError::Selection {
            stage: stage.to_string(),
            location: line.to_string(),
            message: err.to_string(),
        }),
        None => Ok(result.value()),
    }
}

/// Receives the next stream item, or fails as soon as `cancel` fires.
async fn next_item<T>(
    receiver: &mut mpsc::Receiver<T>,
    cancel: &CancellationToken,
) -> Result<Option<T>, GrdepError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(GrdepError::Cancelled),
        item = receiver.recv() => Ok(item),
    }
}

fn normalizer_error(stage: &str, line: &Line, err: &MatchError) -> GrdepError {
    GrdepError::Selection {
        stage: stage.to_string(),
        location: line.to_string(),
        message: err.to_string(),
    }
}

fn write_record<W: Write>(
    out: &mut W,
    root: &ReadLine,
    line: &Line,
    category: Selected<'_>,
    node: Option<Selected<'_>>,
    summary: &mut RunSummary,
) -> Result<(), GrdepError> {
    Record {
        path: root,
        line,
        category,
        node,
    }
    .write_to(out)?;
    summary.records += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config_text;
    use crate::metrics::MetricsCollector;
    use serde_json::Value;
    use std::fs;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    const CONFIG: &str = r#"
ignore:
  - r: "/vendor$"
category:
  - name: ext
    filename:
      - r: "\\.(?P<ext>\\w+)$"
        tmpl: "$ext"
node:
  - name: source
    category: "^bash$"
    matcher:
      - r: "^\\. (?P<v>.+)$"
        tmpl: "$v"
  - name: import
    category: "^go$"
    matcher:
      - r: "^import \"(?P<v>[^\"]+)\"$"
        tmpl: "$v"
normalizer:
  category:
    - name: shell
      matcher:
        - r: "^sh$"
          val: [bash]
  node:
    - name: strip
      matcher:
        - r: "^(?P<v>.+)\\.sh$"
          tmpl: "$v"
"#;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("a.sh"), "#!/bin/bash\n. lib.sh\necho done\n").unwrap();
        fs::write(dir.path().join("src/b.go"), "package b\nimport \"fmt\"\n").unwrap();
        fs::write(dir.path().join("vendor/c.sh"), ". hidden.sh\n").unwrap();
        dir
    }

    fn pipeline(config: &str) -> Pipeline {
        Pipeline::build(&parse_config_text(config).unwrap(), &Metrics::disabled()).unwrap()
    }

    async fn run(pipeline: &Pipeline, roots: &str) -> (Result<RunSummary, GrdepError>, Vec<Value>) {
        let mut out = Vec::new();
        let result =
            pipeline.run(Cursor::new(roots.to_string()), &mut out, &CancellationToken::new()).await;
        let records = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (result, records)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_to_end() {
        let dir = tree();
        let root = dir.path().to_string_lossy().to_string();
        let p = pipeline(CONFIG);

        let (summary, records) = run(&p, &format!("{root}\n")).await;
        let summary = summary.unwrap();
        assert_eq!(summary.roots, 1);
        assert_eq!(summary.lines, 5);
        assert_eq!(summary.records, 2);

        let first = &records[0];
        assert_eq!(first["path"]["linum"], 1);
        assert_eq!(first["path"]["text"], root);
        assert_eq!(first["line"]["linum"], 2);
        assert_eq!(first["line"]["content"], ". lib.sh");
        assert_eq!(first["category"]["origin"]["name"], "ext");
        assert_eq!(first["category"]["origin"]["result"], "sh");
        assert_eq!(first["category"]["normalized"]["name"], "shell");
        assert_eq!(first["category"]["normalized"]["result"], "bash");
        assert_eq!(first["node"]["origin"]["name"], "source");
        assert_eq!(first["node"]["origin"]["result"], "lib.sh");
        assert_eq!(first["node"]["normalized"]["result"], "lib");

        let second = &records[1];
        assert_eq!(second["category"]["normalized"]["index"], -1);
        assert_eq!(second["category"]["normalized"]["result"], "go");
        assert_eq!(second["node"]["origin"]["index"], 1);
        assert_eq!(second["node"]["normalized"]["result"], "fmt");
        p.close();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_category_only() {
        let dir = tree();
        let p = pipeline(CONFIG).category_only(true);

        let (summary, records) = run(&p, &format!("{}\n", dir.path().display())).await;
        assert_eq!(summary.unwrap().records, 5);
        assert!(records.iter().all(|r| r.get("node").is_none()));
        let categories: Vec<&str> =
            records.iter().map(|r| r["category"]["normalized"]["result"].as_str().unwrap()).collect();
        assert_eq!(categories, vec!["bash", "bash", "bash", "go", "go"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_are_repeatable() {
        let dir = tree();
        let roots = format!("{}\n\n{}\n", dir.path().display(), dir.path().join("a.sh").display());
        let p = pipeline(CONFIG);

        let (first_summary, first) = run(&p, &roots).await;
        let (second_summary, second) = run(&p, &roots).await;
        assert_eq!(first_summary.unwrap(), second_summary.unwrap());
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[2]["path"]["linum"], 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_config_writes_nothing() {
        let dir = tree();
        let p = pipeline("{}");
        let (summary, records) = run(&p, &format!("{}\n", dir.path().display())).await;
        assert_eq!(summary.unwrap().records, 0);
        assert!(records.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hard_error_aborts_run() {
        let dir = tree();
        let p = pipeline(
            r#"
category:
  - name: broken
    filename:
      - lua:
          src: "function f(s) return 1 end"
          entry: f
"#,
        );
        let (result, records) = run(&p, &format!("{}\n", dir.path().display())).await;
        match result.unwrap_err() {
            GrdepError::Selection {
                stage,
                location,
                ..
            } => {
                assert_eq!(stage, "category");
                assert!(location.contains("a.sh"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(records.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_run() {
        let dir = tree();
        let p = pipeline(CONFIG);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut out = Vec::new();
        let err = p
            .run(Cursor::new(format!("{}\n", dir.path().display())), &mut out, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GrdepError::Cancelled));
    }

    /// A reader that blocks for a long time before reporting end of input.
    struct StalledInput;

    impl Read for StalledInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(0)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_while_waiting_for_input() {
        let p = pipeline(CONFIG);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut out = Vec::new();
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            p.run(BufReader::new(StalledInput), &mut out, &cancel),
        )
        .await
        .expect("run should stop promptly once cancelled");
        assert!(matches!(result, Err(GrdepError::Cancelled)));
        assert!(out.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ignore_chain_hard_error_aborts_run() {
        let dir = tree();
        let p = pipeline(
            r#"
ignore:
  - lua:
      src: "function f(s) return 1 end"
      entry: f
category:
  - name: ext
    filename:
      - r: "\\.(?P<ext>\\w+)$"
        tmpl: "$ext"
"#,
        );
        let (result, records) = run(&p, &format!("{}\n", dir.path().display())).await;
        match result.unwrap_err() {
            GrdepError::Selection {
                stage,
                message,
                ..
            } => {
                assert_eq!(stage, "ignore");
                assert!(message.contains("should return string"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(records.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_metrics_cover_every_stage() {
        let dir = tree();
        let collector = MetricsCollector::spawn();
        let p = Pipeline::build(&parse_config_text(CONFIG).unwrap(), &collector.handle()).unwrap();
        let mut out = Vec::new();
        p.run(Cursor::new(format!("{}\n", dir.path().display())), &mut out, &CancellationToken::new())
            .await
            .unwrap();
        p.close();

        let snapshot = collector.close().await;
        // two files, each classified once
        assert_eq!(snapshot.get("named-category-selector-ext-call").unwrap().count, 2);
        assert_eq!(snapshot.get("named-node-selector-source-call").unwrap().count, 5);
        assert!(snapshot.get("named-normalizer-shell-call").is_some());
        assert!(snapshot.get("named-normalizer-strip-success").is_some());
    }
}
