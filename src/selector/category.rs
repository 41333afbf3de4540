//! Category selection.
//!
//! A category rule either matches the file path (`filename` mode) or scans
//! the file's lines until the first one its chain matches (`text` mode).
//! Text scans observe the caller's cancellation token and stop with a
//! cancelled stream error when it fires.

use futures::future::join_all;
use std::fs::File;
use std::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::SelectionResult;
use crate::cache::Memoized;
use crate::config::{CSelector, ConfigError};
use crate::matcher::{MatchError, MatchResult, MatcherChain};
use crate::metrics::Metrics;
use crate::walk::read_lines;

/// How a rule derives a category from a file.
#[derive(Debug)]
pub enum CategorySelector {
    /// Runs the chain once against the path.
    Filename(MatcherChain),
    /// Runs the chain against each line; the first match wins.
    Content(MatcherChain),
}

impl CategorySelector {
    /// Selects categories for the file at `path`.
    pub async fn select(&self, path: &str, cancel: &CancellationToken) -> MatchResult {
        match self {
            Self::Filename(chain) => {
                chain.matches(path).await.map_err(|e| e.context(format!("file category {path}")))
            }
            Self::Content(chain) => select_content(chain, path, cancel)
                .await
                .map_err(|e| e.context(format!("text category {path}"))),
        }
    }

    /// Releases the chain's script handles.
    pub fn close(&mut self) {
        match self {
            Self::Filename(chain) | Self::Content(chain) => chain.close(),
        }
    }
}

async fn select_content(
    chain: &MatcherChain,
    path: &str,
    cancel: &CancellationToken,
) -> MatchResult {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(target: "selector::category", "cannot open {path}: {e}");
            return Err(MatchError::unmatched(format!("cannot open: {e}")));
        }
    };

    // stops the reader on every return path without touching the caller's token
    let cancel = cancel.child_token();
    let _guard = cancel.clone().drop_guard();
    let mut lines = read_lines(BufReader::new(file), cancel);

    while let Some(item) = lines.recv().await {
        let line = item.into_result()?;
        match chain.matches(&line.text).await {
            Ok(outputs) => return Ok(outputs),
            Err(e) if e.is_unmatched() => {}
            Err(e) => return Err(e.context(format!("line {}", line.linum))),
        }
    }
    Err(MatchError::unmatched("no line matched"))
}

/// A category rule with a name, measured under
/// `named-category-selector-<name>`.
#[derive(Debug)]
pub struct NamedCategorySelector {
    name: String,
    selector: CategorySelector,
    metrics: Metrics,
    metric_key: String,
}

impl NamedCategorySelector {
    /// Wraps `selector` under `name`.
    pub fn new(name: impl Into<String>, selector: CategorySelector, metrics: Metrics) -> Self {
        let name = name.into();
        let metric_key = format!("named-category-selector-{name}");
        Self {
            name,
            selector,
            metrics,
            metric_key,
        }
    }

    /// Compiles a configured category rule.
    pub fn compile(spec: &CSelector, metrics: &Metrics) -> Result<Self, ConfigError> {
        let context = || format!("category({})", spec.name);
        let selector = match (spec.filename.is_empty(), spec.text.is_empty()) {
            (false, true) => CategorySelector::Filename(
                MatcherChain::compile(&spec.filename, metrics).map_err(|e| e.at(context()))?,
            ),
            (true, false) => CategorySelector::Content(
                MatcherChain::compile(&spec.text, metrics).map_err(|e| e.at(context()))?,
            ),
            _ => {
                return Err(ConfigError::invalid_selector(format!(
                    "{} should have only either filename or text",
                    context()
                )));
            }
        };
        Ok(Self::new(spec.name.clone(), selector, metrics.clone()))
    }

    /// The rule's name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selects categories for `path`.
    pub async fn select(&self, path: &str, cancel: &CancellationToken) -> MatchResult {
        self.metrics
            .measure(&self.metric_key, self.selector.select(path, cancel))
            .await
            .map_err(|e| e.context(format!("category({})", self.name)))
    }

    /// Releases the rule's script handles.
    pub fn close(&mut self) {
        self.selector.close();
    }
}

/// All category rules, in declared order.
#[derive(Debug, Default)]
pub struct NamedCategorySelectors {
    selectors: Vec<NamedCategorySelector>,
}

impl NamedCategorySelectors {
    /// Creates a list from compiled rules.
    pub const fn new(selectors: Vec<NamedCategorySelector>) -> Self {
        Self {
            selectors,
        }
    }

    /// Compiles every configured category rule.
    pub fn compile(specs: &[CSelector], metrics: &Metrics) -> Result<Self, ConfigError> {
        let selectors = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                NamedCategorySelector::compile(spec, metrics).map_err(|e| e.at(format!("category[{i}]")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(selectors))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Evaluates every rule against `path`.
    ///
    /// Rules run concurrently; results are ordered by rule index.
    pub async fn select(&self, path: &str, cancel: &CancellationToken) -> Vec<SelectionResult> {
        let outcomes = join_all(self.selectors.iter().map(|s| s.select(path, cancel))).await;
        self.selectors
            .iter()
            .zip(outcomes)
            .enumerate()
            .flat_map(|(i, (selector, outcome))| SelectionResult::expand(i, selector.name(), outcome))
            .collect()
    }

    /// Releases every rule's script handles.
    pub fn close(&mut self) {
        for selector in &mut self.selectors {
            selector.close();
        }
    }
}

impl Memoized<NamedCategorySelectors, Vec<SelectionResult>> {
    /// Like [`NamedCategorySelectors::select`], cached by path. Results
    /// cut short by cancellation are returned but not cached.
    pub async fn select(&self, path: &str, cancel: &CancellationToken) -> Vec<SelectionResult> {
        self.cache()
            .try_get_or_compute(path.to_string(), || async {
                let results = self.inner().select(path, cancel).await;
                if results.iter().any(SelectionResult::is_cancelled) {
                    Err(results)
                } else {
                    Ok(results)
                }
            })
            .await
            .unwrap_or_else(|uncached| uncached)
    }
}
