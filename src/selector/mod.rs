//! Named rules built on matcher chains.
//!
//! - [`category`] classifies files by path or content
//! - [`node`] extracts dependency nodes from lines, gated on the category
//! - [`normalizer`] rewrites categories and nodes, first match wins
//!
//! Category and node selector lists evaluate every rule for every input
//! and report one [`SelectionResult`] per output (or per failure), tagged
//! with the rule's index and name, so callers see which rules applied.

pub mod category;
pub mod node;
pub mod normalizer;

pub use category::{CategorySelector, NamedCategorySelector, NamedCategorySelectors};
pub use node::{NamedNodeSelector, NamedNodeSelectors, NodeSelector};
pub use normalizer::{NamedNormalizers, NormalizedResult};

use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::{ConfigError, NamedMatcherSpec};
use crate::matcher::{MatchError, MatchResult, MatcherChain};
use crate::metrics::Metrics;

/// A matcher chain with a name, measured under `named-matcher-<name>`.
#[derive(Debug)]
pub struct NamedMatcher {
    name: String,
    chain: MatcherChain,
    metrics: Metrics,
    metric_key: String,
}

impl NamedMatcher {
    /// Wraps `chain` under `name`.
    pub fn new(name: impl Into<String>, chain: MatcherChain, metrics: Metrics) -> Self {
        let name = name.into();
        let metric_key = format!("named-matcher-{name}");
        Self {
            name,
            chain,
            metrics,
            metric_key,
        }
    }

    /// Compiles a configured named chain.
    pub fn compile(spec: &NamedMatcherSpec, metrics: &Metrics) -> Result<Self, ConfigError> {
        let chain = MatcherChain::compile(&spec.matcher, metrics)
            .map_err(|e| e.at(format!("named-matcher({})", spec.name)))?;
        Ok(Self::new(spec.name.clone(), chain, metrics.clone()))
    }

    /// The matcher's name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the chain against `src`.
    pub async fn matches(&self, src: &str) -> MatchResult {
        self.metrics
            .measure(&self.metric_key, self.chain.matches(src))
            .await
            .map_err(|e| e.context(format!("named-matcher({})", self.name)))
    }

    /// Releases the chain's script handles.
    pub fn close(&mut self) {
        self.chain.close();
    }
}

/// Why a rule produced no result, kept as a message so results can be
/// cloned and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionError {
    message: String,
    unmatched: bool,
    cancelled: bool,
}

impl SelectionError {
    /// Returns `true` if the rule simply did not apply.
    pub const fn is_unmatched(&self) -> bool {
        self.unmatched
    }

    /// Returns `true` if the rule was cut short by cancellation.
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&MatchError> for SelectionError {
    fn from(e: &MatchError) -> Self {
        Self {
            message: e.to_string(),
            unmatched: e.is_unmatched(),
            cancelled: e.is_cancelled(),
        }
    }
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SelectionError {}

impl Serialize for SelectionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}

/// One output, or the failure, of one rule in a rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionResult {
    /// Position of the rule in its list
    pub index: usize,
    /// Rule name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// One output string of the rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Set when the rule produced nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<SelectionError>,
}

impl SelectionResult {
    /// Expands one rule's outcome into result entries: one per output
    /// string, or a single error entry.
    pub fn expand(index: usize, name: &str, outcome: MatchResult) -> Vec<Self> {
        match outcome {
            Ok(outputs) => outputs
                .into_iter()
                .map(|result| Self {
                    index,
                    name: name.to_string(),
                    result: Some(result),
                    err: None,
                })
                .collect(),
            Err(e) => vec![Self {
                index,
                name: name.to_string(),
                result: None,
                err: Some(SelectionError::from(&e)),
            }],
        }
    }

    /// The output string, if the rule matched.
    pub fn value(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Returns `true` if the rule was cut short by cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.err.as_ref().is_some_and(SelectionError::is_cancelled)
    }
}
