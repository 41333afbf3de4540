//! Node selection.
//!
//! A node rule only looks at lines of files whose category label matches
//! its category pattern. The gate is checked first, so a rule for `bash`
//! never runs its (possibly expensive) chain on a Go file.

use futures::future::join_all;
use regex::Regex;

use super::SelectionResult;
use crate::config::{ConfigError, NSelector};
use crate::matcher::{MatchError, MatchResult, MatcherChain};
use crate::metrics::Metrics;

/// Category gate plus the chain run on line content.
#[derive(Debug)]
pub struct NodeSelector {
    category: Regex,
    chain: MatcherChain,
}

impl NodeSelector {
    /// Creates a selector.
    pub const fn new(category: Regex, chain: MatcherChain) -> Self {
        Self {
            category,
            chain,
        }
    }

    /// Extracts nodes from `content` when `category` passes the gate.
    pub async fn select(&self, category: &str, content: &str) -> MatchResult {
        if !self.category.is_match(category) {
            return Err(MatchError::unmatched(format!(
                "node category {category} does not match {}",
                self.category.as_str()
            )));
        }
        self.chain.matches(content).await.map_err(|e| e.context(format!("node category {category}")))
    }

    /// Releases the chain's script handles.
    pub fn close(&mut self) {
        self.chain.close();
    }
}

/// A node rule with a name, measured under `named-node-selector-<name>`.
#[derive(Debug)]
pub struct NamedNodeSelector {
    name: String,
    selector: NodeSelector,
    metrics: Metrics,
    metric_key: String,
}

impl NamedNodeSelector {
    /// Wraps `selector` under `name`.
    pub fn new(name: impl Into<String>, selector: NodeSelector, metrics: Metrics) -> Self {
        let name = name.into();
        let metric_key = format!("named-node-selector-{name}");
        Self {
            name,
            selector,
            metrics,
            metric_key,
        }
    }

    /// Compiles a configured node rule.
    pub fn compile(spec: &NSelector, metrics: &Metrics) -> Result<Self, ConfigError> {
        let chain = MatcherChain::compile(&spec.matcher, metrics)
            .map_err(|e| e.at(format!("node({})", spec.name)))?;
        let selector = NodeSelector::new(spec.category.as_regex().clone(), chain);
        Ok(Self::new(spec.name.clone(), selector, metrics.clone()))
    }

    /// The rule's name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extracts nodes from `content` of a file in `category`.
    pub async fn select(&self, category: &str, content: &str) -> MatchResult {
        self.metrics
            .measure(&self.metric_key, self.selector.select(category, content))
            .await
            .map_err(|e| e.context(format!("node({})", self.name)))
    }

    /// Releases the rule's script handles.
    pub fn close(&mut self) {
        self.selector.close();
    }
}

/// All node rules, in declared order.
#[derive(Debug, Default)]
pub struct NamedNodeSelectors {
    selectors: Vec<NamedNodeSelector>,
}

impl NamedNodeSelectors {
    /// Creates a list from compiled rules.
    pub const fn new(selectors: Vec<NamedNodeSelector>) -> Self {
        Self {
            selectors,
        }
    }

    /// Compiles every configured node rule.
    pub fn compile(specs: &[NSelector], metrics: &Metrics) -> Result<Self, ConfigError> {
        let selectors = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                NamedNodeSelector::compile(spec, metrics).map_err(|e| e.at(format!("node[{i}]")))
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

    /// Evaluates every rule against one line.
    pub async fn select(&self, category: &str, content: &str) -> Vec<SelectionResult> {
        let outcomes = join_all(self.selectors.iter().map(|s| s.select(category, content))).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherSpec;
    use crate::metrics::MetricsCollector;

    fn selector(category: &str, specs: Vec<MatcherSpec>) -> NodeSelector {
        NodeSelector::new(
            Regex::new(category).unwrap(),
            MatcherChain::compile(&specs, &Metrics::disabled()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_gate_passes() {
        let s = selector("^bash$", vec![MatcherSpec::regex(r"^\. (?P<v>.+)$").unwrap().with_template("$v")]);
        assert_eq!(s.select("bash", ". lib.sh").await.unwrap(), vec!["lib.sh"]);
        assert!(s.select("bash", "echo").await.unwrap_err().is_unmatched());
    }

    #[tokio::test]
    async fn test_gate_blocks_other_categories_without_running_chain() {
        let collector = MetricsCollector::spawn();
        let chain = MatcherChain::compile(
            // a hard error if it ever ran
            &[MatcherSpec::lua("function f(s) return 1 end", "f")],
            &collector.handle(),
        )
        .unwrap();
        let s = NodeSelector::new(Regex::new("bash").unwrap(), chain);

        for content in ["", ". lib.sh", "anything"] {
            assert!(s.select("go", content).await.unwrap_err().is_unmatched());
        }
        assert!(!s.select("bash", "x").await.unwrap_err().is_unmatched());

        let snapshot = collector.close().await;
        assert_eq!(snapshot.get("matcher-lua-call").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_list_reports_every_rule() {
        let specs: Vec<NSelector> = serde_yaml::from_str(
            r#"
- name: source
  category: "^bash$"
  matcher:
    - r: "^\\. (?P<v>.+)$"
      tmpl: "$v"
- name: bin
  category: ".*"
  matcher:
    - r: "/usr/bin/\\w+"
"#,
        )
        .unwrap();
        let selectors = NamedNodeSelectors::compile(&specs, &Metrics::disabled()).unwrap();
        assert_eq!(selectors.len(), 2);

        let results = selectors.select("bash", ". /usr/bin/env").await;
        let values: Vec<Option<&str>> = results.iter().map(SelectionResult::value).collect();
        assert_eq!(values, vec![Some("/usr/bin/env"), Some("/usr/bin/env")]);
        assert_eq!(results[0].name, "source");
        assert_eq!(results[1].index, 1);

        let results = selectors.select("go", ". /usr/bin/env").await;
        assert!(results[0].err.as_ref().unwrap().is_unmatched());
        assert_eq!(results[1].value(), Some("/usr/bin/env"));
    }

    #[test]
    fn test_compile_reports_location() {
        let specs: Vec<NSelector> =
            serde_yaml::from_str("[{name: n, category: x, matcher: [{sh: cat, glob: '*'}]}]").unwrap();
        let err = NamedNodeSelectors::compile(&specs, &Metrics::disabled()).unwrap_err();
        assert!(err.to_string().ends_with("matcher[0]: node(n): node[0]"));
    }
}
