//! Normalizer chains.
//!
//! Normalizers are tried in declared order and the first one that matches
//! decides the result. When none matches, the input is returned unchanged
//! as a single identity result with index `-1`, so normalization never
//! yields an empty set.

use serde::Serialize;

use super::NamedMatcher;
use crate::cache::Memoized;
use crate::config::{ConfigError, NamedMatcherSpec};
use crate::matcher::MatchError;
use crate::metrics::Metrics;

/// One normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResult {
    /// Index of the normalizer that produced the value, `-1` for identity
    pub index: i64,
    /// Name of the normalizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The normalized value
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
}

impl NormalizedResult {
    /// The result for input no normalizer matched.
    pub fn identity(src: &str) -> Self {
        Self {
            index: -1,
            name: None,
            result: src.to_string(),
        }
    }

    /// Returns `true` if no normalizer matched.
    pub const fn is_identity(&self) -> bool {
        self.index < 0
    }
}

/// Ordered normalizers, measured under `named-normalizer-<name>`.
#[derive(Debug, Default)]
pub struct NamedNormalizers {
    normalizers: Vec<(NamedMatcher, String)>,
    metrics: Metrics,
}

impl NamedNormalizers {
    /// Creates a list from compiled named matchers.
    pub fn new(normalizers: Vec<NamedMatcher>, metrics: Metrics) -> Self {
        let normalizers = normalizers
            .into_iter()
            .map(|m| {
                let key = format!("named-normalizer-{}", m.name());
                (m, key)
            })
            .collect();
        Self {
            normalizers,
            metrics,
        }
    }

    /// Compiles configured normalizers.
    pub fn compile(specs: &[NamedMatcherSpec], metrics: &Metrics) -> Result<Self, ConfigError> {
        let normalizers = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                NamedMatcher::compile(spec, metrics).map_err(|e| e.at(format!("normalizer[{i}]")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(normalizers, metrics.clone()))
    }

    /// Number of normalizers.
    pub fn len(&self) -> usize {
        self.normalizers.len()
    }

    /// Returns `true` if there are no normalizers.
    pub fn is_empty(&self) -> bool {
        self.normalizers.is_empty()
    }

    /// Normalizes `src`.
    ///
    /// Returns one result per output of the first matching normalizer, or
    /// the identity result. Only hard matcher errors are returned as `Err`.
    pub async fn normalize(&self, src: &str) -> Result<Vec<NormalizedResult>, MatchError> {
        for (index, (normalizer, key)) in self.normalizers.iter().enumerate() {
            match self.metrics.measure(key, normalizer.matches(src)).await {
                Ok(outputs) => {
                    let name = Some(normalizer.name().to_string()).filter(|x| !x.is_empty());
                    return Ok(outputs
                        .into_iter()
                        .map(|result| NormalizedResult {
                            index: i64::try_from(index).unwrap_or(i64::MAX),
                            name: name.clone(),
                            result,
                        })
                        .collect());
                }
                Err(e) if e.is_unmatched() => {}
                Err(e) => return Err(e.context(format!("normalizer[{index}]"))),
            }
        }
        Ok(vec![NormalizedResult::identity(src)])
    }

    /// Releases every normalizer's script handles.
    pub fn close(&mut self) {
        for (normalizer, _) in &mut self.normalizers {
            normalizer.close();
        }
    }
}

impl Memoized<NamedNormalizers, Vec<NormalizedResult>> {
    /// Like [`NamedNormalizers::normalize`], cached by input. Errors are
    /// not cached.
    pub async fn normalize(&self, src: &str) -> Result<Vec<NormalizedResult>, MatchError> {
        self.cache().try_get_or_compute(src.to_string(), || self.inner().normalize(src)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherSpec;
    use crate::metrics::MetricsCollector;

    fn normalizers(yaml: &str, metrics: &Metrics) -> NamedNormalizers {
        let specs: Vec<NamedMatcherSpec> = serde_yaml::from_str(yaml).unwrap();
        NamedNormalizers::compile(&specs, metrics).unwrap()
    }

    #[tokio::test]
    async fn test_empty_list_is_identity() {
        let n = NamedNormalizers::default();
        let got = n.normalize("in").await.unwrap();
        assert_eq!(got, vec![NormalizedResult::identity("in")]);
        assert_eq!(serde_json::to_string(&got[0]).unwrap(), r#"{"index":-1,"result":"in"}"#);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let n = normalizers(
            r#"
- name: first
  matcher: [{r: "^sh$", val: [bash]}]
- name: second
  matcher: [{r: "sh", val: [other]}]
"#,
            &Metrics::disabled(),
        );
        let got = n.normalize("sh").await.unwrap();
        assert_eq!(
            got,
            vec![NormalizedResult {
                index: 0,
                name: Some("first".to_string()),
                result: "bash".to_string(),
            }]
        );

        let got = n.normalize("zsh").await.unwrap();
        assert_eq!(got[0].index, 1);
        assert_eq!(got[0].result, "other");

        let got = n.normalize("go").await.unwrap();
        assert!(got[0].is_identity());
        assert_eq!(got[0].result, "go");
    }

    #[tokio::test]
    async fn test_multiple_outputs_and_unnamed() {
        let n = normalizers("[{matcher: [{val: [a, b]}]}]", &Metrics::disabled());
        let got = n.normalize("x").await.unwrap();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|r| r.index == 0 && r.name.is_none()));
        assert_eq!(serde_json::to_string(&got[1]).unwrap(), r#"{"index":0,"result":"b"}"#);
    }

    #[tokio::test]
    async fn test_hard_error_propagates() {
        let specs = vec![NamedMatcherSpec {
            name: "bad".to_string(),
            matcher: vec![MatcherSpec::lua("function f(s) return nil end", "f")],
        }];
        let n = NamedNormalizers::compile(&specs, &Metrics::disabled()).unwrap();
        let err = n.normalize("x").await.unwrap_err();
        assert!(!err.is_unmatched());
        assert!(err.to_string().starts_with("normalizer[0]"));
    }

    #[tokio::test]
    async fn test_metrics_keys() {
        let collector = MetricsCollector::spawn();
        let n = normalizers("[{name: a b, matcher: [{r: '^x$'}]}]", &collector.handle());
        n.normalize("x").await.unwrap();
        n.normalize("y").await.unwrap();

        let snapshot = collector.close().await;
        assert_eq!(snapshot.get("named-normalizer-a_b-call").unwrap().count, 2);
        assert_eq!(snapshot.get("named-normalizer-a_b-success").unwrap().count, 1);
        assert_eq!(snapshot.get("named-matcher-a_b-error").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_memoized_normalize() {
        let memo = Memoized::new(normalizers("[{name: n, matcher: [{r: '^sh$', val: [bash]}]}]", &Metrics::disabled()));
        let first = memo.normalize("sh").await.unwrap();
        assert_eq!(memo.normalize("sh").await.unwrap(), first);
        memo.normalize("go").await.unwrap();
        assert_eq!(memo.cache().len(), 2);
    }
}
