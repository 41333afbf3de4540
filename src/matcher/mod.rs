//! The rule-matching engine.
//!
//! A [`Matcher`] is one primitive pattern-matching operation: a pure
//! function from an input string to a list of candidate strings, or
//! "unmatched". A [`MatcherChain`] threads a working set of candidates
//! through an ordered list of matchers.
//!
//! # Matcher kinds
//!
//! | Kind       | Config         | Output on success                                  |
//! |------------|----------------|----------------------------------------------------|
//! | `regex`    | `r`            | every match as the final stage, else the input     |
//! | `regex`    | `r` + `val`    | the constant list                                  |
//! | `not`      | `not` (+`val`) | the input unchanged (or the constant list)         |
//! | `template` | `r` + `tmpl`   | concatenated template expansion of all matches     |
//! | `value`    | `val`          | the constant list, regardless of input             |
//! | `sh`       | `sh`           | stdout lines of the script fed the input on stdin  |
//! | `glob`     | `glob`         | the input unchanged                                |
//! | `lua`      | `lua`          | lines of the string returned by the entry point    |
//!
//! Blank outputs are dropped after every primitive match; a match whose
//! outputs are all blank counts as unmatched.
//!
//! # Chain semantics
//!
//! The working set starts as `{input}`. Each stage is applied to every
//! member of the working set and the successful outputs are concatenated
//! into the next working set. The chain fails at the first stage that
//! leaves the working set empty. A chain with no stages never matches.
//!
//! A plain regex without `val` is position dependent. It emits every
//! non-overlapping match only as the final stage of a chain, or when
//! applied on its own through [`Matcher::matches`]. Earlier in a chain it
//! gates: the candidate passes through unchanged when the pattern matches
//! anywhere in it.
//!
//! ```rust
//! use grdep::config::MatcherSpec;
//! use grdep::matcher::MatcherChain;
//! use grdep::metrics::Metrics;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let chain = MatcherChain::compile(
//!     &[MatcherSpec::regex("bin")?, MatcherSpec::regex("/bin/[^,]+")?],
//!     &Metrics::disabled(),
//! )?;
//! assert_eq!(chain.matches("/bin/a,/bin/b").await?, vec!["/bin/a", "/bin/b"]);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod lua;
pub mod shell;

pub use error::{MatchError, MatchResult};
pub use lua::{LuaScript, LuaSource};
pub use shell::{SHELL_TIMEOUT, ShellScript};

use regex::Regex;
use tracing::debug;

use crate::config::{ConfigError, MatcherSpec};
use crate::metrics::Metrics;
use crate::pattern::PatternMatcher;

/// A single compiled pattern-matching operation.
#[derive(Debug)]
pub enum Matcher {
    /// Emits every non-overlapping match, or `values` when non-empty.
    /// Before the final stage of a chain, a regex without `values` passes
    /// matching input through unchanged instead.
    Regex {
        /// Pattern searched anywhere in the input
        regex: Regex,
        /// Constant output replacing the raw matches
        values: Vec<String>,
    },
    /// Passes the input through (or emits `values`) when the pattern does
    /// not match.
    NotRegex {
        /// Pattern that must not match
        regex: Regex,
        /// Constant output replacing the input
        values: Vec<String>,
    },
    /// Expands `template` for every match and concatenates the results.
    Template {
        /// Pattern providing the capture groups
        regex: Regex,
        /// `$name` / `${name}` / `$1` template
        template: String,
    },
    /// Always emits `values`.
    Value {
        /// Constant output
        values: Vec<String>,
    },
    /// External script filter.
    Shell(ShellScript),
    /// Shell-glob filter.
    Glob(PatternMatcher),
    /// Embedded Lua filter.
    Lua(LuaScript),
}

impl Matcher {
    /// Compiles a validated configuration entry.
    ///
    /// When an entry enables more than one signal, the kind is picked in
    /// the order lua, sh, glob, not, template, regex, value.
    pub fn from_spec(spec: &MatcherSpec) -> Result<Self, ConfigError> {
        if let Some(lua) = &spec.lua {
            let script = match (&lua.src, &lua.file) {
                (Some(src), _) => LuaScript::inline(src.clone(), lua.entry.clone()),
                (None, Some(file)) => {
                    let path = shellexpand::full(file).map_err(|e| ConfigError::InvalidMatcher {
                        reason: format!("cannot expand lua file path {file}: {e}"),
                    })?;
                    LuaScript::from_file(path.into_owned(), lua.entry.clone())
                }
                (None, None) => {
                    return Err(ConfigError::InvalidMatcher {
                        reason: "lua requires src or file".to_string(),
                    });
                }
            };
            return Ok(Self::Lua(script));
        }
        if let Some(body) = &spec.shell {
            return Ok(Self::Shell(ShellScript::new(body.clone())));
        }
        if let Some(glob) = &spec.glob {
            let pattern = PatternMatcher::new(glob).map_err(|e| ConfigError::InvalidPattern {
                pattern: glob.clone(),
                reason: format!("{e:#}"),
            })?;
            return Ok(Self::Glob(pattern));
        }
        if let Some(not) = &spec.not {
            return Ok(Self::NotRegex {
                regex: not.as_regex().clone(),
                values: spec.value.clone(),
            });
        }
        match (&spec.regex, &spec.template) {
            (Some(regex), Some(template)) => Ok(Self::Template {
                regex: regex.as_regex().clone(),
                template: template.clone(),
            }),
            (Some(regex), None) => Ok(Self::Regex {
                regex: regex.as_regex().clone(),
                values: spec.value.clone(),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidMatcher {
                reason: "tmpl requires r".to_string(),
            }),
            (None, None) if !spec.value.is_empty() => Ok(Self::Value {
                values: spec.value.clone(),
            }),
            (None, None) => Err(ConfigError::InvalidMatcher {
                reason: "empty matcher".to_string(),
            }),
        }
    }

    /// Short name of the matcher kind, used in metric keys and logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Regex {
                ..
            } => "regex",
            Self::NotRegex {
                ..
            } => "not",
            Self::Template {
                ..
            } => "template",
            Self::Value {
                ..
            } => "value",
            Self::Shell(_) => "sh",
            Self::Glob(_) => "glob",
            Self::Lua(_) => "lua",
        }
    }

    const fn metric_key(&self) -> &'static str {
        match self {
            Self::Regex {
                ..
            } => "matcher-regex",
            Self::NotRegex {
                ..
            } => "matcher-not",
            Self::Template {
                ..
            } => "matcher-template",
            Self::Value {
                ..
            } => "matcher-value",
            Self::Shell(_) => "matcher-sh",
            Self::Glob(_) => "matcher-glob",
            Self::Lua(_) => "matcher-lua",
        }
    }

    /// Applies the matcher to `src` as a final stage, dropping blank
    /// outputs. A plain regex therefore finds all matches here.
    pub async fn matches(&self, src: &str) -> MatchResult {
        self.apply(src, true).await
    }

    /// Applies the matcher as a non-final chain stage.
    async fn gate(&self, src: &str) -> MatchResult {
        self.apply(src, false).await
    }

    async fn apply(&self, src: &str, last: bool) -> MatchResult {
        let mut outputs = match self {
            Self::Regex {
                regex,
                values,
            } if !last && values.is_empty() => {
                if regex.is_match(src) {
                    vec![src.to_string()]
                } else {
                    return Err(MatchError::unmatched("regex"));
                }
            }
            _ => self.match_raw(src).await?,
        };
        outputs.retain(|x| !x.trim().is_empty());
        if outputs.is_empty() {
            return Err(MatchError::unmatched(format!("{} produced only blank output", self.kind())));
        }
        Ok(outputs)
    }

    async fn match_raw(&self, src: &str) -> MatchResult {
        match self {
            Self::Regex {
                regex,
                values,
            } => {
                let found: Vec<String> =
                    regex.find_iter(src).map(|m| m.as_str().to_string()).collect();
                if found.is_empty() {
                    Err(MatchError::unmatched("regex"))
                } else if values.is_empty() {
                    Ok(found)
                } else {
                    Ok(values.clone())
                }
            }
            Self::NotRegex {
                regex,
                values,
            } => {
                if regex.is_match(src) {
                    Err(MatchError::unmatched("not"))
                } else if values.is_empty() {
                    Ok(vec![src.to_string()])
                } else {
                    Ok(values.clone())
                }
            }
            Self::Template {
                regex,
                template,
            } => {
                let mut expanded = String::new();
                for caps in regex.captures_iter(src) {
                    caps.expand(template, &mut expanded);
                }
                if expanded.is_empty() {
                    Err(MatchError::unmatched("template"))
                } else {
                    Ok(vec![expanded])
                }
            }
            Self::Value {
                values,
            } => Ok(values.clone()),
            Self::Shell(script) => script.run(src).await,
            Self::Glob(pattern) => {
                if pattern.matches_str(src) {
                    Ok(vec![src.to_string()])
                } else {
                    Err(MatchError::unmatched("glob"))
                }
            }
            Self::Lua(script) => script.run(src).await,
        }
    }

    /// Releases any script file or interpreter held by this matcher.
    pub fn close(&mut self) {
        match self {
            Self::Shell(script) => script.close(),
            Self::Lua(script) => script.close(),
            _ => {}
        }
    }
}

/// Ordered list of matchers applied in sequence.
///
/// The chain is immutable once built, apart from the lazily created
/// script handles of `sh` and `lua` stages. Those are released by
/// [`MatcherChain::close`] or when the chain is dropped.
#[derive(Debug)]
pub struct MatcherChain {
    stages: Vec<Matcher>,
    metrics: Metrics,
}

impl MatcherChain {
    /// Creates a chain from already compiled stages.
    pub const fn new(stages: Vec<Matcher>, metrics: Metrics) -> Self {
        Self {
            stages,
            metrics,
        }
    }

    /// Creates a chain that never matches.
    pub const fn empty() -> Self {
        Self::new(Vec::new(), Metrics::disabled())
    }

    /// Validates and compiles a list of configuration entries.
    ///
    /// Errors are annotated with the index of the offending entry.
    pub fn compile(specs: &[MatcherSpec], metrics: &Metrics) -> Result<Self, ConfigError> {
        let stages = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                spec.validate()
                    .and_then(|()| Matcher::from_spec(spec))
                    .map_err(|e| e.at(format!("matcher[{i}]")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(stages, metrics.clone()))
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages and therefore never matches.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Threads `src` through every stage.
    ///
    /// An unmatched candidate only drops that candidate; a hard error from
    /// any stage aborts the chain.
    pub async fn matches(&self, src: &str) -> MatchResult {
        if self.stages.is_empty() {
            return Err(MatchError::unmatched("empty matcher chain"));
        }

        let last = self.stages.len() - 1;
        let mut current = vec![src.to_string()];
        for (index, stage) in self.stages.iter().enumerate() {
            let mut next = Vec::new();
            for candidate in &current {
                let result = if index == last {
                    self.metrics.measure(stage.metric_key(), stage.matches(candidate)).await
                } else {
                    self.metrics.measure(stage.metric_key(), stage.gate(candidate)).await
                };
                debug!(
                    target: "matcher",
                    "stage {} ({}) src={:?} ret={:?}",
                    index,
                    stage.kind(),
                    candidate,
                    result
                );
                match result {
                    Ok(outputs) => next.extend(outputs),
                    Err(e) if e.is_unmatched() => {}
                    Err(e) => return Err(e.context(format!("matcher chain[{index}]"))),
                }
            }
            if next.is_empty() {
                return Err(MatchError::unmatched(format!("matcher chain[{index}]")));
            }
            current = next;
        }

        current.retain(|x| !x.trim().is_empty());
        if current.is_empty() {
            return Err(MatchError::unmatched("matcher chain"));
        }
        Ok(current)
    }

    /// Releases every script handle held by the chain's stages.
    pub fn close(&mut self) {
        for stage in &mut self.stages {
            stage.close();
        }
    }
}
