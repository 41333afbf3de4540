//! Configuration model, parsing and validation.
//!
//! A configuration describes the whole pipeline:
//!
//! 1. `ignore` - a matcher chain run against every walked path; matching
//!    directories are pruned, matching files skipped
//! 2. `category` - rules classifying a file by its path or its content
//! 3. `normalizer.category` - rewrites category labels
//! 4. `node` - rules extracting dependency nodes from lines of files in a
//!    matching category
//! 5. `normalizer.node` - rewrites node values
//!
//! Several configuration sources may be given; they are merged by
//! concatenating each list, in argument order. Merging is associative and
//! [`Config::default`] is its identity.
//!
//! # Format
//!
//! Sources may be YAML, JSON or TOML and may be given either as a file path
//! or as inline text (see [`parse_config`]):
//!
//! ```yaml
//! ignore:
//!   - r: "/\\.git$"
//! category:
//!   - name: shell
//!     filename:
//!       - r: "\\.sh$"
//!         val: [bash]
//! node:
//!   - name: source
//!     category: "^bash$"
//!     matcher:
//!       - r: "^\\. (?P<v>.+)$"
//!         tmpl: "$v"
//! normalizer:
//!   node:
//!     - name: basename
//!       matcher:
//!         - r: "(?P<b>[^/]+)$"
//!           tmpl: "$b"
//! ```

mod matcher;
mod parser;

pub use crate::core::ConfigError;
pub use matcher::{LuaSpec, MatcherSpec, Regexp, validate_chain};
pub use parser::{load_configs, parse_config, parse_config_text, parse_document};

use serde::{Deserialize, Serialize};

/// A complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Paths to skip while walking
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<MatcherSpec>,
    /// Category rules
    #[serde(default)]
    pub category: Vec<CSelector>,
    /// Node rules
    #[serde(default)]
    pub node: Vec<NSelector>,
    /// Category and node normalizers
    #[serde(default, skip_serializing_if = "Normalizers::is_empty")]
    pub normalizer: Normalizers,
}

impl Config {
    /// Concatenates every list of `other` after the lists of `self`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.ignore.extend(other.ignore);
        self.category.extend(other.category);
        self.node.extend(other.node);
        self.normalizer.category.extend(other.normalizer.category);
        self.normalizer.node.extend(other.normalizer.node);
        self
    }

    /// Checks every rule and matcher entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chain(&self.ignore).map_err(|e| e.at("ignore"))?;
        for (i, selector) in self.category.iter().enumerate() {
            selector.validate().map_err(|e| e.at(format!("category[{i}]")))?;
        }
        for (i, selector) in self.node.iter().enumerate() {
            selector.validate().map_err(|e| e.at(format!("node[{i}]")))?;
        }
        self.normalizer.validate()
    }
}

/// Category rule. Exactly one of `filename` and `text` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CSelector {
    /// Rule name, reported in output records
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Chain run against the file path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filename: Vec<MatcherSpec>,
    /// Chain run against each line of the file until one matches
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<MatcherSpec>,
}

impl CSelector {
    /// Checks the mode and every chain entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.is_empty() == self.text.is_empty() {
            return Err(ConfigError::invalid_selector(format!(
                "category({}) should have only either filename or text",
                self.name
            )));
        }
        validate_chain(&self.filename)
            .and_then(|()| validate_chain(&self.text))
            .map_err(|e| e.at(format!("category({})", self.name)))
    }
}

/// Node rule, applied to lines of files whose category matches `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NSelector {
    /// Rule name, reported in output records
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Gate on the category label
    pub category: Regexp,
    /// Chain run against the line content
    #[serde(default)]
    pub matcher: Vec<MatcherSpec>,
}

impl NSelector {
    /// Checks every chain entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chain(&self.matcher).map_err(|e| e.at(format!("node({})", self.name)))
    }
}

/// A named chain, used for normalizers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedMatcherSpec {
    /// Normalizer name, reported in output records
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// The chain
    #[serde(default)]
    pub matcher: Vec<MatcherSpec>,
}

impl NamedMatcherSpec {
    /// Checks every chain entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chain(&self.matcher).map_err(|e| e.at(format!("normalizer({})", self.name)))
    }
}

/// Category and node normalizers, each tried in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Normalizers {
    /// Applied to category labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<NamedMatcherSpec>,
    /// Applied to node values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node: Vec<NamedMatcherSpec>,
}

impl Normalizers {
    /// Returns `true` if no normalizer is configured.
    pub fn is_empty(&self) -> bool {
        self.category.is_empty() && self.node.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, x) in self.category.iter().enumerate() {
            x.validate().map_err(|e| e.at(format!("category normalizer[{i}]")))?;
        }
        for (i, x) in self.node.iter().enumerate() {
            x.validate().map_err(|e| e.at(format!("node normalizer[{i}]")))?;
        }
        Ok(())
    }
}
