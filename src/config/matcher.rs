//! Matcher entries as written in configuration files.
//!
//! A [`MatcherSpec`] is the serialized form of one chain stage. Its fields
//! are independent optionals on disk; [`MatcherSpec::validate`] enforces
//! which combinations are legal before the entry is compiled into a
//! [`crate::matcher::Matcher`].
//!
//! | Fields         | Meaning                                   |
//! |----------------|-------------------------------------------|
//! | `r`            | all matches of the regex                  |
//! | `r`, `val`     | constant list when the regex matches      |
//! | `r`, `tmpl`    | template expansion of all matches         |
//! | `not`          | input when the regex does not match       |
//! | `not`, `val`   | constant list when the regex does not match |
//! | `sh`           | shell script filter                       |
//! | `glob`         | glob filter                               |
//! | `lua`          | embedded Lua filter                       |
//! | `val`          | constant list                             |

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::core::ConfigError;

/// A regular expression that serializes as its source string.
///
/// Patterns are compiled while deserializing, so a malformed pattern is a
/// parse error of the enclosing document.
#[derive(Clone)]
pub struct Regexp(Regex);

impl Regexp {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Regex::new(pattern).map(Self).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
    }

    /// The compiled expression.
    pub const fn as_regex(&self) -> &Regex {
        &self.0
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Regexp({:?})", self.as_str())
    }
}

impl fmt::Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Regexp {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl FromStr for Regexp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Regexp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Regexp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Self::new(&pattern).map_err(serde::de::Error::custom)
    }
}

/// Embedded Lua script settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LuaSpec {
    /// Inline source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Script file; `~` and `$VAR` are expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Name of the global function called for every candidate
    #[serde(default)]
    pub entry: String,
}

impl LuaSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.trim().is_empty() {
            return Err(ConfigError::invalid_matcher("lua requires entry"));
        }
        match (&self.src, &self.file) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(ConfigError::invalid_matcher("lua requires exactly one of src or file")),
        }
    }
}

/// One stage of a matcher chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherSpec {
    /// Regular expression
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<Regexp>,
    /// Negated regular expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Regexp>,
    /// Shell script body
    #[serde(rename = "sh", default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Shell glob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    /// Embedded Lua script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lua: Option<LuaSpec>,
    /// Expansion template for `r`
    #[serde(rename = "tmpl", default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Constant output
    #[serde(rename = "val", default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
}

impl MatcherSpec {
    /// A plain regex entry.
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            regex: Some(Regexp::new(pattern)?),
            ..Self::default()
        })
    }

    /// A negated regex entry.
    pub fn not(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            not: Some(Regexp::new(pattern)?),
            ..Self::default()
        })
    }

    /// A shell script entry.
    pub fn shell(body: impl Into<String>) -> Self {
        Self {
            shell: Some(body.into()),
            ..Self::default()
        }
    }

    /// A glob entry.
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            glob: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// An inline Lua entry.
    pub fn lua(src: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            lua: Some(LuaSpec {
                src: Some(src.into()),
                file: None,
                entry: entry.into(),
            }),
            ..Self::default()
        }
    }

    /// A constant value entry.
    pub fn value<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_value(values)
    }

    /// Sets the constant output list.
    #[must_use]
    pub fn with_value<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the expansion template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Checks that the entry uses a legal combination of fields.
    ///
    /// Exactly one of `r`, `not`, `sh`, `glob`, `lua` may be set, or `val`
    /// alone. `tmpl` requires `r`; `val` may accompany `r` or `not`; `tmpl`
    /// and `val` exclude each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("sh", &self.shell), ("glob", &self.glob), ("tmpl", &self.template)] {
            if value.as_deref().is_some_and(|x| x.trim().is_empty()) {
                return Err(ConfigError::invalid_matcher(format!("{key} must not be empty")));
            }
        }

        let primaries = [
            self.regex.is_some(),
            self.not.is_some(),
            self.shell.is_some(),
            self.glob.is_some(),
            self.lua.is_some(),
        ]
        .into_iter()
        .filter(|x| *x)
        .count();
        let has_template = self.template.is_some();
        let has_value = !self.value.is_empty();

        match primaries {
            0 if has_template => Err(ConfigError::invalid_matcher("tmpl requires r")),
            0 if has_value => Ok(()),
            0 => Err(ConfigError::invalid_matcher("empty matcher")),
            1 => {
                if has_template && self.regex.is_none() {
                    return Err(ConfigError::invalid_matcher("tmpl requires r"));
                }
                if has_template && has_value {
                    return Err(ConfigError::invalid_matcher("tmpl and val cannot be combined"));
                }
                if has_value && self.regex.is_none() && self.not.is_none() {
                    return Err(ConfigError::invalid_matcher("val can only accompany r or not"));
                }
                if let Some(lua) = &self.lua {
                    lua.validate()?;
                }
                Ok(())
            }
            _ => Err(ConfigError::invalid_matcher(
                "only one of r, not, sh, glob, lua can be specified",
            )),
        }
    }
}

/// Validates every entry of a chain, annotating errors with the index.
pub fn validate_chain(specs: &[MatcherSpec]) -> Result<(), ConfigError> {
    for (i, spec) in specs.iter().enumerate() {
        spec.validate().map_err(|e| e.at(format!("matcher[{i}]")))?;
    }
    Ok(())
}
