//! Configuration parsing.
//!
//! Every source argument is either a path to a configuration file or the
//! configuration text itself. A source that cannot be read as a file is
//! parsed as text.
//!
//! Text is tried as YAML, then JSON, then TOML; the first format that
//! deserializes wins. When all fail, the error lists each parser's message:
//!
//! ```text
//! failed to parse config: yaml: invalid type: string "src", expected struct Config;
//!   json: expected value at line 1 column 1; toml: expected `.`, `=`
//! ```
//!
//! # Examples
//!
//! ```rust
//! use grdep::config::load_configs;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = load_configs(&[
//!     r#"{"category": [{"name": "go", "filename": [{"r": "\\.go$", "val": ["go"]}]}]}"#.to_string(),
//!     "category: [{name: sh, filename: [{glob: '**/*.sh'}]}]".to_string(),
//! ])?;
//! assert_eq!(config.category.len(), 2);
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use std::path::Path;

use super::{Config, ConfigError};

/// Deserializes `text` as YAML, JSON or TOML, in that order.
pub fn parse_document<T>(text: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let yaml_err = match serde_yaml::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    let json_err = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    let toml_err = match toml::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    Err(ConfigError::Parse {
        reason: format!(
            "yaml: {yaml_err}; json: {json_err}; toml: {}",
            toml_err.message().trim()
        ),
    })
}

/// Parses and validates configuration text.
pub fn parse_config_text(text: &str) -> Result<Config, ConfigError> {
    let config: Config = parse_document(text)?;
    config.validate()?;
    Ok(config)
}

/// Parses and validates one source, a file path or inline text.
pub fn parse_config(file_or_text: &str) -> Result<Config, ConfigError> {
    let path = Path::new(file_or_text);
    if path.is_file() {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        tracing::debug!(target: "config", "parsing config file {}", path.display());
        return parse_config_text(&content).map_err(|e| e.at(path.display()));
    }
    tracing::debug!(target: "config", "parsing inline config");
    parse_config_text(file_or_text)
}

/// Parses every source and merges them in order.
pub fn load_configs(sources: &[String]) -> Result<Config, ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::NoConfig);
    }
    sources.iter().enumerate().try_fold(Config::default(), |acc, (i, source)| {
        let config = parse_config(source).map_err(|e| e.at(format!("config[{i}]")))?;
        Ok(acc.merge(config))
    })
}
