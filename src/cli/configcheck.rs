//! Validate configurations and print the merged result.

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{Config, load_configs};
use crate::metrics::Metrics;
use crate::pipeline::Pipeline;

/// Arguments of `grdep configcheck`.
#[derive(Args, Debug)]
pub struct ConfigCheckCommand {
    /// Configuration files or inline configuration text, merged in order
    #[arg(value_name = "FILE_OR_TEXT", required = true)]
    configs: Vec<String>,

    /// Print as JSON instead of YAML
    #[arg(long)]
    json: bool,
}

impl ConfigCheckCommand {
    /// Prints the merged configuration to stdout.
    pub fn execute(self, metrics: &Metrics) -> Result<()> {
        print!("{}", self.render(metrics)?);
        Ok(())
    }

    /// Loads, merges and compiles the configurations, returning the merged
    /// configuration as text.
    pub fn render(&self, metrics: &Metrics) -> Result<String> {
        let config = load_configs(&self.configs).context("failed to load configuration")?;
        // patterns and scripts only fail once compiled
        Pipeline::build(&config, metrics).context("failed to compile configuration")?.close();
        render(&config, self.json)
    }
}

fn render(config: &Config, json: bool) -> Result<String> {
    if json {
        let mut text = serde_json::to_string(config).context("failed to encode configuration")?;
        text.push('\n');
        Ok(text)
    } else {
        serde_yaml::to_string(config).context("failed to encode configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(configs: &[&str], json: bool) -> ConfigCheckCommand {
        ConfigCheckCommand {
            configs: configs.iter().map(ToString::to_string).collect(),
            json,
        }
    }

    #[test]
    fn test_render_json_merges_in_order() {
        let text = command(
            &[
                "category: [{name: a, filename: [{val: [x]}]}]",
                r#"{"category": [{"name": "b", "text": [{"r": "^#!"}]}]}"#,
            ],
            true,
        )
        .render(&Metrics::disabled())
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["category"][0]["name"], "a");
        assert_eq!(value["category"][1]["name"], "b");
        assert_eq!(value["category"][1]["text"][0]["r"], "^#!");
    }

    #[test]
    fn test_render_yaml_parses_back() {
        let text = command(&["node: [{name: n, category: go, matcher: [{r: import}]}]"], false)
            .render(&Metrics::disabled())
            .unwrap();
        let config: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(config.node.len(), 1);
        assert_eq!(config.node[0].category.as_str(), "go");
    }

    #[test]
    fn test_invalid_config_names_source() {
        let err = command(&["{}", "category: [{name: x, filename: [{r: '('}]}]"], false)
            .render(&Metrics::disabled())
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("config[1]"), "{message}");
    }
}
