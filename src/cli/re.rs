//! Try a regular expression against stdin.
//!
//! Every line with at least one match is printed as a JSON object. Without
//! a template, `matches` lists the capture groups of every match (group 0
//! first, unmatched groups empty); with a template it is the concatenated
//! expansion over all matches, exactly what a `r` + `tmpl` matcher emits.

use anyhow::Result;
use clap::Args;
use regex::Regex;
use serde::Serialize;
use std::io::{BufRead, BufReader, BufWriter, Write};
use tokio_util::sync::CancellationToken;

use crate::config::Regexp;
use crate::core::GrdepError;
use crate::walk::read_lines;

/// Arguments of `grdep re`.
#[derive(Args, Debug)]
pub struct ReCommand {
    /// Regular expression to test
    #[arg(value_name = "REGEX")]
    regex: String,

    /// Template expanded for every match, e.g. `$name`
    #[arg(value_name = "TEMPLATE")]
    template: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Matches {
    Groups(Vec<Vec<String>>),
    Expanded(String),
}

#[derive(Debug, Serialize)]
struct Matched<'a> {
    linum: usize,
    text: &'a str,
    matches: Matches,
}

impl ReCommand {
    /// Reads stdin and prints matches to stdout.
    pub async fn execute(self, cancel: &CancellationToken) -> Result<()> {
        let input = BufReader::new(std::io::stdin());
        let mut out = BufWriter::new(std::io::stdout());
        self.execute_with(input, &mut out, cancel).await
    }

    /// Runs against explicit input and output streams.
    pub async fn execute_with<R, W>(
        self,
        input: R,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let regex: Regexp = self.regex.parse()?;
        let mut lines = read_lines(input, cancel.clone());

        while let Some(line) = lines.recv().await {
            if let Some(err) = line.err {
                return Err(GrdepError::from_stream(format!("stdin line {}", line.linum), err).into());
            }
            let Some(matches) = self.find(regex.as_regex(), &line.text) else {
                continue;
            };
            serde_json::to_writer(
                &mut *out,
                &Matched {
                    linum: line.linum,
                    text: &line.text,
                    matches,
                },
            )?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    fn find(&self, regex: &Regex, text: &str) -> Option<Matches> {
        let mut captures = regex.captures_iter(text).peekable();
        captures.peek()?;

        Some(match &self.template {
            Some(template) => {
                let mut expanded = String::new();
                for caps in captures {
                    caps.expand(template, &mut expanded);
                }
                Matches::Expanded(expanded)
            }
            None => Matches::Groups(
                captures
                    .map(|caps| {
                        caps.iter()
                            .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
                            .collect()
                    })
                    .collect(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn run(regex: &str, template: Option<&str>, input: &str) -> Result<String> {
        let command = ReCommand {
            regex: regex.to_string(),
            template: template.map(ToString::to_string),
        };
        let mut out = Vec::new();
        command.execute_with(Cursor::new(input.to_string()), &mut out, &CancellationToken::new()).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_groups() {
        let out = run(r"/bin/(\w+)(x)?", None, "#!/bin/bash\nnone\n/bin/a /bin/b\n").await.unwrap();
        assert_eq!(
            out,
            concat!(
                r##"{"linum":1,"text":"#!/bin/bash","matches":[["/bin/bash","bash",""]]}"##,
                "\n",
                r#"{"linum":3,"text":"/bin/a /bin/b","matches":[["/bin/a","a",""],["/bin/b","b",""]]}"#,
                "\n"
            )
        );
    }

    #[tokio::test]
    async fn test_template() {
        let out = run(r"(?P<k>\w)(?P<v>\d)", Some("$k"), "a1 b2 c3\n").await.unwrap();
        assert_eq!(out, "{\"linum\":1,\"text\":\"a1 b2 c3\",\"matches\":\"abc\"}\n");
    }

    #[tokio::test]
    async fn test_invalid_regex() {
        let err = run("(", None, "x\n").await.unwrap_err();
        assert!(err.downcast_ref::<crate::config::ConfigError>().is_some());
    }
}
