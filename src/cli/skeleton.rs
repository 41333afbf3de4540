//! Print a commented configuration to start from.

use anyhow::Result;
use clap::Args;

/// Arguments of `grdep skeleton`.
#[derive(Args, Debug)]
pub struct SkeletonCommand {}

impl SkeletonCommand {
    /// Prints [`SKELETON`] to stdout.
    pub fn execute(self) -> Result<()> {
        println!("{SKELETON}");
        Ok(())
    }
}

/// A runnable configuration covering every section.
pub const SKELETON: &str = r#"---
# Dependencies are found in the following order:
#
# 1. Skip directories and files matched by 'ignore'.
# 2. Determine the categories of each file with 'category'.
# 3. Normalize categories with 'normalizer.category'.
# 4. Find nodes (dependencies) on each line with 'node'.
# 5. Normalize nodes with 'normalizer.node'.
#
# A matcher is a list of entries applied in order, each one to the outputs
# of the previous one. An entry has one of
#
#   r:    regular expression, optionally with 'tmpl' or 'val'
#   not:  regular expression that must not match, optionally with 'val'
#   glob: shell glob
#   sh:   bash script, reads the input on stdin and prints the outputs
#   lua:  {src: "function f(s) return s end", entry: f} or {file: ..., entry: f}
#   val:  constant outputs
#
# 'tmpl' expands capture groups, e.g. "$name" or "${name}".
#
# Paths of files and directories to skip.
ignore:
  - r: "/\\.git$"
# Categories from the file path ('filename') or the first matching line ('text').
category:
  - name: shell script by extension
    filename:
      - r: "\\.sh$"
        val:
          - bash
          - sh
  - filename: # 'name' is optional
      # the extension is the category
      - r: "\\.(?P<ext>\\w+)$"
        tmpl: "$ext"
  - name: shell script by shebang
    text:
      - r: "^#!/bin/bash"
        val:
          - bash
# Nodes, looked for only in files whose category matches 'category'.
node:
  - name: bash source
    category: "^bash$"
    matcher:
      - r: "^\\. (?P<v>.+)$"
        tmpl: "$v"
  - name: binary
    category: ".*"
    matcher:
      - r: "/usr/bin/\\w+"
# The first matching normalizer rewrites the value; otherwise it is kept as is.
normalizer:
  category:
    - name: sh to bash
      matcher:
        - r: "^sh$"
          val:
            - bash
  node:
    - name: binary name
      matcher:
        - r: "^/usr/bin/(?P<v>\\w+)$"
          tmpl: "$v""#;
