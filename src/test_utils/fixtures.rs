//! Test fixtures for configurations and file trees.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A named configuration text.
#[derive(Clone, Debug)]
pub struct ConfigFixture {
    pub name: String,
    pub content: String,
}

impl ConfigFixture {
    /// Shell projects: categories from extension and shebang, `source`
    /// nodes, `sh` normalized to `bash`, `.sh` stripped from nodes.
    pub fn shell() -> Self {
        Self {
            name: "shell".to_string(),
            content: r#"
ignore:
  - r: "/(\\.git|vendor)$"
category:
  - name: ext
    filename:
      - r: "\\.(?P<ext>\\w+)$"
        tmpl: "$ext"
  - name: shebang
    text:
      - r: "^#!/bin/(?P<sh>\\w+)$"
        tmpl: "$sh"
node:
  - name: source
    category: "^bash$"
    matcher:
      - r: "^\\. (?P<v>.+)$"
        tmpl: "$v"
normalizer:
  category:
    - name: sh to bash
      matcher:
        - r: "^sh$"
          val: [bash]
  node:
    - name: strip extension
      matcher:
        - r: "^(?P<v>.+)\\.sh$"
          tmpl: "$v"
"#
            .trim()
            .to_string(),
        }
    }

    /// A matcher combining `tmpl` without `r`.
    pub fn invalid_matcher() -> Self {
        Self {
            name: "invalid_matcher".to_string(),
            content: "category: [{name: broken, filename: [{tmpl: \"$x\"}]}]".to_string(),
        }
    }

    /// Text no supported format accepts.
    pub fn unparseable() -> Self {
        Self {
            name: "unparseable".to_string(),
            content: "category: [ {".to_string(),
        }
    }

    /// Writes the configuration to `<dir>/<name>.yml`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.yml", self.name));
        fs::write(&path, &self.content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(path)
    }
}

/// A temporary file tree removed on drop.
#[derive(Debug)]
pub struct TreeFixture {
    dir: TempDir,
}

impl TreeFixture {
    /// Creates an empty tree.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    /// A small shell project:
    ///
    /// ```text
    /// run.sh          sources lib.sh and util.sh
    /// lib.sh          sources util.sh
    /// bin/tool        bash shebang, sources run.sh
    /// vendor/x.sh     sources hidden.sh (ignored by ConfigFixture::shell)
    /// README.md
    /// ```
    pub fn shell_project() -> Result<Self> {
        let tree = Self::new()?;
        tree.file("run.sh", "#!/bin/sh\n. lib.sh\n. util.sh\necho run\n")?;
        tree.file("lib.sh", ". util.sh\n")?;
        tree.file("bin/tool", "#!/bin/bash\n. run.sh\n")?;
        tree.file("vendor/x.sh", ". hidden.sh\n")?;
        tree.file("README.md", "# project\n")?;
        Ok(tree)
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir: {}", parent.display()))?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;
        Ok(path)
    }

    /// Root of the tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The tree root as one line of `run` input.
    pub fn root_line(&self) -> String {
        format!("{}\n", self.path().display())
    }
}
