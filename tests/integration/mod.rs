//! Integration test suite for grdep
//!
//! End-to-end tests that run the `grdep` binary against temporary file
//! trees.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **run**: Record output, category-only mode, ignore pruning, failures
//! - **configcheck**: Merging, output formats and validation errors
//! - **re**: Regular expression and template debugging
//! - **skeleton**: The generated configuration is valid and runnable

mod configcheck;
mod re;
mod run;
mod skeleton;

use assert_cmd::Command;
use grdep::test_utils::ConfigFixture;
use std::path::PathBuf;
use tempfile::TempDir;

/// The `grdep` binary under test, with `RUST_LOG` cleared.
pub fn grdep() -> Command {
    let mut cmd = Command::cargo_bin("grdep").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Parses JSON lines.
pub fn records(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Writes `fixture` outside of any walked tree.
pub fn config_file(fixture: &ConfigFixture) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = fixture.write_to(dir.path()).unwrap();
    (dir, path)
}
