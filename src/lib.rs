//! grdep - find dependencies by grep
//!
//! grdep walks file trees and extracts a dependency graph from them with
//! nothing but configurable text matching: every file is assigned one or
//! more *categories* (from its path or its content), and every line of the
//! file is searched for *nodes* (dependencies) by rules gated on the
//! category. Both are then rewritten by *normalizers*. The result is one
//! JSON record per (file line, category, node), ready to be fed to graph
//! tooling.
//!
//! # Architecture Overview
//!
//! ```text
//! stdin roots ─▶ Walker ─▶ CategorySelectors ─▶ Normalizers ─▶ NodeSelectors ─▶ Normalizers ─▶ stdout
//!                  ▲              │                                   │
//!                  └ ignore chain └────────── MatcherChain ───────────┘
//! ```
//!
//! Every rule is a [`matcher::MatcherChain`]: an ordered list of primitive
//! matchers (regex, negated regex, template, constant values, glob, bash
//! script, embedded Lua) where each stage consumes the outputs of the
//! previous one.
//!
//! # Core Modules
//!
//! - [`config`] - Configuration model, parsing (YAML/JSON/TOML), merging and validation
//! - [`matcher`] - Primitive matchers and chains
//! - [`selector`] - Category rules, node rules and normalizers
//! - [`walk`] - Tree walking and line streaming with cancellation
//! - [`pipeline`] - The scan orchestrator and its output records
//! - [`cache`] - Concurrent memoization of selector and normalizer results
//! - [`metrics`] - Per-component call counts and durations
//! - [`pattern`] - Glob matching used by the `glob` matcher
//! - [`core`] - Error types and user-facing error reporting
//! - [`cli`] - The `grdep` command line
//!
//! # Configuration
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
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use grdep::config::load_configs;
//! use grdep::metrics::Metrics;
//! use grdep::pipeline::Pipeline;
//! use std::io::Cursor;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_configs(&["grdep.yml".to_string()])?;
//! let pipeline = Pipeline::build(&config, &Metrics::disabled())?;
//! let mut out = Vec::new();
//! let summary = pipeline
//!     .run(Cursor::new("src\n"), &mut out, &CancellationToken::new())
//!     .await?;
//! println!("{} records", summary.records);
//! pipeline.close();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod matcher;
pub mod metrics;
pub mod pattern;
pub mod pipeline;
pub mod selector;
pub mod walk;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
