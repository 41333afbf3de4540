//! Shell-glob matching for the `glob` matcher kind.
//!
//! A glob matcher is a filter: it passes a candidate through unchanged when
//! the candidate matches the configured pattern and reports "unmatched"
//! otherwise. Candidates are plain strings (usually paths produced by the
//! walker), so matching never touches the filesystem.
//!
//! # Pattern Syntax
//!
//! Patterns follow the `glob` crate:
//!
//! - `*` matches any sequence of characters within a single path component
//! - `**` matches any sequence of path components (recursive matching)
//! - `?` matches any single character
//! - `[abc]` matches any character in the set
//! - `[a-z]` matches any character in the range
//!
//! Brace alternatives (`{a,b}`) are not supported and match literally.
//!
//! # Examples
//!
//! ```rust
//! use grdep::pattern::PatternMatcher;
//!
//! # fn example() -> anyhow::Result<()> {
//! let matcher = PatternMatcher::new("**/vendor/**")?;
//! assert!(matcher.matches_str("src/vendor/lib/a.go"));
//! assert!(!matcher.matches_str("src/lib/a.go"));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::Path;

/// Compiled glob pattern.
///
/// `PatternMatcher` is immutable after construction and can be shared
/// between threads freely.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Pattern,
    original_pattern: String,
}

impl PatternMatcher {
    /// Creates a new pattern matcher from a glob pattern string.
    ///
    /// The pattern is compiled once during creation for efficient matching.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern contains invalid glob syntax, such as
    /// an unterminated character class.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use grdep::pattern::PatternMatcher;
    ///
    /// let matcher = PatternMatcher::new("*.md")?;
    /// let matcher = PatternMatcher::new("**/docs/*.md")?;
    /// let matcher = PatternMatcher::new("agent[0-9].md")?;
    /// assert!(PatternMatcher::new("[unclosed").is_err());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn new(pattern_str: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern_str)
            .with_context(|| format!("Invalid glob pattern: {pattern_str}"))?;

        Ok(Self {
            pattern,
            original_pattern: pattern_str.to_string(),
        })
    }

    /// Checks if a candidate string matches the compiled pattern.
    ///
    /// `*` and `?` do not cross `/`, so `src/*.rs` does not match
    /// `src/a/b.rs`; use `**` for that.
    pub fn matches_str(&self, candidate: &str) -> bool {
        self.pattern.matches_with(candidate, Self::options())
    }

    /// Checks if a path matches the compiled pattern.
    ///
    /// The path is converted lossily to a string before matching.
    pub fn matches(&self, path: &Path) -> bool {
        self.matches_str(&path.to_string_lossy())
    }

    /// Returns the original pattern string used to create this matcher.
    pub fn pattern(&self) -> &str {
        &self.original_pattern
    }

    const fn options() -> MatchOptions {
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        }
    }
}

impl PartialEq for PatternMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.original_pattern == other.original_pattern
    }
}
