//! Error handling for grdep
//!
//! Two strongly-typed error enums cover the library:
//! - [`ConfigError`] for everything detected while loading, validating and
//!   compiling configuration. These are fatal before any file is read.
//! - [`GrdepError`] for failures of a pipeline run: configuration errors,
//!   unreadable input, hard matcher errors, output failures and cancellation.
//!
//! Matcher-level errors live in [`crate::matcher::MatchError`]; the
//! "unmatched" signal never reaches this layer.
//!
//! [`user_friendly_error`] turns whatever bubbled up to `main` into an
//! [`ErrorContext`] with a suggestion, printed in color on stderr.
//!
//! # Examples
//!
//! ```rust,no_run
//! use grdep::core::{GrdepError, user_friendly_error};
//!
//! let ctx = user_friendly_error(anyhow::Error::from(GrdepError::Cancelled));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::walk::StreamError;

/// Errors detected while loading or compiling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A matcher entry uses an illegal combination of fields.
    #[error("invalid matcher: {reason}")]
    InvalidMatcher {
        /// What is wrong with the entry
        reason: String,
    },

    /// A category or node selector is malformed.
    #[error("invalid selector: {reason}")]
    InvalidSelector {
        /// What is wrong with the selector
        reason: String,
    },

    /// A regular expression or glob failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// No supported format could parse the source.
    #[error("failed to parse config: {reason}")]
    Parse {
        /// Parser messages, one per attempted format
        reason: String,
    },

    /// No configuration source was given.
    #[error("no config given")]
    NoConfig,

    /// An error annotated with where in the configuration it occurred.
    #[error("{inner}: {context}")]
    Context {
        /// Location, innermost first, e.g. `matcher[1]: category(shell)`
        context: String,
        /// The wrapped error
        inner: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Annotates the error with a location.
    #[must_use]
    pub fn at(self, context: impl fmt::Display) -> Self {
        Self::Context {
            context: context.to_string(),
            inner: Box::new(self),
        }
    }

    /// Creates an [`ConfigError::InvalidMatcher`].
    pub fn invalid_matcher(reason: impl Into<String>) -> Self {
        Self::InvalidMatcher {
            reason: reason.into(),
        }
    }

    /// Creates an [`ConfigError::InvalidSelector`].
    pub fn invalid_selector(reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            reason: reason.into(),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum GrdepError {
    /// Configuration could not be loaded or compiled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A line stream ended with a read error.
    #[error("failed to read {location}: {source}")]
    LineRead {
        /// Input or file position, e.g. `at src/a.sh:3`
        location: String,
        /// The stream's terminal error
        source: StreamError,
    },

    /// A selector or normalizer failed with a hard error.
    #[error("{stage} failed {location}: {message}")]
    Selection {
        /// Pipeline stage, e.g. `category`
        stage: String,
        /// Where the failing input came from
        location: String,
        /// Error message of the failing component
        message: String,
    },

    /// Writing an output record failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding an output record failed.
    #[error("failed to encode output record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The run was interrupted.
    #[error("run cancelled")]
    Cancelled,

    /// Anything else, already rendered.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl GrdepError {
    /// Converts the terminal error of a line stream read at `location`.
    pub fn from_stream(location: impl Into<String>, err: StreamError) -> Self {
        match err {
            StreamError::Cancelled => Self::Cancelled,
            StreamError::Ignore {
                path,
                message,
            } => Self::Selection {
                stage: "ignore".to_string(),
                location: format!("at {path}"),
                message,
            },
            source @ StreamError::Read(_) => Self::LineRead {
                location: location.into(),
                source,
            },
        }
    }
}

/// An error with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: GrdepError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: GrdepError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known error types are recognized even when wrapped in `anyhow` context;
/// the full context chain is then kept as details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format!("{error:#}");

    let error = match error.downcast::<GrdepError>() {
        Ok(e) => return with_chain(create_error_context(e), chain),
        Err(error) => error,
    };
    let error = match error.downcast::<ConfigError>() {
        Ok(e) => return with_chain(create_error_context(GrdepError::Config(e)), chain),
        Err(error) => error,
    };
    let error = match error.downcast::<std::io::Error>() {
        Ok(e) => return with_chain(create_error_context(GrdepError::Io(e)), chain),
        Err(error) => error,
    };

    ErrorContext::new(GrdepError::Other {
        message: format!("{error:#}"),
    })
}

fn with_chain(ctx: ErrorContext, chain: String) -> ErrorContext {
    if ctx.details.is_none() && chain != ctx.error.to_string() {
        ctx.with_details(chain)
    } else {
        ctx
    }
}

fn create_error_context(error: GrdepError) -> ErrorContext {
    match &error {
        GrdepError::Config(_) => ErrorContext::new(error).with_suggestion(
            "Validate the configuration with 'grdep configcheck' or start from 'grdep skeleton'",
        ),
        GrdepError::LineRead {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the files under the given roots are readable"),
        GrdepError::Selection {
            message,
            ..
        } if message.contains("lua") => ErrorContext::new(error)
            .with_suggestion("Check that the lua entry point exists and returns a string"),
        GrdepError::Selection {
            ..
        } => ErrorContext::new(error),
        GrdepError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            ErrorContext::new(error).with_details("the output reader went away")
        }
        GrdepError::Cancelled => ErrorContext::new(error).with_details("interrupted before all roots were processed"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_context_chain() {
        let err = ConfigError::invalid_matcher("empty matcher").at("matcher[1]").at("category(sh)");
        assert_eq!(err.to_string(), "invalid matcher: empty matcher: matcher[1]: category(sh)");
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(GrdepError::Cancelled)
            .with_details("interrupted")
            .with_suggestion("run again");
        assert_eq!(ctx.to_string(), "run cancelled\nDetails: interrupted\nSuggestion: run again");
    }

    #[test]
    fn test_user_friendly_config_error() {
        let err = anyhow::Error::from(ConfigError::NoConfig);
        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, GrdepError::Config(ConfigError::NoConfig)));
        assert!(ctx.suggestion.unwrap().contains("configcheck"));
    }

    #[test]
    fn test_user_friendly_keeps_context_chain() {
        let err: anyhow::Result<()> = Err(ConfigError::NoConfig).context("loading configs");
        let ctx = user_friendly_error(err.unwrap_err());
        assert!(matches!(ctx.error, GrdepError::Config(_)));
        assert_eq!(ctx.details.as_deref(), Some("loading configs: no config given"));
    }

    #[test]
    fn test_user_friendly_lua_selection() {
        let err = GrdepError::Selection {
            stage: "node".to_string(),
            location: "at a.lua:1".to_string(),
            message: "lua function 'f' returned number but should return string".to_string(),
        };
        let ctx = user_friendly_error(err.into());
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_from_stream() {
        assert!(matches!(
            GrdepError::from_stream("stdin", StreamError::Cancelled),
            GrdepError::Cancelled
        ));

        let err = GrdepError::from_stream(
            "at a.sh:3:",
            StreamError::from(std::io::Error::other("disk gone")),
        );
        assert!(matches!(err, GrdepError::LineRead { .. }));
        assert!(err.to_string().starts_with("failed to read at a.sh:3:"));

        let err = GrdepError::from_stream(
            "at a.sh:0:",
            StreamError::Ignore {
                path: "a.sh".to_string(),
                message: "lua function 'f' returned number but should return string".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "ignore failed at a.sh: lua function 'f' returned number but should return string"
        );
    }

    #[test]
    fn test_user_friendly_unknown_error() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert_eq!(ctx.error.to_string(), "something odd");
        assert!(ctx.suggestion.is_none());
    }
}
