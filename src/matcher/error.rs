//! Error type shared by every matcher, selector and normalizer.
//!
//! [`MatchError::Unmatched`] is not a failure: it is the "no result" signal
//! that flows up through chains and selectors and is recovered at every
//! fan-out boundary. Every other variant is a hard error that aborts the
//! current run.

use thiserror::Error;

use crate::walk::StreamError;

/// Result of a single match attempt: the surviving candidate strings.
pub type MatchResult = Result<Vec<String>, MatchError>;

/// Errors produced while evaluating matchers.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The matcher did not apply to the input.
    #[error("unmatched: {context}")]
    Unmatched {
        /// Where the match stopped, innermost first
        context: String,
    },

    /// The embedded Lua script could not be loaded.
    #[error("lua script failed to load: {reason}")]
    ScriptLoad {
        /// Interpreter error message
        reason: String,
    },

    /// Calling the Lua entry point raised an error.
    #[error("lua call to '{entry}' failed: {reason}")]
    ScriptCall {
        /// Name of the entry-point function
        entry: String,
        /// Interpreter error message
        reason: String,
    },

    /// The Lua entry point returned something other than a string.
    #[error("lua function '{entry}' returned {got} but should return string")]
    InvalidReturnType {
        /// Name of the entry-point function
        entry: String,
        /// Lua type name of the returned value
        got: String,
    },

    /// Reading file content failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A line stream ended with an error item.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A hard error annotated with the component that produced it.
    #[error("{context}: {inner}")]
    Context {
        /// Component description, e.g. `category(shell)`
        context: String,
        /// The wrapped error
        inner: Box<MatchError>,
    },
}

impl MatchError {
    /// Creates an [`MatchError::Unmatched`] value.
    pub fn unmatched(context: impl Into<String>) -> Self {
        Self::Unmatched {
            context: context.into(),
        }
    }

    /// Returns `true` if this is an "unmatched" signal, looking through
    /// context wrappers.
    pub fn is_unmatched(&self) -> bool {
        match self {
            Self::Unmatched {
                ..
            } => true,
            Self::Context {
                inner,
                ..
            } => inner.is_unmatched(),
            _ => false,
        }
    }

    /// Returns `true` if the error originates from a cancelled line stream.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Stream(StreamError::Cancelled) => true,
            Self::Context {
                inner,
                ..
            } => inner.is_cancelled(),
            _ => false,
        }
    }

    /// Prefixes the error with the component that produced it.
    ///
    /// Unmatched signals stay flat so that `is_unmatched` remains cheap.
    #[must_use]
    pub fn context(self, ctx: impl Into<String>) -> Self {
        match self {
            Self::Unmatched {
                context,
            } => Self::Unmatched {
                context: format!("{context}: {}", ctx.into()),
            },
            other => Self::Context {
                context: ctx.into(),
                inner: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_survives_context() {
        let err = MatchError::unmatched("matcher chain[0]").context("named-matcher(x)");
        assert!(err.is_unmatched());
        assert_eq!(err.to_string(), "unmatched: matcher chain[0]: named-matcher(x)");
    }

    #[test]
    fn test_hard_error_is_wrapped() {
        let err = MatchError::InvalidReturnType {
            entry: "f".to_string(),
            got: "number".to_string(),
        }
        .context("category(lua)");

        assert!(!err.is_unmatched());
        assert_eq!(
            err.to_string(),
            "category(lua): lua function 'f' returned number but should return string"
        );
    }

    #[test]
    fn test_cancelled_detection() {
        let err = MatchError::from(StreamError::Cancelled).context("text category a.sh");
        assert!(err.is_cancelled());
        assert!(!err.is_unmatched());
    }
}
