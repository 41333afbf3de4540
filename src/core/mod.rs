//! Core error types shared by the library and the binary.
//!
//! - [`ConfigError`] - configuration load, validation and compile failures
//! - [`GrdepError`] - everything that aborts a run
//! - [`ErrorContext`] - user-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - converts any `anyhow::Error` for display
//!
//! Every operation that can fail returns a [`Result`] with one of these types
//! or an `anyhow::Error` carrying them; nothing in the library prints errors
//! itself.
//!
//! [`Result`]: std::result::Result

pub mod error;

pub use error::{ConfigError, ErrorContext, GrdepError, user_friendly_error};
