//! Embedded Lua filter.
//!
//! A Lua state is created lazily on first use from inline source or a
//! script file, with only the safe standard libraries loaded. Each call
//! invokes the configured entry-point function with the candidate as its
//! single string argument and splits the returned string on newlines.
//!
//! The state is not safe for concurrent use, so calls on one script are
//! serialized behind an async mutex. Returning anything other than a string
//! is a contract violation and surfaces as a hard error.

use mlua::{Function, Lua, LuaOptions, StdLib, Value};
use std::path::PathBuf;
use tokio::sync::{Mutex, OnceCell};

use super::{MatchError, MatchResult};

/// Where the script source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LuaSource {
    /// Source code embedded in the configuration.
    Inline(String),
    /// Path to a script file, read when the state is first created.
    File(PathBuf),
}

/// A Lua entry point evaluated once per candidate.
#[derive(Debug)]
pub struct LuaScript {
    source: LuaSource,
    entry: String,
    state: OnceCell<Mutex<Lua>>,
}

impl LuaScript {
    /// Creates a script from inline source.
    pub fn inline(source: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::new(LuaSource::Inline(source.into()), entry)
    }

    /// Creates a script read from `path` on first use.
    pub fn from_file(path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self::new(LuaSource::File(path.into()), entry)
    }

    fn new(source: LuaSource, entry: impl Into<String>) -> Self {
        Self {
            source,
            entry: entry.into(),
            state: OnceCell::new(),
        }
    }

    /// Returns the entry-point function name.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Returns the script source.
    pub fn source(&self) -> &LuaSource {
        &self.source
    }

    /// Calls the entry point with `src`.
    pub async fn run(&self, src: &str) -> MatchResult {
        let state = self.state.get_or_try_init(|| async { self.load().map(Mutex::new) }).await?;
        let lua = state.lock().await;

        let function: Function =
            lua.globals().get(self.entry.as_str()).map_err(|e| MatchError::ScriptCall {
                entry: self.entry.clone(),
                reason: e.to_string(),
            })?;
        let value: Value = function.call(src).map_err(|e| MatchError::ScriptCall {
            entry: self.entry.clone(),
            reason: e.to_string(),
        })?;

        match value {
            Value::String(s) => {
                Ok(s.to_string_lossy().to_string().split('\n').map(str::to_string).collect())
            }
            other => Err(MatchError::InvalidReturnType {
                entry: self.entry.clone(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Releases the Lua state. A later [`LuaScript::run`] loads the script
    /// again.
    pub fn close(&mut self) {
        self.state.take();
    }

    fn load(&self) -> Result<Lua, MatchError> {
        let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default()).map_err(|e| {
            MatchError::ScriptLoad {
                reason: e.to_string(),
            }
        })?;

        let (name, code) = match &self.source {
            LuaSource::Inline(code) => ("=inline".to_string(), code.clone()),
            LuaSource::File(path) => {
                let code = std::fs::read_to_string(path).map_err(|e| MatchError::ScriptLoad {
                    reason: format!("{}: {e}", path.display()),
                })?;
                (format!("@{}", path.display()), code)
            }
        };

        lua.load(code.as_str()).set_name(name).exec().map_err(|e| MatchError::ScriptLoad {
            reason: e.to_string(),
        })?;
        tracing::debug!(target: "matcher::lua", "loaded lua script, entry point {}", self.entry);
        Ok(lua)
    }
}
