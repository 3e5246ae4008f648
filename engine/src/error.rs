//! Error types for the precision-analysis engine.
//!
//! Numeric conditions (inexact, overflow, underflow, division by zero, NaN
//! production) are never errors: they are flags in
//! [`crate::numerics::RoundingFlags`]. The types here cover what can
//! actually fail: reading literals and files, configuration, and the
//! execution-path engine running out of live forks.
//!
//! ```text
//! EngineError (top-level)
//! ├── ReadError    (malformed literal or trace line)
//! └── ConfigError  (config validation / file loading)
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Convenient `Result` alias used by every fallible engine entry point.
pub type EngineResult<T> = Result<T, EngineError>;

/// Top-level error of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A literal or persisted record could not be read.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every fork of a split terminated abnormally.
    #[error("Every execution path of split '{site}' terminated abnormally")]
    EmptyBranch {
        /// Label of the split point.
        site: String,
    },

    /// The analysed program stopped on this execution path.
    #[error("Execution path terminated: {0}")]
    AnticipatedTermination(String),

    /// A loop ran into the configured iteration bound.
    #[error("Loop '{site}' exceeded {limit} iterations")]
    LoopIterationLimit {
        site: String,
        limit: usize,
    },

    /// A loop state stopped changing while still asking for more iterations.
    #[error("Loop '{site}' is not converging after {iterations} iterations")]
    LoopNotConverging {
        site: String,
        iterations: usize,
    },

    /// Replaying a fork reached a different decision point than recorded.
    #[error("Replayed decision expected site '{expected}' but reached '{found}'")]
    ReplayDiverged {
        expected: String,
        found: String,
    },

    /// Underlying I/O failure (persistence, trace files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Errors that end only the fork they occur in; the split drops the
    /// fork and keeps the others.
    pub fn is_fork_local(&self) -> bool {
        matches!(
            self,
            EngineError::Read(_) | EngineError::AnticipatedTermination(_)
        )
    }
}

/// A literal, input argument or trace record that cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot read '{input}': {message}")]
pub struct ReadError {
    /// The offending text.
    pub input: String,
    /// What is wrong with it.
    pub message: String,
}

impl ReadError {
    pub fn new(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// Errors produced while loading or validating an [`crate::config::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Construct an [`ConfigError::InvalidValue`] error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
