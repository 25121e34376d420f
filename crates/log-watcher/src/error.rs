//! Watcher error types
//!
//! [`WatcherError`] covers everything that can go wrong between reading a log
//! source and handing an incident to a delivery endpoint.
//! `From<WatcherError> for TailwardenError` lets callers above this crate
//! propagate with `?`.

use tailwarden_core::error::{ConfigError, SourceError, TailwardenError};

/// Watcher domain error
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// A pattern's regular expression failed to compile
    #[error("pattern compile error: pattern '{name}': {reason}")]
    PatternCompile {
        /// Pattern name
        name: String,
        /// Compiler message
        reason: String,
    },

    /// A pattern is structurally invalid (empty or duplicate name, empty expression)
    #[error("pattern validation error: pattern '{name}': {reason}")]
    PatternValidation {
        /// Pattern name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A custom pattern file could not be read or parsed
    #[error("pattern load error: {path}: {reason}")]
    PatternLoad {
        /// Pattern file path
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// A named source does not exist (e.g. unknown container)
    #[error("{source_type} not found: {name}")]
    SourceNotFound {
        /// Source kind (docker, file, ...)
        source_type: String,
        /// Name that was looked up
        name: String,
    },

    /// A source failed while being read
    #[error("source error: {source_type}: {reason}")]
    Source {
        /// Source kind (file, directory, docker, journal, eventlog)
        source_type: String,
        /// Error detail
        reason: String,
    },

    /// The watcher cannot run on this host
    #[error("{watcher} watcher requires {required}")]
    UnsupportedPlatform {
        /// Watcher kind
        watcher: String,
        /// Required platform or facility
        required: String,
    },

    /// A delivery attempt failed
    #[error("delivery error: {endpoint}: {reason}")]
    Delivery {
        /// Endpoint label (primary, fallback)
        endpoint: String,
        /// Error detail
        reason: String,
    },

    /// Invalid watcher configuration
    #[error("config error: {field}: {reason}")]
    Config {
        /// Offending field
        field: String,
        /// Error detail
        reason: String,
    },

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatcherError {
    /// Shorthand for [`WatcherError::Source`].
    pub(crate) fn source_failure(source_type: &str, reason: impl std::fmt::Display) -> Self {
        Self::Source {
            source_type: source_type.to_owned(),
            reason: reason.to_string(),
        }
    }
}

impl From<WatcherError> for TailwardenError {
    fn from(err: WatcherError) -> Self {
        match err {
            WatcherError::Config { field, reason } => {
                TailwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            WatcherError::UnsupportedPlatform { .. } => {
                TailwardenError::Source(SourceError::Unsupported(err.to_string()))
            }
            WatcherError::Io(e) => TailwardenError::Io(e),
            other => TailwardenError::Source(SourceError::InitFailed(other.to_string())),
        }
    }
}
