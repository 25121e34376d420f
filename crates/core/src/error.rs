//! Error types shared across the workspace.

/// Top-level tailwarden error
#[derive(Debug, thiserror::Error)]
pub enum TailwardenError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Log source error (watcher construction or startup)
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range or malformed
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Log source errors that abort startup
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Source or pattern set could not be initialized
    #[error("source init failed: {0}")]
    InitFailed(String),

    /// Source kind is not available on this host
    #[error("source unsupported on this platform: {0}")]
    Unsupported(String),
}
