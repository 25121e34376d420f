//! Watcher settings
//!
//! [`WatcherConfig`] and [`DispatchConfig`] are derived from the core
//! [`TailwardenConfig`] with durations and modes already parsed.
//!
//! ```ignore
//! let core = TailwardenConfig::load("tailwarden.toml").await?;
//! let watch = WatcherConfig::from_core(&core)?;
//! let dispatch = DispatchConfig::from_core(&core);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use tailwarden_core::config::{SourceConfig, TailwardenConfig};

use crate::dedup::DEFAULT_CAPACITY;
use crate::error::WatcherError;
use crate::pattern::PatternsMode;

/// Settings for the supervisor and its watchers
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Tick period of polling watchers and retry delay of streaming ones
    pub poll_interval: Duration,
    /// Fingerprints a dedup cache holds before clearing
    pub dedup_capacity: usize,
    /// Time allowed for watcher tasks to finish after cancellation
    pub shutdown_grace: Duration,
    /// Optional custom pattern file
    pub patterns_file: Option<PathBuf>,
    /// How the pattern file combines with built-ins
    pub patterns_mode: PatternsMode,
    /// Sources to watch
    pub sources: Vec<SourceConfig>,
}

impl WatcherConfig {
    /// # Errors
    /// Returns `Config` for an unknown patterns mode.
    pub fn from_core(core: &TailwardenConfig) -> Result<Self, WatcherError> {
        let watch = &core.watch;
        let patterns_file = if watch.patterns_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&watch.patterns_file))
        };

        Ok(Self {
            poll_interval: Duration::from_secs(watch.poll_interval_secs),
            dedup_capacity: watch.dedup_capacity,
            shutdown_grace: Duration::from_secs(watch.shutdown_grace_secs),
            patterns_file,
            patterns_mode: watch.patterns_mode.parse()?,
            sources: watch.sources.clone(),
        })
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            dedup_capacity: DEFAULT_CAPACITY,
            shutdown_grace: Duration::from_secs(5),
            patterns_file: None,
            patterns_mode: PatternsMode::default(),
            sources: Vec::new(),
        }
    }
}

/// Delivery endpoints
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Primary webhook URL
    pub webhook_url: String,
    /// Fallback endpoint, already ending in `/incidents`
    pub fallback_url: String,
    /// `x-api-key` value; `None` sends no header
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl DispatchConfig {
    pub fn from_core(core: &TailwardenConfig) -> Self {
        let delivery = &core.delivery;
        Self {
            webhook_url: delivery.webhook_url.clone(),
            fallback_url: fallback_url(&delivery.intake_url),
            api_key: Some(delivery.api_key.clone()).filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(delivery.timeout_secs),
        }
    }
}

/// `{intake_url}/incidents`, tolerating a trailing slash.
pub fn fallback_url(intake_url: &str) -> String {
    format!("{}/incidents", intake_url.trim_end_matches('/'))
}
