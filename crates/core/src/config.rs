//! Configuration -- `tailwarden.toml` parsing and runtime settings
//!
//! [`TailwardenConfig`] is the top-level configuration value. It is built once
//! at startup and handed, immutable, to the components that need it.
//!
//! # Precedence
//! 1. CLI arguments (applied by the daemon)
//! 2. Environment variables (`TAILWARDEN_DELIVERY_WEBHOOK_URL=...`)
//! 3. Config file (`tailwarden.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), tailwarden_core::error::TailwardenError> {
//! use tailwarden_core::config::TailwardenConfig;
//!
//! // file + env overrides + validation
//! let config = TailwardenConfig::load("tailwarden.toml").await?;
//!
//! // straight from a TOML string
//! let config = TailwardenConfig::parse("[watch]\npoll_interval_secs = 2")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TailwardenError};

/// Tailwarden configuration
///
/// Mirrors the layout of `tailwarden.toml`; each component reads its own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailwardenConfig {
    /// Logging settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Incident delivery endpoints
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Watcher settings and configured sources
    #[serde(default)]
    pub watch: WatchConfig,
    /// Prometheus exporter
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TailwardenConfig {
    /// Loads the TOML file, applies env overrides and validates.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailwardenError> {
        let mut config = Self::from_file(path).await?;
        for rejected in config.apply_env_overrides() {
            rejected.report();
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads the TOML file without env overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailwardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, TailwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            TailwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Applies environment variable overrides.
    ///
    /// Naming: `TAILWARDEN_{SECTION}_{FIELD}`, e.g. `TAILWARDEN_WATCH_POLL_INTERVAL_SECS=2`.
    /// Configured sources cannot be overridden from the environment.
    ///
    /// Values that fail to parse leave the field unchanged and are returned so
    /// the caller can report them once logging is up.
    pub fn apply_env_overrides(&mut self) -> Vec<RejectedOverride> {
        let mut rejected = Vec::new();

        // General
        override_string(&mut self.general.log_level, "TAILWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILWARDEN_GENERAL_LOG_FORMAT");

        // Delivery
        override_string(
            &mut self.delivery.webhook_url,
            "TAILWARDEN_DELIVERY_WEBHOOK_URL",
        );
        override_string(
            &mut self.delivery.intake_url,
            "TAILWARDEN_DELIVERY_INTAKE_URL",
        );
        override_string(&mut self.delivery.api_key, "TAILWARDEN_DELIVERY_API_KEY");
        override_parsed(
            &mut self.delivery.timeout_secs,
            "TAILWARDEN_DELIVERY_TIMEOUT_SECS",
            &mut rejected,
        );

        // Watch
        override_parsed(
            &mut self.watch.poll_interval_secs,
            "TAILWARDEN_WATCH_POLL_INTERVAL_SECS",
            &mut rejected,
        );
        override_parsed(
            &mut self.watch.dedup_capacity,
            "TAILWARDEN_WATCH_DEDUP_CAPACITY",
            &mut rejected,
        );
        override_parsed(
            &mut self.watch.shutdown_grace_secs,
            "TAILWARDEN_WATCH_SHUTDOWN_GRACE_SECS",
            &mut rejected,
        );
        override_string(
            &mut self.watch.patterns_file,
            "TAILWARDEN_WATCH_PATTERNS_FILE",
        );
        override_string(
            &mut self.watch.patterns_mode,
            "TAILWARDEN_WATCH_PATTERNS_MODE",
        );

        // Metrics
        override_parsed(
            &mut self.metrics.enabled,
            "TAILWARDEN_METRICS_ENABLED",
            &mut rejected,
        );
        override_string(
            &mut self.metrics.listen_addr,
            "TAILWARDEN_METRICS_LISTEN_ADDR",
        );
        override_parsed(
            &mut self.metrics.port,
            "TAILWARDEN_METRICS_PORT",
            &mut rejected,
        );

        rejected
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), TailwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.delivery.webhook_url.trim().is_empty() {
            return Err(invalid("delivery.webhook_url", "must not be empty"));
        }
        if self.delivery.intake_url.trim().is_empty() {
            return Err(invalid("delivery.intake_url", "must not be empty"));
        }
        if self.delivery.timeout_secs == 0 {
            return Err(invalid("delivery.timeout_secs", "must be greater than 0"));
        }

        if self.watch.poll_interval_secs == 0 {
            return Err(invalid(
                "watch.poll_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.watch.dedup_capacity == 0 {
            return Err(invalid("watch.dedup_capacity", "must be greater than 0"));
        }

        let valid_modes = ["replace", "prepend", "append"];
        if !valid_modes.contains(&self.watch.patterns_mode.as_str()) {
            return Err(invalid(
                "watch.patterns_mode",
                format!("must be one of: {}", valid_modes.join(", ")),
            ));
        }

        for (idx, source) in self.watch.sources.iter().enumerate() {
            source.validate(idx)?;
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> TailwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Incident delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Primary orchestration webhook (full incident payload, expects 200)
    pub webhook_url: String,
    /// Fallback intake service base URL; incidents go to `{intake_url}/incidents` (expects 201)
    pub intake_url: String,
    /// Shared secret sent as `x-api-key` on both attempts; empty disables the header
    pub api_key: String,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:8080/api/v1/webhooks/incident-webhook".to_owned(),
            intake_url: "http://localhost:3001".to_owned(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Tick period for polling watchers (seconds)
    pub poll_interval_secs: u64,
    /// Entries a dedup cache holds before it is cleared
    pub dedup_capacity: usize,
    /// How long shutdown waits for watcher tasks before abandoning them (seconds)
    pub shutdown_grace_secs: u64,
    /// Optional YAML file with custom patterns; empty means built-ins only
    pub patterns_file: String,
    /// How custom patterns combine with built-ins (replace, prepend, append)
    pub patterns_mode: String,
    /// Sources to watch
    pub sources: Vec<SourceConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            dedup_capacity: 10_000,
            shutdown_grace_secs: 5,
            patterns_file: String::new(),
            patterns_mode: "append".to_owned(),
            sources: Vec::new(),
        }
    }
}

/// One configured log source
///
/// ```toml
/// [[watch.sources]]
/// kind = "directory"
/// path = "/var/log/myapp"
/// pattern = "*.log"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A single file
    File {
        /// File to tail
        path: String,
    },
    /// Every file matching a glob directly under a directory
    Directory {
        /// Root directory
        path: String,
        /// Glob matched against file names
        #[serde(default = "default_glob")]
        pattern: String,
    },
    /// Docker container log streams
    #[serde(alias = "container")]
    Docker {
        /// Container names
        containers: Vec<String>,
    },
    /// systemd journal
    #[serde(alias = "systemd")]
    Journal {
        /// Units to follow; empty follows all units
        #[serde(default)]
        units: Vec<String>,
    },
    /// Windows event log channels
    #[serde(rename = "eventlog", alias = "windows")]
    EventLog {
        /// Channel names
        #[serde(default = "default_channels")]
        channels: Vec<String>,
    },
}

impl SourceConfig {
    /// Short kind name, as used in config and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Directory { .. } => "directory",
            Self::Docker { .. } => "docker",
            Self::Journal { .. } => "journal",
            Self::EventLog { .. } => "eventlog",
        }
    }

    fn validate(&self, idx: usize) -> Result<(), TailwardenError> {
        match self {
            Self::File { path } | Self::Directory { path, .. } if path.trim().is_empty() => {
                Err(invalid(
                    &format!("watch.sources[{idx}].path"),
                    format!("{} source requires a path", self.kind()),
                ))
            }
            Self::Directory { pattern, .. } if pattern.trim().is_empty() => Err(invalid(
                &format!("watch.sources[{idx}].pattern"),
                "glob pattern must not be empty",
            )),
            Self::Docker { containers }
                if containers.iter().all(|c| c.trim().is_empty()) =>
            {
                Err(invalid(
                    &format!("watch.sources[{idx}].containers"),
                    "docker source requires at least one container name",
                ))
            }
            Self::EventLog { channels } if channels.is_empty() => Err(invalid(
                &format!("watch.sources[{idx}].channels"),
                "eventlog source requires at least one channel",
            )),
            _ => Ok(()),
        }
    }
}

/// Default glob for directory sources
pub fn default_glob() -> String {
    "*.log".to_owned()
}

/// Default Windows event log channels
pub fn default_channels() -> Vec<String> {
    vec!["System".to_owned(), "Application".to_owned()]
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enables the exporter
    pub enabled: bool,
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
        }
    }
}

// --- env override helpers ---

/// An environment override whose value could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    /// Variable name, e.g. `TAILWARDEN_METRICS_PORT`
    pub env_key: &'static str,
    /// The raw value found in the environment
    pub value: String,
    /// Target type name
    pub expected: &'static str,
}

impl RejectedOverride {
    /// Logs the rejection at warn level.
    pub fn report(&self) {
        warn!(
            env_key = self.env_key,
            value = self.value.as_str(),
            expected = self.expected,
            "failed to parse env override, ignoring"
        );
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(
    target: &mut T,
    env_key: &'static str,
    rejected: &mut Vec<RejectedOverride>,
) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => rejected.push(RejectedOverride {
                env_key,
                value: val,
                expected: std::any::type_name::<T>(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = TailwardenConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watch.poll_interval_secs, 5);
        assert_eq!(config.watch.dedup_capacity, 10_000);
        assert_eq!(config.delivery.timeout_secs, 10);
        assert!(config.delivery.api_key.is_empty());
        assert!(config.watch.sources.is_empty());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        TailwardenConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = TailwardenConfig::parse("").unwrap();
        assert_eq!(config.delivery.intake_url, "http://localhost:3001");
        assert_eq!(config.watch.patterns_mode, "append");
    }

    #[test]
    fn sources_parse_by_kind() {
        let toml = r#"
[[watch.sources]]
kind = "file"
path = "/var/log/syslog"

[[watch.sources]]
kind = "directory"
path = "/var/log/myapp"

[[watch.sources]]
kind = "docker"
containers = ["api", "worker"]

[[watch.sources]]
kind = "systemd"
units = ["nginx.service"]

[[watch.sources]]
kind = "eventlog"
"#;
        let config = TailwardenConfig::parse(toml).unwrap();
        let sources = &config.watch.sources;
        assert_eq!(sources.len(), 5);
        assert_eq!(
            sources[0],
            SourceConfig::File {
                path: "/var/log/syslog".to_owned()
            }
        );
        assert_eq!(
            sources[1],
            SourceConfig::Directory {
                path: "/var/log/myapp".to_owned(),
                pattern: "*.log".to_owned(),
            }
        );
        assert_eq!(sources[2].kind(), "docker");
        assert_eq!(
            sources[3],
            SourceConfig::Journal {
                units: vec!["nginx.service".to_owned()]
            }
        );
        assert_eq!(
            sources[4],
            SourceConfig::EventLog {
                channels: vec!["System".to_owned(), "Application".to_owned()]
            }
        );
        config.validate().unwrap();
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = TailwardenConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            TailwardenError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn unknown_source_kind_is_parse_error() {
        let toml = r#"
[[watch.sources]]
kind = "kafka"
topic = "logs"
"#;
        assert!(TailwardenConfig::parse(toml).is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = TailwardenConfig::default();
        config.watch.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = TailwardenConfig::default();
        config.delivery.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn validate_rejects_empty_webhook_url() {
        let mut config = TailwardenConfig::default();
        config.delivery.webhook_url = "  ".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("webhook_url"));
    }

    #[test]
    fn validate_rejects_unknown_patterns_mode() {
        let mut config = TailwardenConfig::default();
        config.watch.patterns_mode = "merge".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("patterns_mode"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = TailwardenConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_file_source_without_path() {
        let mut config = TailwardenConfig::default();
        config.watch.sources.push(SourceConfig::File {
            path: String::new(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.sources[0].path"));
    }

    #[test]
    fn validate_rejects_docker_source_without_containers() {
        let mut config = TailwardenConfig::default();
        config.watch.sources.push(SourceConfig::Docker {
            containers: vec![" ".to_owned()],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("containers"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serialized with other env-mutating tests.
        unsafe { std::env::set_var("TEST_TAILWARDEN_STR", "overridden") };
        override_string(&mut val, "TEST_TAILWARDEN_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_TAILWARDEN_STR") };
    }

    #[test]
    #[serial]
    fn env_override_u64_invalid_keeps_original() {
        let mut val: u64 = 5;
        let mut rejected = Vec::new();
        // SAFETY: serialized with other env-mutating tests.
        unsafe { std::env::set_var("TEST_TAILWARDEN_U64_BAD", "soon") };
        override_parsed(&mut val, "TEST_TAILWARDEN_U64_BAD", &mut rejected);
        unsafe { std::env::remove_var("TEST_TAILWARDEN_U64_BAD") };
        assert_eq!(val, 5);
        assert_eq!(
            rejected,
            vec![RejectedOverride {
                env_key: "TEST_TAILWARDEN_U64_BAD",
                value: "soon".to_owned(),
                expected: "u64",
            }]
        );
    }

    #[test]
    #[serial]
    fn env_override_bool_valid() {
        let mut val = false;
        let mut rejected = Vec::new();
        // SAFETY: serialized with other env-mutating tests.
        unsafe { std::env::set_var("TEST_TAILWARDEN_BOOL", "true") };
        override_parsed(&mut val, "TEST_TAILWARDEN_BOOL", &mut rejected);
        unsafe { std::env::remove_var("TEST_TAILWARDEN_BOOL") };
        assert!(val);
        assert!(rejected.is_empty());
    }

    #[test]
    #[serial]
    fn apply_env_overrides_returns_rejected_values() {
        let mut config = TailwardenConfig::default();
        // SAFETY: serialized with other env-mutating tests.
        unsafe {
            std::env::set_var("TAILWARDEN_WATCH_POLL_INTERVAL_SECS", "abc");
            std::env::set_var("TAILWARDEN_METRICS_ENABLED", "yes");
            std::env::set_var("TAILWARDEN_DELIVERY_API_KEY", "k");
        }
        let rejected = config.apply_env_overrides();
        unsafe {
            std::env::remove_var("TAILWARDEN_WATCH_POLL_INTERVAL_SECS");
            std::env::remove_var("TAILWARDEN_METRICS_ENABLED");
            std::env::remove_var("TAILWARDEN_DELIVERY_API_KEY");
        }

        let keys: Vec<_> = rejected.iter().map(|r| r.env_key).collect();
        assert_eq!(
            keys,
            vec!["TAILWARDEN_WATCH_POLL_INTERVAL_SECS", "TAILWARDEN_METRICS_ENABLED"]
        );
        assert_eq!(rejected[0].value, "abc");
        assert_eq!(config.watch.poll_interval_secs, 5);
        assert!(!config.metrics.enabled);
        assert_eq!(config.delivery.api_key, "k");
    }

    #[test]
    #[serial]
    fn apply_env_overrides_updates_delivery_and_watch() {
        let mut config = TailwardenConfig::default();
        // SAFETY: serialized with other env-mutating tests.
        unsafe {
            std::env::set_var("TAILWARDEN_DELIVERY_API_KEY", "s3cret");
            std::env::set_var("TAILWARDEN_WATCH_POLL_INTERVAL_SECS", "2");
        }
        let rejected = config.apply_env_overrides();
        unsafe {
            std::env::remove_var("TAILWARDEN_DELIVERY_API_KEY");
            std::env::remove_var("TAILWARDEN_WATCH_POLL_INTERVAL_SECS");
        }
        assert!(rejected.is_empty());
        assert_eq!(config.delivery.api_key, "s3cret");
        assert_eq!(config.watch.poll_interval_secs, 2);
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_TAILWARDEN_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let mut config = TailwardenConfig::default();
        config.watch.sources.push(SourceConfig::Journal { units: vec![] });
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = TailwardenConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.delivery.webhook_url, config.delivery.webhook_url);
        assert_eq!(parsed.watch.sources, config.watch.sources);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = TailwardenConfig::from_file("/nonexistent/path/tailwarden.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TailwardenError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
