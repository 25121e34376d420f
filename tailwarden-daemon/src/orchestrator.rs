//! Watcher orchestration -- assembly, startup and signal-driven shutdown.
//!
//! The [`Orchestrator`] turns a validated [`TailwardenConfig`] into running
//! watchers:
//!
//! 1. install the metrics exporter (when enabled)
//! 2. log the startup banner
//! 3. load the pattern registry (built-ins plus optional file)
//! 4. build the HTTP dispatcher
//! 5. build every configured watcher; any failure aborts startup
//! 6. hand them to the [`Supervisor`]
//!
//! [`Orchestrator::run`] then waits for SIGINT/SIGTERM (or for every watcher
//! to end) and performs a bounded shutdown.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tailwarden_core::config::{RejectedOverride, TailwardenConfig};
use tailwarden_watcher::{
    DispatchConfig, IncidentDispatcher, PatternRegistry, ShutdownReport, Supervisor, Watcher,
    WatcherConfig, build_watcher,
};

use crate::metrics_server;

/// Loads the configuration file (if any) and applies env overrides.
///
/// Without a path the built-in defaults are used. Validation is left to the
/// caller so CLI overrides can be applied first. Env values that failed to
/// parse are returned alongside the config; tracing is not installed yet, so
/// the caller reports them after `init_tracing`.
pub async fn load_config(
    path: Option<&Path>,
) -> Result<(TailwardenConfig, Vec<RejectedOverride>)> {
    let mut config = match path {
        Some(path) => TailwardenConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => TailwardenConfig::default(),
    };
    let rejected = config.apply_env_overrides();
    Ok((config, rejected))
}

/// The assembled daemon
pub struct Orchestrator {
    config: TailwardenConfig,
    supervisor: Supervisor,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Validates `config` and starts every configured watcher.
    ///
    /// # Errors
    ///
    /// - configuration validation fails or no source is configured
    /// - the pattern file cannot be loaded or a pattern does not compile
    /// - a watcher cannot be constructed (e.g. event log off Windows)
    pub async fn build_from_config(config: TailwardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        if config.watch.sources.is_empty() {
            return Err(anyhow::anyhow!("no sources configured"));
        }

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let watch = WatcherConfig::from_core(&config)?;
        let dispatch = DispatchConfig::from_core(&config);

        tracing::info!(
            webhook_url = %dispatch.webhook_url,
            intake_url = %config.delivery.intake_url,
            poll_interval_secs = config.watch.poll_interval_secs,
            sources = watch.sources.len(),
            "tailwarden starting"
        );

        let registry =
            PatternRegistry::load(watch.patterns_file.as_deref(), watch.patterns_mode).await?;
        let dispatcher = IncidentDispatcher::new(dispatch)?;

        let watchers = watch
            .sources
            .iter()
            .map(|source| {
                build_watcher(source, watch.poll_interval).map_err(|e| {
                    anyhow::anyhow!("failed to start {} watcher: {}", source.kind(), e)
                })
            })
            .collect::<Result<Vec<Box<dyn Watcher>>>>()?;

        let cancel = CancellationToken::new();
        let mut supervisor = Supervisor::new(
            Arc::new(registry),
            Arc::new(dispatcher),
            watch.dedup_capacity,
            watch.shutdown_grace,
        )
        .with_cancel(cancel.clone());

        for watcher in watchers {
            supervisor.spawn(watcher);
        }

        Ok(Self {
            config,
            supervisor,
            cancel,
        })
    }

    /// Runs until a shutdown signal arrives, the cancel token fires, or every
    /// watcher has ended, then shuts the watchers down.
    pub async fn run(mut self) -> Result<ShutdownReport> {
        let cancel = self.cancel.clone();

        tokio::select! {
            signal = wait_for_shutdown_signal() => {
                let signal = signal?;
                tracing::info!(signal, "shutdown signal received");
            }
            _ = self.supervisor.wait(&cancel) => {}
        }

        let report = self.supervisor.shutdown().await;
        tracing::info!(
            finished = report.finished,
            abandoned = report.abandoned,
            "tailwarden stopped"
        );
        Ok(report)
    }

    /// Token that stops the daemon when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of running watcher tasks.
    pub fn active_watchers(&self) -> usize {
        self.supervisor.active()
    }

    pub fn config(&self) -> &TailwardenConfig {
        &self.config
    }
}

/// Waits for SIGTERM or SIGINT and returns the signal name.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}
