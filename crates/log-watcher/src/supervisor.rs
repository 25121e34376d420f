//! Supervisor -- runs watchers as independent tasks and shuts them down
//!
//! Each spawned watcher becomes one task that drives the watcher and its
//! [`IncidentPipeline`] side by side over a bounded channel. A watcher that
//! fails or ends does not affect the others.
//!
//! Shutdown cancels the shared token, then waits up to the grace period for
//! tasks to finish (in-flight deliveries included). Tasks still running after
//! that are aborted and reported as abandoned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tailwarden_core::metrics as m;
use tailwarden_core::pipeline::IncidentSink;

use crate::pattern::PatternRegistry;
use crate::pipeline::IncidentPipeline;
use crate::source::Watcher;

/// Lines buffered between a watcher and its pipeline
pub const LINE_CHANNEL_CAPACITY: usize = 1024;

/// How shutdown went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that finished within the grace period
    pub finished: usize,
    /// Tasks aborted after the grace period
    pub abandoned: usize,
}

/// Holds one unit of the active-watchers gauge; released on drop, so tasks
/// aborted after the grace period are subtracted too.
struct ActiveWatcher;

impl ActiveWatcher {
    fn enter() -> Self {
        metrics::gauge!(m::ACTIVE_WATCHERS).increment(1.0);
        Self
    }
}

impl Drop for ActiveWatcher {
    fn drop(&mut self) {
        metrics::gauge!(m::ACTIVE_WATCHERS).decrement(1.0);
    }
}

pub struct Supervisor {
    registry: Arc<PatternRegistry>,
    sink: Arc<dyn IncidentSink>,
    dedup_capacity: usize,
    shutdown_grace: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<PatternRegistry>,
        sink: Arc<dyn IncidentSink>,
        dedup_capacity: usize,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            registry,
            sink,
            dedup_capacity,
            shutdown_grace,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Uses `cancel` as the parent of every watcher's token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Starts one watcher with its own pipeline.
    pub fn spawn(&mut self, watcher: Box<dyn Watcher>) {
        let kind = watcher.kind();
        let target = watcher.describe();
        let cancel = self.cancel.child_token();
        let pipeline = IncidentPipeline::new(
            Arc::clone(&self.registry),
            self.dedup_capacity,
            Arc::clone(&self.sink),
        );

        self.tasks.spawn(async move {
            let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
            let _active = ActiveWatcher::enter();
            info!(source_kind = kind.as_str(), target = %target, "watcher started");

            let (result, stats) = tokio::join!(watcher.run(tx, cancel), pipeline.run(rx));

            match result {
                Ok(()) => info!(
                    source_kind = kind.as_str(),
                    target = %target,
                    lines = stats.lines,
                    incidents = stats.incidents,
                    "watcher stopped"
                ),
                Err(e) => error!(
                    source_kind = kind.as_str(),
                    target = %target,
                    error = %e,
                    "watcher failed"
                ),
            }
        });
    }

    /// Number of tasks not yet reaped.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits until every watcher has ended on its own or `cancel` fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                joined = self.tasks.join_next() => match joined {
                    Some(Err(e)) if e.is_panic() => error!(error = %e, "watcher task panicked"),
                    Some(_) => {}
                    None => {
                        info!("all watchers ended");
                        return;
                    }
                },
            }
        }
    }

    /// Cancels every watcher and waits up to the grace period.
    pub async fn shutdown(mut self) -> ShutdownReport {
        let total = self.tasks.len();
        info!(tasks = total, grace = ?self.shutdown_grace, "shutting down watchers");
        self.cancel.cancel();

        let mut finished = 0;
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    error!(error = %e, "watcher task panicked");
                }
                finished += 1;
            }
        })
        .await;

        let abandoned = self.tasks.len();
        if drained.is_err() && abandoned > 0 {
            warn!(abandoned, "grace period elapsed, aborting remaining watchers");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        } else {
            info!(finished, "all watchers stopped");
        }

        ShutdownReport {
            finished,
            abandoned,
        }
    }
}
