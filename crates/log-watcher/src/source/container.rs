//! Container log stream watcher
//!
//! Follows the stdout/stderr stream of each named container from the moment
//! the watcher activates. Every container gets its own task; all of them feed
//! the watcher's single line channel, so one dedup cache covers the watcher.
//!
//! # Failure handling
//! - Container not found (404 on inspect): logged, that container's task
//!   ends, siblings keep running.
//! - Stream error or end of stream: logged, re-opened after one poll
//!   interval with `since` set to the re-open time.
//!
//! The Docker API is reached through [`ContainerLogClient`] so tests can run
//! without a daemon.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use tailwarden_core::pipeline::BoxFuture;

use super::{RawLine, Watcher, WatcherKind, forward, pause, report_tick_error, split_lines};
use crate::error::WatcherError;

/// Container log access used by [`ContainerWatcher`]
///
/// # Implementations
/// - [`BollardLogClient`]: Docker daemon via `bollard`
/// - `MockLogClient`: scripted responses (tests only)
pub trait ContainerLogClient: Send + Sync + 'static {
    /// Checks that the container exists.
    ///
    /// # Errors
    /// - `SourceNotFound` when the daemon answers 404
    /// - `Source` for any other failure
    fn inspect(&self, name: &str) -> impl Future<Output = Result<(), WatcherError>> + Send;

    /// Opens a follow-mode stream of raw log chunks written at or after `since`
    /// (unix seconds).
    fn follow_logs(&self, name: &str, since: i64) -> BoxStream<'static, Result<Bytes, WatcherError>>;
}

/// Docker daemon client backed by `bollard`
pub struct BollardLogClient {
    docker: Arc<bollard::Docker>,
}

impl BollardLogClient {
    /// Uses the platform's default Docker socket.
    ///
    /// No request is made here; an unreachable daemon shows up as per-tick
    /// errors once the watcher runs.
    pub fn connect_local() -> Result<Self, WatcherError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            WatcherError::source_failure("docker", format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl ContainerLogClient for BollardLogClient {
    async fn inspect(&self, name: &str) -> Result<(), WatcherError> {
        use bollard::container::InspectContainerOptions;

        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(WatcherError::SourceNotFound {
                source_type: "docker".to_owned(),
                name: name.to_owned(),
            }),
            Err(e) => Err(WatcherError::source_failure(
                "docker",
                format!("inspect {name} failed: {e}"),
            )),
        }
    }

    fn follow_logs(&self, name: &str, since: i64) -> BoxStream<'static, Result<Bytes, WatcherError>> {
        use bollard::container::LogsOptions;

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            since,
            ..Default::default()
        };

        let container = name.to_owned();
        self.docker
            .logs(name, Some(options))
            .map(move |item| {
                item.map(|output| output.into_bytes()).map_err(|e| {
                    WatcherError::source_failure("docker", format!("{container}: {e}"))
                })
            })
            .boxed()
    }
}

/// Follows log streams of named containers
pub struct ContainerWatcher<C: ContainerLogClient> {
    client: Arc<C>,
    containers: Vec<String>,
    retry_interval: Duration,
}

impl<C: ContainerLogClient> ContainerWatcher<C> {
    /// Blank names are dropped.
    pub fn new(client: C, containers: Vec<String>, retry_interval: Duration) -> Self {
        let containers = containers
            .into_iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            client: Arc::new(client),
            containers,
            retry_interval,
        }
    }

    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    async fn watch(self, tx: mpsc::Sender<RawLine>, cancel: CancellationToken) {
        tracing::info!(containers = ?self.containers, "watching docker containers");

        let since = Utc::now().timestamp();
        let mut streams = JoinSet::new();
        for name in self.containers {
            streams.spawn(follow_container(
                Arc::clone(&self.client),
                name,
                since,
                self.retry_interval,
                tx.clone(),
                cancel.clone(),
            ));
        }
        drop(tx);

        while let Some(result) = streams.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "container stream task panicked");
            }
        }

        tracing::info!("docker watcher stopped");
    }
}

/// Streams one container until cancelled, the container is missing, or the
/// receiver is gone.
async fn follow_container<C: ContainerLogClient>(
    client: Arc<C>,
    name: String,
    mut since: i64,
    retry_interval: Duration,
    tx: mpsc::Sender<RawLine>,
    cancel: CancellationToken,
) {
    let source = format!("docker:{name}");

    loop {
        let inspected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = client.inspect(&name) => result,
        };

        match inspected {
            Ok(()) => {
                tracing::info!(container = %name, since, "following container logs");
                let mut stream = client.follow_logs(&name, since);
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            let lines = split_lines(&chunk)
                                .into_iter()
                                .map(|text| RawLine::new(text, source.clone()))
                                .collect();
                            if !forward(&tx, lines).await {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            report_tick_error(WatcherKind::Docker, &name, &e);
                            break;
                        }
                        None => {
                            tracing::warn!(container = %name, "log stream ended");
                            break;
                        }
                    }
                }
            }
            Err(WatcherError::SourceNotFound { .. }) => {
                tracing::error!(container = %name, "container not found, stream stopped");
                return;
            }
            Err(e) => report_tick_error(WatcherKind::Docker, &name, &e),
        }

        if !pause(retry_interval, &cancel).await {
            return;
        }
        since = Utc::now().timestamp();
    }
}

impl<C: ContainerLogClient> Watcher for ContainerWatcher<C> {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Docker
    }

    fn describe(&self) -> String {
        self.containers.join(",")
    }

    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<RawLine>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), WatcherError>> {
        Box::pin(async move {
            self.watch(tx, cancel).await;
            Ok(())
        })
    }
}

/// Scripted container client for tests
#[cfg(test)]
#[derive(Default)]
pub struct MockLogClient {
    /// Names that answer 404
    pub missing: Vec<String>,
    /// Chunks each container emits once its stream opens
    pub chunks: std::collections::HashMap<String, Vec<Bytes>>,
    /// Streams that fail on their first open
    pub fail_first_open: Vec<String>,
    /// `(name, since)` for every stream opened
    pub opened: std::sync::Mutex<Vec<(String, i64)>>,
}

#[cfg(test)]
impl ContainerLogClient for MockLogClient {
    async fn inspect(&self, name: &str) -> Result<(), WatcherError> {
        if self.missing.iter().any(|m| m == name) {
            return Err(WatcherError::SourceNotFound {
                source_type: "docker".to_owned(),
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn follow_logs(&self, name: &str, since: i64) -> BoxStream<'static, Result<Bytes, WatcherError>> {
        let mut opened = self.opened.lock().unwrap();
        let first_open = !opened.iter().any(|(n, _)| n == name);
        opened.push((name.to_owned(), since));

        if first_open && self.fail_first_open.iter().any(|n| n == name) {
            return futures::stream::iter(vec![Err(WatcherError::source_failure(
                "docker",
                "connection reset",
            ))])
            .boxed();
        }

        let chunks = self.chunks.get(name).cloned().unwrap_or_default();
        futures::stream::iter(chunks.into_iter().map(Ok))
            .chain(futures::stream::pending())
            .boxed()
    }
}
