//! Directory watcher
//!
//! Enumerates files matching a glob directly under a root directory on every
//! tick. A file seen for the first time is registered at its current end and
//! not read on that tick; tracked files are read with the same rotation
//! handling as [`FileWatcher`](super::FileWatcher), each independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailwarden_core::pipeline::BoxFuture;

use super::tail::TailState;
use super::{RawLine, Watcher, WatcherKind, forward, pause, report_tick_error};
use crate::error::WatcherError;

/// Tails every matching file in a directory
#[derive(Debug)]
pub struct DirectoryWatcher {
    root: PathBuf,
    pattern: String,
    /// `root` escaped + `/` + `pattern`
    glob_expr: String,
    poll_interval: Duration,
    files: HashMap<PathBuf, TailState>,
}

impl DirectoryWatcher {
    /// # Errors
    /// Returns `Config` when `pattern` is not a valid glob.
    pub fn new(
        root: impl Into<PathBuf>,
        pattern: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, WatcherError> {
        let root = root.into();
        let pattern = pattern.into();

        glob::Pattern::new(&pattern).map_err(|e| WatcherError::Config {
            field: "pattern".to_owned(),
            reason: format!("invalid glob '{pattern}': {e}"),
        })?;

        let escaped_root = glob::Pattern::escape(&root.display().to_string());
        let glob_expr = format!("{}/{pattern}", escaped_root.trim_end_matches('/'));

        Ok(Self {
            root,
            pattern,
            glob_expr,
            poll_interval,
            files: HashMap::new(),
        })
    }

    /// Number of files currently tracked.
    pub fn tracked(&self) -> usize {
        self.files.len()
    }

    /// Performs one poll tick across all matching files.
    ///
    /// Per-file read errors are logged and do not affect other files.
    pub async fn poll_once(&mut self) -> Result<Vec<RawLine>, WatcherError> {
        let matches = self.discover().await?;
        let mut lines = Vec::new();

        for path in matches {
            let Some(state) = self.files.get_mut(&path) else {
                let state = TailState::at_end(&path).await;
                tracing::debug!(
                    path = %path.display(),
                    watermark = state.watermark(),
                    "tracking new file"
                );
                self.files.insert(path, state);
                continue;
            };

            match state.read_new_lines().await {
                Ok(new_lines) => {
                    let source = path.display().to_string();
                    lines.extend(
                        new_lines
                            .into_iter()
                            .map(|line| RawLine::new(line, source.clone())),
                    );
                }
                Err(e) => report_tick_error(
                    WatcherKind::Directory,
                    &path.display().to_string(),
                    &WatcherError::from(e),
                ),
            }
        }

        Ok(lines)
    }

    /// Lists regular files matching the glob.
    async fn discover(&self) -> Result<Vec<PathBuf>, WatcherError> {
        let expr = self.glob_expr.clone();
        let listed = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, String> {
            let paths = glob::glob(&expr).map_err(|e| e.to_string())?;
            Ok(paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect())
        })
        .await
        .map_err(|e| WatcherError::source_failure("directory", e))?;

        listed.map_err(|e| WatcherError::source_failure("directory", e))
    }

    async fn watch(mut self, tx: mpsc::Sender<RawLine>, cancel: CancellationToken) {
        tracing::info!(
            dir = %self.root.display(),
            pattern = %self.pattern,
            "watching directory"
        );

        loop {
            match self.poll_once().await {
                Ok(lines) => {
                    if !forward(&tx, lines).await {
                        break;
                    }
                }
                Err(e) => report_tick_error(WatcherKind::Directory, &self.describe(), &e),
            }
            if !pause(self.poll_interval, &cancel).await {
                break;
            }
        }

        tracing::info!(dir = %self.root.display(), "directory watcher stopped");
    }
}

impl Watcher for DirectoryWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Directory
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.root.display(), self.pattern)
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
