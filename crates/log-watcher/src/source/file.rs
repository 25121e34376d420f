//! Single-file watcher
//!
//! Polls one file on a fixed interval, `tail -f` style. The watermark starts at
//! the file's end when the watcher activates, so existing content is never
//! reported. A file that does not exist yet is waited for and then read from
//! its beginning.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailwarden_core::pipeline::BoxFuture;

use super::tail::TailState;
use super::{RawLine, Watcher, WatcherKind, forward, pause, report_tick_error};
use crate::error::WatcherError;

/// Tails one file
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    poll_interval: Duration,
    state: Option<TailState>,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            state: None,
        }
    }

    /// Records the current end of file as the watermark.
    ///
    /// Called by `run`; exposed so the first poll can be driven directly.
    pub async fn activate(&mut self) {
        let state = TailState::at_end(&self.path).await;
        tracing::debug!(
            path = %self.path.display(),
            watermark = state.watermark(),
            "file watcher activated"
        );
        self.state = Some(state);
    }

    /// Current watermark, `None` before activation.
    pub fn watermark(&self) -> Option<u64> {
        self.state.as_ref().map(TailState::watermark)
    }

    /// Performs one poll tick.
    ///
    /// A missing file yields no lines and no error.
    pub async fn poll_once(&mut self) -> Result<Vec<RawLine>, WatcherError> {
        if self.state.is_none() {
            self.activate().await;
        }
        let Some(state) = self.state.as_mut() else {
            return Ok(Vec::new());
        };

        match state.read_new_lines().await {
            Ok(lines) => {
                let source = state.path().display().to_string();
                Ok(lines
                    .into_iter()
                    .map(|line| RawLine::new(line, source.clone()))
                    .collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "file not present yet");
                Ok(Vec::new())
            }
            Err(e) => Err(WatcherError::source_failure(
                "file",
                format!("{}: {e}", self.path.display()),
            )),
        }
    }

    async fn watch(mut self, tx: mpsc::Sender<RawLine>, cancel: CancellationToken) {
        self.activate().await;
        tracing::info!(path = %self.path.display(), "watching file");

        loop {
            if !pause(self.poll_interval, &cancel).await {
                break;
            }
            match self.poll_once().await {
                Ok(lines) => {
                    if !forward(&tx, lines).await {
                        break;
                    }
                }
                Err(e) => {
                    report_tick_error(WatcherKind::File, &self.path.display().to_string(), &e)
                }
            }
        }

        tracing::info!(path = %self.path.display(), "file watcher stopped");
    }
}

impl Watcher for FileWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::File
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
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

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::*;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn preexisting_content_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "ERROR Exception: old failure\n");

        let mut watcher = FileWatcher::new(&path, Duration::from_secs(5));
        watcher.activate().await;
        assert!(watcher.poll_once().await.unwrap().is_empty());

        append(&path, "Connection refused\n");
        let lines = watcher.poll_once().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Connection refused");
        assert_eq!(lines[0].source, path.display().to_string());
    }

    #[tokio::test]
    async fn rotation_restarts_at_offset_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "line one is quite long\nline two is also long\n");

        let mut watcher = FileWatcher::new(&path, Duration::from_secs(5));
        watcher.activate().await;
        let original_len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(watcher.watermark(), Some(original_len));

        std::fs::write(&path, "rotated\n").unwrap();
        let lines = watcher.poll_once().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "rotated");
        assert_eq!(watcher.watermark(), Some(8));
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");

        let mut watcher = FileWatcher::new(&path, Duration::from_secs(5));
        assert!(watcher.poll_once().await.unwrap().is_empty());

        append(&path, "disk full\n");
        let lines = watcher.poll_once().await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn run_forwards_appended_lines_and_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "history\n");

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let watcher = Box::new(FileWatcher::new(&path, Duration::from_millis(20)));
        let handle = tokio::spawn(watcher.run(tx, cancel.clone()));

        // let the watcher record its starting watermark
        tokio::time::sleep(Duration::from_millis(50)).await;
        append(&path, "Out of memory\n");

        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.text, "Out of memory");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
