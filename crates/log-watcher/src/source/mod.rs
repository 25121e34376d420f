//! Source watchers -- discover new lines from heterogeneous log sources
//!
//! Every source kind implements [`Watcher`]. A watcher runs as one task,
//! pushes [`RawLine`]s into a bounded channel, and exits when its
//! cancellation token fires or the receiving side goes away. Per-tick errors
//! are logged and retried; only construction can fail hard.
//!
//! # Sources
//! - [`FileWatcher`]: one file, tailed from its end at activation
//! - [`DirectoryWatcher`]: every file matching a glob under a directory
//! - [`ContainerWatcher`]: Docker log streams, one task per container
//! - [`JournalWatcher`]: `journalctl -f -o json`
//! - [`EventLogWatcher`]: Windows event log channels (Windows only)

pub mod container;
pub mod directory;
pub mod eventlog;
pub mod file;
pub mod journal;
mod tail;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailwarden_core::config::SourceConfig;
use tailwarden_core::metrics as m;
use tailwarden_core::pipeline::BoxFuture;

use crate::error::WatcherError;

pub use container::{BollardLogClient, ContainerLogClient, ContainerWatcher};
pub use directory::DirectoryWatcher;
pub use eventlog::EventLogWatcher;
pub use file::FileWatcher;
pub use journal::JournalWatcher;

/// A line of text and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line content without its terminator
    pub text: String,
    /// Source identifier (file path, `docker:<name>`, `systemd:<unit>`, ...)
    pub source: String,
    /// When the watcher read the line
    pub received_at: DateTime<Utc>,
}

impl RawLine {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            received_at: Utc::now(),
        }
    }
}

/// Source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    File,
    Directory,
    Docker,
    Journal,
    EventLog,
}

impl WatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Docker => "docker",
            Self::Journal => "journal",
            Self::EventLog => "eventlog",
        }
    }
}

impl fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log source that produces lines until cancelled
///
/// `run` consumes the watcher. It returns `Ok(())` on cancellation or when
/// `tx` is closed, and an error only when the source can never produce
/// anything again.
pub trait Watcher: Send + 'static {
    /// Source kind
    fn kind(&self) -> WatcherKind;

    /// Short description for logs (path, container list, ...)
    fn describe(&self) -> String;

    /// Runs the watch loop.
    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<RawLine>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), WatcherError>>;
}

/// Builds the watcher for one configured source.
///
/// # Errors
/// - `UnsupportedPlatform` for an event log source off Windows
/// - `Config` for an invalid directory glob or event log channel name
/// - `Source` when the Docker client cannot be configured
pub fn build_watcher(
    source: &SourceConfig,
    poll_interval: Duration,
) -> Result<Box<dyn Watcher>, WatcherError> {
    let watcher: Box<dyn Watcher> = match source {
        SourceConfig::File { path } => Box::new(FileWatcher::new(path, poll_interval)),
        SourceConfig::Directory { path, pattern } => Box::new(DirectoryWatcher::new(
            path,
            pattern,
            poll_interval,
        )?),
        SourceConfig::Docker { containers } => {
            let client = BollardLogClient::connect_local()?;
            Box::new(ContainerWatcher::new(
                client,
                containers.clone(),
                poll_interval,
            ))
        }
        SourceConfig::Journal { units } => {
            Box::new(JournalWatcher::new(units.clone(), poll_interval))
        }
        SourceConfig::EventLog { channels } => {
            Box::new(EventLogWatcher::new(channels.clone(), poll_interval)?)
        }
    };
    Ok(watcher)
}

/// Sends lines in order; returns `false` once the receiver is gone.
pub(crate) async fn forward(tx: &mpsc::Sender<RawLine>, lines: Vec<RawLine>) -> bool {
    for line in lines {
        if tx.send(line).await.is_err() {
            return false;
        }
    }
    true
}

/// Sleeps for `period`; returns `false` if cancelled first.
pub(crate) async fn pause(period: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

/// Logs and counts a recoverable per-tick error.
pub(crate) fn report_tick_error(kind: WatcherKind, target: &str, err: &WatcherError) {
    tracing::warn!(
        source_kind = kind.as_str(),
        target,
        error = %err,
        "watcher tick failed, retrying next interval"
    );
    metrics::counter!(m::WATCHER_ERRORS_TOTAL, m::LABEL_SOURCE_KIND => kind.as_str())
        .increment(1);
}

/// Splits a decoded chunk into non-blank lines without terminators.
pub(crate) fn split_lines(chunk: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(chunk)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_strips_terminators_and_blanks() {
        let lines = split_lines(b"first\r\nsecond\n\n   \nthird");
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn split_lines_is_lossy_on_invalid_utf8() {
        let lines = split_lines(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }

    #[test]
    fn build_file_watcher() {
        let source = SourceConfig::File {
            path: "/var/log/syslog".to_owned(),
        };
        let watcher = build_watcher(&source, Duration::from_secs(5)).unwrap();
        assert_eq!(watcher.kind(), WatcherKind::File);
        assert_eq!(watcher.describe(), "/var/log/syslog");
    }

    #[test]
    fn build_journal_watcher_all_units() {
        let source = SourceConfig::Journal { units: vec![] };
        let watcher = build_watcher(&source, Duration::from_secs(5)).unwrap();
        assert_eq!(watcher.kind(), WatcherKind::Journal);
    }

    #[cfg(not(windows))]
    #[test]
    fn build_eventlog_watcher_fails_off_windows() {
        let source = SourceConfig::EventLog {
            channels: vec!["System".to_owned()],
        };
        let err = build_watcher(&source, Duration::from_secs(5)).err().unwrap();
        assert!(matches!(err, WatcherError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn build_directory_watcher_rejects_bad_glob() {
        let source = SourceConfig::Directory {
            path: "/var/log".to_owned(),
            pattern: "[unclosed".to_owned(),
        };
        assert!(build_watcher(&source, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn forward_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        assert!(!forward(&tx, vec![RawLine::new("x", "test")]).await);
    }

    #[tokio::test]
    async fn pause_returns_false_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!pause(Duration::from_secs(60), &cancel).await);
    }
}
