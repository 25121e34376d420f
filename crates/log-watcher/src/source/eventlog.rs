//! Windows event log watcher
//!
//! Each channel is polled by its own task. Every poll interval it queries the
//! newest error and warning entries through PowerShell and analyzes each
//! entry's `Message`. Repeated entries across ticks are left to the dedup
//! cache.
//!
//! Construction fails on any other platform.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use tailwarden_core::pipeline::BoxFuture;

use super::{RawLine, Watcher, WatcherKind, forward, pause, report_tick_error};
use crate::error::WatcherError;

/// Per-query subprocess timeout
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Entries fetched per channel per tick
const NEWEST_ENTRIES: u32 = 10;

/// Polls Windows event log channels
#[derive(Debug)]
pub struct EventLogWatcher {
    channels: Vec<String>,
    poll_interval: Duration,
}

impl EventLogWatcher {
    /// # Errors
    /// - `UnsupportedPlatform` when not running on Windows
    /// - `Config` for an empty list or a channel name with characters outside
    ///   letters, digits, space, `-`, `_` and `/`
    pub fn new(channels: Vec<String>, poll_interval: Duration) -> Result<Self, WatcherError> {
        if !cfg!(windows) {
            return Err(WatcherError::UnsupportedPlatform {
                watcher: "eventlog".to_owned(),
                required: "windows".to_owned(),
            });
        }
        Self::with_channels(channels, poll_interval)
    }

    fn with_channels(channels: Vec<String>, poll_interval: Duration) -> Result<Self, WatcherError> {
        if channels.is_empty() {
            return Err(WatcherError::Config {
                field: "channels".to_owned(),
                reason: "at least one channel is required".to_owned(),
            });
        }
        for channel in &channels {
            validate_channel(channel)?;
        }
        Ok(Self {
            channels,
            poll_interval,
        })
    }

    async fn watch(self, tx: mpsc::Sender<RawLine>, cancel: CancellationToken) {
        tracing::info!(channels = ?self.channels, "watching windows event log");

        let mut pollers = JoinSet::new();
        for channel in self.channels {
            pollers.spawn(poll_channel(
                channel,
                self.poll_interval,
                tx.clone(),
                cancel.clone(),
            ));
        }
        drop(tx);

        while let Some(result) = pollers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "event log poller panicked");
            }
        }

        tracing::info!("event log watcher stopped");
    }
}

/// Polls one channel until cancelled or the receiver is gone.
async fn poll_channel(
    channel: String,
    poll_interval: Duration,
    tx: mpsc::Sender<RawLine>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = query_channel(&channel) => result,
        };
        match result {
            Ok(lines) => {
                if !forward(&tx, lines).await {
                    return;
                }
            }
            Err(e) => report_tick_error(WatcherKind::EventLog, &channel, &e),
        }
        if !pause(poll_interval, &cancel).await {
            return;
        }
    }
}

async fn query_channel(channel: &str) -> Result<Vec<RawLine>, WatcherError> {
    let child = Command::new("powershell")
        .arg("-Command")
        .arg(query_script(channel))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WatcherError::source_failure("eventlog", format!("spawn failed: {e}")))?;

    let output = tokio::time::timeout(QUERY_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            WatcherError::source_failure("eventlog", format!("query of {channel} timed out"))
        })??;

    if !output.status.success() {
        return Err(WatcherError::source_failure(
            "eventlog",
            format!("query of {channel} failed: {}", output.status),
        ));
    }

    parse_events(&String::from_utf8_lossy(&output.stdout), channel)
}

fn validate_channel(channel: &str) -> Result<(), WatcherError> {
    let valid = !channel.trim().is_empty()
        && channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '/'));
    if valid {
        Ok(())
    } else {
        Err(WatcherError::Config {
            field: "channels".to_owned(),
            reason: format!("invalid channel name '{channel}'"),
        })
    }
}

/// PowerShell pipeline returning the newest errors and warnings as JSON.
pub fn query_script(channel: &str) -> String {
    format!(
        "Get-EventLog -LogName '{channel}' -Newest {NEWEST_ENTRIES} -EntryType Error,Warning | \
         Select-Object TimeGenerated,EntryType,Source,Message | ConvertTo-Json"
    )
}

/// Parses `ConvertTo-Json` output: a single object or an array of objects.
///
/// Empty output means no matching entries. Entries without a string
/// `Message` are skipped.
pub fn parse_events(json: &str, channel: &str) -> Result<Vec<RawLine>, WatcherError> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(json)?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        single => vec![single],
    };

    let source = format!("windows:{channel}");
    Ok(entries
        .iter()
        .filter_map(|entry| entry.get("Message").and_then(|m| m.as_str()))
        .map(|message| RawLine::new(message, source.clone()))
        .collect())
}

impl Watcher for EventLogWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::EventLog
    }

    fn describe(&self) -> String {
        self.channels.join(",")
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
