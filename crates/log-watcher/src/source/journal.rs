//! systemd journal watcher
//!
//! Runs `journalctl -f -n 0 -o json [-u UNIT]...` and reads one JSON record per
//! line. The `MESSAGE` field is analyzed and tagged `systemd:<unit>`, using
//! `_SYSTEMD_UNIT` or `unknown`. Records that are not JSON or whose message is
//! not a string are skipped. If `journalctl` cannot be spawned or exits, the
//! feed is started again after one poll interval.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailwarden_core::pipeline::BoxFuture;

use super::{RawLine, Watcher, WatcherKind, forward, pause, report_tick_error};
use crate::error::WatcherError;

const JOURNALCTL: &str = "journalctl";

/// Follows the systemd journal
#[derive(Debug)]
pub struct JournalWatcher {
    units: Vec<String>,
    retry_interval: Duration,
    program: String,
    args: Vec<String>,
}

impl JournalWatcher {
    /// An empty unit list follows every unit.
    pub fn new(units: Vec<String>, retry_interval: Duration) -> Self {
        let units: Vec<String> = units
            .into_iter()
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .collect();
        let mut args: Vec<String> = ["-f", "-n", "0", "-o", "json"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        for unit in &units {
            args.push("-u".to_owned());
            args.push(unit.clone());
        }
        Self {
            units,
            retry_interval,
            program: JOURNALCTL.to_owned(),
            args,
        }
    }

    /// Runs `program` instead of `journalctl`.
    #[cfg(test)]
    fn with_command(mut self, program: &str, args: &[&str]) -> Self {
        self.program = program.to_owned();
        self.args = args.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    /// Arguments passed to `journalctl`.
    pub fn command_args(&self) -> &[String] {
        &self.args
    }

    /// Runs `journalctl` once.
    ///
    /// Returns `Ok(())` on cancellation or when the receiver closes, and an
    /// error when the feed broke and should be started again.
    async fn follow_once(
        &self,
        tx: &mpsc::Sender<RawLine>,
        cancel: &CancellationToken,
    ) -> Result<(), WatcherError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WatcherError::source_failure("journal", format!("spawn failed: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WatcherError::source_failure("journal", "stdout not captured"))?;
        let mut records = BufReader::new(stdout).split(b'\n');

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = records.next_segment() => next?,
            };
            let Some(record) = next else {
                break;
            };

            let Some(line) = parse_record(&String::from_utf8_lossy(&record)) else {
                continue;
            };
            if !forward(tx, vec![line]).await {
                return Ok(());
            }
        }

        let status = child.wait().await?;
        Err(WatcherError::source_failure(
            "journal",
            format!("{} exited: {status}", self.program),
        ))
    }

    async fn watch(self, tx: mpsc::Sender<RawLine>, cancel: CancellationToken) {
        tracing::info!(units = ?self.units, "watching systemd journal");

        loop {
            match self.follow_once(&tx, &cancel).await {
                Ok(()) => break,
                Err(e) => report_tick_error(WatcherKind::Journal, &self.program, &e),
            }
            if !pause(self.retry_interval, &cancel).await {
                break;
            }
        }

        tracing::info!("journal watcher stopped");
    }
}

/// Turns one journal JSON record into a line.
///
/// Returns `None` for malformed records and records whose `MESSAGE` is absent
/// or not a string (journald encodes binary messages as byte arrays).
pub fn parse_record(record: &str) -> Option<RawLine> {
    let record = record.trim();
    if record.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(record) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed journal record");
            return None;
        }
    };

    let Some(message) = value.get("MESSAGE").and_then(|m| m.as_str()) else {
        tracing::debug!("skipping journal record without string MESSAGE");
        return None;
    };
    let unit = value
        .get("_SYSTEMD_UNIT")
        .and_then(|u| u.as_str())
        .unwrap_or("unknown");

    Some(RawLine::new(message, format!("systemd:{unit}")))
}

impl Watcher for JournalWatcher {
    fn kind(&self) -> WatcherKind {
        WatcherKind::Journal
    }

    fn describe(&self) -> String {
        if self.units.is_empty() {
            "all units".to_owned()
        } else {
            self.units.join(",")
        }
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
    use super::*;

    #[test]
    fn args_without_units() {
        let watcher = JournalWatcher::new(vec![], Duration::from_secs(5));
        assert_eq!(watcher.command_args(), vec!["-f", "-n", "0", "-o", "json"]);
        assert_eq!(watcher.describe(), "all units");
    }

    #[test]
    fn args_with_units() {
        let watcher = JournalWatcher::new(
            vec!["nginx.service".to_owned(), " postgresql.service".to_owned()],
            Duration::from_secs(5),
        );
        assert_eq!(
            watcher.command_args(),
            vec![
                "-f",
                "-n",
                "0",
                "-o",
                "json",
                "-u",
                "nginx.service",
                "-u",
                "postgresql.service"
            ]
        );
    }

    #[test]
    fn parse_record_with_unit() {
        let line = parse_record(
            r#"{"MESSAGE":"upstream timed out","_SYSTEMD_UNIT":"nginx.service","PRIORITY":"3"}"#,
        )
        .unwrap();
        assert_eq!(line.text, "upstream timed out");
        assert_eq!(line.source, "systemd:nginx.service");
    }

    #[test]
    fn parse_record_without_unit_uses_unknown() {
        let line = parse_record(r#"{"MESSAGE":"kernel: Out of memory"}"#).unwrap();
        assert_eq!(line.source, "systemd:unknown");
    }

    #[test]
    fn malformed_record_is_skipped() {
        assert!(parse_record("not json at all").is_none());
        assert!(parse_record("").is_none());
    }

    #[cfg(unix)]
    fn shell_feed(retry: Duration) -> JournalWatcher {
        let script = r#"printf '%s\n' 'not json' '{"MESSAGE":"No space left on device","_SYSTEMD_UNIT":"app.service"}' '{"MESSAGE":[104,105]}' '{"MESSAGE":"second record"}'"#;
        JournalWatcher::new(vec![], retry).with_command("sh", &["-c", script])
    }

    #[cfg(unix)]
    async fn recv(rx: &mut mpsc::Receiver<RawLine>) -> RawLine {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a record")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn missing_binary_keeps_watcher_alive() {
        let watcher = JournalWatcher::new(vec![], Duration::from_millis(20))
            .with_command("/nonexistent/tailwarden-journalctl", &[]);
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Box::new(watcher).run(tx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!task.is_finished());

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn malformed_records_are_skipped_mid_stream() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let watcher = Box::new(shell_feed(Duration::from_secs(60)));
        let task = tokio::spawn(watcher.run(tx, cancel.clone()));

        let first = recv(&mut rx).await;
        assert_eq!(first.text, "No space left on device");
        assert_eq!(first.source, "systemd:app.service");
        let second = recv(&mut rx).await;
        assert_eq!(second.text, "second record");
        assert_eq!(second.source, "systemd:unknown");

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_feed_is_started_again() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let watcher = Box::new(shell_feed(Duration::from_millis(20)));
        let task = tokio::spawn(watcher.run(tx, cancel.clone()));

        let texts: Vec<String> = [
            recv(&mut rx).await,
            recv(&mut rx).await,
            recv(&mut rx).await,
            recv(&mut rx).await,
        ]
        .into_iter()
        .map(|line| line.text)
        .collect();
        assert_eq!(
            texts,
            vec![
                "No space left on device",
                "second record",
                "No space left on device",
                "second record"
            ]
        );

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[test]
    fn binary_message_is_skipped() {
        assert!(parse_record(r#"{"MESSAGE":[104,105],"_SYSTEMD_UNIT":"x.service"}"#).is_none());
        assert!(parse_record(r#"{"_SYSTEMD_UNIT":"x.service"}"#).is_none());
    }
}
