//! Per-watcher consumer: raw lines in, delivered incidents out
//!
//! ```text
//! Watcher --RawLine--> mpsc --> IncidentPipeline { LineAnalyzer -> IncidentSink }
//! ```
//!
//! One pipeline serves exactly one watcher, so lines of a source are analyzed
//! and delivered in the order the watcher read them, and the dedup cache is
//! never shared.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use tailwarden_core::pipeline::IncidentSink;

use crate::analyzer::LineAnalyzer;
use crate::pattern::PatternRegistry;
use crate::source::RawLine;

/// Counters reported when a pipeline finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines: u64,
    pub incidents: u64,
    pub delivered: u64,
}

pub struct IncidentPipeline {
    analyzer: LineAnalyzer,
    sink: Arc<dyn IncidentSink>,
    stats: PipelineStats,
}

impl IncidentPipeline {
    pub fn new(
        registry: Arc<PatternRegistry>,
        dedup_capacity: usize,
        sink: Arc<dyn IncidentSink>,
    ) -> Self {
        Self {
            analyzer: LineAnalyzer::new(registry, dedup_capacity),
            sink,
            stats: PipelineStats::default(),
        }
    }

    /// Handles one line. Returns whether an incident was delivered.
    pub async fn process(&mut self, line: &RawLine) -> bool {
        self.stats.lines += 1;

        let Some(incident) = self.analyzer.analyze(&line.text, &line.source) else {
            return false;
        };
        self.stats.incidents += 1;

        info!(
            pattern = %incident.pattern_name,
            severity = %incident.severity,
            source = %incident.source,
            "incident detected"
        );

        let delivered = self.sink.deliver(&incident).await;
        if delivered {
            self.stats.delivered += 1;
        }
        delivered
    }

    /// Consumes lines until every sender is dropped.
    ///
    /// Lines already queued when the watcher stops are still processed.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RawLine>) -> PipelineStats {
        while let Some(line) = rx.recv().await {
            self.process(&line).await;
        }
        debug!(
            sink = self.sink.name(),
            lines = self.stats.lines,
            incidents = self.stats.incidents,
            delivered = self.stats.delivered,
            "pipeline drained"
        );
        self.stats
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    fn pipeline(sink: Arc<RecordingSink>) -> IncidentPipeline {
        let registry = Arc::new(PatternRegistry::with_defaults().unwrap());
        IncidentPipeline::new(registry, 100, sink)
    }

    #[tokio::test]
    async fn matching_line_is_delivered() {
        let sink = RecordingSink::new(true);
        let mut p = pipeline(sink.clone());

        assert!(p.process(&RawLine::new("kernel: Out of memory: Killed process 42", "/var/log/kern.log")).await);
        assert!(!p.process(&RawLine::new("GET /health 200", "/var/log/kern.log")).await);

        assert_eq!(sink.patterns(), vec!["oom_killer"]);
        assert_eq!(
            p.stats(),
            PipelineStats {
                lines: 2,
                incidents: 1,
                delivered: 1
            }
        );
    }

    #[tokio::test]
    async fn rejected_delivery_is_counted_but_not_delivered() {
        let sink = RecordingSink::new(false);
        let mut p = pipeline(sink.clone());

        assert!(!p.process(&RawLine::new("No space left on device", "app")).await);
        assert_eq!(sink.patterns(), vec!["disk_full"]);
        assert_eq!(p.stats().delivered, 0);
        assert_eq!(p.stats().incidents, 1);
    }

    #[tokio::test]
    async fn run_preserves_order_and_drains_queue() {
        let sink = RecordingSink::new(true);
        let (tx, rx) = mpsc::channel(16);

        for text in [
            "FATAL: too many connections for role app",
            "No space left on device",
            "No space left on device",
            "dial tcp: connection refused",
        ] {
            tx.send(RawLine::new(text, "db.log")).await.unwrap();
        }
        drop(tx);

        let stats = pipeline(sink.clone()).run(rx).await;
        assert_eq!(
            sink.patterns(),
            vec!["postgres_connection_exhausted", "disk_full", "connection_refused"]
        );
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.incidents, 3);
    }
}
