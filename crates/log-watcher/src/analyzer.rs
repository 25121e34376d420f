//! Line analyzer -- dedup check, then first-match pattern evaluation
//!
//! Every line passes through the watcher's own [`DedupCache`] before any
//! pattern is evaluated, so a line that matches nothing is still remembered.

use std::sync::Arc;

use chrono::Utc;

use tailwarden_core::metrics as m;
use tailwarden_core::types::Incident;

use crate::dedup::DedupCache;
use crate::pattern::{LogPattern, PatternRegistry};

/// Matches lines against a shared registry with a private dedup cache
#[derive(Debug)]
pub struct LineAnalyzer {
    registry: Arc<PatternRegistry>,
    dedup: DedupCache,
}

impl LineAnalyzer {
    pub fn new(registry: Arc<PatternRegistry>, dedup_capacity: usize) -> Self {
        Self {
            registry,
            dedup: DedupCache::new(dedup_capacity),
        }
    }

    /// Analyzes one line from `source`.
    ///
    /// Returns `None` when the exact line was seen before (since the last cache
    /// clear) or when no pattern matches.
    pub fn analyze(&mut self, line: &str, source: &str) -> Option<Incident> {
        metrics::counter!(m::LINES_ANALYZED_TOTAL).increment(1);

        if !self.dedup.check_and_insert(line) {
            metrics::counter!(m::LINES_SUPPRESSED_TOTAL).increment(1);
            return None;
        }

        let pattern = self.registry.first_match(line)?;
        let incident = build_incident(pattern, line, source);

        metrics::counter!(
            m::INCIDENTS_DETECTED_TOTAL,
            m::LABEL_SEVERITY => incident.severity.as_str(),
            m::LABEL_CATEGORY => incident.category.clone(),
        )
        .increment(1);

        Some(incident)
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }
}

fn build_incident(pattern: &LogPattern, line: &str, source: &str) -> Incident {
    Incident {
        log: line.trim().to_owned(),
        source: source.to_owned(),
        severity: pattern.severity,
        category: pattern.category.clone(),
        summary: summarize(&pattern.name),
        suggested_fix: pattern.suggested_fix.clone(),
        timestamp: Utc::now(),
        pattern_name: pattern.name.clone(),
    }
}

/// Human-readable summary for a pattern name.
///
/// Underscores become spaces and each run of letters is title-cased:
/// `disk_full` becomes `Disk Full detected`, `x509cert` becomes
/// `X509Cert detected`.
pub fn summarize(pattern_name: &str) -> String {
    let mut summary = String::with_capacity(pattern_name.len() + 9);
    let mut prev_is_letter = false;
    for c in pattern_name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_is_letter {
                summary.extend(c.to_lowercase());
            } else {
                summary.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            summary.push(c);
            prev_is_letter = false;
        }
    }
    summary.push_str(" detected");
    summary
}
