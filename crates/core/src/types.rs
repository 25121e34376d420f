//! Domain types shared by every crate in the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incident severity
///
/// Serialized in lowercase (`"critical"`, `"high"`, ...), which is the form
/// both delivery endpoints expect. `Ord` follows urgency:
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth a look
    Low,
    /// Degraded but serving
    Medium,
    /// Likely user-visible
    High,
    /// Outage or data loss in progress
    Critical,
}

impl Severity {
    /// Parses a severity name, ignoring case.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Lowercase name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected problematic log line.
///
/// Serializes to the primary webhook payload:
/// `{log, source, severity, category, summary, suggested_fix, timestamp, pattern_name}`.
/// Incidents carry no identity beyond their content and are never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Trimmed original line
    pub log: String,
    /// Originating source (file path, `docker:<name>`, `systemd:<unit>`, ...)
    pub source: String,
    /// Severity of the matched pattern
    pub severity: Severity,
    /// Category of the matched pattern (database, memory, disk, ...)
    pub category: String,
    /// Human-readable summary derived from the pattern name
    pub summary: String,
    /// Remediation hint, if the pattern has one
    pub suggested_fix: Option<String>,
    /// Detection time
    pub timestamp: DateTime<Utc>,
    /// Name of the matched pattern
    pub pattern_name: String,
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) from {}",
            self.severity, self.summary, self.pattern_name, self.source,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_incident() -> Incident {
        Incident {
            log: "FATAL: too many connections".to_owned(),
            source: "/var/log/postgresql/postgresql.log".to_owned(),
            severity: Severity::Critical,
            category: "database".to_owned(),
            summary: "Postgres Connection Exhausted detected".to_owned(),
            suggested_fix: None,
            timestamp: Utc::now(),
            pattern_name: "postgres_connection_exhausted".to_owned(),
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(serde_json::to_string(&Severity::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str_loose("crit"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("info"), None);
    }

    #[test]
    fn incident_serializes_primary_payload_fields() {
        let value = serde_json::to_value(sample_incident()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "log",
            "source",
            "severity",
            "category",
            "summary",
            "suggested_fix",
            "timestamp",
            "pattern_name",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj.len(), 8);
        assert_eq!(obj["severity"], "critical");
        assert!(obj["suggested_fix"].is_null());
    }

    #[test]
    fn incident_display_mentions_pattern_and_source() {
        let text = sample_incident().to_string();
        assert!(text.contains("postgres_connection_exhausted"));
        assert!(text.contains("postgresql.log"));
        assert!(text.starts_with("[critical]"));
    }
}
