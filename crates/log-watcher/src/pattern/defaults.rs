//! Built-in pattern library
//!
//! Twenty rules covering database, memory, disk, network, auth, TLS,
//! application and container failure signatures. Order matters: evaluation is
//! first-match-wins, so the specific `uncaught_exception` rule sits ahead of
//! the generic `application_error` one.

use tailwarden_core::types::Severity;

use super::LogPattern;

/// Returns the built-in patterns in evaluation order.
pub fn default_patterns() -> Vec<LogPattern> {
    vec![
        // ─── database ────────────────────────────────────────────────
        LogPattern::new(
            "postgres_connection_exhausted",
            r"(FATAL|ERROR).*connection.*pool.*exhausted|too many connections|max_connections",
            Severity::Critical,
            "database",
        )
        .with_fix("Increase max_connections in postgresql.conf or optimize connection pooling"),
        LogPattern::new(
            "mysql_connection_error",
            r"(ERROR|FATAL).*Can't connect to MySQL|Too many connections|Connection refused.*mysql",
            Severity::Critical,
            "database",
        )
        .with_fix("Check MySQL service status and connection limits"),
        LogPattern::new(
            "database_timeout",
            r"(ERROR|WARN).*database.*timeout|query.*timeout|connection.*timed out",
            Severity::High,
            "database",
        )
        .with_fix("Optimize slow queries or increase timeout thresholds"),
        // ─── memory ──────────────────────────────────────────────────
        LogPattern::new(
            "oom_killer",
            r"Out of memory|OOM.*killer|Cannot allocate memory|oom-kill",
            Severity::Critical,
            "memory",
        )
        .with_fix("Increase memory limits or optimize application memory usage"),
        LogPattern::new(
            "memory_high",
            r"memory.*usage.*(9[0-9]|100)%|heap.*overflow|memory.*pressure",
            Severity::High,
            "memory",
        )
        .with_fix("Scale up memory resources or identify memory leaks"),
        // ─── disk ────────────────────────────────────────────────────
        LogPattern::new(
            "disk_full",
            r"No space left on device|disk.*full|filesystem.*full|out of disk space",
            Severity::Critical,
            "disk",
        )
        .with_fix("Clean up disk space or expand storage volume"),
        LogPattern::new(
            "disk_warning",
            r"disk.*usage.*(8[5-9]|9[0-9])%|low disk space|disk.*nearly full",
            Severity::High,
            "disk",
        )
        .with_fix("Monitor disk usage and plan cleanup or expansion"),
        // ─── network ─────────────────────────────────────────────────
        LogPattern::new(
            "connection_refused",
            r"Connection refused|ECONNREFUSED|connection.*reset.*peer",
            Severity::High,
            "network",
        )
        .with_fix("Check if target service is running and firewall rules"),
        LogPattern::new(
            "network_timeout",
            r"(connection|read|write).*timeout|ETIMEDOUT|network.*unreachable",
            Severity::High,
            "network",
        )
        .with_fix("Check network connectivity and increase timeout if needed"),
        LogPattern::new(
            "dns_failure",
            r"DNS.*resolution.*failed|could not resolve|ENOTFOUND|name or service not known",
            Severity::High,
            "network",
        )
        .with_fix("Check DNS configuration and resolver settings"),
        // ─── auth ────────────────────────────────────────────────────
        LogPattern::new(
            "auth_failure",
            r"authentication.*failed|invalid.*credentials|access.*denied|unauthorized|401.*Unauthorized",
            Severity::High,
            "auth",
        )
        .with_fix("Check credentials and authentication configuration"),
        LogPattern::new(
            "permission_denied",
            r"permission denied|EACCES|403.*Forbidden|access.*forbidden",
            Severity::Medium,
            "auth",
        )
        .with_fix("Check file/resource permissions and ownership"),
        // ─── tls ─────────────────────────────────────────────────────
        LogPattern::new(
            "ssl_certificate_expired",
            r"certificate.*expired|SSL.*certificate.*not valid|certificate.*verify.*failed",
            Severity::Critical,
            "network",
        )
        .with_fix("Renew SSL certificate immediately"),
        LogPattern::new(
            "ssl_certificate_expiring",
            r"certificate.*expir(ing|es)|SSL.*expir",
            Severity::High,
            "network",
        )
        .with_fix("Schedule SSL certificate renewal"),
        // ─── application ─────────────────────────────────────────────
        LogPattern::new(
            "uncaught_exception",
            r"uncaught.*exception|unhandled.*rejection|FATAL.*error|panic:|segmentation fault",
            Severity::Critical,
            "application",
        )
        .with_fix("Review application logs and fix the root cause"),
        LogPattern::new(
            "application_error",
            r"ERROR.*Exception|error.*stack.*trace|failed to (start|initialize|connect)",
            Severity::High,
            "application",
        )
        .with_fix("Check application logs for detailed error information"),
        // ─── containers ──────────────────────────────────────────────
        LogPattern::new(
            "container_crash",
            r"container.*crash|CrashLoopBackOff|OOMKilled|container.*died",
            Severity::Critical,
            "application",
        )
        .with_fix("Check container logs and resource limits"),
        LogPattern::new(
            "pod_failure",
            r"pod.*failed|ImagePullBackOff|ErrImagePull|pod.*evicted",
            Severity::High,
            "application",
        )
        .with_fix("Check Kubernetes pod status and events"),
        // ─── availability ────────────────────────────────────────────
        LogPattern::new(
            "service_unavailable",
            r"503.*Service.*Unavailable|service.*down|health.*check.*failed",
            Severity::Critical,
            "application",
        )
        .with_fix("Check service status and restart if necessary"),
        LogPattern::new(
            "high_latency",
            r"(request|response).*latency.*(high|exceeded)|slow.*query|timeout.*exceeded",
            Severity::Medium,
            "application",
        )
        .with_fix("Investigate performance bottlenecks"),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ships_twenty_patterns() {
        assert_eq!(default_patterns().len(), 20);
    }

    #[test]
    fn names_are_unique() {
        let patterns = default_patterns();
        let names: HashSet<_> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), patterns.len());
    }

    #[test]
    fn every_pattern_has_a_fix() {
        for pattern in default_patterns() {
            assert!(
                pattern.suggested_fix.is_some(),
                "pattern {} has no suggested fix",
                pattern.name
            );
        }
    }

    #[test]
    fn order_is_stable() {
        let names: Vec<String> = default_patterns().into_iter().map(|p| p.name).collect();
        assert_eq!(names.first().map(String::as_str), Some("postgres_connection_exhausted"));
        assert_eq!(names.last().map(String::as_str), Some("high_latency"));
        let uncaught = names.iter().position(|n| n == "uncaught_exception");
        let generic = names.iter().position(|n| n == "application_error");
        assert!(uncaught < generic);
    }

    #[test]
    fn categories_are_canonical() {
        let allowed = ["database", "memory", "disk", "network", "auth", "application"];
        for pattern in default_patterns() {
            assert!(allowed.contains(&pattern.category.as_str()), "{}", pattern.name);
        }
    }
}
