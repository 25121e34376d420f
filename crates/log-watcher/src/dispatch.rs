//! Incident dispatcher -- primary webhook with a fallback intake endpoint
//!
//! Each incident gets exactly one primary attempt and, if that fails, one
//! fallback attempt. There is no queue and no retry beyond that: an incident
//! both endpoints refuse is logged and dropped.
//!
//! | Endpoint | Body | Success |
//! |---|---|---|
//! | primary | full [`Incident`] | `200 OK` |
//! | fallback | [`FallbackPayload`] | `201 Created` |
//!
//! Both requests share the configured timeout and carry `x-api-key` when an
//! API key is configured.

use std::time::Instant;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use tailwarden_core::metrics as m;
use tailwarden_core::pipeline::{BoxFuture, IncidentSink};
use tailwarden_core::types::{Incident, Severity};

use crate::config::DispatchConfig;
use crate::error::WatcherError;

const API_KEY_HEADER: &str = "x-api-key";

/// Re-shaped incident accepted by the fallback intake service
#[derive(Debug, Serialize)]
pub struct FallbackPayload<'a> {
    pub severity: Severity,
    pub category: &'a str,
    pub summary: &'a str,
    /// Same as `raw_log`
    pub description: &'a str,
    pub suggested_fix: Option<&'a str>,
    pub source: &'a str,
    pub raw_log: &'a str,
}

impl<'a> From<&'a Incident> for FallbackPayload<'a> {
    fn from(incident: &'a Incident) -> Self {
        Self {
            severity: incident.severity,
            category: &incident.category,
            summary: &incident.summary,
            description: &incident.log,
            suggested_fix: incident.suggested_fix.as_deref(),
            source: &incident.source,
            raw_log: &incident.log,
        }
    }
}

/// HTTP incident delivery
#[derive(Debug, Clone)]
pub struct IncidentDispatcher {
    client: Client,
    config: DispatchConfig,
}

impl IncidentDispatcher {
    /// # Errors
    /// Returns `Config` when the HTTP client cannot be built.
    pub fn new(config: DispatchConfig) -> Result<Self, WatcherError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WatcherError::Config {
                field: "delivery".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// Delivers one incident, falling back when the primary endpoint fails.
    ///
    /// Returns `true` if either endpoint accepted it. Never errors.
    pub async fn deliver(&self, incident: &Incident) -> bool {
        let started = Instant::now();

        let delivered = match self
            .post("primary", &self.config.webhook_url, incident, StatusCode::OK)
            .await
        {
            Ok(()) => {
                info!(summary = %incident.summary, source = %incident.source, "incident sent to webhook");
                true
            }
            Err(primary_err) => {
                warn!(error = %primary_err, "primary delivery failed, trying fallback");
                let payload = FallbackPayload::from(incident);
                match self
                    .post(
                        "fallback",
                        &self.config.fallback_url,
                        &payload,
                        StatusCode::CREATED,
                    )
                    .await
                {
                    Ok(()) => {
                        info!(summary = %incident.summary, source = %incident.source, "incident sent to fallback intake");
                        true
                    }
                    Err(fallback_err) => {
                        warn!(
                            error = %fallback_err,
                            pattern = %incident.pattern_name,
                            source = %incident.source,
                            "incident dropped, both endpoints failed"
                        );
                        false
                    }
                }
            }
        };

        metrics::histogram!(m::DELIVERY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        delivered
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        url: &str,
        body: &T,
        expected: StatusCode,
    ) -> Result<(), WatcherError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let result = match request.send().await {
            Ok(response) if response.status() == expected => Ok(()),
            Ok(response) => Err(WatcherError::Delivery {
                endpoint: endpoint.to_owned(),
                reason: format!("unexpected status {} from {url}", response.status()),
            }),
            Err(e) => Err(WatcherError::Delivery {
                endpoint: endpoint.to_owned(),
                reason: if e.is_timeout() {
                    format!("timed out after {:?} posting to {url}", self.config.timeout)
                } else {
                    format!("request to {url} failed: {e}")
                },
            }),
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        debug!(endpoint, url, outcome, "delivery attempt");
        metrics::counter!(
            m::DELIVERIES_TOTAL,
            m::LABEL_ENDPOINT => endpoint,
            m::LABEL_RESULT => outcome,
        )
        .increment(1);

        result
    }
}

impl IncidentSink for IncidentDispatcher {
    fn name(&self) -> &str {
        "http"
    }

    fn deliver<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, bool> {
        Box::pin(IncidentDispatcher::deliver(self, incident))
    }
}
