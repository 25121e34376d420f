//! Extension traits for the detection pipeline.

use std::future::Future;
use std::pin::Pin;

use crate::types::Incident;

/// Boxed, sendable future used by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Destination for detected incidents.
///
/// Implement this trait to route incidents somewhere new. Delivery is
/// best effort: `true` means the incident was accepted, `false` means it was
/// dropped. Failures are reported through the return value and never as a
/// panic or error, so watcher loops always continue.
pub trait IncidentSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &str;

    /// Delivers one incident.
    fn deliver<'a>(&'a self, incident: &'a Incident) -> BoxFuture<'a, bool>;
}
