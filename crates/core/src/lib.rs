//! Shared building blocks for the tailwarden workspace.
//!
//! - [`types`]: domain types exchanged between watchers and delivery ([`Incident`], [`Severity`])
//! - [`pipeline`]: extension traits (where incidents go once detected)
//! - [`config`]: `tailwarden.toml` parsing, env overrides and validation
//! - [`error`]: top-level error types
//! - [`metrics`]: metric names and descriptions

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- re-exports ---

// errors
pub use error::{ConfigError, SourceError, TailwardenError};

// config
pub use config::{RejectedOverride, TailwardenConfig};

// pipeline traits
pub use pipeline::{BoxFuture, IncidentSink};

// domain types
pub use types::{Incident, Severity};
