//! Log watching, pattern matching and incident delivery.
//!
//! # Modules
//!
//! - [`pattern`]: built-in and custom detection patterns, compiled once into a [`PatternRegistry`]
//! - [`dedup`]: exact-line repeat suppression
//! - [`analyzer`]: dedup check, then first-match pattern evaluation
//! - [`source`]: watchers for files, directories, containers, the journal and the Windows event log
//! - [`pipeline`]: per-watcher consumer feeding incidents to a sink
//! - [`dispatch`]: HTTP delivery with a fallback endpoint
//! - [`supervisor`]: concurrent watcher tasks and bounded shutdown
//! - [`config`]: watcher and delivery settings derived from the core config
//! - [`error`]: domain error type
//!
//! # Architecture
//!
//! ```text
//! Supervisor
//!   ├─ Watcher ──RawLine──> IncidentPipeline ─┐
//!   ├─ Watcher ──RawLine──> IncidentPipeline ─┼─> IncidentSink (IncidentDispatcher)
//!   └─ ...                                    ┘
//! ```

pub mod analyzer;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod pattern;
pub mod pipeline;
pub mod source;
pub mod supervisor;

// --- re-exports ---

// settings
pub use config::{DispatchConfig, WatcherConfig};

// errors
pub use error::WatcherError;

// patterns
pub use pattern::{LogPattern, PatternLoader, PatternRegistry, PatternsMode, default_patterns};

// analysis
pub use analyzer::LineAnalyzer;
pub use dedup::DedupCache;

// sources
pub use source::{RawLine, Watcher, WatcherKind, build_watcher};

// delivery and orchestration
pub use dispatch::IncidentDispatcher;
pub use pipeline::{IncidentPipeline, PipelineStats};
pub use supervisor::{ShutdownReport, Supervisor};
