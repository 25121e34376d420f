//! tailwarden daemon library.
//!
//! Exposes the binary's modules for integration testing. In production the
//! `tailwarden` binary (main.rs) is used.

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
