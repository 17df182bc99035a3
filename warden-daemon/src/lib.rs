//! Warden daemon library.
//!
//! Exposes the daemon's building blocks so integration tests can drive the
//! orchestrator without spawning the binary.

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;

pub use orchestrator::Orchestrator;
