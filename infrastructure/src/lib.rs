//! Infrastructure layer for the Agora cycle engine.
//!
//! Adapters implementing the application layer's ports: a subprocess
//! agent runner, a `gh`-backed issue tracker, JSONL telemetry/state
//! storage, figment-layered config loading, and the self-restart re-exec
//! sequence.

pub mod agent_runner;
pub mod config;
pub mod logging;
pub mod reference;
pub mod self_restart;

pub use agent_runner::{SubprocessAgentRunner, NESTED_SESSION_VAR};
pub use config::{ConfigLoader, FileConfig};
pub use logging::{JsonFileStateStore, JsonlTelemetrySink};
pub use reference::GhTracker;
pub use self_restart::ProcessRestartOps;
