//! Port definitions — the contracts infrastructure adapters must implement.

pub mod agent_runner;
pub mod state_store;
pub mod telemetry_sink;
pub mod tracker;

pub use agent_runner::{AgentInvocation, AgentOutcome, AgentRunError, AgentRunnerPort};
pub use state_store::StateStorePort;
pub use telemetry_sink::TelemetrySinkPort;
pub use tracker::{TrackerError, TrackerPort};
