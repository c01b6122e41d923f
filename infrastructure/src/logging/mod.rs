//! JSONL-backed adapters for the telemetry sink and state store ports.

mod state_store;
mod telemetry_sink;

pub use state_store::JsonFileStateStore;
pub use telemetry_sink::JsonlTelemetrySink;
