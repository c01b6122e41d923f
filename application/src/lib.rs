//! Application layer for the Agora cycle engine.
//!
//! Ports (traits implemented by infrastructure adapters) and use cases
//! (the orchestration logic that calls them). Depends only on the domain
//! layer plus the async runtime and serialization crates needed to define
//! those traits.

pub mod config;
pub mod ports;
pub mod use_cases;

pub use config::EngineConfig;
