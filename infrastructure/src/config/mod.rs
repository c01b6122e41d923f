//! Configuration file loading for the agora engine.
//!
//! Handles file I/O and figment-based layering; see [`ConfigLoader`] for the
//! priority order.

mod file_config;
mod loader;

pub use file_config::FileConfig;
pub use loader::ConfigLoader;
