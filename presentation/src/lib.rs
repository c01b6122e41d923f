//! Presentation layer for the Agora cycle engine.
//!
//! This crate contains the `clap` CLI surface (spec.md §6) and a console
//! formatter for the operator-visible stdout lines the dispatcher and
//! main loop emit alongside the structured `tracing`/telemetry output
//! (§7: "the operator sees structured lines in stdout plus the
//! telemetry/errors JSONL files").

pub mod cli;
pub mod console;

pub use cli::Cli;
pub use console::ConsoleFormatter;
