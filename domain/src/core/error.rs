//! Error-kind taxonomy (§7) and the structured error value that rides in
//! [`crate::telemetry::CyclePhaseResult`] and feeds the circuit breaker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of error kinds the engine ever classifies a failure as.
///
/// This is a *kind*, not a message — callers carry the human-readable text
/// separately in [`StructuredError::message`] so the kind stays stable for
/// the circuit breaker's `(phase, kind, normalized_message)` grouping.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("agent subprocess timed out")]
    AgentTimeout,

    #[error("agent subprocess exited non-zero or failed to spawn")]
    AgentExecError,

    #[error("agent subprocess produced no extractable text")]
    AgentEmpty,

    #[error("agent output did not parse against the expected schema")]
    AgentParseError,

    #[error("tracker call failed transiently (network, 5xx, rate-limited)")]
    TrackerTransient,

    #[error("tracker call failed non-retriably")]
    TrackerFatal,

    #[error("expected label transition precondition not met")]
    StateConflict,

    #[error("intake saw a decision id matching an existing issue")]
    DuplicateDecision,

    #[error("uncaught exception in the main loop")]
    EngineCrash,
}

impl ErrorKind {
    /// Whether this kind is retriable by the tracker adapter (§7).
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::TrackerTransient)
    }
}

/// A classified failure, attached to a [`crate::telemetry::CyclePhaseResult`]
/// or appended to the `errors.jsonl` sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub message: String,
    pub truncated_stack: Option<String>,
}

impl StructuredError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            truncated_stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.truncated_stack = Some(crate::core::string::truncate(&stack.into(), 2000));
        self
    }

    /// Normalize the message for circuit-breaker grouping: trim, collapse
    /// to 200 chars, and strip tokens that vary run-to-run (timestamps,
    /// absolute paths, pids) so that semantically-identical failures group
    /// together even when incidental details differ.
    pub fn normalized_message(&self) -> String {
        normalize_message(&self.message)
    }
}

fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            // Collapse any run of digits (timestamps, pids, line numbers)
            // into a single placeholder so messages that differ only by a
            // number still normalize to the same triple.
            out.push('#');
            while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
                chars.next();
            }
        } else if c == '/' || c == '\\' {
            // Collapse path separators the same way; a distinct temp path
            // per run shouldn't split an otherwise-identical error.
            out.push('/');
            while matches!(chars.peek(), Some(p) if p.is_alphanumeric() || *p == '_' || *p == '-' || *p == '.' || *p == '/' || *p == '\\')
            {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    crate::core::string::truncate(out.trim(), 200)
}
