//! Per-cycle telemetry (§3, §4.8). Append-only and owned exclusively by
//! the engine.

use crate::core::error::StructuredError;
use serde::{Deserialize, Serialize};

/// One executed action within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclePhaseResult {
    pub action: String,
    pub started_at: String,
    pub ended_at: String,
    pub success: bool,
    pub error: Option<StructuredError>,
}

impl CyclePhaseResult {
    pub fn ok(action: impl Into<String>, started_at: impl Into<String>, ended_at: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            started_at: started_at.into(),
            ended_at: ended_at.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(
        action: impl Into<String>,
        started_at: impl Into<String>,
        ended_at: impl Into<String>,
        error: StructuredError,
    ) -> Self {
        Self {
            action: action.into(),
            started_at: started_at.into(),
            ended_at: ended_at.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Observable public output of a cycle (glossary: "Yield").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldKind {
    None,
    PrMerged,
    AnalysisPublished,
}

/// One cycle record, appended as one JSON line to `telemetry.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleTelemetry {
    pub cycle_number: u64,
    pub started_at: String,
    pub ended_at: String,
    pub productive: bool,
    pub phases: Vec<CyclePhaseResult>,
    pub conductor_reasoning: String,
    pub conductor_actions: Vec<String>,
    pub conductor_fallback: bool,
    pub yield_kind: YieldKind,
}

impl CycleTelemetry {
    /// Construct a record, deriving `productive` from `yield_kind` so the
    /// two fields can never disagree (§8).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cycle_number: u64,
        started_at: impl Into<String>,
        ended_at: impl Into<String>,
        phases: Vec<CyclePhaseResult>,
        conductor_reasoning: impl Into<String>,
        conductor_actions: Vec<String>,
        conductor_fallback: bool,
        yield_kind: YieldKind,
    ) -> Self {
        Self {
            cycle_number,
            started_at: started_at.into(),
            ended_at: ended_at.into(),
            productive: yield_kind != YieldKind::None,
            phases,
            conductor_reasoning: conductor_reasoning.into(),
            conductor_actions,
            conductor_fallback,
            yield_kind,
        }
    }

    pub fn to_jsonl_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
