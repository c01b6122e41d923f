//! The Conductor's structured plan output (§3, §4.7).

use serde::{Deserialize, Serialize};

/// Closed action vocabulary (§4.7). Unknown tags fail to parse —
/// `#[serde(deny_unknown_fields)]` is deliberately *not* used on the
/// containing struct (unknown top-level fields are tolerated per §9), but
/// an unrecognized `type` tag here is a hard `AgentParseError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    FetchNews,
    Propose,
    Debate,
    PickAndExecute { issue_number: u64 },
    Director,
    StrategicDirector,
    ResearchScout,
    Cooldown { seconds: u64 },
    Halt,
    FileIssue { title: String, description: String },
    SkipCycle,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::FetchNews => "fetch_news",
            Action::Propose => "propose",
            Action::Debate => "debate",
            Action::PickAndExecute { .. } => "pick_and_execute",
            Action::Director => "director",
            Action::StrategicDirector => "strategic_director",
            Action::ResearchScout => "research_scout",
            Action::Cooldown { .. } => "cooldown",
            Action::Halt => "halt",
            Action::FileIssue { .. } => "file_issue",
            Action::SkipCycle => "skip_cycle",
        }
    }

    /// Whether dispatching this action only reads tracker/agent state
    /// (never mutates anything external) — used by dry-run mode.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Action::Cooldown { .. } | Action::Halt | Action::SkipCycle)
    }
}

/// Maximum number of actions a plan may contain (§4.7, §8).
pub const MAX_ACTIONS: usize = 6;

/// Structured output of the Conductor (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorPlan {
    pub reasoning: String,
    pub actions: Vec<Action>,
    pub suggested_cooldown_seconds: u64,
    pub notes_for_next_cycle: String,
}

/// A plan failed validation and the fallback chain must engage (§4.7, §8).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("plan has {0} actions, exceeding the cap of {MAX_ACTIONS}")]
    TooManyActions(usize),
}

impl ConductorPlan {
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.actions.len() > MAX_ACTIONS {
            return Err(PlanValidationError::TooManyActions(self.actions.len()));
        }
        Ok(())
    }
}
