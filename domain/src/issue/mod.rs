//! The tracker-backed backlog: [`Issue`], [`PullRequest`], the closed
//! label vocabulary, and the in-memory [`IssueState`] tagged variant that
//! translates to label add/remove at the tracker boundary only (§9: never
//! infer transitions from free-form comment content).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Mutually-exclusive lifecycle states (§4.5). Modeled as an explicit
/// in-memory tagged variant; the tracker only ever sees its label
/// projection via [`IssueState::label`]/[`IssueState::from_labels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueState {
    Proposed,
    Backlog,
    InProgress,
    Done,
    Failed,
    Rejected,
}

impl IssueState {
    /// All six state labels, in no particular priority order.
    pub const STATE_LABELS: &'static [&'static str] = &[
        "self-improve:proposed",
        "self-improve:backlog",
        "self-improve:in-progress",
        "self-improve:done",
        "self-improve:failed",
        "self-improve:rejected",
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IssueState::Proposed => "self-improve:proposed",
            IssueState::Backlog => "self-improve:backlog",
            IssueState::InProgress => "self-improve:in-progress",
            IssueState::Done => "self-improve:done",
            IssueState::Failed => "self-improve:failed",
            IssueState::Rejected => "self-improve:rejected",
        }
    }

    /// Terminal states are sticky (§4.5, §8).
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueState::Done | IssueState::Failed | IssueState::Rejected)
    }

    /// Recover the state from a label set. Returns `None` if no state
    /// label is present, and the first match (in `STATE_LABELS` order) if
    /// more than one is — callers treat that as a `StateConflict`.
    pub fn from_labels(labels: &BTreeSet<String>) -> Option<Self> {
        Self::STATE_LABELS
            .iter()
            .find(|l| labels.contains(**l))
            .and_then(|l| Self::from_label(l))
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "self-improve:proposed" => Some(IssueState::Proposed),
            "self-improve:backlog" => Some(IssueState::Backlog),
            "self-improve:in-progress" => Some(IssueState::InProgress),
            "self-improve:done" => Some(IssueState::Done),
            "self-improve:failed" => Some(IssueState::Failed),
            "self-improve:rejected" => Some(IssueState::Rejected),
            _ => None,
        }
    }
}

/// Orthogonal labels (§4.5) that route and annotate an issue independent
/// of its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Label {
    TaskAnalysis,
    TaskCodeChange,
    HumanSuggestion,
    PriorityCritical,
    PriorityHigh,
    PriorityMedium,
    PriorityLow,
    DirectorSuggestion,
    StrategySuggestion,
    ResearchScout,
    EditorialQuality,
    GapContent,
    GapTechnical,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::TaskAnalysis => "task:analysis",
            Label::TaskCodeChange => "task:code-change",
            Label::HumanSuggestion => "human-suggestion",
            Label::PriorityCritical => "priority:critical",
            Label::PriorityHigh => "priority:high",
            Label::PriorityMedium => "priority:medium",
            Label::PriorityLow => "priority:low",
            Label::DirectorSuggestion => "director-suggestion",
            Label::StrategySuggestion => "strategy-suggestion",
            Label::ResearchScout => "research-scout",
            Label::EditorialQuality => "editorial-quality",
            Label::GapContent => "gap:content",
            Label::GapTechnical => "gap:technical",
        }
    }
}

impl FromStr for Label {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task:analysis" => Ok(Label::TaskAnalysis),
            "task:code-change" => Ok(Label::TaskCodeChange),
            "human-suggestion" => Ok(Label::HumanSuggestion),
            "priority:critical" => Ok(Label::PriorityCritical),
            "priority:high" => Ok(Label::PriorityHigh),
            "priority:medium" => Ok(Label::PriorityMedium),
            "priority:low" => Ok(Label::PriorityLow),
            "director-suggestion" => Ok(Label::DirectorSuggestion),
            "strategy-suggestion" => Ok(Label::StrategySuggestion),
            "research-scout" => Ok(Label::ResearchScout),
            "editorial-quality" => Ok(Label::EditorialQuality),
            "gap:content" => Ok(Label::GapContent),
            "gap:technical" => Ok(Label::GapTechnical),
            _ => Err(()),
        }
    }
}

/// A tracker issue as seen by the engine (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: BTreeSet<String>,
    pub state: IssueOpenState,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueOpenState {
    Open,
    Closed,
}

impl Issue {
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.contains(label.as_str())
    }

    pub fn lifecycle_state(&self) -> Option<IssueState> {
        IssueState::from_labels(&self.labels)
    }

    /// The `Closes #N` token a PR body must carry to link back to this
    /// issue (§3, §6).
    pub fn closes_token(&self) -> String {
        format!("Closes #{}", self.number)
    }
}

/// PR lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// CI check status for a PR's branch (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    Pending,
}

/// One recent CI run on the main branch, as returned by the tracker's
/// "list recent CI runs" operation (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatusSummary {
    pub run_id: String,
    pub conclusion: CheckStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub branch: String,
    pub state: PrState,
    pub review_comments: Vec<String>,
    pub check_status: CheckStatus,
    pub body: String,
}

impl PullRequest {
    /// Parse the issue number this PR closes from its body's `Closes #N`
    /// token, if present (contractual with the tracker, §3/§6).
    pub fn closes_issue(&self) -> Option<u64> {
        self.body
            .lines()
            .find_map(|line| line.trim().strip_prefix("Closes #"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
    }
}
