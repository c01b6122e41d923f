//! A single ministry's analysis of a [`crate::decision::Decision`].

use serde::{Deserialize, Serialize};

/// Closed set of ministry roles (§3, §4.2). Declaration order is the
/// contractual ordering for [`crate::session_result::SessionResult`]'s
/// assessment list (§8: "sorted in ministry enum order").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ministry {
    Fiscal,
    Legal,
    Eu,
    Health,
    Security,
    Education,
    Economy,
    Tourism,
    Environment,
    General,
}

impl Ministry {
    /// All ministries, in enum order — the fan-out set for phase 1 of the
    /// analysis pipeline.
    pub const ALL: &'static [Ministry] = &[
        Ministry::Fiscal,
        Ministry::Legal,
        Ministry::Eu,
        Ministry::Health,
        Ministry::Security,
        Ministry::Education,
        Ministry::Economy,
        Ministry::Tourism,
        Ministry::Environment,
        Ministry::General,
    ];
}

/// Closed verdict enum shared by [`Assessment`] and
/// [`crate::session_result::ParliamentDebate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    StronglyPositive,
    Positive,
    Neutral,
    Negative,
    StronglyNegative,
}

/// A ministry's optional counter-proposal, folded into
/// [`crate::session_result::SessionResult::counter_proposal`]'s synthesis
/// input (§4.2 Open Questions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProposal {
    pub title: String,
    pub summary: String,
    pub key_changes: Vec<String>,
    pub expected_benefits: Vec<String>,
    pub feasibility: String,
}

/// One ministry's analysis of one Decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub ministry: Ministry,
    pub decision_id: String,
    pub verdict: Verdict,
    /// Invariant: `1 <= score <= 10` (§3, §8).
    pub score: u8,
    pub summary: String,
    pub reasoning: String,
    pub key_concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub counter_proposal: Option<CounterProposal>,
}

/// Error constructing an [`Assessment`] whose score invariant is violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("assessment score {0} out of range [1, 10]")]
pub struct ScoreOutOfRange(pub u8);

impl Assessment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ministry: Ministry,
        decision_id: impl Into<String>,
        verdict: Verdict,
        score: u8,
        summary: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Result<Self, ScoreOutOfRange> {
        if !(1..=10).contains(&score) {
            return Err(ScoreOutOfRange(score));
        }
        Ok(Self {
            ministry,
            decision_id: decision_id.into(),
            verdict,
            score,
            summary: summary.into(),
            reasoning: reasoning.into(),
            key_concerns: Vec::new(),
            recommendations: Vec::new(),
            counter_proposal: None,
        })
    }

    /// Neutral-default fallback for `AgentParseError` on a ministry
    /// assessment — the *only* place §7 permits recovering a parse error.
    pub fn neutral_fallback(ministry: Ministry, decision_id: impl Into<String>) -> Self {
        Self {
            ministry,
            decision_id: decision_id.into(),
            verdict: Verdict::Neutral,
            score: 5,
            summary: "Assessment unavailable: agent output failed to parse.".to_string(),
            reasoning: String::new(),
            key_concerns: Vec::new(),
            recommendations: Vec::new(),
            counter_proposal: None,
        }
    }
}

/// Sort assessments into the contractual ministry-enum order (§8),
/// regardless of fan-out completion order.
pub fn sort_by_ministry_order(assessments: &mut [Assessment]) {
    assessments.sort_by_key(|a| a.ministry);
}
