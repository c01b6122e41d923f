//! Phase 2/3 outputs of the analysis pipeline and their aggregation into a
//! [`SessionResult`] (§3, §4.2).

use crate::assessment::{sort_by_ministry_order, Assessment, Verdict};
use serde::{Deserialize, Serialize};

/// Synthesis across all surviving assessments for one Decision, produced
/// by the parliament agent in phase 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParliamentDebate {
    pub decision_id: String,
    pub consensus_summary: String,
    pub disagreements: Vec<String>,
    pub overall_verdict: Verdict,
    pub debate_transcript: String,
}

/// Independent scoring produced by the critic agent in phase 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticReport {
    pub decision_id: String,
    /// Invariant: `1 <= decision_score <= 10`.
    pub decision_score: u8,
    /// Invariant: `1 <= assessment_quality_score <= 10`.
    pub assessment_quality_score: u8,
    pub blind_spots: Vec<String>,
    pub overall_analysis: String,
    pub headline: String,
    pub eu_chapter_relevance: Vec<String>,
}

/// Error constructing a [`CriticReport`] whose score invariant is violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("critic score {0} out of range [1, 10]")]
pub struct ScoreOutOfRange(pub u8);

impl CriticReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decision_id: impl Into<String>,
        decision_score: u8,
        assessment_quality_score: u8,
        blind_spots: Vec<String>,
        overall_analysis: impl Into<String>,
        headline: impl Into<String>,
        eu_chapter_relevance: Vec<String>,
    ) -> Result<Self, ScoreOutOfRange> {
        if !(1..=10).contains(&decision_score) {
            return Err(ScoreOutOfRange(decision_score));
        }
        if !(1..=10).contains(&assessment_quality_score) {
            return Err(ScoreOutOfRange(assessment_quality_score));
        }
        Ok(Self {
            decision_id: decision_id.into(),
            decision_score,
            assessment_quality_score,
            blind_spots,
            overall_analysis: overall_analysis.into(),
            headline: headline.into(),
            eu_chapter_relevance,
        })
    }
}

/// Unified alternative produced by the synthesizer agent in phase 3, only
/// when at least one ministry offered a counter-proposal (§9 Open
/// Questions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedCounterProposal {
    pub decision_id: String,
    pub title: String,
    pub executive_summary: String,
    pub detailed_proposal: String,
    pub ministry_contributions: Vec<String>,
    pub key_differences: Vec<String>,
    pub implementation_steps: Vec<String>,
    pub risks_and_tradeoffs: Vec<String>,
}

/// Aggregation of every phase's output for one Decision, plus an optional
/// link back to the tracker issue it was filed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub decision_id: String,
    /// Always sorted in ministry enum order (§8), independent of the
    /// completion order of the phase-1 fan-out.
    pub assessments: Vec<Assessment>,
    pub parliament: Option<ParliamentDebate>,
    pub critic: Option<CriticReport>,
    pub counter_proposal: Option<UnifiedCounterProposal>,
    pub tracker_issue_number: Option<u64>,
}

/// The analysis pipeline failed to produce even one surviving assessment
/// (§4.2: "at least one Assessment must be present or the Decision fails
/// with `AnalysisEmpty`").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no ministry produced an assessment for decision {0}")]
pub struct AnalysisEmpty(pub String);

impl SessionResult {
    pub fn new(
        decision_id: impl Into<String>,
        mut assessments: Vec<Assessment>,
    ) -> Result<Self, AnalysisEmpty> {
        let decision_id = decision_id.into();
        if assessments.is_empty() {
            return Err(AnalysisEmpty(decision_id));
        }
        sort_by_ministry_order(&mut assessments);
        Ok(Self {
            decision_id,
            assessments,
            parliament: None,
            critic: None,
            counter_proposal: None,
            tracker_issue_number: None,
        })
    }

    pub fn with_parliament(mut self, parliament: ParliamentDebate) -> Self {
        self.parliament = Some(parliament);
        self
    }

    pub fn with_critic(mut self, critic: CriticReport) -> Self {
        self.critic = Some(critic);
        self
    }

    pub fn with_counter_proposal(mut self, proposal: UnifiedCounterProposal) -> Self {
        self.counter_proposal = Some(proposal);
        self
    }

    pub fn with_tracker_issue(mut self, number: u64) -> Self {
        self.tracker_issue_number = Some(number);
        self
    }
}
