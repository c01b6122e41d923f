//! Analysis pipeline ("Orchestrator"): one Decision in, one SessionResult
//! out, through a three-phase DAG.
//!
//! Phase 1 fans out to every configured ministry in parallel. Phase 2 fans
//! out to the parliament and critic agents in parallel. Phase 3 runs the
//! synthesizer sequentially, and only if at least one surviving Assessment
//! carried a counter-proposal. The fan-out/join shape mirrors the teacher's
//! quorum phases: spawn a `JoinSet`, await everything, then proceed.

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{
    Assessment, CriticReport, Decision, Ministry, ParliamentDebate, SessionResult,
    UnifiedCounterProposal,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ports::agent_runner::{AgentInvocation, AgentRunnerPort};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no ministry produced a usable assessment")]
    AnalysisEmpty,
}

/// Prompt templates are external inputs (§1 non-goals); the pipeline only
/// knows how to slot a ministry name and the Decision's text into them.
pub struct AnalysisPrompts {
    pub ministry_system_prompt: String,
    pub parliament_system_prompt: String,
    pub critic_system_prompt: String,
    pub synthesizer_system_prompt: String,
}

pub struct AnalysisPipeline {
    agent_runner: Arc<dyn AgentRunnerPort>,
    prompts: AnalysisPrompts,
    model: String,
    agent_timeout: Duration,
}

#[derive(Deserialize)]
struct MinistryOutput {
    verdict: agora_domain::Verdict,
    score: u8,
    summary: String,
    reasoning: String,
    #[serde(default)]
    key_concerns: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    counter_proposal: Option<agora_domain::MinistryCounterProposal>,
}

#[derive(Deserialize)]
struct ParliamentOutput {
    consensus_summary: String,
    #[serde(default)]
    disagreements: Vec<String>,
    overall_verdict: agora_domain::Verdict,
    debate_transcript: String,
}

#[derive(Deserialize)]
struct CriticOutput {
    decision_score: u8,
    assessment_quality_score: u8,
    #[serde(default)]
    blind_spots: Vec<String>,
    overall_analysis: String,
    headline: String,
    #[serde(default)]
    eu_chapter_relevance: Vec<String>,
}

#[derive(Deserialize)]
struct SynthesizerOutput {
    title: String,
    executive_summary: String,
    detailed_proposal: String,
    #[serde(default)]
    ministry_contributions: Vec<String>,
    #[serde(default)]
    key_differences: Vec<String>,
    #[serde(default)]
    implementation_steps: Vec<String>,
    #[serde(default)]
    risks_and_tradeoffs: Vec<String>,
}

impl AnalysisPipeline {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        prompts: AnalysisPrompts,
        model: impl Into<String>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            agent_runner,
            prompts,
            model: model.into(),
            agent_timeout,
        }
    }

    /// Run the full pipeline for one Decision. Phase 1 failures are
    /// tolerated individually; the pipeline only fails outright if every
    /// ministry failed (`AnalysisEmpty`, §4.2).
    pub async fn run(&self, decision: &Decision) -> Result<SessionResult, AnalysisError> {
        let assessments = self.phase_ministries(decision).await;
        if assessments.is_empty() {
            return Err(AnalysisError::AnalysisEmpty);
        }

        let (parliament, critic) = self.phase_parliament_and_critic(decision, &assessments).await;

        let has_counter_proposal = assessments.iter().any(|a| a.counter_proposal.is_some());
        let counter_proposal = if has_counter_proposal {
            self.phase_synthesizer(decision, &assessments, parliament.as_ref())
                .await
        } else {
            None
        };

        let mut result = SessionResult::new(decision.id.clone(), assessments)
            .expect("non-empty assessments checked above");
        if let Some(p) = parliament {
            result = result.with_parliament(p);
        }
        if let Some(c) = critic {
            result = result.with_critic(c);
        }
        if let Some(cp) = counter_proposal {
            result = result.with_counter_proposal(cp);
        }
        Ok(result)
    }

    async fn phase_ministries(&self, decision: &Decision) -> Vec<Assessment> {
        let mut joinset = JoinSet::new();
        for ministry in Ministry::ALL {
            let ministry = *ministry;
            let runner = Arc::clone(&self.agent_runner);
            let invocation = AgentInvocation::new(
                self.prompts.ministry_system_prompt.clone(),
                format!(
                    "Ministry: {:?}\nTitle: {}\nSummary: {}\nFull text: {}",
                    ministry, decision.title, decision.summary, decision.full_text
                ),
                self.model.clone(),
            )
            .with_timeout(self.agent_timeout);

            joinset.spawn(async move {
                let outcome = runner.run(invocation).await;
                (ministry, outcome)
            });
        }

        let mut assessments = Vec::new();
        while let Some(joined) = joinset.join_next().await {
            let (ministry, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    warn!("ministry task panicked: {e}");
                    continue;
                }
            };
            match outcome {
                Ok(text) => match parse_ministry_output(ministry, decision, &text.assistant_text) {
                    Some(assessment) => assessments.push(assessment),
                    None => {
                        warn!(?ministry, "ministry output failed to parse, using neutral fallback");
                        assessments.push(Assessment::neutral_fallback(ministry, decision.id.clone()));
                    }
                },
                Err(e) => {
                    warn!(?ministry, error = %e, "ministry invocation failed");
                }
            }
        }

        agora_domain::assessment::sort_by_ministry_order(&mut assessments);
        assessments
    }

    async fn phase_parliament_and_critic(
        &self,
        decision: &Decision,
        assessments: &[Assessment],
    ) -> (Option<ParliamentDebate>, Option<CriticReport>) {
        let assessments_json =
            serde_json::to_string(assessments).unwrap_or_else(|_| "[]".to_string());

        let parliament_runner = Arc::clone(&self.agent_runner);
        let parliament_invocation = AgentInvocation::new(
            self.prompts.parliament_system_prompt.clone(),
            format!("Assessments: {assessments_json}"),
            self.model.clone(),
        )
        .with_timeout(self.agent_timeout);

        let critic_runner = Arc::clone(&self.agent_runner);
        let critic_invocation = AgentInvocation::new(
            self.prompts.critic_system_prompt.clone(),
            format!(
                "Decision title: {}\nAssessments: {}",
                decision.title, assessments_json
            ),
            self.model.clone(),
        )
        .with_timeout(self.agent_timeout);

        let mut joinset = JoinSet::new();
        joinset.spawn(async move { ("parliament", parliament_runner.run(parliament_invocation).await) });
        joinset.spawn(async move { ("critic", critic_runner.run(critic_invocation).await) });

        let mut parliament = None;
        let mut critic = None;
        while let Some(joined) = joinset.join_next().await {
            let (which, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    warn!("phase-2 task panicked: {e}");
                    continue;
                }
            };
            match (which, outcome) {
                ("parliament", Ok(text)) => {
                    parliament = parse_parliament_output(decision, &text.assistant_text);
                }
                ("critic", Ok(text)) => {
                    critic = parse_critic_output(decision, &text.assistant_text);
                }
                (which, Err(e)) => warn!(which, error = %e, "phase-2 invocation failed"),
                _ => unreachable!(),
            }
        }

        (parliament, critic)
    }

    async fn phase_synthesizer(
        &self,
        decision: &Decision,
        assessments: &[Assessment],
        parliament: Option<&ParliamentDebate>,
    ) -> Option<UnifiedCounterProposal> {
        let counter_proposals: Vec<_> = assessments
            .iter()
            .filter_map(|a| a.counter_proposal.as_ref())
            .collect();
        let parliament_json = parliament
            .map(|p| serde_json::to_string(p).unwrap_or_default())
            .unwrap_or_default();
        let invocation = AgentInvocation::new(
            self.prompts.synthesizer_system_prompt.clone(),
            format!(
                "Ministry counter-proposals: {}\nParliament: {}",
                serde_json::to_string(&counter_proposals).unwrap_or_default(),
                parliament_json
            ),
            self.model.clone(),
        )
        .with_timeout(self.agent_timeout);

        match self.agent_runner.run(invocation).await {
            Ok(text) => parse_synthesizer_output(decision, &text.assistant_text),
            Err(e) => {
                info!(error = %e, "synthesizer failed, counter_proposal left null");
                None
            }
        }
    }
}

fn parse_ministry_output(
    ministry: Ministry,
    decision: &Decision,
    text: &str,
) -> Option<Assessment> {
    let parsed: MinistryOutput = serde_json::from_str(text).ok()?;
    let mut assessment = Assessment::new(
        ministry,
        decision.id.clone(),
        parsed.verdict,
        parsed.score,
        parsed.summary,
        parsed.reasoning,
    )
    .ok()?;
    assessment.key_concerns = parsed.key_concerns;
    assessment.recommendations = parsed.recommendations;
    assessment.counter_proposal = parsed.counter_proposal;
    Some(assessment)
}

fn parse_parliament_output(decision: &Decision, text: &str) -> Option<ParliamentDebate> {
    let parsed: ParliamentOutput = serde_json::from_str(text).ok()?;
    Some(ParliamentDebate {
        decision_id: decision.id.clone(),
        consensus_summary: parsed.consensus_summary,
        disagreements: parsed.disagreements,
        overall_verdict: parsed.overall_verdict,
        debate_transcript: parsed.debate_transcript,
    })
}

fn parse_critic_output(decision: &Decision, text: &str) -> Option<CriticReport> {
    let parsed: CriticOutput = serde_json::from_str(text).ok()?;
    CriticReport::new(
        decision.id.clone(),
        parsed.decision_score,
        parsed.assessment_quality_score,
        parsed.blind_spots,
        parsed.overall_analysis,
        parsed.headline,
        parsed.eu_chapter_relevance,
    )
    .ok()
}

fn parse_synthesizer_output(decision: &Decision, text: &str) -> Option<UnifiedCounterProposal> {
    let parsed: SynthesizerOutput = serde_json::from_str(text).ok()?;
    Some(UnifiedCounterProposal {
        decision_id: decision.id.clone(),
        title: parsed.title,
        executive_summary: parsed.executive_summary,
        detailed_proposal: parsed.detailed_proposal,
        ministry_contributions: parsed.ministry_contributions,
        key_differences: parsed.key_differences,
        implementation_steps: parsed.implementation_steps,
        risks_and_tradeoffs: parsed.risks_and_tradeoffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_runner::{AgentOutcome, AgentRunError};
    use agora_domain::Category;
    use async_trait::async_trait;

    /// Routes every invocation by a substring of its system prompt, since
    /// phase 1 and phase 2 fan out concurrently and arrive in no fixed
    /// order.
    struct RoutedAgentRunner {
        ministry: &'static str,
        parliament: &'static str,
        critic: &'static str,
        synthesizer: &'static str,
    }

    #[async_trait]
    impl AgentRunnerPort for RoutedAgentRunner {
        async fn run(&self, invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            let text = if invocation.system_prompt == "ministry" {
                self.ministry
            } else if invocation.system_prompt == "parliament" {
                self.parliament
            } else if invocation.system_prompt == "critic" {
                self.critic
            } else {
                self.synthesizer
            };
            Ok(AgentOutcome {
                assistant_text: text.to_string(),
            })
        }
    }

    fn prompts() -> AnalysisPrompts {
        AnalysisPrompts {
            ministry_system_prompt: "ministry".to_string(),
            parliament_system_prompt: "parliament".to_string(),
            critic_system_prompt: "critic".to_string(),
            synthesizer_system_prompt: "synthesizer".to_string(),
        }
    }

    fn decision() -> Decision {
        Decision::new(
            "New VAT rate",
            "summary",
            "full text",
            "2026-03-15",
            "https://example.gov/vat",
            Category::Fiscal,
        )
    }

    const MINISTRY_OK: &str = r#"{"verdict":"positive","score":7,"summary":"s","reasoning":"r"}"#;
    const PARLIAMENT_OK: &str =
        r#"{"consensus_summary":"c","overall_verdict":"positive","debate_transcript":"t"}"#;
    const CRITIC_OK: &str =
        r#"{"decision_score":8,"assessment_quality_score":7,"overall_analysis":"a","headline":"h"}"#;

    #[tokio::test]
    async fn every_ministry_contributes_when_all_agents_succeed() {
        let runner = Arc::new(RoutedAgentRunner {
            ministry: MINISTRY_OK,
            parliament: PARLIAMENT_OK,
            critic: CRITIC_OK,
            synthesizer: "{}",
        });
        let pipeline = AnalysisPipeline::new(runner, prompts(), "model", Duration::from_secs(1));

        let result = pipeline.run(&decision()).await.unwrap();
        assert_eq!(result.assessments.len(), Ministry::ALL.len());
        assert!(result.parliament.is_some());
        assert!(result.critic.is_some());
        assert!(result.counter_proposal.is_none());
    }

    #[tokio::test]
    async fn unparseable_ministry_output_falls_back_to_neutral_instead_of_dropping() {
        let runner = Arc::new(RoutedAgentRunner {
            ministry: "not json",
            parliament: PARLIAMENT_OK,
            critic: CRITIC_OK,
            synthesizer: "{}",
        });
        let pipeline = AnalysisPipeline::new(runner, prompts(), "model", Duration::from_secs(1));

        let result = pipeline.run(&decision()).await.unwrap();
        assert_eq!(result.assessments.len(), Ministry::ALL.len());
        assert!(result.assessments.iter().all(|a| a.verdict == agora_domain::Verdict::Neutral));
    }

    #[tokio::test]
    async fn synthesizer_only_runs_when_a_ministry_carried_a_counter_proposal() {
        struct CountingSynth {
            inner: RoutedAgentRunner,
            synth_calls: std::sync::atomic::AtomicU32,
        }
        #[async_trait]
        impl AgentRunnerPort for CountingSynth {
            async fn run(&self, invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
                if invocation.system_prompt == "synthesizer" {
                    self.synth_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
                self.inner.run(invocation).await
            }
        }

        let runner = Arc::new(CountingSynth {
            inner: RoutedAgentRunner {
                ministry: MINISTRY_OK,
                parliament: PARLIAMENT_OK,
                critic: CRITIC_OK,
                synthesizer: r#"{"title":"t","executive_summary":"e","detailed_proposal":"d"}"#,
            },
            synth_calls: std::sync::atomic::AtomicU32::new(0),
        });
        let pipeline = AnalysisPipeline::new(Arc::clone(&runner) as Arc<dyn AgentRunnerPort>, prompts(), "model", Duration::from_secs(1));

        let result = pipeline.run(&decision()).await.unwrap();
        assert_eq!(result.counter_proposal, None);
        assert_eq!(runner.synth_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analysis_empty_when_every_ministry_invocation_fails_to_parse_and_neutral_fallback_still_counts() {
        // neutral_fallback always succeeds, so AnalysisEmpty can only occur
        // if the agent_runner itself errors for every ministry; exercise
        // that path directly.
        struct AlwaysFails;
        #[async_trait]
        impl AgentRunnerPort for AlwaysFails {
            async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
                Err(AgentRunError::Empty)
            }
        }
        let pipeline = AnalysisPipeline::new(Arc::new(AlwaysFails), prompts(), "model", Duration::from_secs(1));
        let result = pipeline.run(&decision()).await;
        assert!(matches!(result, Err(AnalysisError::AnalysisEmpty)));
    }
}
