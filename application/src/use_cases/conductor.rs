//! Conductor planner (§4.7): turn a snapshot of system state into an
//! ordered list of up to six actions for the current cycle, via a
//! three-step fallback chain.

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{step_pick, Action, ConductorPlan, Issue};
use serde::Serialize;
use tracing::warn;

use crate::ports::agent_runner::{AgentInvocation, AgentRunnerPort};

/// The gathered context block handed to the Conductor agent (§4.7): cycle
/// metadata, recent telemetry/errors, backlog snapshot, rate-limit
/// predicates, and the journal tail. Built fresh every cycle by the main
/// loop; never cached across cycles.
#[derive(Debug, Clone, Serialize)]
pub struct ConductorContext {
    pub cycle_number: u64,
    pub productive_cycle_count: u64,
    pub dry_run: bool,
    /// Mirrors `--skip-improve`/`--skip-analysis`/`--skip-research`, so the
    /// conductor agent doesn't plan actions the dispatcher will refuse
    /// anyway (§4.7's context block, §6).
    pub skip_improve: bool,
    pub skip_analysis: bool,
    pub skip_research: bool,
    pub model: String,
    pub recent_telemetry: Vec<serde_json::Value>,
    pub recent_errors: Vec<serde_json::Value>,
    pub open_backlog_issues: Vec<serde_json::Value>,
    pub recently_completed_issues: Vec<serde_json::Value>,
    pub open_prs: Vec<serde_json::Value>,
    pub recently_merged_prs: Vec<serde_json::Value>,
    pub news_allowed_today: bool,
    pub research_due: bool,
    pub director_due: bool,
    pub strategic_director_due: bool,
    pub recent_ci_status: Vec<serde_json::Value>,
    pub action_frequency_summary: serde_json::Value,
    pub journal_tail: Vec<String>,
}

pub struct ConductorPrompts {
    pub primary_system_prompt: String,
    pub recovery_system_prompt: String,
}

pub struct Conductor {
    agent_runner: Arc<dyn AgentRunnerPort>,
    prompts: ConductorPrompts,
    model: String,
    agent_timeout: Duration,
}

impl Conductor {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        prompts: ConductorPrompts,
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

    /// Produce a plan via the fallback chain (§4.7). Always succeeds: the
    /// hard-coded default plan is the chain's final rung.
    pub async fn plan(&self, context: &ConductorContext) -> (ConductorPlan, bool) {
        if let Some(plan) = self.try_primary(context).await {
            return (plan, false);
        }
        warn!(cycle = context.cycle_number, "primary conductor call failed, trying recovery");

        if let Some(plan) = self.try_recovery(context).await {
            return (plan, true);
        }
        warn!(cycle = context.cycle_number, "recovery conductor call failed, using default plan");

        (self.default_plan(context), true)
    }

    async fn try_primary(&self, context: &ConductorContext) -> Option<ConductorPlan> {
        let invocation = AgentInvocation::new(
            self.prompts.primary_system_prompt.clone(),
            serde_json::to_string(context).ok()?,
            self.model.clone(),
        )
        .no_tools()
        .with_timeout(self.agent_timeout);
        let outcome = self.agent_runner.run(invocation).await.ok()?;
        parse_valid_plan(&outcome.assistant_text)
    }

    async fn try_recovery(&self, context: &ConductorContext) -> Option<ConductorPlan> {
        let invocation = AgentInvocation::new(
            self.prompts.recovery_system_prompt.clone(),
            serde_json::to_string(context).ok()?,
            self.model.clone(),
        )
        .with_tools(AgentInvocation::read_only_tools())
        .with_timeout(self.agent_timeout);
        let outcome = self.agent_runner.run(invocation).await.ok()?;
        parse_valid_plan(&outcome.assistant_text)
    }

    /// Hard-coded safe plan (§4.7): `fetch_news` if allowed today, then
    /// `pick_and_execute` on the selector's top pick (if any, via the
    /// same 5-tier `step_pick` the primary/recovery plans are expected to
    /// honor), then `cooldown(60)`.
    fn default_plan(&self, context: &ConductorContext) -> ConductorPlan {
        let mut actions = Vec::new();
        if context.news_allowed_today {
            actions.push(Action::FetchNews);
        }

        let backlog: Vec<Issue> = context
            .open_backlog_issues
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
        if let Some(pick) = step_pick(&backlog) {
            actions.push(Action::PickAndExecute {
                issue_number: pick.issue_number,
            });
        }

        actions.push(Action::Cooldown { seconds: 60 });

        ConductorPlan {
            reasoning: "fallback: hard-coded default plan".to_string(),
            actions,
            suggested_cooldown_seconds: 60,
            notes_for_next_cycle: String::new(),
        }
    }
}

fn parse_valid_plan(text: &str) -> Option<ConductorPlan> {
    let plan: ConductorPlan = serde_json::from_str(text).ok()?;
    plan.validate().ok()?;
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_runner::{AgentOutcome, AgentRunError};
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl AgentRunnerPort for NeverCalled {
        async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            panic!("default_plan must not invoke an agent");
        }
    }

    fn empty_context() -> ConductorContext {
        ConductorContext {
            cycle_number: 1,
            productive_cycle_count: 0,
            dry_run: false,
            skip_improve: false,
            skip_analysis: false,
            skip_research: false,
            model: "default".to_string(),
            recent_telemetry: vec![],
            recent_errors: vec![],
            open_backlog_issues: vec![],
            recently_completed_issues: vec![],
            open_prs: vec![],
            recently_merged_prs: vec![],
            news_allowed_today: true,
            research_due: false,
            director_due: false,
            strategic_director_due: false,
            recent_ci_status: vec![],
            action_frequency_summary: serde_json::json!({}),
            journal_tail: vec![],
        }
    }

    #[test]
    fn default_plan_fetches_news_when_allowed() {
        let conductor = Conductor {
            agent_runner: Arc::new(NeverCalled),
            prompts: ConductorPrompts {
                primary_system_prompt: String::new(),
                recovery_system_prompt: String::new(),
            },
            model: "default".to_string(),
            agent_timeout: Duration::from_secs(1),
        };
        let plan = conductor.default_plan(&empty_context());
        assert!(plan.actions.contains(&Action::FetchNews));
        assert!(plan.actions.last().unwrap() == &Action::Cooldown { seconds: 60 });
    }
}
