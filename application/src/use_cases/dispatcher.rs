//! Action dispatcher (§4.7): executes a [`ConductorPlan`] in order,
//! recording one [`CyclePhaseResult`] per action. Honors `halt` (stops
//! early) and dry-run mode (every non-read-only action is logged but
//! skipped, telemetry is still written).

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{
    Action, CheckStatusSummary, CyclePhaseResult, ErrorKind, Issue, IssueState, Label,
    SessionResult, StructuredError, YieldKind,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ports::agent_runner::{AgentInvocation, AgentRunnerPort};
use crate::ports::state_store::StateStorePort;
use crate::ports::tracker::{NewIssue, TrackerPort};
use crate::use_cases::analysis_pipeline::AnalysisPipeline;
use crate::use_cases::collaborators::{Director, DirectorRole, EditorialReview, NewsIntake, ResearchScout};
use crate::use_cases::debate_filter::DebateFilter;
use crate::use_cases::pr_workflow::{PrWorkflow, PrWorkflowOutcome};

pub struct ProposerPrompts {
    pub system_prompt: String,
}

#[derive(Deserialize)]
struct ProposalItem {
    title: String,
    description: String,
}

/// All the collaborating use cases the dispatcher drives; assembled once
/// per cycle by the main loop (§9: "confine to a single struct constructed
/// once per cycle", applied here to the dispatcher's own dependencies
/// rather than a process-wide global).
pub struct Dispatcher {
    pub tracker: Arc<dyn TrackerPort>,
    pub agent_runner: Arc<dyn AgentRunnerPort>,
    pub state_store: Arc<dyn StateStorePort>,
    pub analysis_pipeline: Arc<AnalysisPipeline>,
    pub pr_workflow: Arc<PrWorkflow>,
    pub debate_filter: Arc<DebateFilter>,
    pub news_intake: Arc<NewsIntake>,
    pub research_scout: Arc<ResearchScout>,
    pub project_director: Arc<Director>,
    pub strategic_director: Arc<Director>,
    pub editorial_review: Arc<EditorialReview>,
    pub proposer_prompts: ProposerPrompts,
    pub model: String,
    pub agent_timeout: Duration,
    pub dry_run: bool,
    /// Never triage/propose/debate self-improvement tasks this run (§6's
    /// `--skip-improve`). Enforced here as well as by the Conductor's
    /// context block, so a conductor agent that proposes one anyway still
    /// can't execute it.
    pub skip_improve: bool,
    /// Never run the analysis pipeline this run (`--skip-analysis`).
    pub skip_analysis: bool,
    /// Never run the research scout this run (`--skip-research`).
    pub skip_research: bool,
}

/// One row of the flat `data/analyses-index.json` summary (§6 of
/// SPEC_FULL: "id, title, date, category, scores, verdict").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnalysesIndexEntry {
    decision_id: String,
    title: String,
    date: String,
    category: agora_domain::Category,
    critic_score: Option<u8>,
    overall_verdict: Option<agora_domain::Verdict>,
    tracker_issue_number: Option<u64>,
}

/// Result of dispatching one cycle's worth of actions.
pub struct DispatchOutcome {
    pub phases: Vec<CyclePhaseResult>,
    pub yield_kind: YieldKind,
    pub halted: bool,
}

impl Dispatcher {
    pub async fn dispatch(&self, plan: &agora_domain::ConductorPlan) -> DispatchOutcome {
        let mut phases = Vec::new();
        let mut yield_kind = YieldKind::None;
        let mut halted = false;

        for action in &plan.actions {
            if self.dry_run && !action.is_read_only() {
                info!(action = action.name(), "dry-run: action logged, not executed");
                phases.push(CyclePhaseResult::ok(action.name(), now_str(), now_str()));
                continue;
            }

            let started_at = now_str();
            let outcome = self.dispatch_one(action).await;
            let ended_at = now_str();

            match outcome {
                Ok(action_yield) => {
                    if action_yield != YieldKind::None {
                        yield_kind = action_yield;
                    }
                    phases.push(CyclePhaseResult::ok(action.name(), started_at, ended_at));
                }
                Err(error) => {
                    warn!(action = action.name(), error = %error.message, "action failed");
                    phases.push(CyclePhaseResult::failed(action.name(), started_at, ended_at, error));
                }
            }

            if matches!(action, Action::Halt) {
                halted = true;
                break;
            }
        }

        DispatchOutcome {
            phases,
            yield_kind,
            halted,
        }
    }

    async fn dispatch_one(&self, action: &Action) -> Result<YieldKind, StructuredError> {
        match action {
            Action::FetchNews => {
                if self.skip_analysis {
                    info!("skip-analysis is set, not fetching news");
                    return Ok(YieldKind::None);
                }
                self.news_intake
                    .run()
                    .await
                    .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;
                Ok(YieldKind::None)
            }
            Action::Propose => {
                if self.skip_improve {
                    info!("skip-improve is set, not proposing");
                    return Ok(YieldKind::None);
                }
                self.propose().await
            }
            Action::Debate => {
                if self.skip_improve {
                    info!("skip-improve is set, not debating");
                    return Ok(YieldKind::None);
                }
                self.debate_oldest_proposed().await
            }
            Action::PickAndExecute { issue_number } => self.pick_and_execute(*issue_number).await,
            Action::Director => {
                if self.skip_improve {
                    info!("skip-improve is set, not running the project director");
                    return Ok(YieldKind::None);
                }
                self.project_director
                    .run()
                    .await
                    .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;
                Ok(YieldKind::None)
            }
            Action::StrategicDirector => {
                if self.skip_improve {
                    info!("skip-improve is set, not running the strategic director");
                    return Ok(YieldKind::None);
                }
                self.strategic_director
                    .run()
                    .await
                    .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;
                Ok(YieldKind::None)
            }
            Action::ResearchScout => {
                if self.skip_research {
                    info!("skip-research is set, not running the research scout");
                    return Ok(YieldKind::None);
                }
                self.research_scout
                    .run(Utc::now())
                    .await
                    .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;
                Ok(YieldKind::None)
            }
            Action::Cooldown { seconds } => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                Ok(YieldKind::None)
            }
            Action::Halt => Ok(YieldKind::None),
            Action::FileIssue { title, description } => {
                self.tracker
                    .create_issue(NewIssue {
                        title: title.clone(),
                        body: description.clone(),
                        labels: vec![IssueState::Proposed.label().to_string()],
                    })
                    .await
                    .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;
                Ok(YieldKind::None)
            }
            Action::SkipCycle => Ok(YieldKind::None),
        }
    }

    /// Spawn a proposer agent that free-forms one or more code-change
    /// proposals, filed as `self-improve:proposed` issues for a later
    /// `debate` action to triage.
    async fn propose(&self) -> Result<YieldKind, StructuredError> {
        let invocation = AgentInvocation::new(
            self.proposer_prompts.system_prompt.clone(),
            "Propose one or more concrete code-change improvements.",
            self.model.clone(),
        )
        .with_tools(AgentInvocation::read_only_tools())
        .with_timeout(self.agent_timeout);
        let outcome = self
            .agent_runner
            .run(invocation)
            .await
            .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;

        let items: Vec<ProposalItem> = serde_json::from_str(&outcome.assistant_text)
            .map_err(|_| StructuredError::new(ErrorKind::AgentParseError, "proposer output did not parse"))?;

        for item in items {
            self.tracker
                .create_issue(NewIssue {
                    title: item.title,
                    body: item.description,
                    labels: vec![
                        IssueState::Proposed.label().to_string(),
                        Label::TaskCodeChange.as_str().to_string(),
                    ],
                })
                .await
                .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;
        }
        Ok(YieldKind::None)
    }

    async fn debate_oldest_proposed(&self) -> Result<YieldKind, StructuredError> {
        let proposed = self
            .tracker
            .list_open_issues(&[IssueState::Proposed.label().to_string()])
            .await
            .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;

        let Some(issue) = proposed.iter().min_by(|a, b| a.created_at.cmp(&b.created_at)) else {
            return Ok(YieldKind::None);
        };

        self.debate_filter
            .run(issue)
            .await
            .map_err(|e| StructuredError::new(e.kind(), e.to_string()))?;
        Ok(YieldKind::None)
    }

    /// Route a backlog issue to the analysis pipeline or the PR workflow
    /// depending on its orthogonal label, enforcing the single
    /// in-progress-issue invariant (§4.5, §8).
    async fn pick_and_execute(&self, issue_number: u64) -> Result<YieldKind, StructuredError> {
        let in_progress = self
            .tracker
            .list_open_issues(&[IssueState::InProgress.label().to_string()])
            .await
            .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;
        if !in_progress.is_empty() {
            return Err(StructuredError::new(
                ErrorKind::StateConflict,
                "another issue is already in-progress",
            ));
        }

        let issue = self
            .tracker
            .read_issue(issue_number)
            .await
            .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;

        if self.skip_analysis && issue.has_label(Label::TaskAnalysis) {
            info!(issue = issue_number, "skip-analysis is set, leaving issue on the backlog");
            return Ok(YieldKind::None);
        }
        if self.skip_improve && issue.has_label(Label::TaskCodeChange) {
            info!(issue = issue_number, "skip-improve is set, leaving issue on the backlog");
            return Ok(YieldKind::None);
        }

        self.tracker
            .add_labels(issue_number, &[IssueState::InProgress.label().to_string()])
            .await
            .map_err(|e| StructuredError::new(ErrorKind::TrackerFatal, e.to_string()))?;
        self.tracker
            .remove_labels(issue_number, &[IssueState::Backlog.label().to_string()])
            .await
            .ok();

        let result = if issue.has_label(Label::TaskAnalysis) {
            self.execute_analysis(&issue).await
        } else if issue.has_label(Label::TaskCodeChange) {
            self.execute_pr_workflow(&issue).await
        } else {
            Err(StructuredError::new(
                ErrorKind::StateConflict,
                "picked issue carries neither task:analysis nor task:code-change",
            ))
        };

        if result.is_err() {
            self.tracker
                .remove_labels(issue_number, &[IssueState::InProgress.label().to_string()])
                .await
                .ok();
        }

        result
    }

    async fn execute_analysis(&self, issue: &Issue) -> Result<YieldKind, StructuredError> {
        let decision: agora_domain::Decision = serde_json::from_str(&issue.body)
            .map_err(|_| StructuredError::new(ErrorKind::AgentParseError, "issue body is not a valid Decision"))?;

        let result = self
            .analysis_pipeline
            .run(&decision)
            .await
            .map_err(|_| StructuredError::new(ErrorKind::AgentExecError, "analysis pipeline produced no assessment"))?
            .with_tracker_issue(issue.number);

        if let Err(e) = self.persist_analysis(&decision, &result).await {
            warn!(decision_id = %result.decision_id, error = %e, "failed to persist analysis result to disk");
        }

        self.tracker
            .add_labels(issue.number, &[IssueState::Done.label().to_string()])
            .await
            .ok();
        self.tracker
            .remove_labels(issue.number, &[IssueState::InProgress.label().to_string()])
            .await
            .ok();
        self.tracker.close_issue(issue.number).await.ok();

        self.editorial_review.run(&result.decision_id).await.ok();

        Ok(YieldKind::AnalysisPublished)
    }

    /// Write `data/analyses/{decision_id}.json` and update the flat
    /// `data/analyses-index.json` summary (§6).
    async fn persist_analysis(&self, decision: &agora_domain::Decision, result: &SessionResult) -> std::io::Result<()> {
        let result_path = format!("data/analyses/{}.json", result.decision_id);
        self.state_store
            .store(&result_path, &serde_json::to_value(result)?)
            .await?;

        let mut index: Vec<AnalysesIndexEntry> = self
            .state_store
            .load("data/analyses-index.json")
            .await?
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let entry = AnalysesIndexEntry {
            decision_id: result.decision_id.clone(),
            title: decision.title.clone(),
            date: decision.date.clone(),
            category: decision.category,
            critic_score: result.critic.as_ref().map(|c| c.decision_score),
            overall_verdict: result.parliament.as_ref().map(|p| p.overall_verdict),
            tracker_issue_number: result.tracker_issue_number,
        };

        match index.iter_mut().find(|e| e.decision_id == entry.decision_id) {
            Some(existing) => *existing = entry,
            None => index.push(entry),
        }

        self.state_store
            .store("data/analyses-index.json", &serde_json::to_value(&index)?)
            .await
    }

    async fn execute_pr_workflow(&self, issue: &Issue) -> Result<YieldKind, StructuredError> {
        match self.pr_workflow.run(issue).await {
            Ok(PrWorkflowOutcome::Merged { .. }) => Ok(YieldKind::PrMerged),
            Err(e) => Err(StructuredError::new(e.kind(), e.to_string())),
        }
    }

    /// Recent CI runs, surfaced for the Conductor's context block (§4.7).
    pub async fn recent_ci_runs(&self, limit: u32) -> Vec<CheckStatusSummary> {
        self.tracker.recent_ci_runs(limit).await.unwrap_or_default()
    }
}

fn now_str() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_runner::{AgentOutcome, AgentRunError};
    use crate::use_cases::analysis_pipeline::AnalysisPrompts;
    use crate::use_cases::collaborators::DirectorRole;
    use crate::use_cases::debate_filter::DebatePrompts;
    use crate::use_cases::pr_workflow::PrWorkflowPrompts;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    struct NeverAgentRunner;

    #[async_trait]
    impl AgentRunnerPort for NeverAgentRunner {
        async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            panic!("this test's dispatch should not require an agent call");
        }
    }

    #[derive(Default)]
    struct InMemoryStateStore {
        files: Mutex<HashMap<String, serde_json::Value>>,
    }

    #[async_trait]
    impl StateStorePort for InMemoryStateStore {
        async fn load(&self, key: &str) -> std::io::Result<Option<serde_json::Value>> {
            Ok(self.files.lock().unwrap().get(key).cloned())
        }
        async fn store(&self, key: &str, value: &serde_json::Value) -> std::io::Result<()> {
            self.files.lock().unwrap().insert(key.to_string(), value.clone());
            Ok(())
        }
        async fn append_journal(&self, _key: &str, _line: &str, _keep_last: usize) -> std::io::Result<()> {
            Ok(())
        }
        async fn read_journal(&self, _key: &str, _limit: usize) -> std::io::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeTracker {
        in_progress_issues: Vec<Issue>,
        created: Mutex<Vec<crate::ports::tracker::NewIssue>>,
    }

    #[async_trait]
    impl crate::ports::tracker::TrackerPort for FakeTracker {
        async fn list_open_issues(&self, labels: &[String]) -> Result<Vec<Issue>, crate::ports::tracker::TrackerError> {
            if labels.iter().any(|l| l == IssueState::InProgress.label()) {
                Ok(self.in_progress_issues.clone())
            } else {
                Ok(vec![])
            }
        }
        async fn read_issue(&self, _number: u64) -> Result<Issue, crate::ports::tracker::TrackerError> {
            unimplemented!()
        }
        async fn create_issue(&self, issue: crate::ports::tracker::NewIssue) -> Result<u64, crate::ports::tracker::TrackerError> {
            self.created.lock().unwrap().push(issue);
            Ok(1)
        }
        async fn add_labels(&self, _number: u64, _labels: &[String]) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn remove_labels(&self, _number: u64, _labels: &[String]) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn close_issue(&self, _number: u64) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn post_comment(&self, _number: u64, _body: &str) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn create_branch(&self, _name: &str, _from: &str) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn open_pr(&self, _branch: &str, _title: &str, _body: &str) -> Result<u64, crate::ports::tracker::TrackerError> {
            Ok(1)
        }
        async fn read_pr(&self, _number: u64) -> Result<agora_domain::PullRequest, crate::ports::tracker::TrackerError> {
            unimplemented!()
        }
        async fn list_pr_review_comments(&self, _number: u64) -> Result<Vec<String>, crate::ports::tracker::TrackerError> {
            Ok(vec![])
        }
        async fn merge_pr(&self, _number: u64) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn close_pr(&self, _number: u64) -> Result<(), crate::ports::tracker::TrackerError> {
            Ok(())
        }
        async fn recent_ci_runs(&self, _limit: u32) -> Result<Vec<agora_domain::CheckStatusSummary>, crate::ports::tracker::TrackerError> {
            Ok(vec![])
        }
    }

    fn in_progress_issue() -> Issue {
        Issue {
            number: 9,
            title: "already running".to_string(),
            body: String::new(),
            labels: [IssueState::InProgress.label().to_string()].into_iter().collect::<BTreeSet<_>>(),
            state: agora_domain::IssueOpenState::Open,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn make_dispatcher(tracker: Arc<FakeTracker>, dry_run: bool) -> Dispatcher {
        let agent_runner: Arc<dyn AgentRunnerPort> = Arc::new(NeverAgentRunner);
        let state_store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::default());
        let tracker_port: Arc<dyn TrackerPort> = tracker;

        Dispatcher {
            tracker: Arc::clone(&tracker_port),
            agent_runner: Arc::clone(&agent_runner),
            state_store: Arc::clone(&state_store),
            analysis_pipeline: Arc::new(AnalysisPipeline::new(
                Arc::clone(&agent_runner),
                AnalysisPrompts {
                    ministry_system_prompt: "m".to_string(),
                    parliament_system_prompt: "p".to_string(),
                    critic_system_prompt: "c".to_string(),
                    synthesizer_system_prompt: "s".to_string(),
                },
                "model",
                Duration::from_secs(1),
            )),
            pr_workflow: Arc::new(PrWorkflow::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                PrWorkflowPrompts {
                    coder_system_prompt: "coder".to_string(),
                    reviewer_system_prompt: "reviewer".to_string(),
                },
                "model",
                Duration::from_secs(1),
                3,
            )),
            debate_filter: Arc::new(DebateFilter::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                DebatePrompts {
                    advocate_system_prompt: "adv".to_string(),
                    skeptic_system_prompt: "skep".to_string(),
                },
                "model",
                Duration::from_secs(1),
                2,
            )),
            news_intake: Arc::new(NewsIntake::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                Arc::clone(&state_store),
                "news",
                "model",
                Duration::from_secs(1),
                3,
            )),
            research_scout: Arc::new(ResearchScout::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                Arc::clone(&state_store),
                "research",
                "model",
                Duration::from_secs(1),
                Duration::from_secs(604800),
            )),
            project_director: Arc::new(Director::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                DirectorRole::Project,
                "director",
                "model",
                Duration::from_secs(1),
                2,
            )),
            strategic_director: Arc::new(Director::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                DirectorRole::Strategic,
                "strategic",
                "model",
                Duration::from_secs(1),
                2,
            )),
            editorial_review: Arc::new(EditorialReview::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker_port),
                "editorial",
                "model",
                Duration::from_secs(1),
            )),
            proposer_prompts: ProposerPrompts {
                system_prompt: "proposer".to_string(),
            },
            model: "model".to_string(),
            agent_timeout: Duration::from_secs(1),
            dry_run,
            skip_improve: false,
            skip_analysis: false,
            skip_research: false,
        }
    }

    #[tokio::test]
    async fn dry_run_skips_non_read_only_actions_but_still_records_phases() {
        let dispatcher = make_dispatcher(Arc::new(FakeTracker::default()), true);
        let plan = agora_domain::ConductorPlan {
            reasoning: "r".to_string(),
            actions: vec![Action::FetchNews, Action::Cooldown { seconds: 0 }],
            suggested_cooldown_seconds: 0,
            notes_for_next_cycle: String::new(),
        };
        let outcome = dispatcher.dispatch(&plan).await;
        assert_eq!(outcome.phases.len(), 2);
        assert!(outcome.phases.iter().all(|p| p.success));
    }

    #[tokio::test]
    async fn halt_stops_dispatch_early() {
        let dispatcher = make_dispatcher(Arc::new(FakeTracker::default()), false);
        let plan = agora_domain::ConductorPlan {
            reasoning: "r".to_string(),
            actions: vec![Action::Halt, Action::Cooldown { seconds: 0 }],
            suggested_cooldown_seconds: 0,
            notes_for_next_cycle: String::new(),
        };
        let outcome = dispatcher.dispatch(&plan).await;
        assert!(outcome.halted);
        assert_eq!(outcome.phases.len(), 1);
    }

    #[tokio::test]
    async fn pick_and_execute_refuses_when_another_issue_is_already_in_progress() {
        let tracker = Arc::new(FakeTracker {
            in_progress_issues: vec![in_progress_issue()],
            created: Mutex::new(vec![]),
        });
        let dispatcher = make_dispatcher(tracker, false);
        let plan = agora_domain::ConductorPlan {
            reasoning: "r".to_string(),
            actions: vec![Action::PickAndExecute { issue_number: 1 }],
            suggested_cooldown_seconds: 0,
            notes_for_next_cycle: String::new(),
        };
        let outcome = dispatcher.dispatch(&plan).await;
        assert_eq!(outcome.phases.len(), 1);
        assert!(!outcome.phases[0].success);
        assert_eq!(outcome.phases[0].error.as_ref().unwrap().kind, ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn file_issue_action_creates_a_proposed_issue() {
        let tracker = Arc::new(FakeTracker::default());
        let dispatcher = make_dispatcher(tracker.clone(), false);
        let plan = agora_domain::ConductorPlan {
            reasoning: "r".to_string(),
            actions: vec![Action::FileIssue {
                title: "title".to_string(),
                description: "desc".to_string(),
            }],
            suggested_cooldown_seconds: 0,
            notes_for_next_cycle: String::new(),
        };
        let outcome = dispatcher.dispatch(&plan).await;
        assert!(outcome.phases[0].success);
        assert_eq!(tracker.created.lock().unwrap().len(), 1);
        assert!(tracker.created.lock().unwrap()[0].labels.contains(&IssueState::Proposed.label().to_string()));
    }
}
