//! Main loop (§2, §4.7): gather state → plan → dispatch → write telemetry
//! → cooldown, repeated until `max_cycles`, `halt`, or `EngineCrash`.

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{CycleTelemetry, IssueState, StructuredError, YieldKind};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::ports::telemetry_sink::TelemetrySinkPort;
use crate::ports::tracker::TrackerPort;
use crate::use_cases::circuit_breaker::CircuitBreaker;
use crate::use_cases::conductor::{Conductor, ConductorContext};
use crate::use_cases::dispatcher::Dispatcher;
use crate::use_cases::self_restart::{RestartOps, SelfRestart};

pub struct MainLoopConfig {
    pub max_cycles: Option<u64>,
    pub cooldown: Duration,
    pub model: String,
    pub dry_run: bool,
    pub circuit_breaker_window: usize,
    pub director_interval_cycles: u64,
}

/// Drives cycles end to end. Generic over the restart-ops adapter so the
/// application layer never names the infrastructure type that shells out
/// to `git`/`libc::execvp`; a deployment that never wants self-restart can
/// build one with `restart: None`.
pub struct MainLoop<O: RestartOps> {
    tracker: Arc<dyn TrackerPort>,
    telemetry: Arc<dyn TelemetrySinkPort>,
    conductor: Conductor,
    dispatcher: Dispatcher,
    circuit_breaker: CircuitBreaker,
    config: MainLoopConfig,
    restart: Option<SelfRestart<O>>,
}

impl<O: RestartOps> MainLoop<O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracker: Arc<dyn TrackerPort>,
        telemetry: Arc<dyn TelemetrySinkPort>,
        conductor: Conductor,
        dispatcher: Dispatcher,
        circuit_breaker: CircuitBreaker,
        config: MainLoopConfig,
        restart: Option<SelfRestart<O>>,
    ) -> Self {
        Self {
            tracker,
            telemetry,
            conductor,
            dispatcher,
            circuit_breaker,
            config,
            restart,
        }
    }

    /// Run cycles until `max_cycles` is reached or the Conductor halts.
    /// Returns `Ok(())` on a graceful stop; `Err` only for `EngineCrash`,
    /// per §7's propagation policy ("only EngineCrash escapes").
    pub async fn run(&self) -> Result<(), StructuredError> {
        let mut cycle_number: u64 = 0;
        let mut productive_cycle_count: u64 = 0;

        loop {
            cycle_number += 1;
            if let Some(max) = self.config.max_cycles {
                if cycle_number > max {
                    info!(cycles = max, "max-cycles reached, stopping");
                    return Ok(());
                }
            }

            match self.run_one_cycle(cycle_number, productive_cycle_count).await {
                Ok((telemetry, halted)) => {
                    if telemetry.productive {
                        productive_cycle_count += 1;
                    }
                    if let Err(e) = self.telemetry.append_cycle(&telemetry).await {
                        warn!(error = %e, "failed to append telemetry record");
                    }

                    if let Ok(recent) = self.telemetry.recent_cycles(self.config.circuit_breaker_window).await {
                        if let Err(e) = self.circuit_breaker.check(&recent).await {
                            warn!(error = %e, "circuit breaker check failed");
                        }
                    }

                    if halted {
                        info!(cycle = cycle_number, "conductor halted the engine");
                        return Ok(());
                    }

                    // A merged PR may have changed the code this process is
                    // running; self-restart is the only event that triggers
                    // re-exec (§4.9: "let a merged PR take effect"). Failure
                    // is non-fatal — the next merged PR will trigger it again.
                    if telemetry.yield_kind == YieldKind::PrMerged && !self.config.dry_run {
                        if let Some(restart) = &self.restart {
                            info!(cycle = cycle_number, "PR merged, attempting self-restart");
                            if let Err(e) = restart.run().await {
                                warn!(cycle = cycle_number, error = %e, "self-restart sequence aborted, continuing on current process image");
                            }
                        }
                    }

                    if !self.config.dry_run {
                        tokio::time::sleep(self.config.cooldown).await;
                    }
                }
                Err(crash) => {
                    error!(cycle = cycle_number, error = %crash.message, "engine crash");
                    let partial = CycleTelemetry::new(
                        cycle_number,
                        now_str(),
                        now_str(),
                        vec![],
                        "engine crash",
                        vec![],
                        false,
                        agora_domain::YieldKind::None,
                    );
                    self.telemetry.append_cycle(&partial).await.ok();
                    self.telemetry.append_error("main_loop", &crash).await.ok();
                    return Err(crash);
                }
            }
        }
    }

    async fn run_one_cycle(
        &self,
        cycle_number: u64,
        productive_cycle_count: u64,
    ) -> Result<(CycleTelemetry, bool), StructuredError> {
        let started_at = now_str();

        let context = self.gather_context(cycle_number, productive_cycle_count).await;
        let (plan, fallback) = self.conductor.plan(&context).await;

        let dispatch_outcome = self.dispatcher.dispatch(&plan).await;
        let ended_at = now_str();

        let telemetry = CycleTelemetry::new(
            cycle_number,
            started_at,
            ended_at,
            dispatch_outcome.phases,
            plan.reasoning.clone(),
            plan.actions.iter().map(|a| a.name().to_string()).collect(),
            fallback,
            dispatch_outcome.yield_kind,
        );

        Ok((telemetry, dispatch_outcome.halted))
    }

    /// Build the Conductor's context block fresh every cycle (§4.7, §9: no
    /// in-memory cache of tracker state crosses cycle boundaries).
    async fn gather_context(&self, cycle_number: u64, productive_cycle_count: u64) -> ConductorContext {
        let recent_telemetry = self
            .telemetry
            .recent_cycles(20)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| serde_json::to_value(t).ok())
            .collect();

        let recent_errors = self
            .telemetry
            .recent_errors(30)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(phase, err)| serde_json::to_value((phase, err)).ok())
            .collect();

        let open_backlog_issues = self
            .tracker
            .list_open_issues(&[IssueState::Backlog.label().to_string()])
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| serde_json::to_value(i).ok())
            .collect();

        let recent_ci_status = self
            .dispatcher
            .recent_ci_runs(10)
            .await
            .into_iter()
            .filter_map(|c| serde_json::to_value(c).ok())
            .collect();

        let news_allowed_today = self
            .dispatcher
            .news_intake
            .allowed_today()
            .await
            .unwrap_or(false);
        let research_due = self
            .dispatcher
            .research_scout
            .due(Utc::now())
            .await
            .unwrap_or(false);

        ConductorContext {
            cycle_number,
            productive_cycle_count,
            dry_run: self.config.dry_run,
            skip_improve: self.dispatcher.skip_improve,
            skip_analysis: self.dispatcher.skip_analysis,
            skip_research: self.dispatcher.skip_research,
            model: self.config.model.clone(),
            recent_telemetry,
            recent_errors,
            open_backlog_issues,
            recently_completed_issues: vec![],
            open_prs: vec![],
            recently_merged_prs: vec![],
            news_allowed_today,
            research_due,
            director_due: is_director_due(productive_cycle_count, self.config.director_interval_cycles),
            strategic_director_due: is_director_due(productive_cycle_count, self.config.director_interval_cycles * 2),
            recent_ci_status,
            action_frequency_summary: serde_json::json!({}),
            journal_tail: vec![],
        }
    }
}

fn now_str() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Director scheduling is driven off the productive-cycle counter, not
/// wall-clock time (§4.7's context block: "productive-cycle counter for
/// director scheduling").
fn is_director_due(productive_cycle_count: u64, interval: u64) -> bool {
    interval > 0 && productive_cycle_count > 0 && productive_cycle_count % interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_runner::{AgentInvocation, AgentOutcome, AgentRunError, AgentRunnerPort};
    use crate::ports::state_store::StateStorePort;
    use crate::use_cases::analysis_pipeline::{AnalysisPipeline, AnalysisPrompts};
    use crate::use_cases::collaborators::{Director, DirectorRole, EditorialReview, NewsIntake, ResearchScout};
    use crate::use_cases::conductor::ConductorPrompts;
    use crate::use_cases::debate_filter::{DebateFilter, DebatePrompts};
    use crate::use_cases::dispatcher::{Dispatcher, ProposerPrompts};
    use crate::use_cases::pr_workflow::{PrWorkflow, PrWorkflowPrompts};
    use crate::use_cases::self_restart::RestartOps;
    use agora_domain::Issue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct AlwaysFailsAgentRunner;

    #[async_trait]
    impl AgentRunnerPort for AlwaysFailsAgentRunner {
        async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            Err(AgentRunError::Empty)
        }
    }

    struct ScriptedAgentRunner {
        responses: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl AgentRunnerPort for ScriptedAgentRunner {
        async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(AgentRunError::Empty);
            }
            Ok(AgentOutcome {
                assistant_text: responses.remove(0).to_string(),
            })
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
    struct FakeTracker;

    #[async_trait]
    impl TrackerPort for FakeTracker {
        async fn list_open_issues(&self, _labels: &[String]) -> Result<Vec<Issue>, crate::ports::tracker::TrackerError> {
            Ok(vec![])
        }
        async fn read_issue(&self, _number: u64) -> Result<Issue, crate::ports::tracker::TrackerError> {
            unimplemented!()
        }
        async fn create_issue(&self, _issue: crate::ports::tracker::NewIssue) -> Result<u64, crate::ports::tracker::TrackerError> {
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

    #[derive(Default)]
    struct InMemoryTelemetrySink {
        cycles: Mutex<Vec<CycleTelemetry>>,
        errors: Mutex<Vec<(String, StructuredError)>>,
    }

    #[async_trait]
    impl TelemetrySinkPort for InMemoryTelemetrySink {
        async fn append_cycle(&self, record: &CycleTelemetry) -> std::io::Result<()> {
            self.cycles.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn append_error(&self, phase: &str, error: &StructuredError) -> std::io::Result<()> {
            self.errors.lock().unwrap().push((phase.to_string(), error.clone()));
            Ok(())
        }
        async fn recent_cycles(&self, limit: usize) -> std::io::Result<Vec<CycleTelemetry>> {
            let cycles = self.cycles.lock().unwrap();
            Ok(cycles.iter().rev().take(limit).cloned().collect())
        }
        async fn recent_errors(&self, limit: usize) -> std::io::Result<Vec<(String, StructuredError)>> {
            let errors = self.errors.lock().unwrap();
            Ok(errors.iter().rev().take(limit).cloned().collect())
        }
    }

    struct NoopRestartOps;

    #[async_trait]
    impl RestartOps for NoopRestartOps {
        async fn push_telemetry_journal(&self) -> Result<(), crate::use_cases::self_restart::RestartError> {
            Ok(())
        }
        async fn fast_forward_pull(&self) -> Result<(), crate::use_cases::self_restart::RestartError> {
            Ok(())
        }
        async fn reinstall_dependencies(&self) -> Result<(), crate::use_cases::self_restart::RestartError> {
            Ok(())
        }
        async fn reexec(&self) -> Result<(), crate::use_cases::self_restart::RestartError> {
            Ok(())
        }
    }

    /// Builds a dispatcher whose every action short-circuits without an
    /// agent call (`skip_analysis`/`skip_improve`/`skip_research` all set),
    /// so `FetchNews`/`Propose`/`Debate`/`Director`/`ResearchScout` never
    /// reach `AlwaysFailsAgentRunner`.
    fn make_dispatcher(tracker: Arc<dyn TrackerPort>) -> Dispatcher {
        let agent_runner: Arc<dyn AgentRunnerPort> = Arc::new(AlwaysFailsAgentRunner);
        let state_store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::default());

        Dispatcher {
            tracker: Arc::clone(&tracker),
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
                Arc::clone(&tracker),
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
                Arc::clone(&tracker),
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
                Arc::clone(&tracker),
                Arc::clone(&state_store),
                "news",
                "model",
                Duration::from_secs(1),
                3,
            )),
            research_scout: Arc::new(ResearchScout::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker),
                Arc::clone(&state_store),
                "research",
                "model",
                Duration::from_secs(1),
                Duration::from_secs(604800),
            )),
            project_director: Arc::new(Director::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker),
                DirectorRole::Project,
                "director",
                "model",
                Duration::from_secs(1),
                2,
            )),
            strategic_director: Arc::new(Director::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker),
                DirectorRole::Strategic,
                "strategic",
                "model",
                Duration::from_secs(1),
                2,
            )),
            editorial_review: Arc::new(EditorialReview::new(
                Arc::clone(&agent_runner),
                Arc::clone(&tracker),
                "editorial",
                "model",
                Duration::from_secs(1),
            )),
            proposer_prompts: ProposerPrompts {
                system_prompt: "proposer".to_string(),
            },
            model: "model".to_string(),
            agent_timeout: Duration::from_secs(1),
            dry_run: false,
            skip_improve: true,
            skip_analysis: true,
            skip_research: true,
        }
    }

    fn make_main_loop(
        tracker: Arc<dyn TrackerPort>,
        telemetry: Arc<InMemoryTelemetrySink>,
        conductor_agent_runner: Arc<dyn AgentRunnerPort>,
        max_cycles: Option<u64>,
    ) -> MainLoop<NoopRestartOps> {
        let conductor = Conductor::new(
            conductor_agent_runner,
            ConductorPrompts {
                primary_system_prompt: "primary".to_string(),
                recovery_system_prompt: "recovery".to_string(),
            },
            "model",
            Duration::from_secs(1),
        );
        let dispatcher = make_dispatcher(Arc::clone(&tracker));
        let circuit_breaker = CircuitBreaker::new(Arc::clone(&tracker), 5, 3);

        MainLoop::new(
            tracker,
            telemetry as Arc<dyn TelemetrySinkPort>,
            conductor,
            dispatcher,
            circuit_breaker,
            MainLoopConfig {
                max_cycles,
                cooldown: Duration::from_millis(0),
                model: "model".to_string(),
                dry_run: true,
                circuit_breaker_window: 5,
                director_interval_cycles: 10,
            },
            Some(SelfRestart::new(NoopRestartOps)),
        )
    }

    #[tokio::test]
    async fn stops_after_max_cycles_and_records_one_telemetry_row_per_cycle() {
        let telemetry = Arc::new(InMemoryTelemetrySink::default());
        // `skip_cycle` plans avoid the hard-coded 60s cooldown the fallback
        // default plan would otherwise schedule (that action runs even
        // though the dispatcher's own dry_run is false in this fixture).
        let skip_plan = r#"{"reasoning":"r","actions":[{"type":"skip_cycle"}],"suggested_cooldown_seconds":0,"notes_for_next_cycle":""}"#;
        let scripted = Arc::new(ScriptedAgentRunner {
            responses: Mutex::new(vec![skip_plan, skip_plan]),
        });
        let main_loop = make_main_loop(Arc::new(FakeTracker), Arc::clone(&telemetry), scripted, Some(2));

        let result = main_loop.run().await;
        assert!(result.is_ok());
        assert_eq!(telemetry.cycles.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn halt_action_from_the_conductor_stops_the_loop_early() {
        let telemetry = Arc::new(InMemoryTelemetrySink::default());
        let halt_plan = r#"{"reasoning":"stop","actions":[{"type":"halt"}],"suggested_cooldown_seconds":0,"notes_for_next_cycle":""}"#;
        let scripted = Arc::new(ScriptedAgentRunner {
            responses: Mutex::new(vec![halt_plan]),
        });
        let main_loop = make_main_loop(Arc::new(FakeTracker), Arc::clone(&telemetry), scripted, None);

        let result = main_loop.run().await;
        assert!(result.is_ok());
        assert_eq!(telemetry.cycles.lock().unwrap().len(), 1);
    }
}
