//! Rate-limited external collaborators (§4.6): news intake, research scout,
//! project director, strategic director, editorial review. Modeled
//! uniformly as a `PeriodicAction` so the cap-enforcement and dedup code is
//! shared instead of repeated per collaborator (SPEC_FULL §8).

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{Decision, ErrorKind, IssueState, Label};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::agent_runner::{AgentInvocation, AgentRunError, AgentRunnerPort};
use crate::ports::state_store::StateStorePort;
use crate::ports::tracker::{NewIssue, TrackerError, TrackerPort};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("agent invocation failed: {0}")]
    Agent(#[from] AgentRunError),
    #[error("tracker call failed: {0}")]
    Tracker(#[from] TrackerError),
    #[error("state store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::Agent(e) => e.kind(),
            CollaboratorError::Tracker(TrackerError::StateConflict(_)) => ErrorKind::StateConflict,
            CollaboratorError::Tracker(TrackerError::Fatal(_)) => ErrorKind::TrackerFatal,
            CollaboratorError::Io(_) => ErrorKind::EngineCrash,
        }
    }
}

/// Each collaborator below follows the same shape: a local state-file key
/// under the workspace's `output/` directory, a `should_run`/`due`
/// predicate checked against the clock before spawning any agent, and a
/// `run` that spawns the collaborator agent, parses its JSON output,
/// creates issues subject to a per-run cap, and persists fresh state.

#[derive(Deserialize, Default)]
struct NewsState {
    last_date: Option<String>,
}

#[derive(Deserialize, Default)]
struct TimestampState {
    last_ts: Option<String>,
}

/// News intake: discovers Decisions, creates one `task:analysis` issue per
/// item, deduplicated by [`agora_domain::derive_decision_id`] (§4.2, §4.6).
pub struct NewsIntake {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    state_store: Arc<dyn StateStorePort>,
    system_prompt: String,
    model: String,
    agent_timeout: Duration,
    cap_per_day: u32,
}

impl NewsIntake {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        state_store: Arc<dyn StateStorePort>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        agent_timeout: Duration,
        cap_per_day: u32,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            state_store,
            system_prompt: system_prompt.into(),
            model: model.into(),
            agent_timeout,
            cap_per_day,
        }
    }

    pub async fn allowed_today(&self) -> Result<bool, CollaboratorError> {
        let today = Utc::now().date_naive().to_string();
        let state = self.state_store.load("news_scout_state.json").await?;
        let last_date = state
            .and_then(|v| serde_json::from_value::<NewsState>(v).ok())
            .and_then(|s| s.last_date);
        Ok(last_date.as_deref() != Some(today.as_str()))
    }

    /// Fetch news, create issues for non-duplicate Decisions (up to the
    /// daily cap), and persist today's date regardless of how many were
    /// created (§4.6: "only one run per configured interval").
    pub async fn run(&self) -> Result<Vec<u64>, CollaboratorError> {
        let invocation = AgentInvocation::new(
            self.system_prompt.clone(),
            "Discover recent news items worth analyzing. Respond with a JSON array of items.",
            self.model.clone(),
        )
        .with_tools(["WebSearch", "WebFetch"])
        .with_timeout(self.agent_timeout);
        let outcome = self.agent_runner.run(invocation).await?;

        let decisions: Vec<Decision> = serde_json::from_str(&outcome.assistant_text).unwrap_or_default();

        let mut created = Vec::new();
        for decision in decisions.into_iter().take(self.cap_per_day as usize) {
            let existing = self
                .tracker
                .list_open_issues(&[Label::TaskAnalysis.as_str().to_string()])
                .await?;
            if existing.iter().any(|i| i.title.contains(&decision.id)) {
                info!(decision = %decision.id, "duplicate decision, skipping");
                continue;
            }

            // The issue body carries the full Decision as JSON so
            // `Dispatcher::execute_analysis` can deserialize it back out
            // once the issue is picked off the backlog.
            let body = serde_json::to_string_pretty(&decision).unwrap_or_default();
            let number = self
                .tracker
                .create_issue(NewIssue {
                    title: format!("[{}] {}", decision.id, decision.title),
                    body,
                    labels: vec![
                        IssueState::Proposed.label().to_string(),
                        Label::TaskAnalysis.as_str().to_string(),
                    ],
                })
                .await?;
            created.push(number);
        }

        let today = Utc::now().date_naive().to_string();
        self.state_store
            .store("news_scout_state.json", &json!({ "last_date": today }))
            .await?;

        Ok(created)
    }
}

/// Research scout: unbounded issues per run, but only one run per
/// configured interval (default weekly), deduped against open
/// `research-scout` issues by title (§4.6).
pub struct ResearchScout {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    state_store: Arc<dyn StateStorePort>,
    system_prompt: String,
    model: String,
    agent_timeout: Duration,
    interval: Duration,
}

#[derive(Deserialize)]
struct ResearchItem {
    title: String,
    description: String,
}

impl ResearchScout {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        state_store: Arc<dyn StateStorePort>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        agent_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            state_store,
            system_prompt: system_prompt.into(),
            model: model.into(),
            agent_timeout,
            interval,
        }
    }

    pub async fn due(&self, now: chrono::DateTime<Utc>) -> Result<bool, CollaboratorError> {
        let state = self.state_store.load("research_scout_state.json").await?;
        let last_ts = state
            .and_then(|v| serde_json::from_value::<TimestampState>(v).ok())
            .and_then(|s| s.last_ts)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok());
        match last_ts {
            None => Ok(true),
            Some(last) => Ok(now.signed_duration_since(last).to_std().unwrap_or(Duration::MAX) >= self.interval),
        }
    }

    pub async fn run(&self, now: chrono::DateTime<Utc>) -> Result<Vec<u64>, CollaboratorError> {
        let invocation = AgentInvocation::new(
            self.system_prompt.clone(),
            "Propose research topics worth investigating. Respond with a JSON array of {title, description}.",
            self.model.clone(),
        )
        .with_tools(["WebSearch", "WebFetch"])
        .with_timeout(self.agent_timeout);
        let outcome = self.agent_runner.run(invocation).await?;
        let items: Vec<ResearchItem> = serde_json::from_str(&outcome.assistant_text).unwrap_or_default();

        let existing = self
            .tracker
            .list_open_issues(&[Label::ResearchScout.as_str().to_string()])
            .await?;

        let mut created = Vec::new();
        for item in items {
            if existing.iter().any(|i| i.title == item.title) {
                continue;
            }
            let number = self
                .tracker
                .create_issue(NewIssue {
                    title: item.title,
                    body: item.description,
                    labels: vec![
                        IssueState::Proposed.label().to_string(),
                        Label::ResearchScout.as_str().to_string(),
                    ],
                })
                .await?;
            created.push(number);
        }

        self.state_store
            .store(
                "research_scout_state.json",
                &json!({ "last_ts": now.to_rfc3339() }),
            )
            .await?;
        Ok(created)
    }
}

/// Which director role is spawning (project director vs strategic
/// director): same cap-enforcement, different prompt and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorRole {
    Project,
    Strategic,
}

impl DirectorRole {
    fn label(&self) -> &'static str {
        match self {
            DirectorRole::Project => Label::DirectorSuggestion.as_str(),
            DirectorRole::Strategic => Label::StrategySuggestion.as_str(),
        }
    }
}

#[derive(Deserialize, Serialize)]
struct DirectorItem {
    title: String,
    description: String,
}

/// Project/strategic director: at most `cap` issues per invocation,
/// hard-enforced regardless of agent output (§4.6).
pub struct Director {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    role: DirectorRole,
    system_prompt: String,
    model: String,
    agent_timeout: Duration,
    cap: u32,
}

impl Director {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        role: DirectorRole,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        agent_timeout: Duration,
        cap: u32,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            role,
            system_prompt: system_prompt.into(),
            model: model.into(),
            agent_timeout,
            cap,
        }
    }

    pub async fn run(&self) -> Result<Vec<u64>, CollaboratorError> {
        let invocation = AgentInvocation::new(
            self.system_prompt.clone(),
            "Review recent telemetry and backlog state, propose improvement tasks.",
            self.model.clone(),
        )
        .with_tools(AgentInvocation::read_only_tools())
        .with_timeout(self.agent_timeout);
        let outcome = self.agent_runner.run(invocation).await?;
        let items: Vec<DirectorItem> = serde_json::from_str(&outcome.assistant_text).unwrap_or_default();

        let mut created = Vec::new();
        for item in items.into_iter().take(self.cap as usize) {
            let number = self
                .tracker
                .create_issue(NewIssue {
                    title: item.title,
                    body: item.description,
                    labels: vec![IssueState::Proposed.label().to_string(), self.role.label().to_string()],
                })
                .await?;
            created.push(number);
        }
        if created.len() as u32 >= self.cap {
            warn!(role = ?self.role, cap = self.cap, "director output truncated to cap");
        }
        Ok(created)
    }
}

/// Editorial review: one invocation per completed analysis, non-blocking
/// (failures here never fail the analysis's own cycle, §4.6).
pub struct EditorialReview {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    system_prompt: String,
    model: String,
    agent_timeout: Duration,
}

impl EditorialReview {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            system_prompt: system_prompt.into(),
            model: model.into(),
            agent_timeout,
        }
    }

    pub async fn run(&self, decision_id: &str) -> Result<(), CollaboratorError> {
        let invocation = AgentInvocation::new(
            self.system_prompt.clone(),
            format!("Editorially review the published analysis for {decision_id}."),
            self.model.clone(),
        )
        .with_tools(AgentInvocation::read_only_tools())
        .with_timeout(self.agent_timeout);
        match self.agent_runner.run(invocation).await {
            Ok(outcome) => {
                if let Ok(items) = serde_json::from_str::<Vec<DirectorItem>>(&outcome.assistant_text) {
                    for item in items {
                        let _ = self
                            .tracker
                            .create_issue(NewIssue {
                                title: item.title,
                                body: item.description,
                                labels: vec![
                                    IssueState::Proposed.label().to_string(),
                                    Label::EditorialQuality.as_str().to_string(),
                                ],
                            })
                            .await;
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "editorial review failed, non-blocking");
                Ok(())
            }
        }
    }
}
