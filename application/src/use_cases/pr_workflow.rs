//! PR workflow (§4.3): drive a task linked to an issue to a merged PR or a
//! capped failure through alternating coder/reviewer rounds.

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{CheckStatus, ErrorKind, Issue, IssueState};
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::agent_runner::{AgentInvocation, AgentRunError, AgentRunnerPort};
use crate::ports::tracker::{TrackerError, TrackerPort};

const VERDICT_APPROVED: &str = "VERDICT: APPROVED";
const VERDICT_CHANGES_REQUESTED: &str = "VERDICT: CHANGES_REQUESTED";

#[derive(Debug, Error)]
pub enum PrWorkflowError {
    #[error("agent invocation failed: {0}")]
    Agent(#[from] AgentRunError),
    #[error("tracker call failed: {0}")]
    Tracker(#[from] TrackerError),
    #[error("coder↔reviewer rounds exhausted without approval")]
    Exhausted,
}

impl PrWorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrWorkflowError::Agent(e) => e.kind(),
            PrWorkflowError::Tracker(TrackerError::StateConflict(_)) => ErrorKind::StateConflict,
            PrWorkflowError::Tracker(TrackerError::Fatal(_)) => ErrorKind::TrackerFatal,
            PrWorkflowError::Exhausted => ErrorKind::AgentExecError,
        }
    }
}

/// Outcome of a completed PR workflow run. Exhaustion is reported as
/// `Err(PrWorkflowError::Exhausted)`, not as a variant here, so the
/// dispatcher's generic failure-recording path handles it uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrWorkflowOutcome {
    Merged { pr_number: u64 },
}

pub struct PrWorkflowPrompts {
    pub coder_system_prompt: String,
    pub reviewer_system_prompt: String,
}

pub struct PrWorkflow {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    prompts: PrWorkflowPrompts,
    model: String,
    agent_timeout: Duration,
    max_rounds: u32,
}

impl PrWorkflow {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        prompts: PrWorkflowPrompts,
        model: impl Into<String>,
        agent_timeout: Duration,
        max_rounds: u32,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            prompts,
            model: model.into(),
            agent_timeout,
            max_rounds,
        }
    }

    /// Drive `issue` (already labeled `task:code-change`, `in-progress`)
    /// through the coder↔reviewer state machine (§4.3).
    pub async fn run(&self, issue: &Issue) -> Result<PrWorkflowOutcome, PrWorkflowError> {
        let branch = format!("agora/issue-{}", issue.number);
        self.tracker.create_branch(&branch, "main").await?;

        let mut pr_number: Option<u64> = None;
        let mut feedback = String::new();

        for round in 1..=self.max_rounds {
            info!(issue = issue.number, round, "coder round");
            let coder_invocation = AgentInvocation::new(
                self.prompts.coder_system_prompt.clone(),
                format!(
                    "Task:\n{}\n\n{}\n\n{}",
                    issue.title,
                    issue.body,
                    if feedback.is_empty() {
                        String::new()
                    } else {
                        format!("Reviewer feedback from the previous round:\n{feedback}")
                    }
                ),
                self.model.clone(),
            )
            .with_timeout(self.agent_timeout);
            self.agent_runner.run(coder_invocation).await?;

            let pr = match pr_number {
                Some(n) => self.tracker.read_pr(n).await?,
                None => {
                    let title = format!("{} (Closes #{})", issue.title, issue.number);
                    let body = format!("{}\n\nCloses #{}", issue.body, issue.number);
                    let n = self.tracker.open_pr(&branch, &title, &body).await?;
                    pr_number = Some(n);
                    self.tracker.read_pr(n).await?
                }
            };

            if pr.check_status == CheckStatus::Fail {
                feedback = "Local checks failed on the branch; fix and retry.".to_string();
                continue;
            }

            info!(issue = issue.number, pr = pr.number, "reviewer round");
            let reviewer_invocation = AgentInvocation::new(
                self.prompts.reviewer_system_prompt.clone(),
                format!("Review PR #{} for issue #{}.", pr.number, issue.number),
                self.model.clone(),
            )
            .with_tools(AgentInvocation::read_only_tools())
            .with_timeout(self.agent_timeout);
            self.agent_runner.run(reviewer_invocation).await?;

            let comments = self.tracker.list_pr_review_comments(pr.number).await?;
            let approved = comments.iter().any(|c| c.contains(VERDICT_APPROVED));
            let changes_requested = comments.iter().any(|c| c.contains(VERDICT_CHANGES_REQUESTED));

            if approved && !changes_requested {
                self.tracker.merge_pr(pr.number).await?;
                self.tracker
                    .add_labels(issue.number, &[IssueState::Done.label().to_string()])
                    .await?;
                self.tracker.close_issue(issue.number).await?;
                return Ok(PrWorkflowOutcome::Merged { pr_number: pr.number });
            }

            // Fail-closed (§4.3): no recognizable verdict marker is treated
            // as changes requested.
            feedback = comments.join("\n");
        }

        warn!(issue = issue.number, "pr workflow exhausted rounds");
        if let Some(n) = pr_number {
            self.tracker.close_pr(n).await?;
        }
        self.tracker
            .add_labels(issue.number, &[IssueState::Failed.label().to_string()])
            .await?;
        self.tracker
            .post_comment(
                issue.number,
                &format!("PR workflow exhausted after {} round(s) without approval.", self.max_rounds),
            )
            .await?;

        Err(PrWorkflowError::Exhausted)
    }
}
