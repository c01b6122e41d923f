//! Debate filter (triage, §4.4): turn a raw proposed improvement into
//! either `self-improve:backlog` or `self-improve:rejected` without a
//! third LLM judge. The scoring itself is [`agora_domain::judge`]; this
//! use case only spawns the two agents, records their outputs as comments,
//! and applies the resulting labels.

use std::sync::Arc;
use std::time::Duration;

use agora_domain::{judge, AdvocateOutput, DebateVerdict, ErrorKind, Issue, IssueState, Label, SkepticOutput};
use thiserror::Error;
use tracing::info;

use crate::ports::agent_runner::{AgentInvocation, AgentRunError, AgentRunnerPort};
use crate::ports::tracker::{TrackerError, TrackerPort};

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("advocate or skeptic agent failed: {0}")]
    Agent(#[from] AgentRunError),
    #[error("tracker call failed: {0}")]
    Tracker(#[from] TrackerError),
    #[error("debate agent output did not parse against the expected schema")]
    Parse,
}

impl DebateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DebateError::Agent(e) => e.kind(),
            DebateError::Tracker(TrackerError::StateConflict(_)) => ErrorKind::StateConflict,
            DebateError::Tracker(TrackerError::Fatal(_)) => ErrorKind::TrackerFatal,
            DebateError::Parse => ErrorKind::AgentParseError,
        }
    }
}

pub struct DebatePrompts {
    pub advocate_system_prompt: String,
    pub skeptic_system_prompt: String,
}

pub struct DebateFilter {
    agent_runner: Arc<dyn AgentRunnerPort>,
    tracker: Arc<dyn TrackerPort>,
    prompts: DebatePrompts,
    model: String,
    agent_timeout: Duration,
    threshold: i32,
}

impl DebateFilter {
    pub fn new(
        agent_runner: Arc<dyn AgentRunnerPort>,
        tracker: Arc<dyn TrackerPort>,
        prompts: DebatePrompts,
        model: impl Into<String>,
        agent_timeout: Duration,
        threshold: i32,
    ) -> Self {
        Self {
            agent_runner,
            tracker,
            prompts,
            model: model.into(),
            agent_timeout,
            threshold,
        }
    }

    /// Run the debate for one proposed-improvement issue, or apply the
    /// human-suggestion bypass (§4.4: "checked before spawning any agent").
    pub async fn run(&self, issue: &Issue) -> Result<DebateVerdict, DebateError> {
        if issue.has_label(Label::HumanSuggestion) {
            info!(issue = issue.number, "human-suggestion bypass, skipping debate");
            self.tracker
                .add_labels(issue.number, &[IssueState::Backlog.label().to_string()])
                .await?;
            return Ok(DebateVerdict {
                accepted: true,
                strength_score: 10,
                weakness_score: 0,
                threshold: self.threshold,
            });
        }

        let advocate_invocation = AgentInvocation::new(
            self.prompts.advocate_system_prompt.clone(),
            format!("Proposal:\n{}\n\n{}", issue.title, issue.body),
            self.model.clone(),
        )
        .with_timeout(self.agent_timeout);
        let advocate_text = self.agent_runner.run(advocate_invocation).await?;
        let advocate: AdvocateOutput =
            serde_json::from_str(&advocate_text.assistant_text).map_err(|_| DebateError::Parse)?;

        let skeptic_invocation = AgentInvocation::new(
            self.prompts.skeptic_system_prompt.clone(),
            format!(
                "Proposal:\n{}\n\n{}\n\nAdvocate output: {}",
                issue.title,
                issue.body,
                serde_json::to_string(&advocate).unwrap_or_default()
            ),
            self.model.clone(),
        )
        .with_timeout(self.agent_timeout);
        let skeptic_text = self.agent_runner.run(skeptic_invocation).await?;
        let skeptic: SkepticOutput =
            serde_json::from_str(&skeptic_text.assistant_text).map_err(|_| DebateError::Parse)?;

        let verdict = judge(&advocate, &skeptic, self.threshold);

        self.tracker
            .post_comment(
                issue.number,
                &format!(
                    "Advocate (strength {}): {}",
                    advocate.strength_score,
                    advocate.key_arguments.join("; ")
                ),
            )
            .await?;
        self.tracker
            .post_comment(
                issue.number,
                &format!(
                    "Skeptic (weakness {}): {}",
                    skeptic.weakness_score,
                    skeptic.risks.join("; ")
                ),
            )
            .await?;

        if verdict.accepted {
            self.tracker
                .add_labels(issue.number, &[IssueState::Backlog.label().to_string()])
                .await?;
        } else {
            self.tracker
                .add_labels(issue.number, &[IssueState::Rejected.label().to_string()])
                .await?;
            self.tracker.close_issue(issue.number).await?;
        }

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_runner::{AgentOutcome, AgentRunError};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    struct ScriptedAgentRunner {
        responses: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl AgentRunnerPort for ScriptedAgentRunner {
        async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
            let mut responses = self.responses.lock().unwrap();
            Ok(AgentOutcome {
                assistant_text: responses.remove(0).to_string(),
            })
        }
    }

    struct FakeTracker {
        comments: Mutex<Vec<String>>,
        labels_added: Mutex<Vec<String>>,
        closed: Mutex<bool>,
    }

    impl FakeTracker {
        fn new() -> Self {
            Self {
                comments: Mutex::new(vec![]),
                labels_added: Mutex::new(vec![]),
                closed: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl TrackerPort for FakeTracker {
        async fn list_open_issues(&self, _labels: &[String]) -> Result<Vec<Issue>, TrackerError> {
            Ok(vec![])
        }
        async fn read_issue(&self, _number: u64) -> Result<Issue, TrackerError> {
            unimplemented!()
        }
        async fn create_issue(&self, _issue: crate::ports::tracker::NewIssue) -> Result<u64, TrackerError> {
            Ok(1)
        }
        async fn add_labels(&self, _number: u64, labels: &[String]) -> Result<(), TrackerError> {
            self.labels_added.lock().unwrap().extend(labels.iter().cloned());
            Ok(())
        }
        async fn remove_labels(&self, _number: u64, _labels: &[String]) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn close_issue(&self, _number: u64) -> Result<(), TrackerError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
        async fn post_comment(&self, _number: u64, body: &str) -> Result<(), TrackerError> {
            self.comments.lock().unwrap().push(body.to_string());
            Ok(())
        }
        async fn create_branch(&self, _name: &str, _from: &str) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn open_pr(&self, _branch: &str, _title: &str, _body: &str) -> Result<u64, TrackerError> {
            Ok(1)
        }
        async fn read_pr(&self, _number: u64) -> Result<agora_domain::PullRequest, TrackerError> {
            unimplemented!()
        }
        async fn list_pr_review_comments(&self, _number: u64) -> Result<Vec<String>, TrackerError> {
            Ok(vec![])
        }
        async fn merge_pr(&self, _number: u64) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn close_pr(&self, _number: u64) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn recent_ci_runs(&self, _limit: u32) -> Result<Vec<agora_domain::CheckStatusSummary>, TrackerError> {
            Ok(vec![])
        }
    }

    fn issue(labels: &[&str]) -> Issue {
        Issue {
            number: 5,
            title: "Proposal".to_string(),
            body: "do the thing".to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            state: agora_domain::IssueOpenState::Open,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn prompts() -> DebatePrompts {
        DebatePrompts {
            advocate_system_prompt: "advocate".to_string(),
            skeptic_system_prompt: "skeptic".to_string(),
        }
    }

    #[tokio::test]
    async fn human_suggestion_bypasses_debate_without_spawning_agents() {
        struct Never;
        #[async_trait]
        impl AgentRunnerPort for Never {
            async fn run(&self, _invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
                panic!("must not spawn an agent on the human-suggestion bypass");
            }
        }
        let tracker = Arc::new(FakeTracker::new());
        let filter = DebateFilter::new(Arc::new(Never), tracker.clone(), prompts(), "model", Duration::from_secs(1), 2);

        let verdict = filter.run(&issue(&["self-improve:proposed", "human-suggestion"])).await.unwrap();
        assert!(verdict.accepted);
        assert!(tracker.labels_added.lock().unwrap().contains(&IssueState::Backlog.label().to_string()));
    }

    #[tokio::test]
    async fn accepts_when_margin_meets_threshold() {
        let tracker = Arc::new(FakeTracker::new());
        let runner = Arc::new(ScriptedAgentRunner {
            responses: Mutex::new(vec![
                r#"{"strength_score": 9, "key_arguments": ["a"]}"#,
                r#"{"weakness_score": 2, "risks": ["b"]}"#,
            ]),
        });
        let filter = DebateFilter::new(runner, tracker.clone(), prompts(), "model", Duration::from_secs(1), 2);

        let verdict = filter.run(&issue(&["self-improve:proposed"])).await.unwrap();
        assert!(verdict.accepted);
        assert!(tracker.labels_added.lock().unwrap().contains(&IssueState::Backlog.label().to_string()));
        assert_eq!(tracker.comments.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejects_and_closes_when_margin_below_threshold() {
        let tracker = Arc::new(FakeTracker::new());
        let runner = Arc::new(ScriptedAgentRunner {
            responses: Mutex::new(vec![
                r#"{"strength_score": 4, "key_arguments": []}"#,
                r#"{"weakness_score": 5, "risks": []}"#,
            ]),
        });
        let filter = DebateFilter::new(runner, tracker.clone(), prompts(), "model", Duration::from_secs(1), 2);

        let verdict = filter.run(&issue(&["self-improve:proposed"])).await.unwrap();
        assert!(!verdict.accepted);
        assert!(tracker.labels_added.lock().unwrap().contains(&IssueState::Rejected.label().to_string()));
        assert!(*tracker.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn unparseable_advocate_output_is_a_parse_error() {
        let tracker = Arc::new(FakeTracker::new());
        let runner = Arc::new(ScriptedAgentRunner {
            responses: Mutex::new(vec!["not json"]),
        });
        let filter = DebateFilter::new(runner, tracker, prompts(), "model", Duration::from_secs(1), 2);

        let result = filter.run(&issue(&["self-improve:proposed"])).await;
        assert!(matches!(result, Err(DebateError::Parse)));
    }
}
