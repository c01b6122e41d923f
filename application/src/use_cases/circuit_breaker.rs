//! Circuit breaker (§4.8): a mechanical, no-LLM rule that inspects the
//! last K telemetry records and files a stability issue when the same
//! `(phase, kind, normalized_message)` triple recurs.

use std::collections::HashMap;
use std::sync::Arc;

use agora_domain::{CycleTelemetry, ErrorKind, IssueState, Label};

use crate::ports::tracker::{NewIssue, TrackerError, TrackerPort};

pub struct CircuitBreaker {
    tracker: Arc<dyn TrackerPort>,
    window: usize,
    threshold: usize,
}

impl CircuitBreaker {
    pub fn new(tracker: Arc<dyn TrackerPort>, window: usize, threshold: usize) -> Self {
        Self {
            tracker,
            window,
            threshold,
        }
    }

    /// Inspect `recent` (most-recent-first or in any order; only the last
    /// `window` entries matter) and file at most one open issue per
    /// offending triple (§4.8, §8: "idempotently — duplicate open issues
    /// with the same triple are skipped").
    pub async fn check(&self, recent: &[CycleTelemetry]) -> Result<Vec<u64>, TrackerError> {
        let window: Vec<&CycleTelemetry> = recent.iter().rev().take(self.window).collect();

        let mut counts: HashMap<(String, ErrorKind, String), usize> = HashMap::new();
        for cycle in &window {
            // One occurrence per cycle regardless of how many phases in
            // that cycle matched the same triple (§9 Open Questions).
            let mut seen_this_cycle = std::collections::HashSet::new();
            for phase in &cycle.phases {
                let Some(error) = &phase.error else { continue };
                let key = (phase.action.clone(), error.kind, error.normalized_message());
                if seen_this_cycle.insert(key.clone()) {
                    *counts.entry(key).or_insert(0) += 1;
                }
            }
        }

        let existing_open = self
            .tracker
            .list_open_issues(&[Label::PriorityHigh.as_str().to_string()])
            .await?;

        let mut filed = Vec::new();
        for ((phase, kind, message), count) in counts {
            if count < self.threshold {
                continue;
            }
            let title = format!("Recurring failure: {phase} / {kind:?} / {message}");
            if existing_open.iter().any(|i| i.title == title) {
                continue;
            }
            let number = self
                .tracker
                .create_issue(NewIssue {
                    title,
                    body: format!(
                        "Triggered by the circuit breaker: {phase} failed with {kind:?} \
                         at least {count} time(s) in the last {} cycles.",
                        self.window
                    ),
                    labels: vec![
                        IssueState::Proposed.label().to_string(),
                        Label::PriorityHigh.as_str().to_string(),
                    ],
                })
                .await?;
            filed.push(number);
        }

        Ok(filed)
    }
}
