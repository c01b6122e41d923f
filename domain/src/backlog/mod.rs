//! The deterministic 5-tier backlog selector (§4.5). A pure function over
//! an in-memory issue snapshot — re-derived every cycle so the tracker
//! stays the single source of truth (§9); it never maintains its own
//! queue.

use crate::issue::{Issue, IssueState, Label};

/// A selected issue plus which tier matched, useful for logging why the
/// Conductor/dispatcher picked what it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuePick {
    pub issue_number: u64,
    pub tier: SelectorTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTier {
    PriorityCritical,
    TaskAnalysis,
    HumanSuggestion,
    DirectorOrStrategySuggestion,
    Fifo,
}

fn is_backlog(issue: &Issue) -> bool {
    matches!(issue.lifecycle_state(), Some(IssueState::Backlog))
}

/// Select at most one open backlog issue per `pick_and_execute` action
/// (§4.5), applying the 5-tier priority in order:
///
/// 1. `priority:critical`, most recently created first.
/// 2. `task:analysis`, FIFO by creation time.
/// 3. `human-suggestion`.
/// 4. `director-suggestion` or `strategy-suggestion`.
/// 5. Everything else, oldest first.
pub fn step_pick(issues: &[Issue]) -> Option<IssuePick> {
    let backlog: Vec<&Issue> = issues.iter().filter(|i| is_backlog(i)).collect();

    if let Some(issue) = most_recent(backlog.iter().copied().filter(|i| i.has_label(Label::PriorityCritical))) {
        return Some(IssuePick {
            issue_number: issue.number,
            tier: SelectorTier::PriorityCritical,
        });
    }

    if let Some(issue) = oldest(backlog.iter().copied().filter(|i| i.has_label(Label::TaskAnalysis))) {
        return Some(IssuePick {
            issue_number: issue.number,
            tier: SelectorTier::TaskAnalysis,
        });
    }

    if let Some(issue) = oldest(backlog.iter().copied().filter(|i| i.has_label(Label::HumanSuggestion))) {
        return Some(IssuePick {
            issue_number: issue.number,
            tier: SelectorTier::HumanSuggestion,
        });
    }

    if let Some(issue) = oldest(backlog.iter().copied().filter(|i| {
        i.has_label(Label::DirectorSuggestion) || i.has_label(Label::StrategySuggestion)
    })) {
        return Some(IssuePick {
            issue_number: issue.number,
            tier: SelectorTier::DirectorOrStrategySuggestion,
        });
    }

    oldest(backlog.into_iter()).map(|issue| IssuePick {
        issue_number: issue.number,
        tier: SelectorTier::Fifo,
    })
}

fn oldest<'a, I: Iterator<Item = &'a Issue>>(iter: I) -> Option<&'a Issue> {
    iter.min_by(|a, b| a.created_at.cmp(&b.created_at))
}

fn most_recent<'a, I: Iterator<Item = &'a Issue>>(iter: I) -> Option<&'a Issue> {
    iter.max_by(|a, b| a.created_at.cmp(&b.created_at))
}
