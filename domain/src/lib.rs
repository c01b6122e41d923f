//! Domain layer for the Agora cycle engine.
//!
//! Entities, value objects, closed enums, and the handful of pure
//! functions (the backlog selector, the debate judge) that must never
//! depend on I/O or an async runtime. Everything here is a value type;
//! ownership of external identity (issue numbers, PR numbers) belongs to
//! the tracker, not to these types.

pub mod assessment;
pub mod backlog;
pub mod conductor;
pub mod core;
pub mod debate;
pub mod decision;
pub mod issue;
pub mod session_result;
pub mod telemetry;

pub use assessment::{Assessment, CounterProposal as MinistryCounterProposal, Ministry, Verdict};
pub use backlog::{step_pick, IssuePick};
pub use conductor::{Action, ConductorPlan};
pub use core::error::{ErrorKind, StructuredError};
pub use core::string::truncate;
pub use debate::{judge, AdvocateOutput, DebateVerdict, SkepticOutput};
pub use decision::{derive_decision_id, Category, Decision};
pub use issue::{
    CheckStatus, CheckStatusSummary, Issue, IssueOpenState, IssueState, Label, PrState,
    PullRequest,
};
pub use session_result::{CriticReport, ParliamentDebate, SessionResult, UnifiedCounterProposal};
pub use telemetry::{CyclePhaseResult, CycleTelemetry, YieldKind};
