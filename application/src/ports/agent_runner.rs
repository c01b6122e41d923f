//! Agent subprocess runner port (§4.1).
//!
//! Mirrors the shape of the teacher's `LlmGateway` port: a trait the
//! application layer calls, implemented by a subprocess adapter in
//! infrastructure. Unlike an in-process LLM session, every invocation here
//! is a single fire-and-forget subprocess — there is no persistent session
//! object to hand back.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// One agent subprocess invocation (§4.1 contract).
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub allowed_tools: BTreeSet<String>,
    pub max_turns: u32,
    pub timeout: Duration,
    pub env_overrides: Vec<(String, String)>,
}

impl AgentInvocation {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: model.into(),
            allowed_tools: BTreeSet::new(),
            max_turns: 1,
            timeout: Duration::from_secs(300),
            env_overrides: Vec::new(),
        }
    }

    /// No-tool invocation, as the Conductor's primary planning call uses
    /// (§4.7: "Primary: no-tool agent call").
    pub fn no_tools(mut self) -> Self {
        self.allowed_tools.clear();
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Read-only tool set for the reviewer (§4.3: "must never include
    /// write/edit tools") and the recovery Conductor agent (§4.7).
    pub fn read_only_tools() -> BTreeSet<String> {
        ["Read", "Grep", "Glob", "WebSearch", "WebFetch"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Successful invocation outcome (§4.1).
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub assistant_text: String,
}

/// Classified failure of an agent invocation (§4.1, §7).
#[derive(Error, Debug, Clone)]
pub enum AgentRunError {
    #[error("agent subprocess exited non-zero or failed to spawn: {0}")]
    ExecError(String),

    #[error("agent subprocess timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64, partial_text: Option<String> },

    #[error("agent subprocess produced no extractable text")]
    Empty,
}

impl AgentRunError {
    pub fn kind(&self) -> agora_domain::ErrorKind {
        match self {
            AgentRunError::ExecError(_) => agora_domain::ErrorKind::AgentExecError,
            AgentRunError::Timeout { .. } => agora_domain::ErrorKind::AgentTimeout,
            AgentRunError::Empty => agora_domain::ErrorKind::AgentEmpty,
        }
    }
}

/// Port for spawning an isolated agent subprocess (§4.1).
///
/// Implementations guarantee: each invocation is an independent process,
/// no state is shared between invocations, stdio is fully drained before
/// reaping on every path including timeout/cancellation, and the
/// nested-session sentinel is always cleared before spawn.
#[async_trait]
pub trait AgentRunnerPort: Send + Sync {
    async fn run(&self, invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError>;
}
