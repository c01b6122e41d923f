//! Subprocess-backed [`AgentRunnerPort`] adapter (§4.1, §9 of SPEC_FULL).
//!
//! Spawns a configurable agent binary, writes the invocation as one JSON
//! object on stdin, and streams newline-delimited JSON messages off
//! stdout until the process exits or the wall-clock deadline hits. Each
//! message is expected to carry a `type` field; the adapter keeps the
//! text of the last message with `type == "assistant"` and returns that
//! as the outcome, mirroring the teacher's `CopilotSession` pattern of
//! routing streamed JSON-RPC messages down to one final response value,
//! but flattened to a single fire-and-forget subprocess instead of a
//! persistent session.
//!
//! Every invocation is a fresh process: no session state crosses calls.
//! stdout and stderr are always drained to EOF before the child is
//! reaped, on every exit path including timeout, so a child that buffers
//! output in a full pipe can never deadlock the adapter (§5, §9).

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use agora_application::ports::agent_runner::{AgentInvocation, AgentOutcome, AgentRunError, AgentRunnerPort};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// The environment variable the engine always clears before spawning an
/// agent, and that an agent binary checks to refuse recursive
/// self-spawning (§9 of SPEC_FULL: "the nested-session sentinel").
pub const NESTED_SESSION_VAR: &str = "AGORA_NESTED_SESSION";

#[derive(Serialize)]
struct SubprocessRequest<'a> {
    system_prompt: &'a str,
    user_prompt: &'a str,
    model: &'a str,
    allowed_tools: &'a BTreeSet<String>,
    max_turns: u32,
    effort: &'a str,
}

/// Spawns `binary_path` for every invocation (§4.1: "invoke an external
/// LLM agent as an isolated subprocess").
pub struct SubprocessAgentRunner {
    binary_path: PathBuf,
    effort: String,
}

impl SubprocessAgentRunner {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            effort: "medium".to_string(),
        }
    }

    pub fn with_effort(mut self, effort: impl Into<String>) -> Self {
        self.effort = effort.into();
        self
    }

    fn spawn(&self, invocation: &AgentInvocation) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_remove(NESTED_SESSION_VAR);
        for (key, value) in &invocation.env_overrides {
            if key == NESTED_SESSION_VAR {
                continue;
            }
            cmd.env(key, value);
        }
        cmd.spawn()
    }
}

#[async_trait]
impl AgentRunnerPort for SubprocessAgentRunner {
    async fn run(&self, invocation: AgentInvocation) -> Result<AgentOutcome, AgentRunError> {
        let span = tracing::info_span!(
            "agent_invocation",
            model = %invocation.model,
            allowed_tools = invocation.allowed_tools.len(),
            max_turns = invocation.max_turns,
        );
        let _enter = span.enter();
        let started = Instant::now();

        let mut child = self
            .spawn(&invocation)
            .map_err(|e| AgentRunError::ExecError(format!("failed to spawn agent binary: {e}")))?;

        let request = SubprocessRequest {
            system_prompt: &invocation.system_prompt,
            user_prompt: &invocation.user_prompt,
            model: &invocation.model,
            allowed_tools: &invocation.allowed_tools,
            max_turns: invocation.max_turns,
            effort: &self.effort,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| AgentRunError::ExecError(format!("failed to encode request: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                warn!(error = %e, "failed to write request to agent stdin");
            }
            drop(stdin);
        }

        let run_fut = drain_and_wait(&mut child);
        match tokio::time::timeout(invocation.timeout, run_fut).await {
            Ok(Ok(outcome)) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "agent invocation complete");
                Ok(outcome)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // Timeout: escalate kill, reap, and return whatever partial
                // text had streamed so far (§4.1, §5: "terminated,
                // escalating to kill").
                let partial = kill_and_collect_partial(&mut child).await;
                warn!(timeout_secs = invocation.timeout.as_secs(), "agent invocation timed out");
                Err(AgentRunError::Timeout {
                    elapsed_secs: started.elapsed().as_secs(),
                    partial_text: partial,
                })
            }
        }
    }
}

/// Stream stdout line by line, keeping the text of the most recent
/// `{"type":"assistant",...}` message; fully drain stderr in parallel so
/// a chatty child never blocks on a full pipe. Wait for exit only after
/// both streams hit EOF (§5, §9).
async fn drain_and_wait(child: &mut Child) -> Result<AgentOutcome, AgentRunError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AgentRunError::ExecError("agent subprocess has no stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AgentRunError::ExecError("agent subprocess has no stderr".to_string()))?;

    let stdout_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        let mut last_assistant_text: Option<String> = None;
        while let Ok(Some(line)) = reader.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<Value>(&line) {
                if let Some(text) = extract_assistant_text(&value) {
                    last_assistant_text = Some(text);
                }
            } else {
                debug!(line = %line, "non-JSON line from agent stdout, ignored");
            }
        }
        last_assistant_text
    });

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let mut stderr = stderr;
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let status = child
        .wait()
        .await
        .map_err(|e| AgentRunError::ExecError(format!("failed to wait on agent subprocess: {e}")))?;

    let assistant_text = stdout_task.await.unwrap_or(None);
    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(AgentRunError::ExecError(format!(
            "agent subprocess exited with {status}: {}",
            stderr_text.trim()
        )));
    }

    match assistant_text {
        Some(text) if !text.trim().is_empty() => Ok(AgentOutcome { assistant_text: text }),
        _ => Err(AgentRunError::Empty),
    }
}

/// Extract the final assistant text block from one streamed message
/// (§4.1, §6: "the engine collects the final assistant text block").
fn extract_assistant_text(value: &Value) -> Option<String> {
    if value.get("type")?.as_str()? != "assistant" {
        return None;
    }
    value
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value.get("content").and_then(|c| {
                c.as_array().map(|blocks| {
                    blocks
                        .iter()
                        .filter_map(|b| b.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("")
                })
            })
        })
}

async fn kill_and_collect_partial(child: &mut Child) -> Option<String> {
    let _ = child.start_kill();
    let mut partial = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = tokio::time::timeout(Duration::from_secs(2), stdout.read_to_string(&mut partial)).await;
    }
    let _ = child.wait().await;
    if partial.trim().is_empty() {
        None
    } else {
        Some(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_assistant_text_field() {
        let msg = serde_json::json!({ "type": "assistant", "text": "hello" });
        assert_eq!(extract_assistant_text(&msg), Some("hello".to_string()));
    }

    #[test]
    fn extracts_assistant_content_blocks() {
        let msg = serde_json::json!({
            "type": "assistant",
            "content": [{ "text": "foo" }, { "text": "bar" }]
        });
        assert_eq!(extract_assistant_text(&msg), Some("foobar".to_string()));
    }

    #[test]
    fn ignores_non_assistant_messages() {
        let msg = serde_json::json!({ "type": "tool_call", "text": "ignored" });
        assert_eq!(extract_assistant_text(&msg), None);
    }

    #[tokio::test]
    async fn runs_a_real_subprocess_and_collects_output() {
        // Use `cat` as a stand-in agent binary: it never writes a
        // well-formed assistant message, so this exercises the
        // spawn/drain/reap path end-to-end and expects `AgentEmpty`.
        let runner = SubprocessAgentRunner::new("cat");
        let invocation = AgentInvocation::new("sys", "user", "test-model").with_timeout(Duration::from_secs(5));
        let result = runner.run(invocation).await;
        assert!(matches!(result, Err(AgentRunError::Empty)));
    }

    #[tokio::test]
    async fn missing_binary_is_an_exec_error() {
        let runner = SubprocessAgentRunner::new("/no/such/agent-binary-xyz");
        let invocation = AgentInvocation::new("sys", "user", "test-model").with_timeout(Duration::from_secs(5));
        let result = runner.run(invocation).await;
        assert!(matches!(result, Err(AgentRunError::ExecError(_))));
    }
}
