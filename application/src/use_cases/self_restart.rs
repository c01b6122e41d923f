//! Self-restart / re-exec (§4.9): let a merged PR take effect within the
//! running process by pulling the update, reinstalling dependencies, and
//! replacing the process image in place.

use agora_domain::ErrorKind;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("telemetry push failed: {0}")]
    Push(String),
    #[error("fast-forward pull was not possible, aborting re-exec")]
    NotFastForwardable,
    #[error("dependency reinstall step failed: {0}")]
    DependencyInstall(String),
    #[error("process replacement is unsupported on this platform")]
    UnsupportedPlatform,
}

impl RestartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RestartError::NotFastForwardable => ErrorKind::StateConflict,
            _ => ErrorKind::EngineCrash,
        }
    }
}

/// Port for the platform-specific steps of the re-exec sequence, so the
/// use case stays testable without actually forking `git`/the process
/// image. The infrastructure adapter shells out to `git`/`gh` and calls
/// `libc::execvp` on unix (§9 of SPEC_FULL).
#[async_trait]
pub trait RestartOps: Send + Sync {
    async fn push_telemetry_journal(&self) -> Result<(), RestartError>;
    async fn fast_forward_pull(&self) -> Result<(), RestartError>;
    async fn reinstall_dependencies(&self) -> Result<(), RestartError>;
    /// Replace the running process image, preserving argv. Only returns on
    /// failure — success never returns to the caller.
    async fn reexec(&self) -> Result<(), RestartError>;
}

pub struct SelfRestart<O: RestartOps> {
    ops: O,
}

impl<O: RestartOps> SelfRestart<O> {
    pub fn new(ops: O) -> Self {
        Self { ops }
    }

    /// Run the full sequence (§4.9): push, pull, reinstall, re-exec. Any
    /// failure aborts the sequence and is returned; the engine continues
    /// running on the old process image.
    pub async fn run(&self) -> Result<(), RestartError> {
        self.ops.push_telemetry_journal().await?;
        self.ops.fast_forward_pull().await?;
        self.ops.reinstall_dependencies().await?;
        self.ops.reexec().await
    }
}
