//! `git`/process-replacement backed [`RestartOps`] adapter (§4.9, §11 of
//! SPEC_FULL).
//!
//! Wraps `git` the same way [`crate::reference::GhTracker`] does —
//! `tokio::process::Command`, full stdio capture, stderr surfaced on
//! failure — and adds the one step a tracker adapter never needs: process
//! replacement via `execvp` on unix. There is no portable equivalent, so
//! the non-unix path returns [`RestartError::UnsupportedPlatform`] rather
//! than silently no-op'ing.

use std::ffi::CString;
use std::path::PathBuf;

use agora_application::use_cases::self_restart::{RestartError, RestartOps};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

pub struct ProcessRestartOps {
    working_dir: PathBuf,
    telemetry_journal_path: PathBuf,
    install_command: Vec<String>,
}

impl ProcessRestartOps {
    pub fn new(working_dir: impl Into<PathBuf>, telemetry_journal_path: impl Into<PathBuf>, install_command: Vec<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            telemetry_journal_path: telemetry_journal_path.into(),
            install_command,
        }
    }

    async fn run_git(&self, args: &[&str]) -> Result<(), RestartError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| RestartError::Push(format!("failed to spawn git: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(RestartError::Push(format!("git {args:?} failed: {stderr}")))
        }
    }
}

#[async_trait]
impl RestartOps for ProcessRestartOps {
    async fn push_telemetry_journal(&self) -> Result<(), RestartError> {
        let path_str = self.telemetry_journal_path.to_string_lossy().to_string();
        self.run_git(&["add", &path_str]).await?;

        let status = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&self.working_dir)
            .status()
            .await
            .map_err(|e| RestartError::Push(format!("failed to spawn git: {e}")))?;
        if status.success() {
            // Nothing staged: journal unchanged since the last push.
            return Ok(());
        }

        self.run_git(&["commit", "-m", "chore: update telemetry journal"]).await?;
        self.run_git(&["push"]).await
    }

    async fn fast_forward_pull(&self) -> Result<(), RestartError> {
        let output = Command::new("git")
            .args(["fetch", "origin"])
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| RestartError::Push(format!("failed to spawn git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RestartError::Push(format!("git fetch failed: {stderr}")));
        }

        let merge = Command::new("git")
            .args(["merge", "--ff-only", "origin/HEAD"])
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| RestartError::Push(format!("failed to spawn git: {e}")))?;
        if merge.status.success() {
            Ok(())
        } else {
            Err(RestartError::NotFastForwardable)
        }
    }

    async fn reinstall_dependencies(&self) -> Result<(), RestartError> {
        let Some((program, rest)) = self.install_command.split_first() else {
            return Ok(());
        };
        let output = Command::new(program)
            .args(rest)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| RestartError::DependencyInstall(format!("failed to spawn {program}: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(RestartError::DependencyInstall(stderr))
        }
    }

    #[cfg(unix)]
    async fn reexec(&self) -> Result<(), RestartError> {
        let argv: Vec<String> = std::env::args().collect();
        let Some(program) = argv.first().cloned() else {
            return Err(RestartError::UnsupportedPlatform);
        };
        info!(program = %program, "re-executing process image after self-update");

        let c_program = CString::new(program.clone()).map_err(|_| RestartError::UnsupportedPlatform)?;
        let c_args: Vec<CString> = argv
            .iter()
            .map(|a| CString::new(a.as_str()).map_err(|_| RestartError::UnsupportedPlatform))
            .collect::<Result<_, _>>()?;

        // Only returns on failure; a successful execvp replaces this
        // process image and never comes back here (§11).
        unsafe {
            libc::execvp(c_program.as_ptr(), {
                let mut ptrs: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
                ptrs.push(std::ptr::null());
                ptrs.as_ptr()
            });
        }
        Err(RestartError::UnsupportedPlatform)
    }

    #[cfg(not(unix))]
    async fn reexec(&self) -> Result<(), RestartError> {
        Err(RestartError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reinstall_with_empty_command_is_a_noop() {
        let ops = ProcessRestartOps::new(".", "telemetry.jsonl", vec![]);
        assert!(ops.reinstall_dependencies().await.is_ok());
    }
}
