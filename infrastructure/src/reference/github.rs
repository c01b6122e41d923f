//! `gh`-CLI-backed [`TrackerPort`] adapter (§6, §7).
//!
//! Every tracker operation shells out to the `gh` CLI (issues, PRs, CI
//! runs) or to `git` (branch creation), in the spirit of the teacher's
//! `GitHubReferenceResolver`: spawn, capture stdout/stderr, parse JSON.
//! Transient failures (network errors, 5xx, rate limiting) are retried
//! with exponential backoff up to `max_retries` times before surfacing as
//! [`TrackerError::Fatal`] — the port's contract is that only `Fatal` or
//! `StateConflict` ever reaches the application layer.

use agora_application::ports::tracker::{NewIssue, TrackerError, TrackerPort};
use agora_domain::{CheckStatus, CheckStatusSummary, Issue, IssueOpenState, PrState, PullRequest};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct GhTracker {
    working_dir: Option<String>,
    repo: Option<String>,
    max_retries: u32,
}

impl GhTracker {
    /// Try to create a new adapter, validating that `gh` is installed and
    /// authenticated. Returns `None` for graceful degradation — the
    /// composition root treats an absent tracker as a fatal startup error,
    /// but this constructor mirrors the teacher's `try_new` shape so the
    /// same check can be reused wherever a non-fatal probe is useful.
    pub async fn try_new(working_dir: Option<String>, repo: Option<String>, max_retries: u32) -> Option<Self> {
        if which::which("gh").is_err() {
            debug!("gh CLI not found, tracker adapter unavailable");
            return None;
        }

        let mut cmd = Command::new("gh");
        cmd.arg("auth").arg("status");
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }
        match cmd.status().await {
            Ok(status) if status.success() => Some(Self {
                working_dir,
                repo,
                max_retries,
            }),
            _ => {
                debug!("gh CLI not authenticated, tracker adapter unavailable");
                None
            }
        }
    }

    fn base_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("gh");
        cmd.args(args);
        if let Some(repo) = &self.repo {
            cmd.arg("--repo").arg(repo);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run a `gh` invocation, retrying transient-looking failures with
    /// exponential backoff (§5, §7: "up to 5 retries with exponential
    /// backoff for transient errors").
    async fn run_gh(&self, args: &[&str]) -> Result<String, TrackerError> {
        let mut attempt = 0;
        loop {
            let output = self
                .base_command(args)
                .output()
                .await
                .map_err(|e| TrackerError::Fatal(format!("failed to spawn gh: {e}")))?;

            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }

            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_transient(&stderr) && attempt < self.max_retries {
                attempt += 1;
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "transient gh failure, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }

            return Err(TrackerError::Fatal(format!("gh {args:?} failed: {stderr}")));
        }
    }

    async fn run_git(&self, args: &[&str]) -> Result<(), TrackerError> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| TrackerError::Fatal(format!("failed to spawn git: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(TrackerError::Fatal(format!("git {args:?} failed: {stderr}")))
        }
    }
}

/// Heuristic transient classification for `gh`'s stderr (§7): network
/// errors, 5xx responses, and explicit rate-limit messages are retried;
/// everything else (auth failures, 404s, validation errors) is fatal.
fn is_transient(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    lowered.contains("timeout")
        || lowered.contains("connection reset")
        || lowered.contains("temporarily unavailable")
        || lowered.contains("rate limit")
        || lowered.contains("secondary rate limit")
        || lowered.contains("500")
        || lowered.contains("502")
        || lowered.contains("503")
        || lowered.contains("504")
}

fn parse_issue(value: &serde_json::Value) -> Result<Issue, TrackerError> {
    let number = value["number"]
        .as_u64()
        .ok_or_else(|| TrackerError::Fatal("gh issue json missing number".to_string()))?;
    let title = value["title"].as_str().unwrap_or_default().to_string();
    let body = value["body"].as_str().unwrap_or_default().to_string();
    let labels: BTreeSet<String> = value["labels"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|l| l["name"].as_str().map(str::to_string))
        .collect();
    let state = match value["state"].as_str().unwrap_or("OPEN") {
        "CLOSED" => IssueOpenState::Closed,
        _ => IssueOpenState::Open,
    };
    let created_at = value["createdAt"].as_str().unwrap_or_default().to_string();

    Ok(Issue {
        number,
        title,
        body,
        labels,
        state,
        created_at,
    })
}

/// Extract the trailing numeric id from a `gh issue create`/`gh pr
/// create` URL (e.g. `https://github.com/o/r/issues/42` -> `42`); neither
/// command supports `--json`, so the created entity's number is only
/// available via its URL.
fn parse_trailing_number(url: &str) -> Result<u64, TrackerError> {
    url.trim()
        .rsplit('/')
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TrackerError::Fatal(format!("could not parse number from gh output: {url}")))
}

#[async_trait]
impl TrackerPort for GhTracker {
    async fn list_open_issues(&self, labels: &[String]) -> Result<Vec<Issue>, TrackerError> {
        let mut args = vec![
            "issue".to_string(),
            "list".to_string(),
            "--state".to_string(),
            "open".to_string(),
            "--json".to_string(),
            "number,title,body,labels,state,createdAt".to_string(),
            "--limit".to_string(),
            "200".to_string(),
        ];
        for label in labels {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();

        let stdout = self.run_gh(&args_ref).await?;
        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| TrackerError::Fatal(format!("bad gh issue list json: {e}")))?;
        value
            .as_array()
            .ok_or_else(|| TrackerError::Fatal("gh issue list did not return an array".to_string()))?
            .iter()
            .map(parse_issue)
            .collect()
    }

    async fn read_issue(&self, number: u64) -> Result<Issue, TrackerError> {
        let number_str = number.to_string();
        let stdout = self
            .run_gh(&["issue", "view", &number_str, "--json", "number,title,body,labels,state,createdAt"])
            .await?;
        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| TrackerError::Fatal(format!("bad gh issue view json: {e}")))?;
        parse_issue(&value)
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<u64, TrackerError> {
        let mut args = vec!["issue".to_string(), "create".to_string(), "--title".to_string(), issue.title];
        args.push("--body".to_string());
        args.push(issue.body);
        for label in &issue.labels {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run_gh(&args_ref).await?;
        parse_trailing_number(&stdout)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        let joined = labels.join(",");
        self.run_gh(&["issue", "edit", &number_str, "--add-label", &joined]).await?;
        Ok(())
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        let joined = labels.join(",");
        self.run_gh(&["issue", "edit", &number_str, "--remove-label", &joined]).await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        self.run_gh(&["issue", "close", &number_str]).await?;
        Ok(())
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        self.run_gh(&["issue", "comment", &number_str, "--body", body]).await?;
        Ok(())
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), TrackerError> {
        self.run_git(&["fetch", "origin", from]).await?;
        self.run_git(&["checkout", "-b", name, &format!("origin/{from}")]).await?;
        self.run_git(&["push", "-u", "origin", name]).await
    }

    async fn open_pr(&self, branch: &str, title: &str, body: &str) -> Result<u64, TrackerError> {
        if !body.contains("Closes #") {
            return Err(TrackerError::StateConflict(
                "PR body is missing the required Closes #N token".to_string(),
            ));
        }
        let stdout = self
            .run_gh(&["pr", "create", "--title", title, "--body", body, "--head", branch])
            .await?;
        parse_trailing_number(&stdout)
    }

    async fn read_pr(&self, number: u64) -> Result<PullRequest, TrackerError> {
        let number_str = number.to_string();
        let stdout = self
            .run_gh(&[
                "pr",
                "view",
                &number_str,
                "--json",
                "number,headRefName,state,body,reviews,statusCheckRollup",
            ])
            .await?;
        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| TrackerError::Fatal(format!("bad gh pr view json: {e}")))?;

        let state = match value["state"].as_str().unwrap_or("OPEN") {
            "MERGED" => PrState::Merged,
            "CLOSED" => PrState::Closed,
            _ => PrState::Open,
        };
        let review_comments = extract_review_comments(&value);
        let check_status = extract_check_status(&value);

        Ok(PullRequest {
            number,
            branch: value["headRefName"].as_str().unwrap_or_default().to_string(),
            state,
            review_comments,
            check_status,
            body: value["body"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn list_pr_review_comments(&self, number: u64) -> Result<Vec<String>, TrackerError> {
        Ok(self.read_pr(number).await?.review_comments)
    }

    async fn merge_pr(&self, number: u64) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        self.run_gh(&["pr", "merge", &number_str, "--squash", "--delete-branch"]).await?;
        Ok(())
    }

    async fn close_pr(&self, number: u64) -> Result<(), TrackerError> {
        let number_str = number.to_string();
        self.run_gh(&["pr", "close", &number_str]).await?;
        Ok(())
    }

    async fn recent_ci_runs(&self, limit: u32) -> Result<Vec<CheckStatusSummary>, TrackerError> {
        let limit_str = limit.to_string();
        let stdout = self
            .run_gh(&[
                "run",
                "list",
                "--branch",
                "main",
                "--limit",
                &limit_str,
                "--json",
                "databaseId,conclusion,createdAt",
            ])
            .await?;
        let value: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| TrackerError::Fatal(format!("bad gh run list json: {e}")))?;
        let runs = value
            .as_array()
            .ok_or_else(|| TrackerError::Fatal("gh run list did not return an array".to_string()))?;

        Ok(runs
            .iter()
            .map(|run| CheckStatusSummary {
                run_id: run["databaseId"].as_u64().map(|n| n.to_string()).unwrap_or_default(),
                conclusion: match run["conclusion"].as_str().unwrap_or("") {
                    "success" => CheckStatus::Pass,
                    "" => CheckStatus::Pending,
                    _ => CheckStatus::Fail,
                },
                created_at: run["createdAt"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

fn extract_review_comments(pr_json: &serde_json::Value) -> Vec<String> {
    pr_json["reviews"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|r| r["body"].as_str())
        .filter(|b| !b.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_check_status(pr_json: &serde_json::Value) -> CheckStatus {
    let Some(rollup) = pr_json["statusCheckRollup"].as_array() else {
        return CheckStatus::Pending;
    };
    if rollup.is_empty() {
        return CheckStatus::Pending;
    }
    let mut saw_pending = false;
    for check in rollup {
        match check["conclusion"].as_str() {
            Some("SUCCESS") => continue,
            Some("") | None => saw_pending = true,
            _ => return CheckStatus::Fail,
        }
    }
    if saw_pending {
        CheckStatus::Pending
    } else {
        CheckStatus::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_number_from_url() {
        assert_eq!(parse_trailing_number("https://github.com/o/r/issues/42\n").unwrap(), 42);
    }

    #[test]
    fn classifies_transient_stderr() {
        assert!(is_transient("error connecting: connection reset by peer"));
        assert!(is_transient("HTTP 503 Service Unavailable"));
        assert!(!is_transient("HTTP 404 Not Found"));
        assert!(!is_transient("could not resolve to a User"));
    }

    #[test]
    fn check_status_fails_on_any_failure() {
        let json = serde_json::json!({
            "statusCheckRollup": [
                { "conclusion": "SUCCESS" },
                { "conclusion": "FAILURE" },
            ]
        });
        assert_eq!(extract_check_status(&json), CheckStatus::Fail);
    }

    #[test]
    fn check_status_pending_while_incomplete() {
        let json = serde_json::json!({
            "statusCheckRollup": [
                { "conclusion": "SUCCESS" },
                { "conclusion": "" },
            ]
        });
        assert_eq!(extract_check_status(&json), CheckStatus::Pending);
    }

    #[test]
    fn open_pr_requires_closes_token() {
        // covered functionally in adapter; here we check the heuristic alone
        let body = "No closes token";
        assert!(!body.contains("Closes #"));
    }
}
