//! JSONL telemetry/error sinks (§4.8, §6): `telemetry.jsonl` and
//! `errors.jsonl`, one JSON object per line, append-only. Grounded in the
//! teacher's `JsonlConversationLogger` (buffered-writer-behind-a-mutex, one
//! record per line, flush on every write for crash safety) but async and
//! split across the two files the tracker port's contract requires.

use agora_application::ports::telemetry_sink::TelemetrySinkPort;
use agora_domain::{CycleTelemetry, StructuredError};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;

pub struct JsonlTelemetrySink {
    telemetry_path: PathBuf,
    errors_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTelemetrySink {
    /// Create a sink rooted at `data_dir` (typically `output/data`),
    /// creating the directory if it doesn't exist yet.
    pub async fn new(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        Ok(Self {
            telemetry_path: data_dir.join("telemetry.jsonl"),
            errors_path: data_dir.join("errors.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    async fn append_line(&self, path: &Path, line: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }

    async fn tail_lines(path: &Path, limit: usize) -> std::io::Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = tokio::fs::File::open(path).await?;
        let mut reader = BufReader::new(file).lines();
        let mut all = Vec::new();
        while let Some(line) = reader.next_line().await? {
            all.push(line);
        }
        let start = all.len().saturating_sub(limit);
        Ok(all.split_off(start))
    }
}

#[async_trait::async_trait]
impl TelemetrySinkPort for JsonlTelemetrySink {
    async fn append_cycle(&self, record: &CycleTelemetry) -> std::io::Result<()> {
        let line = record
            .to_jsonl_line()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        self.append_line(&self.telemetry_path, &line).await
    }

    async fn append_error(&self, phase: &str, error: &StructuredError) -> std::io::Result<()> {
        let record = serde_json::json!({ "phase": phase, "error": error });
        let line = serde_json::to_string(&record).map_err(|e| std::io::Error::other(e.to_string()))?;
        self.append_line(&self.errors_path, &line).await
    }

    async fn recent_cycles(&self, limit: usize) -> std::io::Result<Vec<CycleTelemetry>> {
        let lines = Self::tail_lines(&self.telemetry_path, limit).await?;
        Ok(lines
            .into_iter()
            .filter_map(|line| match serde_json::from_str(&line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "skipping unparseable trailing telemetry line");
                    None
                }
            })
            .collect())
    }

    async fn recent_errors(&self, limit: usize) -> std::io::Result<Vec<(String, StructuredError)>> {
        let lines = Self::tail_lines(&self.errors_path, limit).await?;
        Ok(lines
            .into_iter()
            .filter_map(|line| {
                let value: serde_json::Value = serde_json::from_str(&line).ok()?;
                let phase = value.get("phase")?.as_str()?.to_string();
                let error: StructuredError = serde_json::from_value(value.get("error")?.clone()).ok()?;
                Some((phase, error))
            })
            .collect())
    }
}
