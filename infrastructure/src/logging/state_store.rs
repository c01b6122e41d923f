//! JSON-file state store (§4.6, §6): news/research scout state and the
//! Conductor journal, one file per key under a workspace root.

use agora_application::ports::state_store::StateStorePort;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

pub struct JsonFileStateStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait::async_trait]
impl StateStorePort for JsonFileStateStore {
    async fn load(&self, key: &str) -> std::io::Result<Option<Value>> {
        let path = self.resolve(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&path).await?;
        let value = serde_json::from_str(&contents).map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(Some(value))
    }

    async fn store(&self, key: &str, value: &Value) -> std::io::Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let _guard = self.write_lock.lock().await;
        let contents = serde_json::to_string_pretty(value).map_err(|e| std::io::Error::other(e.to_string()))?;
        tokio::fs::write(&path, contents).await
    }

    async fn append_journal(&self, key: &str, line: &str, keep_last: usize) -> std::io::Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let _guard = self.write_lock.lock().await;

        let mut lines = read_all_lines(&path).await?;
        lines.push(line.to_string());
        let start = lines.len().saturating_sub(keep_last);
        let trimmed = lines.split_off(start);

        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).await?;
        for l in &trimmed {
            file.write_all(l.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await
    }

    async fn read_journal(&self, key: &str, limit: usize) -> std::io::Result<Vec<String>> {
        let path = self.resolve(key);
        let mut lines = read_all_lines(&path).await?;
        let start = lines.len().saturating_sub(limit);
        Ok(lines.split_off(start))
    }
}

async fn read_all_lines(path: &Path) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::new(file).lines();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await? {
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());
        let value = serde_json::json!({ "last_date": "2026-07-28" });
        store.store("news_scout_state.json", &value).await.unwrap();
        let loaded = store.load("news_scout_state.json").await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn load_missing_key_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());
        assert_eq!(store.load("absent.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn journal_keeps_only_last_n_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path());
        for i in 0..15 {
            store
                .append_journal("conductor_journal.jsonl", &format!("{{\"entry\":{i}}}"), 10)
                .await
                .unwrap();
        }
        let lines = store.read_journal("conductor_journal.jsonl", 20).await.unwrap();
        assert_eq!(lines.len(), 10);
        assert!(lines[0].contains("\"entry\":5"));
        assert!(lines[9].contains("\"entry\":14"));
    }
}
