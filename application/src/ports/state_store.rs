//! State-file port for the small local journals (§4.6, §6): news intake's
//! last-run date, research scout's last-run timestamp, and the Conductor
//! journal. One JSON document per state file, read-modify-write.
//!
//! Methods traffic in `serde_json::Value` rather than a generic type
//! parameter so the trait stays object-safe (`Arc<dyn StateStorePort>`);
//! callers serialize/deserialize their own typed state around the edges.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait StateStorePort: Send + Sync {
    /// Load the JSON document at `key` (a relative path under the
    /// workspace's `output/` directory), or `None` if it doesn't exist yet.
    async fn load(&self, key: &str) -> std::io::Result<Option<Value>>;

    /// Overwrite the JSON document at `key`.
    async fn store(&self, key: &str, value: &Value) -> std::io::Result<()>;

    /// Append one line to a JSONL journal at `key`, then trim it to the
    /// last `keep_last` lines (the Conductor journal keeps only its last
    /// 10 entries as context, §6).
    async fn append_journal(&self, key: &str, line: &str, keep_last: usize) -> std::io::Result<()>;

    /// Read the last `limit` lines of a JSONL journal at `key`.
    async fn read_journal(&self, key: &str, limit: usize) -> std::io::Result<Vec<String>>;
}
