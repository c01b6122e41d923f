//! Telemetry sink port (§3, §4.8). Grounded in the teacher's
//! `ConversationLogger` port/`JsonlConversationLogger` adapter shape: a
//! small trait for appending one structured record at a time.

use agora_domain::{CycleTelemetry, StructuredError};
use async_trait::async_trait;

#[async_trait]
pub trait TelemetrySinkPort: Send + Sync {
    /// Append one cycle record to `telemetry.jsonl`. Must be atomic at the
    /// line level: build the full line in memory, then write once (§9).
    async fn append_cycle(&self, record: &CycleTelemetry) -> std::io::Result<()>;

    /// Append one structured error to `errors.jsonl`, independent of the
    /// per-cycle record (§4.8).
    async fn append_error(&self, phase: &str, error: &StructuredError) -> std::io::Result<()>;

    /// Read the last `limit` cycle records, skipping any unparseable
    /// trailing line left by a crash (§9).
    async fn recent_cycles(&self, limit: usize) -> std::io::Result<Vec<CycleTelemetry>>;

    /// Read the last `limit` structured errors.
    async fn recent_errors(&self, limit: usize) -> std::io::Result<Vec<(String, StructuredError)>>;
}
