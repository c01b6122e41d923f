//! Serializable mirror of [`agora_application::EngineConfig`].
//!
//! `figment` needs a `Deserialize + Serialize` type to merge layers and to
//! provide defaults; `EngineConfig` itself uses `Duration`, which doesn't
//! round-trip through TOML cleanly, so this type carries plain integers
//! (seconds) and converts to the runtime type at the edge.

use agora_application::EngineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub max_cycles: Option<u64>,
    pub cooldown_seconds: u64,
    pub model: String,
    pub max_pr_rounds: u32,
    pub director_interval_cycles: u64,
    pub dry_run: bool,
    pub skip_improve: bool,
    pub skip_analysis: bool,
    pub skip_research: bool,
    pub debate_threshold: i32,
    pub news_cap_per_day: u32,
    pub director_cap_per_invocation: u32,
    pub circuit_breaker_window: usize,
    pub circuit_breaker_threshold: usize,
    pub agent_timeout_seconds: u64,
    pub tracker_max_retries: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            max_cycles: defaults.max_cycles,
            cooldown_seconds: defaults.cooldown.as_secs(),
            model: defaults.model,
            max_pr_rounds: defaults.max_pr_rounds,
            director_interval_cycles: defaults.director_interval_cycles,
            dry_run: defaults.dry_run,
            skip_improve: defaults.skip_improve,
            skip_analysis: defaults.skip_analysis,
            skip_research: defaults.skip_research,
            debate_threshold: defaults.debate_threshold,
            news_cap_per_day: defaults.news_cap_per_day,
            director_cap_per_invocation: defaults.director_cap_per_invocation,
            circuit_breaker_window: defaults.circuit_breaker_window,
            circuit_breaker_threshold: defaults.circuit_breaker_threshold,
            agent_timeout_seconds: defaults.agent_timeout.as_secs(),
            tracker_max_retries: defaults.tracker_max_retries,
        }
    }
}

impl From<FileConfig> for EngineConfig {
    fn from(file: FileConfig) -> Self {
        EngineConfig {
            max_cycles: file.max_cycles,
            cooldown: Duration::from_secs(file.cooldown_seconds),
            model: file.model,
            max_pr_rounds: file.max_pr_rounds,
            director_interval_cycles: file.director_interval_cycles,
            dry_run: file.dry_run,
            skip_improve: file.skip_improve,
            skip_analysis: file.skip_analysis,
            skip_research: file.skip_research,
            debate_threshold: file.debate_threshold,
            news_cap_per_day: file.news_cap_per_day,
            director_cap_per_invocation: file.director_cap_per_invocation,
            circuit_breaker_window: file.circuit_breaker_window,
            circuit_breaker_threshold: file.circuit_breaker_threshold,
            agent_timeout: Duration::from_secs(file.agent_timeout_seconds),
            tracker_max_retries: file.tracker_max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_config_matches_engine_defaults() {
        let file = FileConfig::default();
        let engine: EngineConfig = file.into();
        let defaults = EngineConfig::default();
        assert_eq!(engine.model, defaults.model);
        assert_eq!(engine.cooldown, defaults.cooldown);
        assert_eq!(engine.debate_threshold, defaults.debate_threshold);
    }
}
