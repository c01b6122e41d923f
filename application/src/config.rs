//! Application-level engine configuration: the knobs that control use-case
//! behavior (timeouts, caps, thresholds), as distinct from where they came
//! from (figment/CLI — an infrastructure/presentation concern).

use std::time::Duration;

/// Behavior configuration for one engine run, assembled from CLI flags and
/// config-file values by the composition root (§6).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_cycles: Option<u64>,
    pub cooldown: Duration,
    pub model: String,
    pub max_pr_rounds: u32,
    pub director_interval_cycles: u64,
    pub dry_run: bool,
    pub skip_improve: bool,
    pub skip_analysis: bool,
    pub skip_research: bool,
    /// Debate filter acceptance threshold `T` (§4.4, §9 Open Questions).
    pub debate_threshold: i32,
    /// News intake cap: at most this many items per day (§4.6).
    pub news_cap_per_day: u32,
    /// Project/strategic director cap per invocation (§4.6).
    pub director_cap_per_invocation: u32,
    /// Circuit breaker window size `K` (§4.8).
    pub circuit_breaker_window: usize,
    /// Circuit breaker trigger count (§4.8).
    pub circuit_breaker_threshold: usize,
    pub agent_timeout: Duration,
    pub tracker_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            cooldown: Duration::from_secs(60),
            model: "default".to_string(),
            max_pr_rounds: 3,
            director_interval_cycles: 20,
            dry_run: false,
            skip_improve: false,
            skip_analysis: false,
            skip_research: false,
            debate_threshold: 2,
            news_cap_per_day: 3,
            director_cap_per_invocation: 2,
            circuit_breaker_window: 5,
            circuit_breaker_threshold: 3,
            agent_timeout: Duration::from_secs(600),
            tracker_max_retries: 5,
        }
    }
}
