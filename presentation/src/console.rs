//! Operator-visible console output for the main loop.
//!
//! This is deliberately a handful of formatted lines per cycle, not an
//! interactive display: the engine is a long-running daemon, and the
//! durable record of what happened lives in `telemetry.jsonl`, not the
//! terminal (§7). Colored section headers follow the teacher's console
//! formatter; there's no progress bar or spinner here, since there's
//! nothing to animate between cycles.

use agora_domain::telemetry::{CyclePhaseResult, CycleTelemetry, YieldKind};
use colored::Colorize;

pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One block summarizing a completed cycle: header, per-action
    /// outcomes, and the yield.
    pub fn format_cycle(telemetry: &CycleTelemetry) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{} {}\n",
            format!("── cycle {} ──", telemetry.cycle_number).cyan().bold(),
            Self::yield_badge(telemetry.yield_kind)
        ));

        if telemetry.conductor_fallback {
            out.push_str(&format!("  {}\n", "conductor: fallback plan used".yellow()));
        }

        for phase in &telemetry.phases {
            out.push_str(&Self::format_phase(phase));
        }

        out
    }

    fn format_phase(phase: &CyclePhaseResult) -> String {
        if phase.success {
            format!("  {} {}\n", "ok".green().bold(), phase.action)
        } else {
            let message = phase
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error");
            format!(
                "  {} {} — {}\n",
                "fail".red().bold(),
                phase.action,
                message
            )
        }
    }

    fn yield_badge(yield_kind: YieldKind) -> colored::ColoredString {
        match yield_kind {
            YieldKind::None => "idle".dimmed(),
            YieldKind::PrMerged => "PR merged".green().bold(),
            YieldKind::AnalysisPublished => "analysis published".green().bold(),
        }
    }

    /// One line for startup diagnostics (config source, tracker
    /// availability, etc.).
    pub fn info(label: &str, detail: &str) -> String {
        format!("{} {}", format!("{label}:").cyan().bold(), detail)
    }

    /// One line for a fatal startup or crash condition.
    pub fn error(detail: &str) -> String {
        format!("{} {}", "error:".red().bold(), detail)
    }

    pub fn warn(detail: &str) -> String {
        format!("{} {}", "warning:".yellow().bold(), detail)
    }
}
