//! `clap`-derived CLI surface (spec.md §6), plus the config-loading flags
//! SPEC_FULL §12 adds on top (`--config`/`--no-config`) so figment's
//! layered loading is operable from the command line.

use clap::Parser;
use std::path::PathBuf;

/// Autonomous cycle engine: discovers news, runs a multi-stage analysis
/// pipeline, self-proposes code-change tasks, and drives them through an
/// automated pull-request workflow.
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(author, version, about = "Autonomous cycle engine", long_about = None)]
pub struct Cli {
    /// Stop after running this many cycles (default: run forever).
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u64>,

    /// Seconds to sleep between cycles when the Conductor doesn't
    /// override it with `suggested_cooldown_seconds`.
    #[arg(long, value_name = "SECONDS")]
    pub cooldown: Option<u64>,

    /// Model id passed to every agent subprocess invocation.
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,

    /// Cap on coder/reviewer rounds in the PR workflow before the issue
    /// is marked failed (§4.3).
    #[arg(long, value_name = "N")]
    pub max_pr_rounds: Option<u32>,

    /// Productive-cycle interval between project director invocations
    /// (§4.7's context block; the strategic director runs at double this
    /// interval).
    #[arg(long, value_name = "N")]
    pub director_interval: Option<u64>,

    /// Log every planned action but execute none of the non-read-only
    /// ones; telemetry is still written (§4.7).
    #[arg(long)]
    pub dry_run: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace). Default is
    /// warn-level only.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Never triage/propose/debate self-improvement tasks this run.
    #[arg(long)]
    pub skip_improve: bool,

    /// Never run the analysis pipeline this run.
    #[arg(long)]
    pub skip_analysis: bool,

    /// Never run the research scout this run.
    #[arg(long)]
    pub skip_research: bool,

    /// Load configuration from this file instead of the usual
    /// project/XDG search (ambient flag, not part of spec.md §6's closed
    /// CLI list).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip all config-file sources; use built-in defaults layered only
    /// under these CLI flags.
    #[arg(long)]
    pub no_config: bool,

    /// Workspace root for `output/`, `prompts/`, and the tracker's
    /// working directory. Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub workspace: Option<PathBuf>,
}

impl Cli {
    /// Translate `-v`/`-vv`/`-vvv` into a `tracing_subscriber::EnvFilter`
    /// directive string, exactly as the teacher's CLI does.
    pub fn log_filter_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
