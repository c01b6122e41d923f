//! Composition root for the Agora cycle engine.
//!
//! Parses CLI flags, loads layered configuration, constructs every
//! infrastructure adapter behind its application-layer port, wires the
//! use cases into a [`MainLoop`], and runs it to completion.

mod prompts;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use agora_application::config::EngineConfig;
use agora_application::ports::agent_runner::AgentRunnerPort;
use agora_application::ports::state_store::StateStorePort;
use agora_application::ports::telemetry_sink::TelemetrySinkPort;
use agora_application::ports::tracker::TrackerPort;
use agora_application::use_cases::analysis_pipeline::{AnalysisPipeline, AnalysisPrompts};
use agora_application::use_cases::circuit_breaker::CircuitBreaker;
use agora_application::use_cases::collaborators::{Director, DirectorRole, EditorialReview, NewsIntake, ResearchScout};
use agora_application::use_cases::conductor::{Conductor, ConductorPrompts};
use agora_application::use_cases::debate_filter::{DebateFilter, DebatePrompts};
use agora_application::use_cases::dispatcher::{Dispatcher, ProposerPrompts};
use agora_application::use_cases::main_loop::{MainLoop, MainLoopConfig};
use agora_application::use_cases::pr_workflow::{PrWorkflow, PrWorkflowPrompts};
use agora_application::use_cases::self_restart::SelfRestart;
use agora_infrastructure::config::file_config::FileConfig;
use agora_infrastructure::config::loader::ConfigLoader;
use agora_infrastructure::{GhTracker, JsonFileStateStore, JsonlTelemetrySink, ProcessRestartOps, SubprocessAgentRunner};
use agora_presentation::{Cli, ConsoleFormatter};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Path to the agent binary the subprocess runner spawns (§6: "path
/// configurable"). Not part of the closed CLI surface, so it is
/// environment-configured like the tracker's auth token.
const AGENT_BINARY_VAR: &str = "AGORA_AGENT_BINARY";
const AGENT_EFFORT_VAR: &str = "AGORA_AGENT_EFFORT";
const REPO_VAR: &str = "AGORA_REPO";
const INSTALL_COMMAND_VAR: &str = "AGORA_INSTALL_COMMAND";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log_filter_directive()))
        .with_target(false)
        .init();

    let config = build_engine_config(&cli)?;
    let workspace = cli.workspace.clone().unwrap_or(env::current_dir()?);

    info!(
        model = %config.model,
        dry_run = config.dry_run,
        workspace = %workspace.display(),
        "starting agora cycle engine"
    );

    let agent_binary = env::var(AGENT_BINARY_VAR).unwrap_or_else(|_| "agent".to_string());
    let agent_runner: Arc<dyn AgentRunnerPort> = {
        let mut runner = SubprocessAgentRunner::new(agent_binary);
        if let Ok(effort) = env::var(AGENT_EFFORT_VAR) {
            runner = runner.with_effort(effort);
        }
        Arc::new(runner)
    };

    let repo = env::var(REPO_VAR).ok();
    let working_dir = workspace.to_string_lossy().to_string();
    let tracker: Arc<dyn TrackerPort> = {
        let gh = GhTracker::try_new(Some(working_dir), repo, config.tracker_max_retries)
            .await
            .context("gh CLI is not installed or not authenticated; the tracker adapter is required to run")?;
        Arc::new(gh)
    };

    let data_dir = workspace.join("output").join("data");
    let telemetry: Arc<dyn TelemetrySinkPort> = Arc::new(
        JsonlTelemetrySink::new(&data_dir)
            .await
            .context("failed to initialize telemetry sink")?,
    );
    let state_store: Arc<dyn StateStorePort> = Arc::new(JsonFileStateStore::new(workspace.join("output")));

    let analysis_pipeline = Arc::new(AnalysisPipeline::new(
        Arc::clone(&agent_runner),
        AnalysisPrompts {
            ministry_system_prompt: prompts::MINISTRY.to_string(),
            parliament_system_prompt: prompts::PARLIAMENT.to_string(),
            critic_system_prompt: prompts::CRITIC.to_string(),
            synthesizer_system_prompt: prompts::SYNTHESIZER.to_string(),
        },
        config.model.clone(),
        config.agent_timeout,
    ));

    let pr_workflow = Arc::new(PrWorkflow::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        PrWorkflowPrompts {
            coder_system_prompt: prompts::CODER.to_string(),
            reviewer_system_prompt: prompts::REVIEWER.to_string(),
        },
        config.model.clone(),
        config.agent_timeout,
        config.max_pr_rounds,
    ));

    let debate_filter = Arc::new(DebateFilter::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        DebatePrompts {
            advocate_system_prompt: prompts::ADVOCATE.to_string(),
            skeptic_system_prompt: prompts::SKEPTIC.to_string(),
        },
        config.model.clone(),
        config.agent_timeout,
        config.debate_threshold,
    ));

    let news_intake = Arc::new(NewsIntake::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        Arc::clone(&state_store),
        prompts::NEWS_INTAKE,
        config.model.clone(),
        config.agent_timeout,
        config.news_cap_per_day,
    ));

    let research_scout = Arc::new(ResearchScout::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        Arc::clone(&state_store),
        prompts::RESEARCH_SCOUT,
        config.model.clone(),
        config.agent_timeout,
        Duration::from_secs(7 * 24 * 60 * 60),
    ));

    let project_director = Arc::new(Director::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        DirectorRole::Project,
        prompts::PROJECT_DIRECTOR,
        config.model.clone(),
        config.agent_timeout,
        config.director_cap_per_invocation,
    ));

    let strategic_director = Arc::new(Director::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        DirectorRole::Strategic,
        prompts::STRATEGIC_DIRECTOR,
        config.model.clone(),
        config.agent_timeout,
        config.director_cap_per_invocation,
    ));

    let editorial_review = Arc::new(EditorialReview::new(
        Arc::clone(&agent_runner),
        Arc::clone(&tracker),
        prompts::EDITORIAL_REVIEW,
        config.model.clone(),
        config.agent_timeout,
    ));

    let conductor = Conductor::new(
        Arc::clone(&agent_runner),
        ConductorPrompts {
            primary_system_prompt: prompts::CONDUCTOR_PRIMARY.to_string(),
            recovery_system_prompt: prompts::CONDUCTOR_RECOVERY.to_string(),
        },
        config.model.clone(),
        config.agent_timeout,
    );

    let dispatcher = Dispatcher {
        tracker: Arc::clone(&tracker),
        agent_runner: Arc::clone(&agent_runner),
        state_store: Arc::clone(&state_store),
        analysis_pipeline,
        pr_workflow,
        debate_filter,
        news_intake,
        research_scout,
        project_director,
        strategic_director,
        editorial_review,
        proposer_prompts: ProposerPrompts {
            system_prompt: prompts::PROPOSER.to_string(),
        },
        model: config.model.clone(),
        agent_timeout: config.agent_timeout,
        dry_run: config.dry_run,
        skip_improve: config.skip_improve,
        skip_analysis: config.skip_analysis,
        skip_research: config.skip_research,
    };

    let circuit_breaker = CircuitBreaker::new(Arc::clone(&tracker), config.circuit_breaker_window, config.circuit_breaker_threshold);

    let install_command: Vec<String> = env::var(INSTALL_COMMAND_VAR)
        .ok()
        .map(|cmd| cmd.split_whitespace().map(String::from).collect())
        .unwrap_or_default();
    let restart = ProcessRestartOps::new(workspace.clone(), data_dir.join("telemetry.jsonl"), install_command);

    let main_loop = MainLoop::new(
        tracker,
        telemetry,
        conductor,
        dispatcher,
        circuit_breaker,
        MainLoopConfig {
            max_cycles: config.max_cycles,
            cooldown: config.cooldown,
            model: config.model.clone(),
            dry_run: config.dry_run,
            circuit_breaker_window: config.circuit_breaker_window,
            director_interval_cycles: config.director_interval_cycles,
        },
        Some(SelfRestart::new(restart)),
    );

    match main_loop.run().await {
        Ok(()) => Ok(()),
        Err(crash) => {
            eprintln!("{}", ConsoleFormatter::error(&crash.message));
            bail!("engine crash: {}", crash.message);
        }
    }
}

/// Merge figment-layered file config with CLI overrides (§6, SPEC_FULL §1:
/// "all CLI flags are optional overrides layered on top").
fn build_engine_config(cli: &Cli) -> Result<EngineConfig> {
    let file: FileConfig = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?
    };

    let mut config: EngineConfig = file.into();

    if let Some(max_cycles) = cli.max_cycles {
        config.max_cycles = Some(max_cycles);
    }
    if let Some(cooldown) = cli.cooldown {
        config.cooldown = Duration::from_secs(cooldown);
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(max_pr_rounds) = cli.max_pr_rounds {
        config.max_pr_rounds = max_pr_rounds;
    }
    if let Some(director_interval) = cli.director_interval {
        config.director_interval_cycles = director_interval;
    }
    config.dry_run |= cli.dry_run;
    config.skip_improve |= cli.skip_improve;
    config.skip_analysis |= cli.skip_analysis;
    config.skip_research |= cli.skip_research;

    Ok(config)
}
