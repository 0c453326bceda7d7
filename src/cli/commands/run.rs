//! `swarmlab run` - execute an experiment.

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::adapters::executors::{MockSessionExecutor, RetryingExecutor, ThrottledExecutor};
use crate::adapters::oracles::AnthropicDecisionOracle;
use crate::adapters::pages::SimulatedPageFactory;
use crate::adapters::store::InMemorySnapshotStore;
use crate::cli::output::{ProgressRenderer, ResultsTable};
use crate::cli::types::RunArgs;
use crate::domain::models::{Config, ExperimentConfig, ExperimentEvent};
use crate::domain::ports::SessionExecutor;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{OracleSessionRunner, SwarmScheduler};

pub async fn execute(args: RunArgs, settings: &Config, json_mode: bool) -> Result<()> {
    let mut experiment = ConfigLoader::load_experiment(&args.experiment, &settings.scheduler)?;
    apply_overrides(&mut experiment, &args);

    let executor = build_executor(&args, settings, &experiment)?;

    if !json_mode {
        println!(
            "Running experiment '{}' against {}",
            style(&experiment.id).bold(),
            experiment.url
        );
        println!(
            "   {} variants x {} sessions, {} personas, {} at a time",
            experiment.variants.len(),
            experiment.sessions_per_variant,
            experiment.personas.len(),
            experiment.max_concurrent
        );
        if args.dry_run {
            println!("   Mode: DRY RUN (synthesized sessions)");
        }
        println!();
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ExperimentEvent>();
    let total = experiment.total_sessions();
    let event_handler = tokio::spawn(async move {
        let renderer = if json_mode {
            ProgressRenderer::hidden(total)
        } else {
            ProgressRenderer::new(total)
        };
        while let Some(event) = event_rx.recv().await {
            if !renderer.handle(&event) {
                break;
            }
        }
    });

    let scheduler = SwarmScheduler::new(executor);
    let run_result = scheduler.run_experiment_with_events(&experiment, event_tx).await;
    join_renderer(event_handler).await;

    let result = run_result.context("Experiment run failed")?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!();
        print!("{}", ResultsTable::new().format_report(&result));
    }
    Ok(())
}

/// Wait for the progress renderer; a panic there must not hide the run result.
async fn join_renderer(handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        warn!(error = %err, "progress renderer stopped unexpectedly");
    }
}

fn apply_overrides(experiment: &mut ExperimentConfig, args: &RunArgs) {
    if let Some(max_concurrent) = args.max_concurrent {
        experiment.max_concurrent = max_concurrent;
    }
    if let Some(sessions) = args.sessions {
        experiment.sessions_per_variant = sessions;
    }
    if args.seed.is_some() {
        experiment.seed = args.seed;
    }
}

/// Build the executor stack: throttle and retry around the session runner.
fn build_executor(
    args: &RunArgs,
    settings: &Config,
    experiment: &ExperimentConfig,
) -> Result<Arc<dyn SessionExecutor>> {
    if args.dry_run {
        let mut mock = MockSessionExecutor::new().with_default_conversion_rate(args.mock_conversion_rate);
        if let Some(seed) = experiment.seed {
            mock = mock.with_seed(seed);
        }
        return Ok(Arc::new(mock));
    }

    if settings.oracle.get_api_key().is_none() {
        anyhow::bail!("ANTHROPIC_API_KEY not set; use --dry-run to run without the live oracle");
    }

    let oracle = AnthropicDecisionOracle::new(settings.oracle.clone(), experiment.goal.clone())?;
    let runner = OracleSessionRunner::new(Arc::new(oracle), Arc::new(SimulatedPageFactory::default()))
        .with_max_steps(settings.scheduler.max_steps)
        .with_snapshot_store(Arc::new(InMemorySnapshotStore::new()));
    let throttled = ThrottledExecutor::new(Arc::new(runner), &settings.rate_limit)?;
    let retrying = RetryingExecutor::new(Arc::new(throttled), settings.retry.clone());

    Ok(Arc::new(retrying))
}
