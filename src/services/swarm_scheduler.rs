//! Swarm Scheduler - turns an experiment into sessions and drives them to completion.
//!
//! Sessions run in consecutive batches of at most `max_concurrent`. Every
//! session in a batch is spawned on its own task and the batch is joined
//! before the next one starts, with a fixed pause in between. A session that
//! fails (error, timeout, panic) is replaced by a synthesized failed record;
//! it never aborts its siblings or the run.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument, trace, warn};

use crate::domain::errors::{DomainResult, SessionError};
use crate::domain::models::{
    ExperimentConfig, ExperimentEvent, ExperimentResult, ExperimentState, ExperimentStatus,
    Persona, SessionRecord,
};
use crate::domain::ports::{SessionExecutor, SessionRequest};
use crate::services::insight_generator::InsightGenerator;
use crate::services::result_aggregator::ResultAggregator;

/// One planned session.
#[derive(Debug, Clone)]
pub struct SessionSlot {
    pub variant_id: String,
    /// Index of this session among its variant's sessions
    pub position: usize,
    pub persona: Persona,
    pub changes: Option<serde_json::Value>,
}

/// Build the full, shuffled work queue for an experiment.
///
/// The i-th session of every variant uses `personas[i % personas.len()]`.
/// The queue is then shuffled so variants do not run in contiguous blocks.
pub fn build_session_queue(config: &ExperimentConfig) -> Vec<SessionSlot> {
    let mut queue = plan_sessions(config);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    queue.shuffle(&mut rng);
    queue
}

/// Unshuffled plan: variants in order, round-robin personas within each.
fn plan_sessions(config: &ExperimentConfig) -> Vec<SessionSlot> {
    if config.personas.is_empty() {
        return Vec::new();
    }

    config
        .variants
        .iter()
        .flat_map(|variant| {
            (0..config.sessions_per_variant).map(move |position| SessionSlot {
                variant_id: variant.id.clone(),
                position,
                persona: config.personas[position % config.personas.len()].clone(),
                changes: variant.changes.clone(),
            })
        })
        .collect()
}

/// Runs experiments against a session executor.
///
/// Holds no per-run state: queue and counters live inside each call, so one
/// scheduler can serve concurrent experiments.
pub struct SwarmScheduler {
    executor: Arc<dyn SessionExecutor>,
    aggregator: ResultAggregator,
    insights: InsightGenerator,
}

impl SwarmScheduler {
    pub fn new(executor: Arc<dyn SessionExecutor>) -> Self {
        Self {
            executor,
            aggregator: ResultAggregator::new(),
            insights: InsightGenerator::new(),
        }
    }

    /// Run an experiment without observing progress.
    pub async fn run_experiment(&self, config: &ExperimentConfig) -> DomainResult<ExperimentResult> {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.run_experiment_with_events(config, tx).await
    }

    /// Run an experiment, streaming status and progress events.
    ///
    /// Returns an error only for an invalid configuration, before any session
    /// has been scheduled. Event delivery is best-effort.
    #[instrument(skip_all, fields(experiment_id = %config.id))]
    pub async fn run_experiment_with_events(
        &self,
        config: &ExperimentConfig,
        events: mpsc::UnboundedSender<ExperimentEvent>,
    ) -> DomainResult<ExperimentResult> {
        let mut status = ExperimentStatus::new(
            config.id.clone(),
            config.total_sessions(),
            config.variants.iter().map(|v| v.id.as_str()),
        );

        if let Err(err) = config.validate() {
            warn!(error = %err, "rejecting experiment configuration");
            status.state = ExperimentState::Failed;
            status.error = Some(err.to_string());
            emit(&events, ExperimentEvent::Status(status));
            emit(&events, ExperimentEvent::Error { message: err.to_string() });
            return Err(err);
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let queue = build_session_queue(config);

        info!(
            variants = config.variants.len(),
            personas = config.personas.len(),
            total_sessions = queue.len(),
            max_concurrent = config.max_concurrent,
            executor = self.executor.name(),
            "starting experiment"
        );

        emit(
            &events,
            ExperimentEvent::Personas {
                persona_ids: config.personas.iter().map(|p| p.id.clone()).collect(),
            },
        );
        status.state = ExperimentState::Running;
        emit(&events, ExperimentEvent::Status(status.clone()));

        let mut sessions = Vec::with_capacity(queue.len());
        for (batch_index, batch) in queue.chunks(config.max_concurrent).enumerate() {
            if batch_index > 0 && config.batch_delay_ms > 0 {
                sleep(Duration::from_millis(config.batch_delay_ms)).await;
            }

            debug!(batch = batch_index + 1, size = batch.len(), "launching batch");
            self.run_batch(config, batch, clock, &mut status, &mut sessions, &events)
                .await;
        }

        status.state = ExperimentState::Analyzing;
        emit(&events, ExperimentEvent::Status(status.clone()));

        let aggregation = self.aggregator.aggregate(&sessions, &config.variants);
        let insights = self.insights.generate(&aggregation, &sessions);

        let result = ExperimentResult {
            experiment_id: config.id.clone(),
            sessions,
            variant_results: aggregation.variant_results,
            winner: aggregation.winner,
            confidence: aggregation.confidence,
            is_significant: aggregation.is_significant,
            insights: insights.insights,
            recommendations: insights.recommendations,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            winner = ?result.winner,
            confidence = result.confidence,
            significant = result.is_significant,
            failed_sessions = result.failed_sessions(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "experiment completed"
        );

        status.state = ExperimentState::Completed;
        status.progress = 100.0;
        status.estimated_seconds_remaining = Some(0);
        emit(&events, ExperimentEvent::Status(status));
        emit(&events, ExperimentEvent::Complete(result.clone()));

        Ok(result)
    }

    /// Run one batch concurrently and wait for every session to settle.
    async fn run_batch(
        &self,
        config: &ExperimentConfig,
        batch: &[SessionSlot],
        clock: Instant,
        status: &mut ExperimentStatus,
        sessions: &mut Vec<SessionRecord>,
        events: &mpsc::UnboundedSender<ExperimentEvent>,
    ) {
        let mut in_flight = FuturesUnordered::new();

        for slot in batch {
            let executor = Arc::clone(&self.executor);
            let request = SessionRequest {
                experiment_id: config.id.clone(),
                url: config.url.clone(),
                persona: slot.persona.clone(),
                variant_id: slot.variant_id.clone(),
                changes: slot.changes.clone(),
                goal: config.goal.clone(),
                max_duration_secs: config.max_session_duration_secs,
            };
            let launched_at = Utc::now();
            let handle = tokio::spawn(async move { executor.execute(request).await });

            in_flight.push(async move { (slot, launched_at, handle.await) });
        }

        while let Some((slot, launched_at, outcome)) = in_flight.next().await {
            let outcome = outcome.unwrap_or_else(|join_err| {
                Err(SessionError::Aborted(join_err.to_string()))
            });
            let record = settle(config, slot, launched_at, outcome);

            status.record_completion(&slot.variant_id, clock.elapsed().as_secs_f64());
            emit(events, ExperimentEvent::Progress(status.clone()));
            sessions.push(record);
        }
    }
}

/// Turn an executor outcome into the record kept for the slot.
fn settle(
    config: &ExperimentConfig,
    slot: &SessionSlot,
    launched_at: chrono::DateTime<Utc>,
    outcome: Result<SessionRecord, SessionError>,
) -> SessionRecord {
    match outcome {
        Ok(mut record) => {
            if record.variant_id != slot.variant_id {
                warn!(
                    session_id = %record.id,
                    reported = %record.variant_id,
                    expected = %slot.variant_id,
                    "executor reported a different variant; keeping the scheduled one"
                );
                record.variant_id.clone_from(&slot.variant_id);
            }
            trace!(
                session_id = %record.id,
                variant_id = %record.variant_id,
                converted = record.converted,
                "session completed"
            );
            record
        }
        Err(err) => {
            warn!(
                variant_id = %slot.variant_id,
                persona_id = %slot.persona.id,
                error = %err,
                transient = err.is_transient(),
                "session failed"
            );
            SessionRecord::failed(
                &slot.persona,
                slot.variant_id.clone(),
                config.url.clone(),
                launched_at,
                err.to_string(),
            )
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<ExperimentEvent>, event: ExperimentEvent) {
    let name = event.name();
    if events.send(event).is_err() {
        trace!(event = name, "event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::experiment::test_experiment;
    use crate::domain::models::persona::test_persona;
    use crate::domain::models::Variant;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn config(sessions_per_variant: usize, personas: usize) -> ExperimentConfig {
        let mut cfg = test_experiment(
            vec![Variant::control("control", "Control"), Variant::new("variant_a", "A")],
            (0..personas).map(|i| test_persona(&format!("p{i}"))).collect(),
        );
        cfg.sessions_per_variant = sessions_per_variant;
        cfg
    }

    #[test]
    fn test_queue_completeness() {
        let queue = build_session_queue(&config(7, 3));
        assert_eq!(queue.len(), 14);
        assert_eq!(queue.iter().filter(|s| s.variant_id == "control").count(), 7);
        assert_eq!(queue.iter().filter(|s| s.variant_id == "variant_a").count(), 7);
    }

    #[test]
    fn test_round_robin_personas() {
        let cfg = config(7, 3);
        for slot in build_session_queue(&cfg) {
            assert_eq!(slot.persona.id, format!("p{}", slot.position % 3));
        }

        let mut per_persona: HashMap<String, usize> = HashMap::new();
        for slot in plan_sessions(&cfg).iter().filter(|s| s.variant_id == "control") {
            *per_persona.entry(slot.persona.id.clone()).or_default() += 1;
        }
        assert_eq!(per_persona["p0"], 3);
        assert_eq!(per_persona["p1"], 2);
        assert_eq!(per_persona["p2"], 2);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let cfg = config(10, 2);
        let first: Vec<(String, usize)> = build_session_queue(&cfg)
            .into_iter()
            .map(|s| (s.variant_id, s.position))
            .collect();
        let second: Vec<(String, usize)> = build_session_queue(&cfg)
            .into_iter()
            .map(|s| (s.variant_id, s.position))
            .collect();
        assert_eq!(first, second);

        let planned: Vec<(String, usize)> = plan_sessions(&cfg)
            .into_iter()
            .map(|s| (s.variant_id, s.position))
            .collect();
        assert_ne!(first, planned, "queue should not stay in variant blocks");
    }

    struct PanickingExecutor;

    #[async_trait]
    impl SessionExecutor for PanickingExecutor {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError> {
            if request.variant_id == "variant_a" {
                panic!("executor crashed");
            }
            let mut record = SessionRecord::new(&request.persona, request.variant_id, request.url);
            record.converted = true;
            Ok(record)
        }
    }

    #[tokio::test]
    async fn test_panicking_session_is_isolated() {
        let scheduler = SwarmScheduler::new(Arc::new(PanickingExecutor));
        let result = scheduler
            .run_experiment(&config(3, 2))
            .await
            .expect("run should complete");

        assert_eq!(result.sessions.len(), 6);
        let failed: Vec<_> = result.sessions.iter().filter(|s| s.is_failed()).collect();
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|s| s.variant_id == "variant_a" && !s.converted));
        assert_eq!(result.variant_results["control"].conversions, 3);
    }

    #[tokio::test]
    async fn test_invalid_config_emits_error_event() {
        let scheduler = SwarmScheduler::new(Arc::new(PanickingExecutor));
        let mut cfg = config(3, 2);
        cfg.variants.clear();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = scheduler.run_experiment_with_events(&cfg, tx).await;
        assert!(result.is_err());

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["status", "error"]);
    }
}
