//! Programmable session executor for tests and dry runs.
//!
//! Sessions are synthesized rather than browsed: a short action log is
//! generated per persona and the visitor converts with a configurable
//! per-variant probability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::domain::errors::SessionError;
use crate::domain::models::{
    ActionType, AgentAction, GoalKind, Impression, PageSamples, SessionMetrics, SessionRecord,
};
use crate::domain::ports::{SessionExecutor, SessionRequest};

const SIMULATED_PAGE_HEIGHT_PX: u32 = 3_000;

/// Mock session executor.
pub struct MockSessionExecutor {
    default_conversion_rate: f64,
    conversion_rates: HashMap<String, f64>,
    variant_failures: HashMap<String, SessionError>,
    /// Fail this many leading calls with the given error
    leading_failures: Option<(usize, SessionError)>,
    delay: Duration,
    rng: Mutex<StdRng>,
    calls: AtomicUsize,
}

impl MockSessionExecutor {
    pub fn new() -> Self {
        Self {
            default_conversion_rate: 0.0,
            conversion_rates: HashMap::new(),
            variant_failures: HashMap::new(),
            leading_failures: None,
            delay: Duration::ZERO,
            rng: Mutex::new(StdRng::from_entropy()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Conversion probability for variants without their own rate.
    pub fn with_default_conversion_rate(mut self, rate: f64) -> Self {
        self.default_conversion_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_conversion_rate(mut self, variant_id: impl Into<String>, rate: f64) -> Self {
        self.conversion_rates
            .insert(variant_id.into(), rate.clamp(0.0, 1.0));
        self
    }

    /// Every session of `variant_id` fails with `error`.
    pub fn with_failure(mut self, variant_id: impl Into<String>, error: SessionError) -> Self {
        self.variant_failures.insert(variant_id.into(), error);
        self
    }

    /// The first `count` calls fail with `error`, whatever their variant.
    pub fn failing_first(mut self, count: usize, error: SessionError) -> Self {
        self.leading_failures = Some((count, error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Number of `execute` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn conversion_rate(&self, variant_id: &str) -> f64 {
        self.conversion_rates
            .get(variant_id)
            .copied()
            .unwrap_or(self.default_conversion_rate)
    }

    fn synthesize(&self, request: &SessionRequest) -> SessionRecord {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let converts = rng.gen_bool(self.conversion_rate(&request.variant_id));

        let mut record = SessionRecord::new(&request.persona, &request.variant_id, &request.url);
        let patience = u64::from(request.persona.behavior.patience);
        let started_at = record.started_at;

        let mut clock = push(
            &mut record,
            AgentAction::new(ActionType::Navigate, started_at)
                .with_target(request.url.clone())
                .with_duration_ms(rng.gen_range(300..1_500)),
        );
        clock = push(
            &mut record,
            AgentAction::new(ActionType::Read, clock).with_duration_ms(patience * rng.gen_range(400..900)),
        );
        let scrolls = rng.gen_range(0..=3u32);
        for _ in 0..scrolls {
            clock = push(
                &mut record,
                AgentAction::new(ActionType::Scroll, clock).with_duration_ms(rng.gen_range(500..1_500)),
            );
        }

        if converts {
            let action = goal_action(request, clock).with_duration_ms(rng.gen_range(200..800));
            clock = push(&mut record, action);
            record.mark_converted(Some(
                request
                    .persona
                    .intent
                    .conversion_triggers
                    .first()
                    .cloned()
                    .unwrap_or_else(|| request.goal.description.clone()),
            ));
            record.exit_reason = Some("Converted".to_string());
            record.impression = Some(Impression::Positive);
        } else {
            let reason = request
                .persona
                .intent
                .dealbreakers
                .first()
                .cloned()
                .unwrap_or_else(|| "Not convinced".to_string());
            clock = push(
                &mut record,
                AgentAction::new(ActionType::Leave, clock).with_reasoning(reason.clone()),
            );
            record.exit_reason = Some(reason);
            record.impression = Some(if rng.gen_bool(0.5) {
                Impression::Neutral
            } else {
                Impression::Negative
            });
        }

        let samples = PageSamples {
            max_scroll_px: (800 + scrolls * 640).min(SIMULATED_PAGE_HEIGHT_PX),
            page_height_px: SIMULATED_PAGE_HEIGHT_PX,
            load_time_ms: 350,
        };
        record.metrics = SessionMetrics::from_actions(&record.actions, samples);
        record.ended_at = clock;
        record
    }
}

impl Default for MockSessionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn push(record: &mut SessionRecord, action: AgentAction) -> DateTime<Utc> {
    let ended = action.ended_at();
    record.record_action(action);
    ended
}

/// An action that satisfies the request's conversion goal.
fn goal_action(request: &SessionRequest, at: DateTime<Utc>) -> AgentAction {
    let goal = &request.goal;
    match goal.kind {
        GoalKind::Click | GoalKind::Submit => {
            AgentAction::new(ActionType::Click, at).with_target(goal.target.clone())
        }
        GoalKind::Navigate => {
            AgentAction::new(ActionType::Navigate, at).with_target(goal.target.clone())
        }
        GoalKind::Custom => AgentAction::new(ActionType::Convert, at).with_target(goal.target.clone()),
    }
}

#[async_trait]
impl SessionExecutor for MockSessionExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some((count, error)) = &self.leading_failures {
            if call < *count {
                return Err(error.clone());
            }
        }
        if let Some(error) = self.variant_failures.get(&request.variant_id) {
            return Err(error.clone());
        }

        Ok(self.synthesize(&request))
    }
}
