//! Oracle-driven session runner.
//!
//! Walks one persona through one variant: open the page, then repeatedly ask
//! the decision oracle for the next action and apply it, until the visitor
//! leaves, converts, or runs out of steps or time.
//!
//! Session time is virtual: each action starts where the previous one ended,
//! using the duration the oracle assigned to it. The wall-clock budget is
//! enforced separately with a timeout around the whole loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::domain::errors::SessionError;
use crate::domain::models::{
    ActionType, AgentAction, Decision, DecisionParse, Impression, PageSamples, PageSnapshot,
    SessionMetrics, SessionRecord,
};
use crate::domain::ports::{
    DecisionOracle, PageDriverFactory, SessionExecutor, SessionRequest, SnapshotStore,
};

/// Default cap on oracle decisions per session
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Simulated duration for actions the oracle did not time.
pub const fn default_duration_ms(action: ActionType) -> u64 {
    match action {
        ActionType::Read => 4_000,
        ActionType::Wait => 2_000,
        ActionType::Scroll => 1_200,
        ActionType::Navigate => 1_500,
        ActionType::Click | ActionType::Hover | ActionType::Convert => 800,
        ActionType::Leave => 0,
    }
}

/// `SessionExecutor` driven by a decision oracle and a page driver.
pub struct OracleSessionRunner {
    oracle: Arc<dyn DecisionOracle>,
    pages: Arc<dyn PageDriverFactory>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    max_steps: usize,
}

impl OracleSessionRunner {
    pub fn new(oracle: Arc<dyn DecisionOracle>, pages: Arc<dyn PageDriverFactory>) -> Self {
        Self {
            oracle,
            pages,
            snapshots: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Keep the first snapshot seen for each variant in `store`.
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    #[instrument(
        skip_all,
        fields(persona_id = %request.persona.id, variant_id = %request.variant_id)
    )]
    async fn run_session(&self, request: &SessionRequest) -> Result<SessionRecord, SessionError> {
        let mut record = SessionRecord::new(&request.persona, &request.variant_id, &request.url);
        debug!(persona = %request.persona.summary(), "session started");
        let mut page = self.pages.create();

        let mut snapshot = page.open(&request.url, request.changes.as_ref()).await?;
        self.remember_snapshot(request, &snapshot).await;

        let budget_ms = request.max_duration_secs.saturating_mul(1_000);
        let mut elapsed_ms = 0u64;
        let mut clock = record.started_at;
        let mut samples = PageSamples {
            max_scroll_px: seen_depth(&snapshot),
            page_height_px: snapshot.page_height_px,
            load_time_ms: snapshot.load_time_ms,
        };
        let mut exit_reason = None;

        for step in 0..self.max_steps {
            let decision = match self
                .oracle
                .decide_next_action(&request.persona, &snapshot, &record.actions)
                .await?
            {
                DecisionParse::Parsed(decision) => decision,
                DecisionParse::Unparseable { reason, raw } => {
                    warn!(step, %reason, raw_len = raw.len(), "oracle output was not a decision");
                    return Err(SessionError::DecisionParse(reason));
                }
            };

            let action = to_action(&decision, clock);
            clock = action.ended_at();
            elapsed_ms = elapsed_ms.saturating_add(action.duration_ms.unwrap_or(0));

            if decision.impression.is_some() {
                record.impression = decision.impression;
            }
            if decision.feedback.is_some() {
                record.feedback.clone_from(&decision.feedback);
            }

            debug!(step, action = %action.action_type, target = ?action.target, "agent acted");

            let converted = request.goal.is_satisfied_by(&action);
            let action_type = action.action_type;
            record.record_action(action.clone());

            if converted {
                record.mark_converted(decision.reasoning.clone().or(decision.target.clone()));
                exit_reason = Some("Converted".to_string());
                break;
            }
            if action_type == ActionType::Leave {
                exit_reason = Some(
                    decision
                        .reasoning
                        .unwrap_or_else(|| "Visitor left the page".to_string()),
                );
                break;
            }

            snapshot = page.perform(&action).await?;
            samples.max_scroll_px = samples.max_scroll_px.max(seen_depth(&snapshot));
            samples.page_height_px = samples.page_height_px.max(snapshot.page_height_px);

            if elapsed_ms >= budget_ms {
                exit_reason = Some("Time budget exhausted".to_string());
                break;
            }
        }

        record.exit_reason = Some(exit_reason.unwrap_or_else(|| "Step limit reached".to_string()));
        if record.impression.is_none() {
            record.impression = Some(if record.converted {
                Impression::Positive
            } else {
                Impression::Neutral
            });
        }
        record.metrics = SessionMetrics::from_actions(&record.actions, samples);
        record.ended_at = clock;

        debug!(
            converted = record.converted,
            actions = record.actions.len(),
            time_on_page_ms = record.metrics.time_on_page_ms,
            "session finished"
        );
        Ok(record)
    }

    async fn remember_snapshot(&self, request: &SessionRequest, snapshot: &PageSnapshot) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let key = format!("{}/{}", request.experiment_id, request.variant_id);
        if store.get(&key).await.is_none() {
            store.put(key, snapshot.clone()).await;
        }
    }
}

#[async_trait]
impl SessionExecutor for OracleSessionRunner {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError> {
        let budget = request.max_duration_secs;
        timeout(Duration::from_secs(budget), self.run_session(&request))
            .await
            .map_err(|_| SessionError::Timeout(budget))?
    }
}

fn to_action(decision: &Decision, at: chrono::DateTime<chrono::Utc>) -> AgentAction {
    let duration_ms = decision
        .duration_ms
        .unwrap_or_else(|| default_duration_ms(decision.action));
    let mut action = AgentAction::new(decision.action, at).with_duration_ms(duration_ms);
    if let Some(target) = &decision.target {
        action = action.with_target(target.clone());
    }
    if let Some(reasoning) = &decision.reasoning {
        action = action.with_reasoning(reasoning.clone());
    }
    action
}

/// Deepest point of the page the viewport has reached.
fn seen_depth(snapshot: &PageSnapshot) -> u32 {
    snapshot
        .scroll_position_px
        .saturating_add(snapshot.viewport_height_px)
        .min(snapshot.page_height_px)
}
