//! Progress snapshots and the events streamed while an experiment runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::results::ExperimentResult;

/// Lifecycle state of an experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentState {
    #[default]
    Pending,
    Running,
    Analyzing,
    Completed,
    Failed,
}

impl ExperimentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time projection of a run. Never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentStatus {
    pub experiment_id: String,
    pub state: ExperimentState,
    /// Percentage, 0-100
    pub progress: f64,
    pub completed_sessions: usize,
    pub total_sessions: usize,
    pub variant_progress: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_seconds_remaining: Option<u64>,
}

impl ExperimentStatus {
    pub fn new<'a>(
        experiment_id: impl Into<String>,
        total_sessions: usize,
        variant_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            state: ExperimentState::Pending,
            progress: 0.0,
            completed_sessions: 0,
            total_sessions,
            variant_progress: variant_ids.into_iter().map(|id| (id.to_string(), 0)).collect(),
            error: None,
            estimated_seconds_remaining: None,
        }
    }

    /// Record one settled session for `variant_id` and refresh derived fields.
    pub fn record_completion(&mut self, variant_id: &str, elapsed_secs: f64) {
        self.completed_sessions += 1;
        *self.variant_progress.entry(variant_id.to_string()).or_insert(0) += 1;

        self.progress = if self.total_sessions == 0 {
            100.0
        } else {
            (self.completed_sessions as f64 / self.total_sessions as f64 * 100.0).min(100.0)
        };

        let remaining = self.total_sessions.saturating_sub(self.completed_sessions);
        let per_session = elapsed_secs / self.completed_sessions as f64;
        self.estimated_seconds_remaining = Some((per_session * remaining as f64).round() as u64);
    }
}

/// Event emitted to the caller of a run.
///
/// Names match the transport events used by streaming front-ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum ExperimentEvent {
    /// Lifecycle transition
    Status(ExperimentStatus),
    /// Personas taking part in the run
    Personas { persona_ids: Vec<String> },
    /// A session settled
    Progress(ExperimentStatus),
    /// Run finished
    Complete(ExperimentResult),
    /// Run rejected or aborted
    Error { message: String },
}

impl ExperimentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Personas { .. } => "personas",
            Self::Progress(_) => "progress",
            Self::Complete(_) => "complete",
            Self::Error { .. } => "error",
        }
    }
}
