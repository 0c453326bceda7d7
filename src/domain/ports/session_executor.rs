//! Session executor port - the boundary to a single browsing agent.

use async_trait::async_trait;

use crate::domain::errors::SessionError;
use crate::domain::models::{ConversionGoal, Persona, SessionRecord};

/// Everything needed to run one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub experiment_id: String,
    pub url: String,
    pub persona: Persona,
    pub variant_id: String,
    /// Opaque variant payload, passed through untouched
    pub changes: Option<serde_json::Value>,
    pub goal: ConversionGoal,
    pub max_duration_secs: u64,
}

/// Runs one browsing session to completion.
///
/// Implementations are expected to enforce `max_duration_secs` themselves and
/// return rather than hang. Any error is converted by the scheduler into a
/// failed session record.
#[async_trait]
pub trait SessionExecutor: Send + Sync {
    /// Get the executor name.
    fn name(&self) -> &'static str;

    /// Run the session and return its complete record.
    async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError>;
}
