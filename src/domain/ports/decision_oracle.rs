//! Decision oracle port - chooses what a persona does next.

use async_trait::async_trait;

use crate::domain::errors::SessionError;
use crate::domain::models::{AgentAction, DecisionParse, PageSnapshot, Persona};

/// Picks the next action for a persona looking at a page.
///
/// Typically backed by an LLM call. Output that cannot be turned into an
/// action is reported as `DecisionParse::Unparseable` rather than an error so
/// callers can decide how to treat it.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decide_next_action(
        &self,
        persona: &Persona,
        snapshot: &PageSnapshot,
        history: &[AgentAction],
    ) -> Result<DecisionParse, SessionError>;
}
