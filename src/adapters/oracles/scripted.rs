//! Deterministic oracle that replays a fixed script.
//!
//! The step to play is the length of the action history, so the oracle holds
//! no per-session state and one instance can serve any number of sessions.
//! Once the script runs out the visitor leaves.

use async_trait::async_trait;

use crate::domain::errors::SessionError;
use crate::domain::models::{
    ActionType, AgentAction, Decision, DecisionParse, PageSnapshot, Persona,
};
use crate::domain::ports::DecisionOracle;

#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Vec<DecisionParse>,
}

impl ScriptedOracle {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            script: decisions.into_iter().map(DecisionParse::Parsed).collect(),
        }
    }

    /// Script raw model replies, parsed the same way a live model's would be.
    pub fn from_raw_outputs<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            script: outputs
                .into_iter()
                .map(|raw| DecisionParse::from_model_output(raw.as_ref()))
                .collect(),
        }
    }

    /// Read the page, scroll once, then act on `target`.
    pub fn browse_then_click(target: impl Into<String>) -> Self {
        Self::new(vec![
            Decision::new(ActionType::Read)
                .with_duration_ms(3_000)
                .with_reasoning("Reading the headline"),
            Decision::new(ActionType::Scroll).with_duration_ms(1_500),
            Decision::new(ActionType::Click)
                .with_target(target)
                .with_reasoning("The offer matches what I came for"),
        ])
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn decide_next_action(
        &self,
        _persona: &Persona,
        _snapshot: &PageSnapshot,
        history: &[AgentAction],
    ) -> Result<DecisionParse, SessionError> {
        Ok(self.script.get(history.len()).cloned().unwrap_or_else(|| {
            DecisionParse::Parsed(
                Decision::new(ActionType::Leave).with_reasoning("Nothing left to do"),
            )
        }))
    }
}
