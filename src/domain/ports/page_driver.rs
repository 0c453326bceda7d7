//! Page driver port - loads a variant of the page and performs actions on it.

use async_trait::async_trait;

use crate::domain::errors::SessionError;
use crate::domain::models::{AgentAction, PageSnapshot};

/// One browsing context for one session.
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` with the variant's changes applied.
    async fn open(
        &mut self,
        url: &str,
        changes: Option<&serde_json::Value>,
    ) -> Result<PageSnapshot, SessionError>;

    /// Apply an action and return the resulting view.
    async fn perform(&mut self, action: &AgentAction) -> Result<PageSnapshot, SessionError>;
}

/// Creates a fresh page driver per session.
pub trait PageDriverFactory: Send + Sync {
    fn create(&self) -> Box<dyn PageDriver>;
}
