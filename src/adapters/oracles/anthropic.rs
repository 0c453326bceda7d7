//! Anthropic Messages API decision oracle.
//!
//! Asks the model to role-play the persona and reply with a single JSON
//! decision. The persona description goes into a cached system block since it
//! is identical for every step of a session.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult, SessionError};
use crate::domain::models::{
    AgentAction, ConversionGoal, DecisionParse, OracleConfig, PageSnapshot, Persona,
};
use crate::domain::ports::DecisionOracle;

/// Characters of visible page text sent per step
const MAX_VISIBLE_TEXT_CHARS: usize = 4_000;

/// Most recent actions echoed back to the model
const MAX_HISTORY_IN_PROMPT: usize = 12;

/// Anthropic's "overloaded" status, treated like a 429
const STATUS_OVERLOADED: u16 = 529;

/// Message role in Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Cache control marker for Anthropic prompt caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub control_type: String,
}

/// System prompt content block with optional cache_control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemContentBlock {
    fn cached_text(content: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: content.into(),
            cache_control: Some(CacheControl {
                control_type: "ephemeral".to_string(),
            }),
        }
    }
}

/// Content block in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

/// Request to the Anthropic Messages API.
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Vec<SystemContentBlock>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Decision oracle backed by the Anthropic Messages API.
pub struct AnthropicDecisionOracle {
    config: OracleConfig,
    goal: ConversionGoal,
    client: Client,
}

impl AnthropicDecisionOracle {
    /// Create an oracle for sessions pursuing `goal`.
    pub fn new(config: OracleConfig, goal: ConversionGoal) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DomainError::ValidationFailed(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            goal,
            client,
        })
    }

    fn system_prompt(&self, persona: &Persona) -> String {
        let mut prompt = format!(
            "You are simulating a real visitor on a web page. Stay in character.\n\n\
             Visitor: {}\n\
             Age bracket: {}. Device: {}. Tech comfort: {}/10.\n\
             Patience {}/10, thoroughness {}/10, skepticism {}/10, scroll speed {}/10.\n\
             Goal: {} (urgency {}/10).\n",
            persona.name,
            persona.demographics.age_bracket,
            persona.demographics.device.as_str(),
            persona.demographics.tech_comfort,
            persona.behavior.patience,
            persona.behavior.thoroughness,
            persona.behavior.skepticism,
            persona.behavior.scroll_speed,
            persona.intent.goal,
            persona.intent.urgency,
        );
        if !persona.intent.conversion_triggers.is_empty() {
            let _ = writeln!(
                prompt,
                "Things that make you act: {}.",
                persona.intent.conversion_triggers.join(", ")
            );
        }
        if !persona.intent.dealbreakers.is_empty() {
            let _ = writeln!(
                prompt,
                "Things that make you leave: {}.",
                persona.intent.dealbreakers.join(", ")
            );
        }
        let _ = write!(
            prompt,
            "\nThe site owner hopes you will: {}.\n\
             Decide ONE next action. Reply with only a JSON object:\n\
             {{\"action\": \"navigate|click|scroll|hover|read|wait|leave|convert\", \
             \"target\": \"selector or url, optional\", \"duration_ms\": 1500, \
             \"reasoning\": \"short\", \"impression\": \"positive|neutral|negative, when leaving\", \
             \"feedback\": \"one sentence, when leaving\"}}",
            self.goal.description
        );
        prompt
    }

    fn user_prompt(snapshot: &PageSnapshot, history: &[AgentAction]) -> String {
        let text: String = snapshot.visible_text.chars().take(MAX_VISIBLE_TEXT_CHARS).collect();
        let mut prompt = format!(
            "URL: {}\nTitle: {}\nScroll: {}px of {}px (viewport {}px)\nClickable: {}\n\nVisible text:\n{}\n",
            snapshot.url,
            snapshot.title,
            snapshot.scroll_position_px,
            snapshot.page_height_px,
            snapshot.viewport_height_px,
            snapshot.clickable_targets.join(", "),
            text,
        );
        if snapshot.at_bottom() {
            prompt.push_str("(You have reached the bottom of the page.)\n");
        }

        if history.is_empty() {
            prompt.push_str("\nYou just arrived.");
        } else {
            prompt.push_str("\nWhat you did so far:\n");
            let skip = history.len().saturating_sub(MAX_HISTORY_IN_PROMPT);
            for action in &history[skip..] {
                let _ = writeln!(
                    prompt,
                    "- {} {}",
                    action.action_type,
                    action.target.as_deref().unwrap_or("")
                );
            }
        }
        prompt
    }

    fn build_request(&self, persona: &Persona, snapshot: &PageSnapshot, history: &[AgentAction]) -> MessagesRequest {
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: vec![SystemContentBlock::cached_text(self.system_prompt(persona))],
            messages: vec![Message {
                role: MessageRole::User,
                content: vec![ContentBlock::Text {
                    text: Self::user_prompt(snapshot, history),
                }],
            }],
        }
    }
}

/// Map a non-success HTTP status to a session error.
fn classify_status(status: StatusCode, body: &str) -> SessionError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.chars().take(200).collect::<String>(),
        |envelope| format!("{}: {}", envelope.error.error_type, envelope.error.message),
    );

    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == STATUS_OVERLOADED {
        SessionError::RateLimited(format!("API error {status}: {detail}"))
    } else {
        SessionError::Upstream(format!("API error {status}: {detail}"))
    }
}

#[async_trait]
impl DecisionOracle for AnthropicDecisionOracle {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn decide_next_action(
        &self,
        persona: &Persona,
        snapshot: &PageSnapshot,
        history: &[AgentAction],
    ) -> Result<DecisionParse, SessionError> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| SessionError::Upstream("ANTHROPIC_API_KEY not set".to_string()))?;

        let api_request = self.build_request(persona, snapshot, history);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(format!("API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, &body);
            warn!(%status, error = %err, "decision request rejected");
            return Err(err);
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Upstream(format!("Failed to parse response: {e}")))?;

        debug!(
            message_id = %result.id,
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            stop_reason = ?result.stop_reason,
            "decision received"
        );

        let text = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(DecisionParse::from_model_output(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::persona::test_persona;
    use crate::domain::models::{ActionType, GoalKind};
    use mockito::Server;

    fn goal() -> ConversionGoal {
        ConversionGoal {
            kind: GoalKind::Click,
            target: "#signup".to_string(),
            description: "Start a free trial".to_string(),
        }
    }

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            visible_text: "Try it free for 14 days".to_string(),
            clickable_targets: vec!["#signup".to_string()],
            scroll_position_px: 0,
            page_height_px: 2_400,
            viewport_height_px: 800,
            load_time_ms: 120,
        }
    }

    fn oracle(base_url: String) -> AnthropicDecisionOracle {
        let config = OracleConfig {
            api_key: Some("test-api-key".to_string()),
            base_url,
            ..Default::default()
        };
        AnthropicDecisionOracle::new(config, goal()).unwrap()
    }

    fn response_body(text: &str) -> String {
        serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 420, "output_tokens": 38}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_decision_parsed_from_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-api-key")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body(
                r##"Sure. {"action": "click", "target": "#signup", "reasoning": "free trial"}"##,
            ))
            .create_async()
            .await;

        let decision = oracle(server.url())
            .decide_next_action(&test_persona("p1"), &snapshot(), &[])
            .await
            .unwrap();

        let DecisionParse::Parsed(decision) = decision else {
            panic!("expected a decision");
        };
        assert_eq!(decision.action, ActionType::Click);
        assert_eq!(decision.target.as_deref(), Some("#signup"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_prose_reply_is_unparseable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body("I would probably scroll a bit."))
            .create_async()
            .await;

        let decision = oracle(server.url())
            .decide_next_action(&test_persona("p1"), &snapshot(), &[])
            .await
            .unwrap();
        assert!(matches!(decision, DecisionParse::Unparseable { .. }));
    }

    #[tokio::test]
    async fn test_429_and_529_are_rate_limits() {
        for status in [429, 529] {
            let mut server = Server::new_async().await;
            let _mock = server
                .mock("POST", "/v1/messages")
                .with_status(status)
                .with_body(r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#)
                .create_async()
                .await;

            let err = oracle(server.url())
                .decide_next_action(&test_persona("p1"), &snapshot(), &[])
                .await
                .unwrap_err();
            assert!(err.is_rate_limited(), "status {status} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let err = oracle(server.url())
            .decide_next_action(&test_persona("p1"), &snapshot(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Upstream(_)));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_prompts_carry_persona_and_page() {
        let oracle = oracle("http://localhost:9".to_string());
        let mut persona = test_persona("p1");
        persona.intent.dealbreakers = vec!["hidden pricing".to_string()];

        let history = vec![AgentAction::new(ActionType::Scroll, chrono::Utc::now())];
        let request = oracle.build_request(&persona, &snapshot(), &history);

        assert_eq!(request.system.len(), 1);
        assert!(request.system[0].cache_control.is_some());
        assert!(request.system[0].text.contains("hidden pricing"));
        assert!(request.system[0].text.contains("Start a free trial"));

        let ContentBlock::Text { text } = &request.messages[0].content[0] else {
            panic!("expected text block");
        };
        assert!(text.contains("Try it free"));
        assert!(text.contains("- scroll"));
    }
}
