//! Page snapshots and agent decisions exchanged with the browsing collaborators.

use serde::{Deserialize, Serialize};

use super::session::{ActionType, Impression};

/// What the agent can currently see of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    /// Visible text around the viewport, truncated by the page driver
    pub visible_text: String,
    /// Selectors or labels the agent can act on
    #[serde(default)]
    pub clickable_targets: Vec<String>,
    pub scroll_position_px: u32,
    pub page_height_px: u32,
    pub viewport_height_px: u32,
    pub load_time_ms: u64,
}

impl PageSnapshot {
    /// Whether the viewport already shows the bottom of the page.
    pub fn at_bottom(&self) -> bool {
        self.scroll_position_px + self.viewport_height_px >= self.page_height_px
    }
}

/// The oracle's choice of next action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Decision {
    pub action: ActionType,
    #[serde(default)]
    pub target: Option<String>,
    /// Simulated time the action takes, in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Set on terminal decisions
    #[serde(default)]
    pub impression: Option<Impression>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Decision {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            target: None,
            duration_ms: None,
            reasoning: None,
            impression: None,
            feedback: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_impression(mut self, impression: Impression) -> Self {
        self.impression = Some(impression);
        self
    }
}

/// Outcome of turning raw oracle output into a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionParse {
    Parsed(Decision),
    Unparseable { reason: String, raw: String },
}

impl DecisionParse {
    /// Parse the first JSON object embedded in free-form model output.
    pub fn from_model_output(raw: &str) -> Self {
        let Some(start) = raw.find('{') else {
            return Self::unparseable("no JSON object in output", raw);
        };
        let Some(end) = raw.rfind('}') else {
            return Self::unparseable("unterminated JSON object", raw);
        };
        if end < start {
            return Self::unparseable("unterminated JSON object", raw);
        }

        match serde_json::from_str::<Decision>(&raw[start..=end]) {
            Ok(decision) => Self::Parsed(decision),
            Err(e) => Self::unparseable(&e.to_string(), raw),
        }
    }

    fn unparseable(reason: &str, raw: &str) -> Self {
        Self::Unparseable {
            reason: reason.to_string(),
            raw: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedded_json() {
        let raw = r##"I think the visitor would click now.
{"action": "click", "target": "#signup", "reasoning": "free trial is prominent"}
Done."##;
        match DecisionParse::from_model_output(raw) {
            DecisionParse::Parsed(decision) => {
                assert_eq!(decision.action, ActionType::Click);
                assert_eq!(decision.target.as_deref(), Some("#signup"));
                assert!(decision.duration_ms.is_none());
            }
            DecisionParse::Unparseable { reason, .. } => panic!("expected parse, got {reason}"),
        }
    }

    #[test]
    fn test_parse_terminal_decision() {
        let raw = r#"{"action": "leave", "impression": "negative", "feedback": "too pushy"}"#;
        let DecisionParse::Parsed(decision) = DecisionParse::from_model_output(raw) else {
            panic!("expected parse");
        };
        assert_eq!(decision.action, ActionType::Leave);
        assert_eq!(decision.impression, Some(Impression::Negative));
    }

    #[test]
    fn test_unparseable_outputs() {
        assert!(matches!(
            DecisionParse::from_model_output("I would leave the page"),
            DecisionParse::Unparseable { .. }
        ));
        assert!(matches!(
            DecisionParse::from_model_output(r#"{"action": "teleport"}"#),
            DecisionParse::Unparseable { .. }
        ));
        assert!(matches!(
            DecisionParse::from_model_output("} backwards {"),
            DecisionParse::Unparseable { .. }
        ));
    }

    #[test]
    fn test_at_bottom() {
        let snapshot = PageSnapshot {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            visible_text: String::new(),
            clickable_targets: vec![],
            scroll_position_px: 2_200,
            page_height_px: 3_000,
            viewport_height_px: 800,
            load_time_ms: 300,
        };
        assert!(snapshot.at_bottom());
    }
}
