//! Session domain model.
//!
//! A session is one simulated visit by one persona to one variant. The record
//! is mutated by the session executor while it runs and is immutable once it
//! reaches the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::persona::Persona;

/// Sessions shorter than this count as a bounce.
pub const BOUNCE_THRESHOLD_MS: u64 = 5_000;

/// Kind of action an agent took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Scroll,
    Hover,
    Read,
    Wait,
    Leave,
    Convert,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::Read => "read",
            Self::Wait => "wait",
            Self::Leave => "leave",
            Self::Convert => "convert",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable log entry describing one agent action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentAction {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl AgentAction {
    pub fn new(action_type: ActionType, timestamp: DateTime<Utc>) -> Self {
        Self {
            action_type,
            target: None,
            timestamp,
            duration_ms: None,
            reasoning: None,
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

    /// Timestamp at which the action finished.
    pub fn ended_at(&self) -> DateTime<Utc> {
        let duration = i64::try_from(self.duration_ms.unwrap_or(0)).unwrap_or(i64::MAX);
        chrono::TimeDelta::try_milliseconds(duration)
            .and_then(|delta| self.timestamp.checked_add_signed(delta))
            .unwrap_or(self.timestamp)
    }
}

/// Visitor's overall impression of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impression {
    Positive,
    Neutral,
    Negative,
}

/// Page measurements sampled while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSamples {
    /// Deepest scroll offset seen, in pixels
    pub max_scroll_px: u32,
    /// Total scrollable page height, in pixels
    pub page_height_px: u32,
    pub load_time_ms: u64,
}

/// Numeric aggregate describing one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct SessionMetrics {
    pub time_on_page_ms: u64,
    pub scroll_depth_px: u32,
    pub scroll_depth_percent: f64,
    pub clicks: u32,
    pub hovers: u32,
    pub hesitations: u32,
    pub load_time_ms: u64,
}

impl SessionMetrics {
    /// Derive metrics from the action log and page samples.
    ///
    /// Time on page spans from the first action's start to the last action's end.
    pub fn from_actions(actions: &[AgentAction], samples: PageSamples) -> Self {
        let time_on_page_ms = match (actions.first(), actions.iter().map(AgentAction::ended_at).max()) {
            (Some(first), Some(last)) => {
                u64::try_from((last - first.timestamp).num_milliseconds()).unwrap_or(0)
            }
            _ => 0,
        };

        let count = |kind: ActionType| {
            u32::try_from(actions.iter().filter(|a| a.action_type == kind).count())
                .unwrap_or(u32::MAX)
        };

        let scroll_depth_percent = if samples.page_height_px == 0 {
            0.0
        } else {
            (f64::from(samples.max_scroll_px) / f64::from(samples.page_height_px) * 100.0)
                .min(100.0)
        };

        Self {
            time_on_page_ms,
            scroll_depth_px: samples.max_scroll_px,
            scroll_depth_percent,
            clicks: count(ActionType::Click),
            hovers: count(ActionType::Hover),
            hesitations: count(ActionType::Wait),
            load_time_ms: samples.load_time_ms,
        }
    }

    pub fn is_bounce(&self) -> bool {
        self.time_on_page_ms < BOUNCE_THRESHOLD_MS
    }
}

/// Complete record of one simulated visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionRecord {
    pub id: Uuid,
    pub persona_id: String,
    pub persona_name: String,
    pub variant_id: String,
    pub url: String,
    #[serde(default)]
    pub actions: Vec<AgentAction>,
    #[serde(default)]
    pub metrics: SessionMetrics,
    pub converted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impression: Option<Impression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SessionRecord {
    /// Start a new record with an empty action log.
    pub fn new(persona: &Persona, variant_id: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            persona_id: persona.id.clone(),
            persona_name: persona.name.clone(),
            variant_id: variant_id.into(),
            url: url.into(),
            actions: Vec::new(),
            metrics: SessionMetrics::default(),
            converted: false,
            conversion_trigger: None,
            exit_reason: None,
            impression: None,
            feedback: None,
            started_at: now,
            ended_at: now,
            errors: Vec::new(),
        }
    }

    /// Synthesize the record for a session that errored out.
    pub fn failed(
        persona: &Persona,
        variant_id: impl Into<String>,
        url: impl Into<String>,
        started_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let mut record = Self::new(persona, variant_id, url);
        record.started_at = started_at;
        record.ended_at = Utc::now().max(started_at);
        record.converted = false;
        record.impression = Some(Impression::Negative);
        record.exit_reason = Some(format!("Error: {message}"));
        record.errors = vec![message];
        record
    }

    pub fn is_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Append an action to the log.
    pub fn record_action(&mut self, action: AgentAction) {
        self.actions.push(action);
    }

    /// Mark the session as converted.
    pub fn mark_converted(&mut self, trigger: Option<String>) {
        self.converted = true;
        self.conversion_trigger = trigger;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::persona::test_persona;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).expect("valid timestamp")
    }

    #[test]
    fn test_metrics_from_actions() {
        let actions = vec![
            AgentAction::new(ActionType::Navigate, at(0)).with_duration_ms(1_000),
            AgentAction::new(ActionType::Scroll, at(1_000)).with_duration_ms(500),
            AgentAction::new(ActionType::Hover, at(1_500)).with_target("#pricing"),
            AgentAction::new(ActionType::Wait, at(2_000)).with_duration_ms(3_000),
            AgentAction::new(ActionType::Click, at(5_000)).with_target("#signup"),
            AgentAction::new(ActionType::Read, at(5_500)).with_duration_ms(2_500),
        ];
        let samples = PageSamples {
            max_scroll_px: 1_500,
            page_height_px: 3_000,
            load_time_ms: 420,
        };

        let metrics = SessionMetrics::from_actions(&actions, samples);
        assert_eq!(metrics.time_on_page_ms, 8_000);
        assert_eq!(metrics.scroll_depth_px, 1_500);
        assert!((metrics.scroll_depth_percent - 50.0).abs() < f64::EPSILON);
        assert_eq!(metrics.clicks, 1);
        assert_eq!(metrics.hovers, 1);
        assert_eq!(metrics.hesitations, 1);
        assert_eq!(metrics.load_time_ms, 420);
        assert!(!metrics.is_bounce());
    }

    #[test]
    fn test_metrics_empty_log() {
        let metrics = SessionMetrics::from_actions(&[], PageSamples::default());
        assert_eq!(metrics.time_on_page_ms, 0);
        assert!(metrics.scroll_depth_percent.abs() < f64::EPSILON);
        assert!(metrics.is_bounce());
    }

    #[test]
    fn test_failed_record_shape() {
        let persona = test_persona("p1");
        let started = Utc::now();
        let record = SessionRecord::failed(&persona, "variant_a", "https://example.com", started, "boom");

        assert!(!record.converted);
        assert!(record.is_failed());
        assert_eq!(record.impression, Some(Impression::Negative));
        assert_eq!(record.exit_reason.as_deref(), Some("Error: boom"));
        assert_eq!(record.errors, vec!["boom".to_string()]);
        assert_eq!(record.variant_id, "variant_a");
        assert!(record.ended_at >= record.started_at);
    }
}
