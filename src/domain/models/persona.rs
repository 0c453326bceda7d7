//! Persona domain model.
//!
//! Personas are abstract user-behaviour profiles produced outside the core.
//! They are read-only once an experiment starts.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Lowest allowed value for a behaviour scalar.
pub const BEHAVIOR_MIN: u8 = 1;
/// Highest allowed value for a behaviour scalar.
pub const BEHAVIOR_MAX: u8 = 10;

/// Device the persona browses with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

/// Demographic attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Demographics {
    /// Age bracket, e.g. "25-34"
    pub age_bracket: String,
    #[serde(default)]
    pub device: Device,
    /// Comfort with technology, 1-10
    #[serde(default = "default_scale")]
    pub tech_comfort: u8,
}

/// Behaviour attributes, each on a 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Behavior {
    pub patience: u8,
    pub thoroughness: u8,
    pub skepticism: u8,
    pub scroll_speed: u8,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            patience: 5,
            thoroughness: 5,
            skepticism: 5,
            scroll_speed: 5,
        }
    }
}

/// What the persona is trying to achieve on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Intent {
    pub goal: String,
    /// Urgency, 1-10
    #[serde(default = "default_scale")]
    pub urgency: u8,
    #[serde(default)]
    pub conversion_triggers: Vec<String>,
    #[serde(default)]
    pub dealbreakers: Vec<String>,
}

const fn default_scale() -> u8 {
    5
}

/// A simulated visitor profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub demographics: Demographics,
    #[serde(default)]
    pub behavior: Behavior,
    pub intent: Intent,
}

impl Persona {
    /// Check that every bounded scalar is within `BEHAVIOR_MIN..=BEHAVIOR_MAX`.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "persona id cannot be empty".to_string(),
            ));
        }

        let scalars = [
            ("tech_comfort", self.demographics.tech_comfort),
            ("patience", self.behavior.patience),
            ("thoroughness", self.behavior.thoroughness),
            ("skepticism", self.behavior.skepticism),
            ("scroll_speed", self.behavior.scroll_speed),
            ("urgency", self.intent.urgency),
        ];

        for (field, value) in scalars {
            if !(BEHAVIOR_MIN..=BEHAVIOR_MAX).contains(&value) {
                return Err(DomainError::ValidationFailed(format!(
                    "persona '{}': {field} must be between {BEHAVIOR_MIN} and {BEHAVIOR_MAX}, got {value}",
                    self.id
                )));
            }
        }

        Ok(())
    }

    /// Short one-line description used in oracle prompts and logs.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}, {}, patience {}/10, skepticism {}/10): {}",
            self.name,
            self.demographics.age_bracket,
            self.demographics.device.as_str(),
            self.behavior.patience,
            self.behavior.skepticism,
            self.intent.goal
        )
    }
}

#[cfg(test)]
pub(crate) fn test_persona(id: &str) -> Persona {
    Persona {
        id: id.to_string(),
        name: format!("Persona {id}"),
        demographics: Demographics {
            age_bracket: "25-34".to_string(),
            device: Device::Desktop,
            tech_comfort: 6,
        },
        behavior: Behavior::default(),
        intent: Intent {
            goal: "Sign up for a trial".to_string(),
            urgency: 5,
            conversion_triggers: vec!["free trial".to_string()],
            dealbreakers: vec!["hidden pricing".to_string()],
        },
    }
}
