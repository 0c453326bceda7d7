//! Experiment definition: variants, conversion goal and scheduling knobs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::persona::Persona;
use super::session::{ActionType, AgentAction};
use crate::domain::errors::{DomainError, DomainResult};

/// What kind of outcome counts as a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Click,
    Submit,
    Navigate,
    Custom,
}

/// Declarative success condition for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConversionGoal {
    pub kind: GoalKind,
    /// Selector, button text or URL pattern depending on `kind`
    pub target: String,
    pub description: String,
}

impl ConversionGoal {
    /// Returns true if `action` satisfies this goal.
    pub fn is_satisfied_by(&self, action: &AgentAction) -> bool {
        let target_matches = action
            .target
            .as_deref()
            .is_some_and(|target| contains_ignore_case(target, &self.target));

        match (self.kind, action.action_type) {
            (GoalKind::Custom, ActionType::Convert) => true,
            (GoalKind::Click, ActionType::Click | ActionType::Convert) => target_matches,
            (GoalKind::Submit, ActionType::Click | ActionType::Convert) => {
                target_matches
                    || action
                        .target
                        .as_deref()
                        .is_some_and(|target| contains_ignore_case(target, "submit"))
            }
            (GoalKind::Navigate, ActionType::Navigate | ActionType::Convert) => target_matches,
            _ => false,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A named version of the page under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Variant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_control: bool,
    /// Style/script injection instructions, meaningful only to the session executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
}

impl Variant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_control: false,
            changes: None,
        }
    }

    pub fn control(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_control: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }
}

/// Full description of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentConfig {
    pub id: String,
    pub url: String,
    pub variants: Vec<Variant>,
    pub goal: ConversionGoal,
    pub personas: Vec<Persona>,
    #[serde(default = "default_sessions_per_variant")]
    pub sessions_per_variant: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Fixed pause between batches, in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_max_session_duration_secs")]
    pub max_session_duration_secs: u64,
    /// Seed for the queue shuffle; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

const fn default_sessions_per_variant() -> usize {
    10
}

pub(crate) const fn default_max_concurrent() -> usize {
    3
}

pub(crate) const fn default_batch_delay_ms() -> u64 {
    1_000
}

pub(crate) const fn default_max_session_duration_secs() -> u64 {
    60
}

impl ExperimentConfig {
    /// Number of sessions the scheduler will run.
    ///
    /// Saturates; `validate` rejects configurations where this would overflow.
    pub fn total_sessions(&self) -> usize {
        self.variants.len().saturating_mul(self.sessions_per_variant)
    }

    /// The variant flagged as control, if any.
    pub fn control(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_control)
    }

    /// Reject configurations that cannot be scheduled.
    pub fn validate(&self) -> DomainResult<()> {
        if self.url.trim().is_empty() {
            return Err(DomainError::InvalidExperiment(
                "target url cannot be empty".to_string(),
            ));
        }
        if self.variants.is_empty() {
            return Err(DomainError::InvalidExperiment(
                "at least one variant is required".to_string(),
            ));
        }
        if self.personas.is_empty() {
            return Err(DomainError::InvalidExperiment(
                "at least one persona is required".to_string(),
            ));
        }
        if self.sessions_per_variant == 0 {
            return Err(DomainError::InvalidExperiment(
                "sessions_per_variant must be at least 1".to_string(),
            ));
        }
        if self.variants.len().checked_mul(self.sessions_per_variant).is_none() {
            return Err(DomainError::InvalidExperiment(format!(
                "too many sessions: {} variants x {} sessions per variant",
                self.variants.len(),
                self.sessions_per_variant
            )));
        }
        if self.max_concurrent == 0 {
            return Err(DomainError::InvalidExperiment(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for variant in &self.variants {
            if variant.id.trim().is_empty() {
                return Err(DomainError::InvalidExperiment(
                    "variant id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(variant.id.as_str()) {
                return Err(DomainError::InvalidExperiment(format!(
                    "duplicate variant id '{}'",
                    variant.id
                )));
            }
        }

        for persona in &self.personas {
            persona
                .validate()
                .map_err(|e| DomainError::InvalidExperiment(e.to_string()))?;
        }

        let controls = self.variants.iter().filter(|v| v.is_control).count();
        if controls != 1 {
            warn!(
                experiment_id = %self.id,
                controls,
                "experiment should mark exactly one control variant"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_experiment(variants: Vec<Variant>, personas: Vec<Persona>) -> ExperimentConfig {
    ExperimentConfig {
        id: "exp-test".to_string(),
        url: "https://example.com/landing".to_string(),
        variants,
        goal: ConversionGoal {
            kind: GoalKind::Click,
            target: "#signup".to_string(),
            description: "Click the signup button".to_string(),
        },
        personas,
        sessions_per_variant: 4,
        max_concurrent: 2,
        batch_delay_ms: 0,
        max_session_duration_secs: 30,
        seed: Some(7),
    }
}
