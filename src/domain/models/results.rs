//! Aggregated experiment outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::experiment::Variant;
use super::session::SessionRecord;

/// A value with the number of sessions it was observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Per-variant statistics, recomputed from scratch on every aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VariantResult {
    pub variant_id: String,
    pub variant_name: String,
    pub is_control: bool,
    pub sessions: usize,
    pub conversions: usize,
    /// Percentage, 0-100
    pub conversion_rate: f64,
    pub avg_time_on_page_ms: f64,
    pub avg_scroll_depth_percent: f64,
    pub avg_clicks: f64,
    /// Percentage of sessions under the bounce threshold
    pub bounce_rate: f64,
    /// Most frequent first; equal counts in ascending text order
    pub top_exit_reasons: Vec<ReasonCount>,
    pub top_conversion_triggers: Vec<ReasonCount>,
    /// Composite 0-100
    pub engagement_score: u32,
}

impl VariantResult {
    /// Result for a variant that produced no sessions.
    pub fn empty(variant: &Variant) -> Self {
        Self {
            variant_id: variant.id.clone(),
            variant_name: variant.name.clone(),
            is_control: variant.is_control,
            sessions: 0,
            conversions: 0,
            conversion_rate: 0.0,
            avg_time_on_page_ms: 0.0,
            avg_scroll_depth_percent: 0.0,
            avg_clicks: 0.0,
            bounce_rate: 0.0,
            top_exit_reasons: Vec::new(),
            top_conversion_triggers: Vec::new(),
            engagement_score: 0,
        }
    }
}

/// Final output of an experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub sessions: Vec<SessionRecord>,
    pub variant_results: BTreeMap<String, VariantResult>,
    pub winner: Option<String>,
    /// Heuristic confidence, 50-99 when a comparison was made
    pub confidence: u32,
    pub is_significant: bool,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExperimentResult {
    pub fn failed_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_failed()).count()
    }

    pub fn total_conversions(&self) -> usize {
        self.sessions.iter().filter(|s| s.converted).count()
    }
}
