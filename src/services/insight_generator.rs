//! Data-driven observations and recommendations derived from aggregated results.
//!
//! Rules are evaluated in a fixed order and only append when their trigger
//! holds, so the output is deterministic for a given aggregation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Impression, SessionRecord, VariantResult};
use crate::services::result_aggregator::Aggregation;

/// Relative lift (percent) above which a best-vs-worst insight is emitted.
pub const LIFT_INSIGHT_THRESHOLD: f64 = 10.0;
/// Mean engagement below this is flagged as low.
pub const LOW_ENGAGEMENT: f64 = 40.0;
/// Mean engagement above this is called out as high.
pub const HIGH_ENGAGEMENT: f64 = 70.0;
/// Bounce rate (percent) above which a variant is flagged.
pub const HIGH_BOUNCE: f64 = 50.0;
/// Share of negative sessions (percent) above which exit reasons are surfaced.
pub const NEGATIVE_SHARE: f64 = 30.0;
/// Mean conversion rate (percent) below which the value proposition is questioned.
pub const LOW_CONVERSION: f64 = 10.0;

const MAX_NEGATIVE_REASONS: usize = 3;

/// Insights and recommendations, most salient first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Insights {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Stateless rule engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsightGenerator;

impl InsightGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, aggregation: &Aggregation, sessions: &[SessionRecord]) -> Insights {
        let all: Vec<&VariantResult> = aggregation.variant_results.values().collect();
        let observed: Vec<&VariantResult> = all.iter().copied().filter(|r| r.sessions > 0).collect();

        let mut insights = Vec::new();
        if let Some(insight) = lift_insight(&observed) {
            insights.push(insight);
        }
        if let Some(insight) = engagement_insight(&all) {
            insights.push(insight);
        }
        insights.extend(bounce_insights(&observed));
        if let Some(insight) = negative_impression_insight(sessions) {
            insights.push(insight);
        }

        Insights {
            insights,
            recommendations: recommendations(aggregation, &all),
        }
    }
}

fn label(result: &VariantResult) -> String {
    if result.variant_name.is_empty() || result.variant_name == result.variant_id {
        format!("'{}'", result.variant_id)
    } else {
        format!("'{}' ({})", result.variant_id, result.variant_name)
    }
}

fn lift_insight(observed: &[&VariantResult]) -> Option<String> {
    if observed.len() < 2 {
        return None;
    }

    let best = observed
        .iter()
        .copied()
        .reduce(|best, r| if r.conversion_rate > best.conversion_rate { r } else { best })?;
    let worst = observed
        .iter()
        .copied()
        .reduce(|worst, r| if r.conversion_rate < worst.conversion_rate { r } else { worst })?;

    if best.variant_id == worst.variant_id || best.conversion_rate <= worst.conversion_rate {
        return None;
    }

    if worst.conversion_rate <= 0.0 {
        return Some(format!(
            "{} converted {:.1}% of sessions while {} recorded no conversions",
            label(best),
            best.conversion_rate,
            label(worst)
        ));
    }

    let relative_lift = (best.conversion_rate - worst.conversion_rate) / worst.conversion_rate * 100.0;
    (relative_lift > LIFT_INSIGHT_THRESHOLD).then(|| {
        format!(
            "{} outperforms {} by {:.1}% relative lift ({:.1}% vs {:.1}% conversion)",
            label(best),
            label(worst),
            relative_lift,
            best.conversion_rate,
            worst.conversion_rate
        )
    })
}

/// Means are taken over every configured variant, including ones that never ran.
fn engagement_insight(results: &[&VariantResult]) -> Option<String> {
    if results.is_empty() {
        return None;
    }

    let mean = results
        .iter()
        .map(|r| f64::from(r.engagement_score))
        .sum::<f64>()
        / results.len() as f64;

    if mean < LOW_ENGAGEMENT {
        Some(format!(
            "Low engagement across variants (mean score {mean:.0}/100): visitors are not exploring the page"
        ))
    } else if mean > HIGH_ENGAGEMENT {
        Some(format!(
            "High engagement across variants (mean score {mean:.0}/100): the content holds attention"
        ))
    } else {
        None
    }
}

fn bounce_insights(observed: &[&VariantResult]) -> Vec<String> {
    observed
        .iter()
        .filter(|r| r.bounce_rate > HIGH_BOUNCE)
        .map(|r| {
            format!(
                "{} has a high bounce rate of {:.0}%: most visitors left within 5 seconds",
                label(r),
                r.bounce_rate
            )
        })
        .collect()
}

fn negative_impression_insight(sessions: &[SessionRecord]) -> Option<String> {
    if sessions.is_empty() {
        return None;
    }

    let mut negative: Vec<&SessionRecord> = sessions
        .iter()
        .filter(|s| s.impression == Some(Impression::Negative))
        .collect();
    let share = negative.len() as f64 * 100.0 / sessions.len() as f64;
    if share <= NEGATIVE_SHARE {
        return None;
    }

    negative.sort_by_key(|s| s.id);
    let mut seen = HashSet::new();
    let reasons: Vec<&str> = negative
        .iter()
        .filter_map(|s| s.exit_reason.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty() && seen.insert(*r))
        .take(MAX_NEGATIVE_REASONS)
        .collect();

    let mut insight = format!("{share:.0}% of sessions ended with a negative impression");
    if !reasons.is_empty() {
        insight.push_str(&format!(". Common exit reasons: {}", reasons.join("; ")));
    }
    Some(insight)
}

fn recommendations(aggregation: &Aggregation, results: &[&VariantResult]) -> Vec<String> {
    let mut recommendations = Vec::new();
    let winner = aggregation
        .winner
        .as_ref()
        .and_then(|id| aggregation.variant_results.get(id));

    match winner {
        Some(winner) if aggregation.is_significant => recommendations.push(format!(
            "Ship {}: it is the favoured variant at {}% confidence",
            label(winner),
            aggregation.confidence
        )),
        Some(winner) => recommendations.push(format!(
            "{} leads at only {}% confidence; run more sessions before deciding",
            label(winner),
            aggregation.confidence
        )),
        None => recommendations.push(
            "No variant separated from the rest; test more divergent variants".to_string(),
        ),
    }

    let mean_conversion = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.conversion_rate).sum::<f64>() / results.len() as f64
    };
    if mean_conversion < LOW_CONVERSION {
        recommendations.push(format!(
            "Average conversion is {mean_conversion:.1}%; revisit the core value proposition"
        ));
    }

    recommendations
}
