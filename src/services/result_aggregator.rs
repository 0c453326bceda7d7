//! Result aggregation: session records in, per-variant statistics and a winner out.
//!
//! Aggregation is a pure function of its inputs. Sessions are put into a
//! canonical order (by session id) before anything is summed or counted, so
//! the output does not depend on the order records arrived in.
//!
//! The confidence figure is a heuristic, not a hypothesis test: it grows with
//! sample size and with the absolute rate difference, and has no variance term
//! and no correction for multiple comparisons.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::domain::models::{
    Impression, ReasonCount, SessionRecord, Variant, VariantResult,
};

/// How many exit reasons / conversion triggers to keep per variant.
pub const TOP_REASONS_LIMIT: usize = 5;

/// Confidence reported when no meaningful comparison could be made.
pub const BASELINE_CONFIDENCE: u32 = 50;

/// Confidence at or above which a winner is significant.
pub const SIGNIFICANCE_THRESHOLD: u32 = 95;

const MAX_CONFIDENCE: f64 = 99.0;
const RATE_EPSILON: f64 = 1e-9;

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub variant_results: BTreeMap<String, VariantResult>,
    pub winner: Option<String>,
    pub confidence: u32,
    pub is_significant: bool,
}

/// Outcome of the winner comparison.
#[derive(Debug, Clone, PartialEq)]
struct WinnerDecision {
    winner: Option<String>,
    confidence: u32,
}

impl WinnerDecision {
    fn baseline(winner: Option<String>) -> Self {
        Self {
            winner,
            confidence: BASELINE_CONFIDENCE,
        }
    }
}

/// Stateless aggregator over session records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `sessions` for every variant in `variants`.
    ///
    /// Variants without sessions are still present, with all-zero fields.
    /// Sessions for unknown variant ids are ignored.
    pub fn aggregate(&self, sessions: &[SessionRecord], variants: &[Variant]) -> Aggregation {
        let mut ordered: Vec<&SessionRecord> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.id);

        let mut grouped: HashMap<&str, Vec<&SessionRecord>> = HashMap::new();
        for session in ordered {
            grouped.entry(session.variant_id.as_str()).or_default().push(session);
        }

        let variant_results: BTreeMap<String, VariantResult> = variants
            .iter()
            .map(|variant| {
                let result = grouped
                    .get(variant.id.as_str())
                    .map_or_else(|| VariantResult::empty(variant), |group| summarize(variant, group));
                (variant.id.clone(), result)
            })
            .collect();

        let decision = determine_winner(&variant_results, variants);
        let is_significant = decision.winner.is_some() && decision.confidence >= SIGNIFICANCE_THRESHOLD;

        Aggregation {
            variant_results,
            winner: decision.winner,
            confidence: decision.confidence,
            is_significant,
        }
    }
}

/// Build the statistics for one variant from its (canonically ordered) sessions.
fn summarize(variant: &Variant, sessions: &[&SessionRecord]) -> VariantResult {
    if sessions.is_empty() {
        return VariantResult::empty(variant);
    }

    let count = sessions.len() as f64;
    let conversions = sessions.iter().filter(|s| s.converted).count();
    let bounces = sessions.iter().filter(|s| s.metrics.is_bounce()).count();
    let positives = sessions
        .iter()
        .filter(|s| s.impression == Some(Impression::Positive))
        .count();

    let avg_time_on_page_ms =
        sessions.iter().map(|s| s.metrics.time_on_page_ms as f64).sum::<f64>() / count;
    let avg_scroll_depth_percent =
        sessions.iter().map(|s| s.metrics.scroll_depth_percent).sum::<f64>() / count;
    let avg_clicks = sessions.iter().map(|s| f64::from(s.metrics.clicks)).sum::<f64>() / count;

    let engagement_score = engagement_score(
        avg_time_on_page_ms,
        avg_scroll_depth_percent,
        avg_clicks,
        percentage(positives, sessions.len()),
    );

    VariantResult {
        variant_id: variant.id.clone(),
        variant_name: variant.name.clone(),
        is_control: variant.is_control,
        sessions: sessions.len(),
        conversions,
        conversion_rate: percentage(conversions, sessions.len()),
        avg_time_on_page_ms,
        avg_scroll_depth_percent,
        avg_clicks,
        bounce_rate: percentage(bounces, sessions.len()),
        top_exit_reasons: top_reasons(sessions.iter().filter_map(|s| s.exit_reason.as_deref())),
        top_conversion_triggers: top_reasons(
            sessions.iter().filter_map(|s| s.conversion_trigger.as_deref()),
        ),
        engagement_score,
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 * 100.0) / whole as f64
    }
}

/// Composite 0-100 score; the four sub-scores are weighted equally.
///
/// Time saturates at 30s of dwell, clicks at 5 per session.
pub fn engagement_score(
    avg_time_on_page_ms: f64,
    avg_scroll_depth_percent: f64,
    avg_clicks: f64,
    positive_rate: f64,
) -> u32 {
    let time_score = (avg_time_on_page_ms / 300.0).min(100.0);
    let scroll_score = avg_scroll_depth_percent.clamp(0.0, 100.0);
    let click_score = (avg_clicks * 20.0).min(100.0);
    let mean = (time_score + scroll_score + click_score + positive_rate) / 4.0;
    mean.round().clamp(0.0, 100.0) as u32
}

/// Count non-empty values, most frequent first; equal counts sort by reason text.
fn top_reasons<'a>(values: impl Iterator<Item = &'a str>) -> Vec<ReasonCount> {
    let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.map(str::trim).filter(|v| !v.is_empty()) {
        *tally.entry(value).or_default() += 1;
    }

    let mut counts: Vec<ReasonCount> = tally
        .into_iter()
        .map(|(reason, count)| ReasonCount {
            reason: reason.to_string(),
            count,
        })
        .collect();
    counts.sort_by_key(|c| Reverse(c.count));
    counts.truncate(TOP_REASONS_LIMIT);
    counts
}

/// `50 + min(25, 25·n/100) + min(25, 25·|Δ|/20)`, clamped to `[50, 99]`.
pub fn heuristic_confidence(total_samples: usize, rate_difference: f64) -> u32 {
    let sample_term = (25.0 * total_samples as f64 / 100.0).min(25.0);
    let difference_term = (25.0 * rate_difference.abs() / 20.0).min(25.0);
    (50.0 + sample_term + difference_term)
        .clamp(f64::from(BASELINE_CONFIDENCE), MAX_CONFIDENCE)
        .round() as u32
}

fn determine_winner(
    results: &BTreeMap<String, VariantResult>,
    variants: &[Variant],
) -> WinnerDecision {
    let ordered: Vec<&VariantResult> = variants
        .iter()
        .filter_map(|v| results.get(&v.id))
        .collect();

    match ordered.iter().find(|r| r.is_control) {
        Some(control) => winner_against_control(control, &ordered),
        None => winner_by_rank(&ordered),
    }
}

fn winner_against_control(control: &VariantResult, ordered: &[&VariantResult]) -> WinnerDecision {
    let mut best: Option<(&VariantResult, f64)> = None;

    for candidate in ordered.iter().filter(|r| r.variant_id != control.variant_id) {
        let lift = candidate.conversion_rate - control.conversion_rate;
        if lift <= RATE_EPSILON {
            continue;
        }
        if best.is_none_or(|(_, best_lift)| lift > best_lift + RATE_EPSILON) {
            best = Some((candidate, lift));
        }
    }

    match best {
        Some((winner, lift)) => WinnerDecision {
            winner: Some(winner.variant_id.clone()),
            confidence: heuristic_confidence(winner.sessions + control.sessions, lift),
        },
        None => WinnerDecision::baseline(Some(control.variant_id.clone())),
    }
}

fn winner_by_rank(ordered: &[&VariantResult]) -> WinnerDecision {
    let mut ranked = ordered.to_vec();
    ranked.sort_by(|a, b| b.conversion_rate.total_cmp(&a.conversion_rate));

    let (Some(top), Some(runner_up)) = (ranked.first(), ranked.get(1)) else {
        return WinnerDecision::baseline(None);
    };

    let difference = top.conversion_rate - runner_up.conversion_rate;
    if difference <= RATE_EPSILON {
        return WinnerDecision::baseline(None);
    }

    WinnerDecision {
        winner: Some(top.variant_id.clone()),
        confidence: heuristic_confidence(top.sessions + runner_up.sessions, difference),
    }
}
