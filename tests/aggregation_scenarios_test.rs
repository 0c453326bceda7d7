//! Worked aggregation scenarios through the public service API.

mod common;

use swarmlab::services::{InsightGenerator, Insights, ResultAggregator};
use swarmlab::{SessionRecord, Variant};

use common::{record, records, variants};

fn analyze(sessions: &[SessionRecord], variants: &[Variant]) -> (swarmlab::services::Aggregation, Insights) {
    let aggregation = ResultAggregator::new().aggregate(sessions, variants);
    let insights = InsightGenerator::new().generate(&aggregation, sessions);
    (aggregation, insights)
}

#[test]
fn test_clear_winner() {
    let mut sessions = records("control", 10, 1);
    sessions.extend(records("variant_a", 10, 5));

    let (aggregation, insights) = analyze(&sessions, &variants(2));

    assert_eq!(aggregation.winner.as_deref(), Some("variant_a"));
    assert_eq!(aggregation.confidence, 80);
    assert!(!aggregation.is_significant);
    assert!((aggregation.variant_results["variant_a"].conversion_rate - 50.0).abs() < 1e-9);
    assert!(insights
        .recommendations
        .iter()
        .any(|r| r.contains("variant_a") && r.contains("80%")));
}

#[test]
fn test_no_lift_keeps_control() {
    let mut sessions = records("control", 10, 2);
    sessions.extend(records("variant_a", 10, 2));

    let (aggregation, _) = analyze(&sessions, &variants(2));

    assert_eq!(aggregation.winner.as_deref(), Some("control"));
    assert_eq!(aggregation.confidence, 50);
    assert!(!aggregation.is_significant);
}

#[test]
fn test_lift_insight_names_both_variants() {
    let mut sessions = records("control", 20, 1);
    sessions.extend(records("variant_a", 20, 4));

    let (_, insights) = analyze(&sessions, &variants(2));

    let lift = insights
        .insights
        .iter()
        .find(|i| i.contains("relative lift"))
        .expect("lift insight");
    assert!(lift.contains("control"));
    assert!(lift.contains("variant_a"));
    assert!(lift.contains("300.0%"));
}

#[test]
fn test_high_bounce_variant_is_flagged() {
    let mut sessions: Vec<SessionRecord> = (0..10)
        .map(|i| record("variant_a", false, if i < 6 { 2_000 } else { 15_000 }))
        .collect();
    sessions.extend(records("control", 10, 3));

    let (aggregation, insights) = analyze(&sessions, &variants(2));

    assert!((aggregation.variant_results["variant_a"].bounce_rate - 60.0).abs() < 1e-9);
    assert!(insights
        .insights
        .iter()
        .any(|i| i.contains("variant_a") && i.contains("bounce")));
}

#[test]
fn test_variant_without_sessions_is_reported_empty() {
    let sessions = records("control", 5, 1);

    let (aggregation, _) = analyze(&sessions, &variants(3));

    let empty = &aggregation.variant_results["variant_b"];
    assert_eq!(empty.sessions, 0);
    assert!(empty.conversion_rate.abs() < f64::EPSILON);
    assert!(empty.bounce_rate.abs() < f64::EPSILON);
    assert_eq!(empty.engagement_score, 0);
}

#[test]
fn test_failed_sessions_count_as_non_conversions() {
    let persona = common::persona("p0");
    let mut sessions = records("control", 4, 2);
    sessions.extend((0..4).map(|_| {
        SessionRecord::failed(&persona, "variant_a", common::TEST_URL, chrono::Utc::now(), "timeout")
    }));

    let (aggregation, _) = analyze(&sessions, &variants(2));

    let failed = &aggregation.variant_results["variant_a"];
    assert_eq!(failed.sessions, 4);
    assert_eq!(failed.conversions, 0);
    assert_eq!(failed.top_exit_reasons[0].reason, "Error: timeout");
    assert_eq!(failed.top_exit_reasons[0].count, 4);
}
