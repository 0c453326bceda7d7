//! Common test utilities for integration tests
//!
//! Shared fixtures for experiments, personas and hand-built session records.

#![allow(dead_code)]

use swarmlab::domain::models::{
    Behavior, ConversionGoal, Demographics, Device, ExperimentConfig, GoalKind, Intent, Persona,
    SessionRecord, Variant,
};

pub const TEST_URL: &str = "https://example.com/landing";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn persona(id: &str) -> Persona {
    Persona {
        id: id.to_string(),
        name: format!("Persona {id}"),
        demographics: Demographics {
            age_bracket: "35-44".to_string(),
            device: Device::Mobile,
            tech_comfort: 7,
        },
        behavior: Behavior::default(),
        intent: Intent {
            goal: "Find out what it costs".to_string(),
            urgency: 6,
            conversion_triggers: vec!["clear pricing".to_string()],
            dealbreakers: vec!["forced signup".to_string()],
        },
    }
}

pub fn personas(count: usize) -> Vec<Persona> {
    (0..count).map(|i| persona(&format!("p{i}"))).collect()
}

/// `control` plus `variant_a`, `variant_b`, ... up to `count` variants in total.
pub fn variants(count: usize) -> Vec<Variant> {
    (0..count)
        .map(|i| {
            if i == 0 {
                Variant::control("control", "Original")
            } else {
                let letter = char::from(b'a' + (i - 1) as u8);
                Variant::new(format!("variant_{letter}"), format!("Variant {letter}"))
            }
        })
        .collect()
}

/// Experiment with no batch delay and a fixed seed.
pub fn experiment(
    variants: Vec<Variant>,
    personas: Vec<Persona>,
    sessions_per_variant: usize,
) -> ExperimentConfig {
    ExperimentConfig {
        id: "exp-integration".to_string(),
        url: TEST_URL.to_string(),
        variants,
        goal: ConversionGoal {
            kind: GoalKind::Click,
            target: "#signup".to_string(),
            description: "Click the signup button".to_string(),
        },
        personas,
        sessions_per_variant,
        max_concurrent: 3,
        batch_delay_ms: 0,
        max_session_duration_secs: 30,
        seed: Some(7),
    }
}

/// A completed session with the given outcome and dwell time.
pub fn record(variant_id: &str, converted: bool, time_on_page_ms: u64) -> SessionRecord {
    let mut record = SessionRecord::new(&persona("p0"), variant_id, TEST_URL);
    record.metrics.time_on_page_ms = time_on_page_ms;
    record.metrics.scroll_depth_percent = 50.0;
    record.metrics.clicks = u32::from(converted);
    if converted {
        record.mark_converted(Some("clear pricing".to_string()));
        record.exit_reason = Some("Converted".to_string());
    } else {
        record.exit_reason = Some("forced signup".to_string());
    }
    record
}

/// `sessions` records for one variant, the first `conversions` of them converted.
pub fn records(variant_id: &str, sessions: usize, conversions: usize) -> Vec<SessionRecord> {
    (0..sessions)
        .map(|i| record(variant_id, i < conversions, 12_000))
        .collect()
}
