//! `swarmlab validate` - check an experiment definition without running it.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ValidateArgs;
use crate::domain::models::{Config, ExperimentConfig};
use crate::infrastructure::config::ConfigLoader;

/// Planned shape of a run.
#[derive(Debug, Serialize)]
pub struct ValidationOutput {
    pub experiment_id: String,
    pub url: String,
    pub variants: Vec<String>,
    pub control: Option<String>,
    pub personas: Vec<String>,
    pub sessions_per_variant: usize,
    pub total_sessions: usize,
    pub batches: usize,
    pub max_concurrent: usize,
}

impl ValidationOutput {
    pub fn from_experiment(experiment: &ExperimentConfig) -> Self {
        let total_sessions = experiment.total_sessions();
        Self {
            experiment_id: experiment.id.clone(),
            url: experiment.url.clone(),
            variants: experiment.variants.iter().map(|v| v.id.clone()).collect(),
            control: experiment.control().map(|v| v.id.clone()),
            personas: experiment.personas.iter().map(|p| p.id.clone()).collect(),
            sessions_per_variant: experiment.sessions_per_variant,
            total_sessions,
            batches: total_sessions.div_ceil(experiment.max_concurrent.max(1)),
            max_concurrent: experiment.max_concurrent,
        }
    }
}

impl CommandOutput for ValidationOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Experiment '{}' is valid\n", self.experiment_id);
        let _ = writeln!(out, "   URL: {}", self.url);
        let _ = writeln!(
            out,
            "   Variants: {} (control: {})",
            self.variants.join(", "),
            self.control.as_deref().unwrap_or("none")
        );
        let _ = writeln!(out, "   Personas: {}", self.personas.join(", "));
        let _ = write!(
            out,
            "   Sessions: {} ({} per variant) in {} batches of up to {}",
            self.total_sessions, self.sessions_per_variant, self.batches, self.max_concurrent
        );
        out
    }
}

pub fn execute(args: &ValidateArgs, settings: &Config, json_mode: bool) -> Result<()> {
    let experiment = ConfigLoader::load_experiment(&args.experiment, &settings.scheduler)?;
    experiment
        .validate()
        .with_context(|| format!("{} is not a valid experiment", args.experiment.display()))?;

    output(&ValidationOutput::from_experiment(&experiment), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::experiment::test_experiment;
    use crate::domain::models::persona::test_persona;
    use crate::domain::models::Variant;

    #[test]
    fn test_plan_summary() {
        let experiment = test_experiment(
            vec![
                Variant::control("control", "Original"),
                Variant::new("variant_a", "A"),
                Variant::new("variant_b", "B"),
            ],
            vec![test_persona("p1"), test_persona("p2")],
        );

        let plan = ValidationOutput::from_experiment(&experiment);
        assert_eq!(plan.total_sessions, 12);
        assert_eq!(plan.batches, 6);
        assert_eq!(plan.control.as_deref(), Some("control"));

        let human = plan.to_human();
        assert!(human.contains("variant_a"));
        assert!(human.contains("12 (4 per variant) in 6 batches of up to 2"));
        assert_eq!(plan.to_json()["total_sessions"], 12);
    }
}
