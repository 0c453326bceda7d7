use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, SchedulerConfig};
use crate::domain::models::ExperimentConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent: {0}. Must be between 1 and 100")]
    InvalidMaxConcurrent(usize),

    #[error("Invalid max_session_duration_secs: {0}. Must be at least 1")]
    InvalidSessionDuration(u64),

    #[error("Invalid max_steps: {0}. Must be at least 1")]
    InvalidMaxSteps(usize),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

const PROJECT_CONFIG: &str = ".swarmlab/config.yaml";
const LOCAL_CONFIG: &str = ".swarmlab/local.yaml";
const ENV_PREFIX: &str = "SWARMLAB_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the working directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .swarmlab/config.yaml
    /// 3. .swarmlab/local.yaml (optional overrides)
    /// 4. Environment variables (SWARMLAB_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`] with the project directory at `root`.
    pub fn load_from(root: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(root.join(PROJECT_CONFIG)))
            .merge(Yaml::file(root.join(LOCAL_CONFIG)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load an experiment definition.
    ///
    /// Scheduler fields missing from the file fall back to `defaults`. JSON
    /// files are accepted too.
    pub fn load_experiment(
        path: impl AsRef<Path>,
        defaults: &SchedulerConfig,
    ) -> Result<ExperimentConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Experiment file not found: {}", path.display());
        }

        Figment::new()
            .merge(Serialized::defaults(defaults))
            .merge(Yaml::file(path))
            .extract()
            .with_context(|| format!("Failed to load experiment from {}", path.display()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let scheduler = &config.scheduler;
        if scheduler.max_concurrent == 0 || scheduler.max_concurrent > 100 {
            return Err(ConfigError::InvalidMaxConcurrent(scheduler.max_concurrent));
        }
        if scheduler.max_session_duration_secs == 0 {
            return Err(ConfigError::InvalidSessionDuration(
                scheduler.max_session_duration_secs,
            ));
        }
        if scheduler.max_steps == 0 {
            return Err(ConfigError::InvalidMaxSteps(scheduler.max_steps));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if !config.rate_limit.requests_per_second.is_finite()
            || config.rate_limit.requests_per_second <= 0.0
        {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.oracle.base_url.trim().is_empty() || config.oracle.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "oracle base_url and model cannot be empty".to_string(),
            ));
        }
        if config.oracle.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "oracle max_tokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.max_concurrent, 3);
        assert_eq!(config.scheduler.batch_delay_ms, 1_000);
        assert_eq!(config.scheduler.max_session_duration_secs, 60);
        assert!((config.rate_limit.requests_per_second - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
scheduler:
  max_concurrent: 8
  batch_delay_ms: 250
rate_limit:
  requests_per_second: 5.0
  burst_size: 10
logging:
  level: debug
  format: json
oracle:
  model: claude-haiku-4-5
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.scheduler.max_concurrent, 8);
        assert_eq!(config.scheduler.batch_delay_ms, 250);
        assert_eq!(config.scheduler.max_steps, 25);
        assert_eq!(config.rate_limit.burst_size, 10);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.oracle.model, "claude-haiku-4-5");
        assert_eq!(config.oracle.api_version, "2023-06-01");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_rejections() {
        let mut config = Config::default();
        config.scheduler.max_concurrent = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrent(0))
        ));

        let mut config = Config::default();
        config.scheduler.max_steps = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxSteps(0))
        ));

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));

        let mut config = Config::default();
        config.rate_limit.requests_per_second = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));

        let mut config = Config::default();
        config.rate_limit.burst_size = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBurstSize(0))
        ));

        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30_000;
        config.retry.max_backoff_ms = 10_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30_000, 10_000))
        ));
    }

    #[test]
    fn test_hierarchical_merging_and_env() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join(".swarmlab")).unwrap();
        fs::write(
            root.path().join(PROJECT_CONFIG),
            "scheduler:\n  max_concurrent: 5\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        fs::write(
            root.path().join(LOCAL_CONFIG),
            "scheduler:\n  max_concurrent: 7\nlogging:\n  level: debug\n",
        )
        .unwrap();

        let config = temp_env::with_vars(
            [
                ("SWARMLAB_RATE_LIMIT__REQUESTS_PER_SECOND", Some("4.5")),
                ("SWARMLAB_LOGGING__LEVEL", Some("warn")),
            ],
            || ConfigLoader::load_from(root.path()),
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent, 7, "local overrides project");
        assert_eq!(config.logging.format, "json", "project value persists");
        assert_eq!(config.logging.level, "warn", "env overrides files");
        assert!((config.rate_limit.requests_per_second - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  max_concurrent: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_experiment_falls_back_to_scheduler_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"
id: homepage-cta
url: https://example.com
variants:
  - id: control
    name: Original
    is_control: true
  - id: green
    name: Green button
    changes:
      add_targets: ["#cta-green"]
goal:
  kind: click
  target: "#signup"
  description: Start trial
personas:
  - id: skeptic
    name: Skeptical buyer
    demographics:
      age_bracket: 35-44
    intent:
      goal: Compare prices
max_concurrent: 2
"##
        )
        .unwrap();
        file.flush().unwrap();

        let defaults = SchedulerConfig {
            batch_delay_ms: 50,
            ..SchedulerConfig::default()
        };
        let experiment = ConfigLoader::load_experiment(file.path(), &defaults).unwrap();

        assert_eq!(experiment.variants.len(), 2);
        assert_eq!(experiment.max_concurrent, 2, "file value wins");
        assert_eq!(experiment.batch_delay_ms, 50, "falls back to settings");
        assert_eq!(experiment.sessions_per_variant, 10);
        experiment.validate().unwrap();
    }

    #[test]
    fn test_missing_experiment_file() {
        let err = ConfigLoader::load_experiment("/nonexistent/exp.yaml", &SchedulerConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
