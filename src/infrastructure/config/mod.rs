//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Experiment definition loading

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
