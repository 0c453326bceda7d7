//! swarmlab - simulated-visitor A/B testing for web pages
//!
//! An experiment defines a page URL, a set of variants and a set of personas.
//! The swarm scheduler runs `sessions_per_variant` simulated visits per
//! variant in bounded-concurrency batches, aggregates the session records
//! into per-variant statistics, picks a winner and derives insights.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): scheduler, session runner, aggregation, insights
//! - **Adapters** (`adapters`): executors, decision oracles, page drivers, stores
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swarmlab::adapters::executors::MockSessionExecutor;
//! use swarmlab::services::SwarmScheduler;
//!
//! let scheduler = SwarmScheduler::new(Arc::new(MockSessionExecutor::new()));
//! let result = scheduler.run_experiment(&experiment).await?;
//! println!("winner: {:?}", result.winner);
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, SessionError};
pub use domain::models::{
    Config, ConversionGoal, ExperimentConfig, ExperimentEvent, ExperimentResult,
    ExperimentStatus, GoalKind, Persona, SessionRecord, Variant, VariantResult,
};
pub use domain::ports::{DecisionOracle, PageDriver, SessionExecutor, SessionRequest, SnapshotStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{InsightGenerator, OracleSessionRunner, ResultAggregator, SwarmScheduler};
