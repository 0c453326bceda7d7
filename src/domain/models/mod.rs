pub mod config;
pub mod experiment;
pub mod page;
pub mod persona;
pub mod results;
pub mod session;
pub mod status;

pub use config::{
    Config, LoggingConfig, OracleConfig, RateLimitConfig, RetryConfig, SchedulerConfig,
};
pub use experiment::{ConversionGoal, ExperimentConfig, GoalKind, Variant};
pub use page::{Decision, DecisionParse, PageSnapshot};
pub use persona::{Behavior, Demographics, Device, Intent, Persona};
pub use results::{ExperimentResult, ReasonCount, VariantResult};
pub use session::{
    ActionType, AgentAction, Impression, PageSamples, SessionMetrics, SessionRecord,
    BOUNCE_THRESHOLD_MS,
};
pub use status::{ExperimentEvent, ExperimentState, ExperimentStatus};
