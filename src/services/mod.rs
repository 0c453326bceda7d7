//! Domain services: scheduling, session execution, aggregation and insights.

pub mod insight_generator;
pub mod result_aggregator;
pub mod session_runner;
pub mod swarm_scheduler;

pub use insight_generator::{InsightGenerator, Insights};
pub use result_aggregator::{Aggregation, ResultAggregator};
pub use session_runner::OracleSessionRunner;
pub use swarm_scheduler::{build_session_queue, SessionSlot, SwarmScheduler};
