//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - SessionExecutor: runs one browsing session to completion
//! - DecisionOracle: chooses the next action for a persona
//! - PageDriver: loads the page and applies actions to it
//! - SnapshotStore: request-scoped key/value storage for page snapshots
//!
//! These traits keep the scheduling and analysis core independent of any
//! specific browser or model backend.

pub mod decision_oracle;
pub mod page_driver;
pub mod session_executor;
pub mod snapshot_store;

pub use decision_oracle::DecisionOracle;
pub use page_driver::{PageDriver, PageDriverFactory};
pub use session_executor::{SessionExecutor, SessionRequest};
pub use snapshot_store::SnapshotStore;
