//! Domain layer for swarmlab
//!
//! This module contains the experiment data model, the ports the core
//! depends on, and the domain error types.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, SessionError};
