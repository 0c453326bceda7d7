//! Domain errors for the swarmlab experiment system.

use thiserror::Error;

/// Domain-level errors that can occur while planning or running an experiment.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid experiment: {0}")]
    InvalidExperiment(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by a single browsing session.
///
/// These never escape an experiment run: the scheduler turns every one of them
/// into a failed session record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An upstream dependency (LLM API, hosted browser) refused the request
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The session ran past its duration budget
    #[error("Session exceeded its {0}s budget")]
    Timeout(u64),

    /// The decision oracle produced output that could not be parsed into an action
    #[error("Unparseable decision: {0}")]
    DecisionParse(String),

    /// The page driver failed to load or act on the page
    #[error("Page error: {0}")]
    Page(String),

    /// Any other upstream failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The session task ended without producing a record
    #[error("Session aborted: {0}")]
    Aborted(String),
}

impl SessionError {
    /// Returns true if the failure was caused by upstream rate limiting.
    ///
    /// Only these errors are retried by the retry decorator.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SessionError::RateLimited(_))
    }

    /// Returns true if the error may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::RateLimited(_) | SessionError::Timeout(_) | SessionError::Upstream(_)
        )
    }
}
