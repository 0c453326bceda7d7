//! Retry decorator for session executors.
//!
//! Only rate-limit errors are retried; every other failure is returned on the
//! first attempt so broken sessions surface quickly.

use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::domain::errors::SessionError;
use crate::domain::models::{RetryConfig, SessionRecord};
use crate::domain::ports::{SessionExecutor, SessionRequest};

/// Retries the wrapped executor with exponential backoff on rate limiting.
pub struct RetryingExecutor<E: SessionExecutor + ?Sized> {
    inner: Arc<E>,
    config: RetryConfig,
}

impl<E: SessionExecutor + ?Sized> RetryingExecutor<E> {
    pub fn new(inner: Arc<E>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn policy(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.config.initial_backoff_ms.max(1));
        ExponentialBackoffBuilder::new()
            .with_initial_interval(initial)
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms).max(initial))
            .with_max_elapsed_time(None)
            .build()
    }
}

#[async_trait]
impl<E: SessionExecutor + ?Sized + 'static> SessionExecutor for RetryingExecutor<E> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError> {
        let attempts = AtomicU32::new(0);
        let max_retries = self.config.max_retries;
        let request = &request;
        let attempts_ref = &attempts;

        retry_notify(
            self.policy(),
            || async move {
                let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst);
                match self.inner.execute(request.clone()).await {
                    Ok(record) => Ok(record),
                    Err(err) if err.is_rate_limited() && attempt < max_retries => {
                        Err(backoff::Error::transient(err))
                    }
                    Err(err) => Err(backoff::Error::permanent(err)),
                }
            },
            |err: SessionError, wait: Duration| {
                warn!(
                    variant_id = %request.variant_id,
                    persona_id = %request.persona.id,
                    attempt = attempts_ref.load(Ordering::SeqCst),
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "rate limited, backing off"
                );
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executors::MockSessionExecutor;
    use crate::domain::models::persona::test_persona;
    use crate::domain::models::{ConversionGoal, GoalKind};

    fn request() -> SessionRequest {
        SessionRequest {
            experiment_id: "exp-1".to_string(),
            url: "https://example.com".to_string(),
            persona: test_persona("p1"),
            variant_id: "control".to_string(),
            changes: None,
            goal: ConversionGoal {
                kind: GoalKind::Click,
                target: "#signup".to_string(),
                description: "Sign up".to_string(),
            },
            max_duration_secs: 60,
        }
    }

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let inner = Arc::new(
            MockSessionExecutor::new().failing_first(2, SessionError::RateLimited("429".to_string())),
        );
        let executor = RetryingExecutor::new(inner.clone(), fast_retries(3));

        let record = executor.execute(request()).await.unwrap();
        assert_eq!(record.variant_id, "control");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(
            MockSessionExecutor::new().failing_first(10, SessionError::RateLimited("429".to_string())),
        );
        let executor = RetryingExecutor::new(inner.clone(), fast_retries(2));

        let err = executor.execute(request()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let inner = Arc::new(
            MockSessionExecutor::new().failing_first(1, SessionError::Upstream("500".to_string())),
        );
        let executor = RetryingExecutor::new(inner.clone(), fast_retries(3));

        assert!(executor.execute(request()).await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_works_behind_trait_object() {
        let inner: Arc<dyn SessionExecutor> = Arc::new(MockSessionExecutor::new());
        let executor = RetryingExecutor::new(inner, fast_retries(1));
        assert_eq!(executor.name(), "mock");
        assert!(executor.execute(request()).await.is_ok());
    }
}
