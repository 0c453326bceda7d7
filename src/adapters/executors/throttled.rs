//! Launch throttle for session executors.
//!
//! A token bucket shared by every session that goes through the decorator,
//! so bursts of concurrent launches are spread out to `requests_per_second`
//! after the first `burst_size`.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::domain::errors::{DomainError, DomainResult, SessionError};
use crate::domain::models::{RateLimitConfig, SessionRecord};
use crate::domain::ports::{SessionExecutor, SessionRequest};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Waits for a launch token before delegating to the wrapped executor.
pub struct ThrottledExecutor<E: SessionExecutor + ?Sized> {
    inner: Arc<E>,
    limiter: DirectLimiter,
}

impl<E: SessionExecutor + ?Sized> ThrottledExecutor<E> {
    pub fn new(inner: Arc<E>, config: &RateLimitConfig) -> DomainResult<Self> {
        if !config.requests_per_second.is_finite() || config.requests_per_second <= 0.0 {
            return Err(DomainError::ValidationFailed(format!(
                "requests_per_second must be positive, got {}",
                config.requests_per_second
            )));
        }

        let period = Duration::from_secs_f64(1.0 / config.requests_per_second);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                DomainError::ValidationFailed("requests_per_second is too large".to_string())
            })?
            .allow_burst(burst);

        Ok(Self {
            inner,
            limiter: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl<E: SessionExecutor + ?Sized + 'static> SessionExecutor for ThrottledExecutor<E> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn execute(&self, request: SessionRequest) -> Result<SessionRecord, SessionError> {
        self.limiter.until_ready().await;
        trace!(variant_id = %request.variant_id, "launch token acquired");
        self.inner.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executors::MockSessionExecutor;
    use crate::domain::models::persona::test_persona;
    use crate::domain::models::{ConversionGoal, GoalKind};
    use std::time::Instant;

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

    #[tokio::test]
    async fn test_burst_then_throttle() {
        let config = RateLimitConfig {
            requests_per_second: 5.0,
            burst_size: 2,
        };
        let executor = ThrottledExecutor::new(Arc::new(MockSessionExecutor::new()), &config).unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            executor.execute(request()).await.unwrap();
        }
        // two immediate launches, then two more at 200ms intervals
        assert!(start.elapsed() >= Duration::from_millis(350), "got {:?}", start.elapsed());
    }

    #[test]
    fn test_rejects_bad_rates() {
        for rps in [0.0, -1.0, f64::NAN] {
            let config = RateLimitConfig {
                requests_per_second: rps,
                burst_size: 1,
            };
            assert!(ThrottledExecutor::new(Arc::new(MockSessionExecutor::new()), &config).is_err());
        }
    }
}
