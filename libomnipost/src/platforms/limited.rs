//! Rate limit wrapper for adapters

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{ErrorDisposition, PlatformAdapter, PublishReceipt, ValidationResult};
use crate::error::PlatformError;
use crate::rate_limiter::RateLimiter;
use crate::types::Post;

/// Adapter that consults a [`RateLimiter`] before every publish
///
/// A denied publish fails with code 368 (`rate_limited`) without reaching the
/// platform. Only successful publishes count against the budget, but every
/// request in flight holds a slot until it finishes.
pub struct RateLimitedAdapter {
    inner: Arc<dyn PlatformAdapter>,
    limiter: Arc<RateLimiter>,
    platform: String,
}

impl RateLimitedAdapter {
    pub fn new(platform: &str, inner: Arc<dyn PlatformAdapter>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner,
            limiter,
            platform: platform.to_lowercase(),
        }
    }
}

/// Open limiter slot, released on drop unless committed
///
/// A publish cancelled by the worker timeout drops this guard mid-flight.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    platform: &'a str,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self) {
        self.limiter
            .commit(self.platform, chrono::Utc::now().timestamp_millis());
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release(self.platform);
        }
    }
}

#[async_trait]
impl PlatformAdapter for RateLimitedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn validate_content(&self, post: &Post) -> ValidationResult {
        self.inner.validate_content(post)
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PlatformError> {
        let now = chrono::Utc::now().timestamp_millis();
        if !self.limiter.reserve(&self.platform, now) {
            warn!(platform = %self.platform, post_id = %post.id, "platform at request budget");
            return Err(PlatformError::rate_limited());
        }
        let reservation = Reservation {
            limiter: &self.limiter,
            platform: &self.platform,
            committed: false,
        };

        let receipt = self.inner.publish(post).await?;
        reservation.commit();
        Ok(receipt)
    }

    fn handle_error(&self, error: &PlatformError, post: &Post) -> ErrorDisposition {
        self.inner.handle_error(error, post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;
    use crate::rate_limiter::RateLimit;
    use std::collections::HashMap;
    use std::time::Duration;

    fn limiter(limit: u32) -> Arc<RateLimiter> {
        let mut limits = HashMap::new();
        limits.insert("mock".to_string(), RateLimit::new(limit, Duration::from_secs(3600)));
        Arc::new(RateLimiter::new(limits))
    }

    #[tokio::test]
    async fn test_denied_publish_skips_outbound_call() {
        let mock = Arc::new(MockAdapter::success("mock"));
        let wrapped = RateLimitedAdapter::new("mock", mock.clone(), limiter(1));
        let post = Post::new("hello".to_string());

        wrapped.publish(&post).await.unwrap();
        let err = wrapped.publish(&post).await.unwrap_err();

        assert_eq!(err.code(), Some(368));
        assert_eq!(mock.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_publish_not_recorded() {
        let mock = Arc::new(MockAdapter::failing("mock", 100));
        let limiter = limiter(1);
        let wrapped = RateLimitedAdapter::new("mock", mock.clone(), limiter.clone());
        let post = Post::new("hello".to_string());

        assert!(wrapped.publish(&post).await.is_err());
        assert!(wrapped.publish(&post).await.is_err());

        assert_eq!(mock.publish_call_count(), 2);
        assert!(limiter.can_proceed("mock", chrono::Utc::now().timestamp_millis()));
    }

    #[tokio::test]
    async fn test_parallel_publishes_share_budget() {
        let mock = Arc::new(MockAdapter::with_delay("mock", Duration::from_millis(100)));
        let wrapped = Arc::new(RateLimitedAdapter::new("mock", mock.clone(), limiter(1)));

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let wrapped = wrapped.clone();
                tokio::spawn(async move { wrapped.publish(&Post::new(format!("post {}", i))).await })
            })
            .collect();

        let mut published = 0;
        let mut denied = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => published += 1,
                Err(e) => {
                    assert_eq!(e.code(), Some(368));
                    denied += 1;
                }
            }
        }

        assert_eq!((published, denied), (1, 4));
        assert_eq!(mock.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_publish_frees_slot() {
        let mock = Arc::new(MockAdapter::with_delay("mock", Duration::from_secs(5)));
        let limiter = limiter(1);
        let wrapped = RateLimitedAdapter::new("mock", mock, limiter.clone());
        let post = Post::new("slow".to_string());

        let outcome = tokio::time::timeout(Duration::from_millis(50), wrapped.publish(&post)).await;
        assert!(outcome.is_err());

        let now = chrono::Utc::now().timestamp_millis();
        assert!(limiter.reserve("mock", now), "timed out request still holds its slot");
    }

    #[test]
    fn test_delegates_validation_and_classification() {
        let mock = Arc::new(MockAdapter::with_limit("mock", 5));
        let wrapped = RateLimitedAdapter::new("mock", mock, limiter(10));
        let post = Post::new("too long for five".to_string());

        assert_eq!(wrapped.name(), "mock");
        assert!(!wrapped.validate_content(&post).valid);
        assert_eq!(
            wrapped
                .handle_error(&PlatformError::rate_limited(), &post)
                .reason,
            "rate_limited"
        );
    }
}
