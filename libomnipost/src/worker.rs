//! Single-attempt publish state machine
//!
//! A worker takes one post that the scheduler has already moved to
//! `publishing` and drives it to `published`, back to `scheduled` with a
//! backoff delay, or to `failed`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::error::{PlatformError, Result};
use crate::platforms::registry::AdapterRegistry;
use crate::publish_log::{PublishEvent, PublishLog, PublishLogEntry};
use crate::retry::RetryPolicy;
use crate::store::PostStore;
use crate::types::Post;

/// Reason recorded when no adapter resolves for the target platform
pub const ADAPTER_MISSING: &str = "adapter_missing";
/// Reason recorded when validation fails without naming an error code
pub const VALIDATION_FAILED: &str = "validation_failed";

/// What a single attempt did to the post
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Published {
        external_id: String,
    },
    Retrying {
        retry_count: u32,
        reason: String,
        scheduled_at: DateTime<Utc>,
    },
    Failed {
        retry_count: u32,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn PostStore>,
    registry: Arc<AdapterRegistry>,
    log: Arc<PublishLog>,
    policy: RetryPolicy,
    publish_timeout: Duration,
}

impl Worker {
    pub fn new(
        store: Arc<dyn PostStore>,
        registry: Arc<AdapterRegistry>,
        log: Arc<PublishLog>,
        policy: RetryPolicy,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            log,
            policy,
            publish_timeout,
        }
    }

    /// Process a post and log, rather than return, storage errors
    ///
    /// This is what the scheduler spawns; there is no caller to hand an error
    /// back to.
    pub async fn run(&self, post: Post) {
        let post_id = post.id.clone();
        if let Err(e) = self.process(post).await {
            error!(post_id = %post_id, error = %e, "failed to record publish outcome");
        }
    }

    /// Run one publish attempt and persist its outcome
    #[instrument(skip(self, post), fields(post_id = %post.id, retry_count = post.retry_count))]
    pub async fn process(&self, post: Post) -> Result<AttemptOutcome> {
        let post = post.normalized();
        let platform = post.target_platform();

        let Some(adapter) = self.registry.get(&platform) else {
            self.log.push(
                PublishLogEntry::new(&platform, PublishEvent::AdapterMissing)
                    .post(&post.id)
                    .message(format!("No adapter registered for {}", platform)),
            );
            return self.fail(&post, true, ADAPTER_MISSING).await;
        };

        let validation = adapter.validate_content(&post);
        if !validation.valid {
            let joined = validation.joined_errors();
            self.log.push(
                PublishLogEntry::new(&platform, PublishEvent::ValidationFailed)
                    .post(&post.id)
                    .message(joined.clone()),
            );
            let reason = if joined.is_empty() {
                VALIDATION_FAILED.to_string()
            } else {
                joined
            };
            return self.fail(&post, true, &reason).await;
        }

        let published = match tokio::time::timeout(self.publish_timeout, adapter.publish(&post))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(self.publish_timeout)),
        };

        match published {
            Ok(receipt) => {
                self.store.mark_published(&post.id).await?;
                self.log.push(
                    PublishLogEntry::new(&platform, PublishEvent::PublishSuccess)
                        .post(&post.id)
                        .message(receipt.external_id.clone()),
                );
                info!(platform = %platform, external_id = %receipt.external_id, "post published");
                Ok(AttemptOutcome::Published {
                    external_id: receipt.external_id,
                })
            }
            Err(err) => {
                let disposition = adapter.handle_error(&err, &post);
                self.log.push(
                    PublishLogEntry::new(&platform, PublishEvent::PublishError)
                        .post(&post.id)
                        .message(err.message())
                        .retry_count(post.retry_count + 1),
                );
                let reason = if disposition.reason.is_empty() {
                    err.message()
                } else {
                    disposition.reason
                };
                self.fail(&post, disposition.should_retry, &reason).await
            }
        }
    }

    async fn fail(&self, post: &Post, retryable: bool, reason: &str) -> Result<AttemptOutcome> {
        let retry_count = post.retry_count + 1;

        if retryable && self.policy.can_retry(post.retry_count) {
            let delay = self.policy.backoff_delay(post.retry_count);
            let scheduled_at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
            self.store
                .schedule_retry(&post.id, retry_count, reason, scheduled_at)
                .await?;
            warn!(
                reason,
                retry_count,
                delay_ms = delay.as_millis() as u64,
                "publish attempt failed, retry scheduled"
            );
            return Ok(AttemptOutcome::Retrying {
                retry_count,
                reason: reason.to_string(),
                scheduled_at,
            });
        }

        self.store
            .mark_failed(&post.id, retry_count, reason)
            .await?;
        error!(reason, retry_count, "publish failed permanently");
        Ok(AttemptOutcome::Failed {
            retry_count,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;
    use crate::platforms::MediaRequirement;
    use crate::store::MemoryStore;
    use crate::types::PostStatus;

    struct Harness {
        store: Arc<MemoryStore>,
        log: Arc<PublishLog>,
        worker: Worker,
    }

    fn harness(registry: AdapterRegistry) -> Harness {
        harness_with_timeout(registry, Duration::from_secs(30))
    }

    fn harness_with_timeout(registry: AdapterRegistry, timeout: Duration) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(PublishLog::default());
        let worker = Worker::new(
            store.clone(),
            Arc::new(registry),
            log.clone(),
            RetryPolicy::default(),
            timeout,
        );
        Harness { store, log, worker }
    }

    fn registry_with(adapter: MockAdapter) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new(true);
        registry.register("mock", Arc::new(adapter));
        registry
    }

    async fn claimed_post(store: &MemoryStore, platform: &str, retry_count: u32) -> Post {
        let mut post = Post::scheduled(
            "hello world".to_string(),
            vec![platform.to_string()],
            Utc::now(),
        );
        post.retry_count = retry_count;
        store.create_post(&post).await.unwrap();
        assert!(store.mark_publishing(&post.id).await.unwrap());
        store.get_post(&post.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_success_marks_published() {
        let h = harness(registry_with(MockAdapter::success("mock")));
        let post = claimed_post(&h.store, "mock", 1).await;

        let outcome = h.worker.process(post.clone()).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Published { .. }));

        let stored = h.store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.last_error.is_none());

        let entries = h.log.entries();
        assert_eq!(entries[0].event, PublishEvent::PublishSuccess);
        assert!(entries[0].message.as_deref().unwrap().starts_with("mock:mock-"));
    }

    #[tokio::test]
    async fn test_missing_adapter_is_retried() {
        let h = harness(AdapterRegistry::new(true));
        let post = claimed_post(&h.store, "nowhere", 0).await;

        let outcome = h.worker.process(post.clone()).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Retrying { retry_count: 1, .. }));

        let stored = h.store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Scheduled);
        assert_eq!(stored.last_error.as_deref(), Some(ADAPTER_MISSING));
        assert_eq!(h.log.entries()[0].event, PublishEvent::AdapterMissing);
    }

    #[tokio::test]
    async fn test_disabled_registry_reports_adapter_missing() {
        let mut registry = AdapterRegistry::new(false);
        registry.register("mock", Arc::new(MockAdapter::success("mock")));
        let h = harness(registry);
        let post = claimed_post(&h.store, "mock", 0).await;

        h.worker.process(post).await.unwrap();
        assert_eq!(h.log.entries()[0].event, PublishEvent::AdapterMissing);
    }

    #[tokio::test]
    async fn test_validation_failure_records_joined_codes() {
        let h = harness(registry_with(MockAdapter::requiring_media(
            "mock",
            MediaRequirement::Image,
        )));
        let post = claimed_post(&h.store, "mock", 0).await;

        h.worker.process(post.clone()).await.unwrap();

        let stored = h.store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Scheduled);
        assert_eq!(stored.last_error.as_deref(), Some("media_required"));

        let entry = &h.log.entries()[0];
        assert_eq!(entry.event, PublishEvent::ValidationFailed);
        assert_eq!(entry.message.as_deref(), Some("media_required"));
    }

    #[tokio::test]
    async fn test_retryable_error_schedules_backoff() {
        let h = harness(registry_with(MockAdapter::failing("mock", 368)));
        let post = claimed_post(&h.store, "mock", 1).await;

        let before = Utc::now();
        let outcome = h.worker.process(post.clone()).await.unwrap();
        let after = Utc::now();

        let AttemptOutcome::Retrying {
            retry_count,
            reason,
            scheduled_at,
        } = outcome
        else {
            panic!("expected retry, got {:?}", outcome);
        };
        assert_eq!(retry_count, 2);
        assert_eq!(reason, "rate_limited");
        assert!(scheduled_at >= before + chrono::Duration::milliseconds(30_000));
        assert!(scheduled_at <= after + chrono::Duration::milliseconds(35_000));

        let entry = &h.log.entries()[0];
        assert_eq!(entry.event, PublishEvent::PublishError);
        assert_eq!(entry.retry_count, Some(2));
        assert_eq!(entry.message.as_deref(), Some("Mock publish failed"));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let h = harness(registry_with(MockAdapter::failing("mock", 400)));
        let post = claimed_post(&h.store, "mock", 0).await;

        let outcome = h.worker.process(post.clone()).await.unwrap();
        assert_eq!(
            outcome,
            AttemptOutcome::Failed {
                retry_count: 1,
                reason: "non_retryable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_retries_exhausted_fails() {
        let h = harness(registry_with(MockAdapter::failing("mock", 190)));
        let post = claimed_post(&h.store, "mock", 3).await;

        h.worker.process(post.clone()).await.unwrap();

        let stored = h.store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert_eq!(stored.retry_count, 4);
        assert_eq!(stored.last_error.as_deref(), Some("auth_expired"));
        assert!(h.store.due_posts(Utc::now() + chrono::Duration::days(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_timeout_is_retryable() {
        let h = harness_with_timeout(
            registry_with(MockAdapter::with_delay("mock", Duration::from_secs(5))),
            Duration::from_millis(50),
        );
        let post = claimed_post(&h.store, "mock", 0).await;

        let outcome = h.worker.process(post.clone()).await.unwrap();
        assert!(matches!(
            outcome,
            AttemptOutcome::Retrying { ref reason, .. } if reason == "publish_timeout"
        ));
    }
}
