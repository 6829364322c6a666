//! Mock adapter implementation for testing
//!
//! This module provides a configurable mock adapter that can simulate
//! successes, coded failures and slow platforms. It's designed for use in
//! integration tests to exercise the scheduler and worker without network
//! access or credentials.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{validate_common, MediaRequirement, PlatformAdapter, PublishReceipt, ValidationResult};
use crate::error::PlatformError;
use crate::types::Post;

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "twitter", "mock")
    pub name: String,

    /// Error code returned by failing publishes; `None` means publishes succeed
    pub fail_code: Option<i64>,

    /// Number of leading publishes that fail before the mock starts
    /// succeeding; `None` fails forever when `fail_code` is set
    pub fail_times: Option<usize>,

    /// Delay before completing publish (simulates network latency)
    pub delay: Duration,

    /// Character limit for validation
    pub character_limit: Option<usize>,

    /// Attachment kind required by validation
    pub media: MediaRequirement,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Content that has been published (for verification)
    pub published_content: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fail_code: None,
            fail_times: None,
            delay: Duration::from_millis(0),
            character_limit: None,
            media: MediaRequirement::None,
            publish_call_count: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock adapter for testing
pub struct MockAdapter {
    config: MockConfig,
}

impl MockAdapter {
    /// Create a new mock adapter with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock adapter that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock adapter whose publishes always fail with `code`
    pub fn failing(name: &str, code: i64) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            fail_code: Some(code),
            ..Default::default()
        })
    }

    /// Create a mock adapter that fails `times` publishes with `code`, then succeeds
    pub fn flaky(name: &str, code: i64, times: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            fail_code: Some(code),
            fail_times: Some(times),
            ..Default::default()
        })
    }

    /// Create a mock adapter with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Create a mock adapter with a character limit
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        })
    }

    /// Create a mock adapter that requires matching attachments
    pub fn requiring_media(name: &str, media: MediaRequirement) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            media,
            ..Default::default()
        })
    }

    /// Get the number of times publish was called
    pub fn publish_call_count(&self) -> usize {
        *self
            .config
            .publish_call_count
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Get all content that was published
    pub fn published_content(&self) -> Vec<String> {
        self.config
            .published_content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate_content(&self, post: &Post) -> ValidationResult {
        validate_common(post, self.config.character_limit, self.config.media)
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PlatformError> {
        let call_number = {
            let mut count = self
                .config
                .publish_call_count
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *count += 1;
            *count
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(code) = self.config.fail_code {
            let still_failing = self
                .config
                .fail_times
                .map_or(true, |times| call_number <= times);
            if still_failing {
                return Err(PlatformError::api(code, "Mock publish failed"));
            }
        }

        self.config
            .published_content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(post.content.clone());

        Ok(PublishReceipt {
            external_id: format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4()),
        })
    }
}
