//! Manual publishing and publish-log access

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{OmnipostError, PlatformError, Result};
use crate::platforms::registry::AdapterRegistry;
use crate::platforms::PublishReceipt;
use crate::publish_log::{PublishEvent, PublishLog, PublishLogEntry};
use crate::types::Post;
use crate::worker::{ADAPTER_MISSING, VALIDATION_FAILED};

/// Publish on demand, outside the queue
#[derive(Clone)]
pub struct PublishingService {
    registry: Arc<AdapterRegistry>,
    log: Arc<PublishLog>,
    publish_timeout: Duration,
}

impl PublishingService {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        log: Arc<PublishLog>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            log,
            publish_timeout,
        }
    }

    /// Validate and publish `content` to one platform immediately
    ///
    /// Nothing is stored. Only the publish call itself is journaled, as
    /// `manual_trigger_success` or `manual_trigger_error`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput("adapter_missing")` if no adapter resolves
    /// - `InvalidInput` with the joined validation codes if the content is
    ///   rejected
    /// - `Platform` if the publish call fails or times out
    pub async fn trigger(
        &self,
        platform: &str,
        content: &str,
        media_urls: Vec<String>,
    ) -> Result<PublishReceipt> {
        let platform = platform.to_lowercase();
        let adapter = self
            .registry
            .get(&platform)
            .ok_or_else(|| OmnipostError::InvalidInput(ADAPTER_MISSING.to_string()))?;

        let mut post = Post::new(content.to_string()).with_media(media_urls);
        post.platform_ids = vec![platform.clone()];

        let validation = adapter.validate_content(&post);
        if !validation.valid {
            let joined = validation.joined_errors();
            return Err(OmnipostError::InvalidInput(if joined.is_empty() {
                VALIDATION_FAILED.to_string()
            } else {
                joined
            }));
        }

        let result = match tokio::time::timeout(self.publish_timeout, adapter.publish(&post)).await
        {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout(self.publish_timeout)),
        };

        match result {
            Ok(receipt) => {
                self.log.push(
                    PublishLogEntry::new(&platform, PublishEvent::ManualTriggerSuccess)
                        .post(&post.id)
                        .message(receipt.external_id.clone()),
                );
                info!(platform = %platform, external_id = %receipt.external_id, "manual publish succeeded");
                Ok(receipt)
            }
            Err(err) => {
                self.log.push(
                    PublishLogEntry::new(&platform, PublishEvent::ManualTriggerError)
                        .message(err.message()),
                );
                Err(err.into())
            }
        }
    }

    /// Publish log entries, newest first
    pub fn logs(&self) -> Vec<PublishLogEntry> {
        self.log.entries()
    }
}
