//! Queue management: scheduling, rescheduling, cancelling and windows

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::{OmnipostError, Result};
use crate::store::PostStore;
use crate::types::{PlatformWindow, Post, PostStatus};
use crate::windows::WindowValidator;

#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn PostStore>,
    validator: WindowValidator,
}

impl QueueService {
    pub fn new(store: Arc<dyn PostStore>, validator: WindowValidator) -> Self {
        Self { store, validator }
    }

    /// Create a `scheduled` post after checking every target's window
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if content is blank, no platform is named, or `at`
    ///   is already in the past
    /// - `Window` if a publish window or minimum spacing rejects `at`
    pub async fn schedule(
        &self,
        content: &str,
        platforms: Vec<String>,
        media_urls: Vec<String>,
        at: DateTime<Utc>,
    ) -> Result<Post> {
        if content.trim().is_empty() {
            return Err(OmnipostError::InvalidInput(
                "Content cannot be empty".to_string(),
            ));
        }
        let platforms: Vec<String> = platforms.iter().map(|p| p.to_lowercase()).collect();
        if platforms.is_empty() {
            return Err(OmnipostError::InvalidInput(
                "At least one platform is required".to_string(),
            ));
        }
        ensure_not_past(at)?;

        self.validator
            .validate(self.store.as_ref(), &platforms, at, None)
            .await?;

        let post = Post::scheduled(content.to_string(), platforms, at).with_media(media_urls);
        self.store.create_post(&post).await?;
        info!(post_id = %post.id, scheduled_at = %at, "post scheduled");
        Ok(post)
    }

    /// Move a post to a new time and back into the queue
    ///
    /// The post is excluded from its own spacing check. Posts that are
    /// published or currently being published cannot be rescheduled.
    pub async fn reschedule(&self, id: &str, at: DateTime<Utc>) -> Result<Post> {
        let post = self.get(id).await?;
        if matches!(post.status, PostStatus::Published | PostStatus::Publishing) {
            return Err(OmnipostError::InvalidInput(format!(
                "post {} is {} and cannot be rescheduled",
                id, post.status
            )));
        }
        ensure_not_past(at)?;

        self.validator
            .validate(self.store.as_ref(), &post.platforms(), at, Some(id))
            .await?;

        self.store.update_schedule(id, at).await?;
        info!(post_id = %id, scheduled_at = %at, "post rescheduled");
        self.get(id).await
    }

    /// Return a post to `draft` so the scheduler ignores it
    ///
    /// A worker already publishing the post is not interrupted.
    pub async fn cancel(&self, id: &str) -> Result<Post> {
        let post = self.get(id).await?;
        if matches!(post.status, PostStatus::Published | PostStatus::Failed) {
            return Err(OmnipostError::InvalidInput(format!(
                "post {} is {} and cannot be cancelled",
                id, post.status
            )));
        }
        self.store.set_status(id, PostStatus::Draft).await?;
        info!(post_id = %id, "post cancelled");
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> Result<Post> {
        self.store
            .get_post(id)
            .await?
            .ok_or_else(|| OmnipostError::NotFound(format!("post {}", id)))
    }

    pub async fn windows(&self) -> Result<Vec<PlatformWindow>> {
        self.store.windows().await
    }

    pub async fn set_window(&self, window: PlatformWindow) -> Result<()> {
        if window.start_hour > 23 || window.end_hour > 23 {
            return Err(OmnipostError::InvalidInput(
                "Window hours must be between 0 and 23".to_string(),
            ));
        }
        if window.start_hour > window.end_hour {
            return Err(OmnipostError::InvalidInput(format!(
                "Window start {} is after end {}",
                window.start_hour, window.end_hour
            )));
        }
        let window = PlatformWindow {
            platform_id: window.platform_id.to_lowercase(),
            ..window
        };
        self.store.upsert_window(&window).await
    }
}

fn ensure_not_past(at: DateTime<Utc>) -> Result<()> {
    // A minute of slack covers clock skew between parsing and storing
    if at < Utc::now() - chrono::Duration::minutes(1) {
        return Err(OmnipostError::InvalidInput(format!(
            "Scheduled time {} is in the past",
            at.to_rfc3339()
        )));
    }
    Ok(())
}
