//! Storage abstraction consumed by the scheduler, worker and queue service
//!
//! [`crate::db::Database`] is the SQLite implementation used by the binaries;
//! [`MemoryStore`] keeps everything in process and backs tests and embedding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{OmnipostError, Result};
use crate::types::{PlatformWindow, Post, PostStatus};

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts with `status = scheduled` and `scheduled_at <= now`, oldest first
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>>;

    /// Move a post from `scheduled` to `publishing`
    ///
    /// Returns `false` if the post was not in `scheduled` status (already
    /// claimed, cancelled or deleted), in which case nothing changes.
    async fn mark_publishing(&self, id: &str) -> Result<bool>;

    /// Final success: `published`, `last_error` cleared, `retry_count` kept
    async fn mark_published(&self, id: &str) -> Result<()>;

    /// Put a post back in the queue for another attempt
    async fn schedule_retry(
        &self,
        id: &str,
        retry_count: u32,
        last_error: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Final failure
    async fn mark_failed(&self, id: &str, retry_count: u32, last_error: &str) -> Result<()>;

    /// All publish windows, enabled or not
    async fn windows(&self) -> Result<Vec<PlatformWindow>>;

    /// Insert or replace the window for `window.platform_id`
    async fn upsert_window(&self, window: &PlatformWindow) -> Result<()>;

    /// Whether a `scheduled` or `publishing` post other than `exclude_id`
    /// targets `platform` with `scheduled_at` in `[from, to]`
    async fn has_gap_conflict(
        &self,
        platform: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<bool>;

    async fn create_post(&self, post: &Post) -> Result<()>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>>;

    /// Set `scheduled_at` and return the post to `scheduled`
    async fn update_schedule(&self, id: &str, scheduled_at: DateTime<Utc>) -> Result<()>;

    async fn set_status(&self, id: &str, status: PostStatus) -> Result<()>;
}

fn in_gap_range(post: &Post, platform: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    matches!(post.status, PostStatus::Scheduled | PostStatus::Publishing)
        && post.scheduled_at >= from
        && post.scheduled_at <= to
        && targets_platform(post, platform)
}

/// In-process [`PostStore`]
///
/// Starts with the default publish windows, matching a freshly created
/// database.
pub struct MemoryStore {
    posts: Mutex<HashMap<String, Post>>,
    windows: Mutex<HashMap<String, PlatformWindow>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_windows(PlatformWindow::defaults())
    }

    pub fn with_windows(windows: Vec<PlatformWindow>) -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
            windows: Mutex::new(
                windows
                    .into_iter()
                    .map(|w| (w.platform_id.clone(), w))
                    .collect(),
            ),
        }
    }

    fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Post),
    {
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        let post = posts
            .get_mut(id)
            .ok_or_else(|| OmnipostError::NotFound(format!("post {}", id)))?;
        f(post);
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        let mut due: Vec<Post> = posts
            .values()
            .filter(|p| p.status == PostStatus::Scheduled && p.scheduled_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_at);
        Ok(due)
    }

    async fn mark_publishing(&self, id: &str) -> Result<bool> {
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        match posts.get_mut(id) {
            Some(post) if post.status == PostStatus::Scheduled => {
                post.status = PostStatus::Publishing;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_published(&self, id: &str) -> Result<()> {
        self.update(id, |post| {
            post.status = PostStatus::Published;
            post.last_error = None;
        })
    }

    async fn schedule_retry(
        &self,
        id: &str,
        retry_count: u32,
        last_error: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update(id, |post| {
            post.status = PostStatus::Scheduled;
            post.retry_count = retry_count;
            post.last_error = Some(last_error.to_string());
            post.scheduled_at = scheduled_at;
        })
    }

    async fn mark_failed(&self, id: &str, retry_count: u32, last_error: &str) -> Result<()> {
        self.update(id, |post| {
            post.status = PostStatus::Failed;
            post.retry_count = retry_count;
            post.last_error = Some(last_error.to_string());
        })
    }

    async fn windows(&self) -> Result<Vec<PlatformWindow>> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<PlatformWindow> = windows.values().cloned().collect();
        all.sort_by(|a, b| a.platform_id.cmp(&b.platform_id));
        Ok(all)
    }

    async fn upsert_window(&self, window: &PlatformWindow) -> Result<()> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.insert(window.platform_id.to_lowercase(), window.clone());
        Ok(())
    }

    async fn has_gap_conflict(
        &self,
        platform: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        let platform = platform.to_lowercase();
        let posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(posts
            .values()
            .filter(|p| Some(p.id.as_str()) != exclude_id)
            .any(|p| in_gap_range(p, &platform, from, to)))
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        if posts.contains_key(&post.id) {
            return Err(OmnipostError::InvalidInput(format!(
                "post {} already exists",
                post.id
            )));
        }
        posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(posts.get(id).cloned())
    }

    async fn update_schedule(&self, id: &str, scheduled_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |post| {
            post.scheduled_at = scheduled_at;
            post.status = PostStatus::Scheduled;
        })
    }

    async fn set_status(&self, id: &str, status: PostStatus) -> Result<()> {
        self.update(id, |post| post.status = status)
    }
}

/// Filter used by SQL-backed stores after narrowing by time and status
pub(crate) fn targets_platform(post: &Post, platform: &str) -> bool {
    post.platforms().iter().any(|p| p == platform)
}
