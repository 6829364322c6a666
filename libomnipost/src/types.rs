//! Core types for Omnipost

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::OmnipostError;

/// Platform used when a post names no target at all
pub const GENERIC_PLATFORM: &str = "generic";

/// A unit of scheduled work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub status: PostStatus,
    pub scheduled_at: DateTime<Utc>,
    pub platform_ids: Vec<String>,
    /// Legacy single-platform field, consulted when `platform_ids` is empty
    pub platform_id: Option<String>,
    pub media_urls: Vec<String>,
    /// Legacy single-attachment field, consulted when `media_urls` is empty
    pub media_url: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            status: PostStatus::Draft,
            scheduled_at: now,
            platform_ids: Vec::new(),
            platform_id: None,
            media_urls: Vec::new(),
            media_url: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
        }
    }

    /// Create a post already queued for `platforms` at `scheduled_at`
    pub fn scheduled(content: String, platforms: Vec<String>, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            status: PostStatus::Scheduled,
            scheduled_at,
            platform_ids: platforms,
            ..Self::new(content)
        }
    }

    pub fn with_media(mut self, media_urls: Vec<String>) -> Self {
        self.media_urls = media_urls;
        self
    }

    /// The platform a single publish attempt targets.
    ///
    /// First entry of `platform_ids`, then the legacy `platform_id`, then
    /// [`GENERIC_PLATFORM`]. Always lower-cased.
    pub fn target_platform(&self) -> String {
        self.platform_ids
            .first()
            .or(self.platform_id.as_ref())
            .map(|p| p.to_lowercase())
            .unwrap_or_else(|| GENERIC_PLATFORM.to_string())
    }

    /// All platforms this post is aimed at, including the legacy field
    pub fn platforms(&self) -> Vec<String> {
        if !self.platform_ids.is_empty() {
            self.platform_ids.iter().map(|p| p.to_lowercase()).collect()
        } else {
            self.platform_id
                .iter()
                .map(|p| p.to_lowercase())
                .collect()
        }
    }

    /// Copy with the legacy single-value fields folded into the list fields
    pub fn normalized(&self) -> Post {
        let mut post = self.clone();
        if post.platform_ids.is_empty() {
            post.platform_ids = self.platform_id.iter().cloned().collect();
        }
        if post.media_urls.is_empty() {
            post.media_urls = self.media_url.iter().cloned().collect();
        }
        post
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = OmnipostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(OmnipostError::InvalidInput(format!(
                "Unknown post status: {}",
                other
            ))),
        }
    }
}

/// Per-platform scheduling constraint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformWindow {
    pub platform_id: String,
    pub start_hour: u8,
    pub end_hour: u8,
    pub enabled: bool,
    pub min_gap_minutes: u32,
}

impl PlatformWindow {
    pub fn new(platform_id: &str, start_hour: u8, end_hour: u8, min_gap_minutes: u32) -> Self {
        Self {
            platform_id: platform_id.to_lowercase(),
            start_hour,
            end_hour,
            enabled: true,
            min_gap_minutes,
        }
    }

    /// Windows seeded into an empty store
    pub fn defaults() -> Vec<PlatformWindow> {
        vec![
            PlatformWindow::new("instagram", 8, 22, 30),
            PlatformWindow::new("facebook", 7, 22, 30),
            PlatformWindow::new("twitter", 0, 23, 5),
            PlatformWindow::new("linkedin", 8, 18, 60),
            PlatformWindow::new("tiktok", 9, 23, 30),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_platform_prefers_platform_ids() {
        let mut post = Post::new("hello".to_string());
        post.platform_ids = vec!["Twitter".to_string(), "discord".to_string()];
        post.platform_id = Some("facebook".to_string());
        assert_eq!(post.target_platform(), "twitter");
    }

    #[test]
    fn test_target_platform_falls_back_to_legacy_field() {
        let mut post = Post::new("hello".to_string());
        post.platform_id = Some("LinkedIn".to_string());
        assert_eq!(post.target_platform(), "linkedin");
        assert_eq!(post.platforms(), vec!["linkedin"]);
    }

    #[test]
    fn test_target_platform_generic_when_unset() {
        let post = Post::new("hello".to_string());
        assert_eq!(post.target_platform(), GENERIC_PLATFORM);
        assert!(post.platforms().is_empty());
    }

    #[test]
    fn test_normalized_folds_legacy_media() {
        let mut post = Post::new("hello".to_string());
        post.media_url = Some("https://cdn.example.com/a.png".to_string());
        post.platform_id = Some("instagram".to_string());

        let normalized = post.normalized();
        assert_eq!(normalized.media_urls, vec!["https://cdn.example.com/a.png"]);
        assert_eq!(normalized.platform_ids, vec!["instagram"]);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert!("pending".parse::<PostStatus>().is_err());
    }
}
