//! Platform adapter abstraction and implementations
//!
//! Each publishing target is reached through a [`PlatformAdapter`], which
//! knows the platform's content rules, performs the outbound publish call and
//! classifies the errors it produces. Adapters are looked up by platform id
//! through the [`registry::AdapterRegistry`].
//!
//! # Examples
//!
//! ```no_run
//! use libomnipost::platforms::{PlatformAdapter, http::HttpAdapter, profiles};
//! use libomnipost::config::PlatformConfig;
//! use libomnipost::Post;
//!
//! # async fn example() -> Result<(), libomnipost::error::PlatformError> {
//! let adapter = HttpAdapter::new(profiles::TWITTER, &PlatformConfig::default());
//! let post = Post::new("Hello from the queue".to_string());
//!
//! let validation = adapter.validate_content(&post);
//! if validation.valid {
//!     let receipt = adapter.publish(&post).await?;
//!     println!("Published as {}", receipt.external_id);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PlatformError;
use crate::types::Post;

pub mod http;
pub mod limited;
pub mod profiles;
pub mod registry;

// Mock adapter is available for all builds (not just tests) to support integration tests
pub mod mock;

pub const CONTENT_REQUIRED: &str = "content_required";
pub const CONTENT_TOO_LONG: &str = "content_too_long";
pub const MEDIA_REQUIRED: &str = "media_required";
pub const INVALID_MEDIA_FORMAT: &str = "invalid_media_format";

/// Outcome of checking a post against a platform's content rules
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(error: &str) -> Self {
        Self {
            valid: false,
            errors: vec![error.to_string()],
        }
    }

    /// Error codes joined for storage in `last_error`
    pub fn joined_errors(&self) -> String {
        self.errors.join(",")
    }
}

/// Identifier the platform assigned to a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub external_id: String,
}

/// How the worker should treat a failed publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDisposition {
    pub should_retry: bool,
    pub reason: String,
    /// Platform-suggested wait before retrying. Informational; the worker
    /// applies its own backoff.
    pub suggested_delay: Option<Duration>,
}

impl ErrorDisposition {
    pub fn retry(reason: &str, suggested_delay: Duration) -> Self {
        Self {
            should_retry: true,
            reason: reason.to_string(),
            suggested_delay: Some(suggested_delay),
        }
    }

    pub fn terminal(reason: &str) -> Self {
        Self {
            should_retry: false,
            reason: reason.to_string(),
            suggested_delay: None,
        }
    }
}

/// Media an adapter requires among a post's attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRequirement {
    None,
    Image,
    Video,
}

impl MediaRequirement {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaRequirement::None => &[],
            MediaRequirement::Image => &["jpg", "jpeg", "png"],
            MediaRequirement::Video => &["mp4", "mov", "webm"],
        }
    }

    /// True if the URL ends with one of the accepted extensions
    pub fn accepts(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.extensions()
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }
}

/// Check a post against the rules shared by every platform
///
/// Order matters: empty content is reported before media problems, which are
/// reported before length.
pub fn validate_common(
    post: &Post,
    max_length: Option<usize>,
    media: MediaRequirement,
) -> ValidationResult {
    if post.content.trim().is_empty() {
        return ValidationResult::invalid(CONTENT_REQUIRED);
    }

    if media != MediaRequirement::None {
        if post.media_urls.is_empty() {
            return ValidationResult::invalid(MEDIA_REQUIRED);
        }
        if !post.media_urls.iter().any(|url| media.accepts(url)) {
            return ValidationResult::invalid(INVALID_MEDIA_FORMAT);
        }
    }

    if let Some(limit) = max_length {
        if post.content.chars().count() > limit {
            return ValidationResult::invalid(CONTENT_TOO_LONG);
        }
    }

    ValidationResult::ok()
}

/// Default error classification shared by all adapters
pub fn classify_error(error: &PlatformError) -> ErrorDisposition {
    match error {
        PlatformError::Timeout(_) => {
            ErrorDisposition::retry("publish_timeout", Duration::from_secs(60))
        }
        _ => match error.code() {
            Some(PlatformError::AUTH_EXPIRED) => {
                ErrorDisposition::retry("auth_expired", Duration::from_secs(5 * 60))
            }
            Some(PlatformError::RATE_LIMITED) => {
                ErrorDisposition::retry("rate_limited", Duration::from_secs(15 * 60))
            }
            Some(PlatformError::BAD_REQUEST) => {
                ErrorDisposition::retry("temporary_bad_request", Duration::from_secs(60))
            }
            _ => ErrorDisposition::terminal("non_retryable"),
        },
    }
}

/// Adapter trait for publishing to one platform
///
/// Implementations must be cheap to share: the registry hands out
/// `Arc<dyn PlatformAdapter>` and workers call them concurrently.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Lower-case platform identifier (e.g. "twitter", "discord")
    fn name(&self) -> &str;

    /// Check the post's content and attachments against platform rules
    fn validate_content(&self, post: &Post) -> ValidationResult;

    /// Publish the post with a single outbound call
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Api` carrying the platform's numeric code, or
    /// `PlatformError::Network` if the request never completed.
    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PlatformError>;

    /// Classify a publish error into a retry decision
    ///
    /// The default follows the shared code table: 190 auth_expired, 368
    /// rate_limited and 100 temporary_bad_request retry; anything else is
    /// terminal.
    fn handle_error(&self, error: &PlatformError, _post: &Post) -> ErrorDisposition {
        classify_error(error)
    }
}
