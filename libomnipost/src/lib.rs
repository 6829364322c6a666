//! Omnipost - scheduled publishing to many platforms
//!
//! This library holds the publishing pipeline shared by the `omni-send`
//! daemon and the `omni-post` queue tool: a polling [`Scheduler`] claims due
//! posts and hands each to a [`Worker`], which resolves a platform adapter,
//! validates, publishes and records the outcome with exponential backoff on
//! retryable failures.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod publish_log;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;
pub mod windows;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{OmnipostError, Result};
pub use platforms::registry::AdapterRegistry;
pub use platforms::PlatformAdapter;
pub use publish_log::{PublishEvent, PublishLog, PublishLogEntry};
pub use rate_limiter::{RateLimit, RateLimiter};
pub use scheduler::Scheduler;
pub use store::{MemoryStore, PostStore};
pub use types::{PlatformWindow, Post, PostStatus};
pub use worker::{AttemptOutcome, Worker};
