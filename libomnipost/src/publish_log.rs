//! In-memory publish journal
//!
//! A bounded, newest-first record of what the worker and manual trigger did.
//! Entries are never persisted and are lost on restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Entries kept before the oldest is evicted
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishEvent {
    AdapterMissing,
    ValidationFailed,
    PublishSuccess,
    PublishError,
    ManualTriggerSuccess,
    ManualTriggerError,
}

impl PublishEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishEvent::AdapterMissing => "adapter_missing",
            PublishEvent::ValidationFailed => "validation_failed",
            PublishEvent::PublishSuccess => "publish_success",
            PublishEvent::PublishError => "publish_error",
            PublishEvent::ManualTriggerSuccess => "manual_trigger_success",
            PublishEvent::ManualTriggerError => "manual_trigger_error",
        }
    }
}

impl fmt::Display for PublishEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishLogEntry {
    pub timestamp: DateTime<Utc>,
    pub platform_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub event: PublishEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl PublishLogEntry {
    pub fn new(platform_id: &str, event: PublishEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            platform_id: platform_id.to_string(),
            post_id: None,
            event,
            message: None,
            retry_count: None,
        }
    }

    pub fn post(mut self, post_id: &str) -> Self {
        self.post_id = Some(post_id.to_string());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}

/// Fixed-capacity ring buffer of publish events
pub struct PublishLog {
    capacity: usize,
    entries: Mutex<VecDeque<PublishLogEntry>>,
}

impl Default for PublishLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PublishLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
        }
    }

    /// Append an entry, evicting the oldest once over capacity
    pub fn push(&self, entry: PublishLogEntry) {
        tracing::info!(
            event = %entry.event,
            platform = %entry.platform_id,
            post_id = entry.post_id.as_deref().unwrap_or("-"),
            message = entry.message.as_deref().unwrap_or(""),
            "publish log"
        );

        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// All entries, newest first
    pub fn entries(&self) -> Vec<PublishLogEntry> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PublishLogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
