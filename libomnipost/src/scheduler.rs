//! Polling scheduler
//!
//! Each tick claims due posts by moving them to `publishing` and hands each
//! one to a spawned [`Worker`] task. The scheduler never retries anything
//! itself; retries come back around as due posts.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::store::PostStore;
use crate::types::PostStatus;
use crate::worker::Worker;

/// Longest single sleep between shutdown checks
const SHUTDOWN_CHECK: Duration = Duration::from_secs(1);

pub struct Scheduler {
    store: Arc<dyn PostStore>,
    worker: Worker,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<dyn PostStore>, worker: Worker, poll_interval: Duration) -> Self {
        Self {
            store,
            worker,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Claim and dispatch every due post
    ///
    /// Returns the handles of the spawned worker tasks. The daemon loop drops
    /// them; callers that need the outcome (tests, one-shot runs) await them.
    pub async fn tick(&self) -> Result<Vec<JoinHandle<()>>> {
        let due = self.store.due_posts(Utc::now()).await?;
        if due.is_empty() {
            debug!("no posts due");
            return Ok(Vec::new());
        }

        info!(count = due.len(), "found posts due for publishing");

        let mut handles = Vec::with_capacity(due.len());
        for mut post in due {
            match self.store.mark_publishing(&post.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(post_id = %post.id, "post already claimed, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "could not claim post, skipping this tick");
                    continue;
                }
            }

            post.status = PostStatus::Publishing;
            let worker = self.worker.clone();
            handles.push(tokio::spawn(async move { worker.run(post).await }));
        }

        Ok(handles)
    }

    /// Tick immediately, then every poll interval until `shutdown` is set
    ///
    /// In-flight workers are left to finish on their own.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!(poll_interval = ?self.poll_interval, "scheduler started");

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping scheduler loop");
                break;
            }

            if let Err(e) = self.tick().await {
                error!(error = %e, "Error querying due posts");
            }

            let mut remaining = self.poll_interval;
            while !remaining.is_zero() {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let step = remaining.min(SHUTDOWN_CHECK);
                sleep(step).await;
                remaining -= step;
            }
        }
    }
}
