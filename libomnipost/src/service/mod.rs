//! Service layer for Omnipost
//!
//! `OmnipostService` wires the shared components (store, rate limiter,
//! adapter registry, publish log) once per process and hands out the
//! sub-services the binaries use:
//!
//! - [`QueueService`]: schedule, reschedule and cancel posts; manage windows
//! - [`PublishingService`]: manual one-off publishing and publish-log reads
//! - [`Scheduler`]: the polling loop that drives queued posts through the
//!   worker
//!
//! # Example
//!
//! ```no_run
//! use libomnipost::service::OmnipostService;
//! use libomnipost::Config;
//!
//! # async fn example() -> libomnipost::Result<()> {
//! let service = OmnipostService::from_config(Config::load()?).await?;
//!
//! let at = chrono::Utc::now() + chrono::Duration::hours(2);
//! let post = service
//!     .queue()
//!     .schedule("Hello from the queue", vec!["twitter".to_string()], vec![], at)
//!     .await?;
//! println!("Scheduled {}", post.id);
//! # Ok(())
//! # }
//! ```

pub mod publishing;
pub mod queue;

pub use publishing::PublishingService;
pub use queue::QueueService;

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, Result};
use crate::platforms::registry::AdapterRegistry;
use crate::publish_log::PublishLog;
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use crate::store::PostStore;
use crate::windows::WindowValidator;
use crate::worker::Worker;

/// Main service facade that owns the shared pipeline components
pub struct OmnipostService {
    store: Arc<dyn PostStore>,
    registry: Arc<AdapterRegistry>,
    log: Arc<PublishLog>,
    queue: QueueService,
    publishing: PublishingService,
    scheduler: Scheduler,
}

impl OmnipostService {
    /// Open the configured SQLite database and build every component
    ///
    /// # Errors
    ///
    /// Returns an error if the database path is not valid UTF-8, the
    /// database cannot be opened or migrated, or the configured UTC offset is
    /// out of range.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = config.database_path();
        let db_path = db_path.to_str().ok_or_else(|| {
            ConfigError::Invalid {
                field: "database.path".to_string(),
                reason: "path is not valid UTF-8".to_string(),
            }
        })?;
        let db = Database::new(db_path).await?;
        Self::with_store(&config, Arc::new(db))
    }

    /// Build every component over an existing store with the built-in adapters
    pub fn with_store(config: &Config, store: Arc<dyn PostStore>) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.effective_rate_limits()));
        let registry = AdapterRegistry::from_config(config, limiter);
        Self::with_registry(config, store, registry)
    }

    /// Build every component over an existing store and registry
    pub fn with_registry(
        config: &Config,
        store: Arc<dyn PostStore>,
        registry: AdapterRegistry,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let log = Arc::new(PublishLog::default());
        let timeout = config.scheduler.publish_timeout();

        let worker = Worker::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&log),
            RetryPolicy::with_max_retries(config.scheduler.max_retries),
            timeout,
        );
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            worker,
            config.scheduler.poll_interval(),
        );
        let queue = QueueService::new(
            Arc::clone(&store),
            WindowValidator::new(config.scheduler.utc_offset_minutes)?,
        );
        let publishing = PublishingService::new(Arc::clone(&registry), Arc::clone(&log), timeout);

        Ok(Self {
            store,
            registry,
            log,
            queue,
            publishing,
            scheduler,
        })
    }

    pub fn store(&self) -> &Arc<dyn PostStore> {
        &self.store
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn publish_log(&self) -> &PublishLog {
        &self.log
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    pub fn publishing(&self) -> &PublishingService {
        &self.publishing
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
