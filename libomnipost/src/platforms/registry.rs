//! Platform id to adapter lookup

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::http::HttpAdapter;
use super::limited::RateLimitedAdapter;
use super::profiles;
use super::PlatformAdapter;
use crate::config::Config;
use crate::rate_limiter::RateLimiter;

/// Resolves lower-cased platform ids to shared adapters
///
/// The enable switch is fixed at construction. A disabled registry resolves
/// nothing, so every post fails resolution with `adapter_missing`.
pub struct AdapterRegistry {
    enabled: bool,
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            adapters: HashMap::new(),
        }
    }

    /// Build the registry of built-in HTTP adapters described by `config`
    ///
    /// All adapters share one connection pool. When
    /// `adapters.rate_limited` is set each adapter is wrapped with `limiter`.
    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Self {
        let mut registry = Self::new(config.adapters.enabled);
        let client = reqwest::Client::new();

        for profile in profiles::ALL {
            let adapter: Arc<dyn PlatformAdapter> = Arc::new(HttpAdapter::with_client(
                *profile,
                &config.platform(profile.name),
                client.clone(),
            ));
            let adapter: Arc<dyn PlatformAdapter> = if config.adapters.rate_limited {
                Arc::new(RateLimitedAdapter::new(
                    profile.name,
                    adapter,
                    limiter.clone(),
                ))
            } else {
                adapter
            };
            registry.register(profile.name, adapter);
        }

        debug!(
            enabled = registry.enabled,
            count = registry.adapters.len(),
            "adapter registry built"
        );
        registry
    }

    /// Register (or replace) the adapter for a platform
    pub fn register(&mut self, platform: &str, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(platform.to_lowercase(), adapter);
    }

    /// Look up the adapter for a platform; `None` when unknown or disabled
    pub fn get(&self, platform: &str) -> Option<Arc<dyn PlatformAdapter>> {
        if !self.enabled {
            return None;
        }
        self.adapters.get(&platform.to_lowercase()).cloned()
    }

    pub fn has(&self, platform: &str) -> bool {
        self.get(platform).is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registered platform ids, sorted
    pub fn platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}
