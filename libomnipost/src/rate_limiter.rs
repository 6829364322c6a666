//! Rate limiting for platform publishing
//!
//! Tracks a fixed request budget per platform over a fixed window. Windows
//! reset lazily: the first `record` after a window has elapsed starts a new
//! one. State is process-local.
//!
//! Concurrent publishers go through [`RateLimiter::reserve`]: a reservation
//! holds a slot while the request is in flight, so parallel workers cannot
//! all pass the check before any of them records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Request budget for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub interval: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self { limit, interval }
    }

    fn interval_ms(&self) -> i64 {
        i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: i64,
    count: u32,
}

/// Rate limiter for platform publishing
///
/// Timestamps are Unix milliseconds supplied by the caller so the limiter can
/// be driven deterministically.
pub struct RateLimiter {
    /// Platform-specific budgets, keyed by lower-cased platform name
    limits: HashMap<String, RateLimit>,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, Window>,
    /// Reserved requests not yet committed or released
    in_flight: HashMap<String, u32>,
}

impl LimiterState {
    fn used(&self, key: &str, limit: &RateLimit, now: i64) -> u32 {
        let recorded = match self.windows.get(key) {
            Some(window) if !is_expired(window, limit, now) => window.count,
            _ => 0,
        };
        recorded.saturating_add(self.in_flight.get(key).copied().unwrap_or(0))
    }

    fn record(&mut self, key: &str, limit: &RateLimit, now: i64) {
        match self.windows.get_mut(key) {
            Some(window) if !is_expired(window, limit, now) => window.count += 1,
            _ => {
                self.windows
                    .insert(key.to_string(), Window { start: now, count: 1 });
            }
        }
    }

    fn release(&mut self, key: &str) {
        if let Some(n) = self.in_flight.get_mut(key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.in_flight.remove(key);
            }
        }
    }
}

impl RateLimiter {
    /// Create a new rate limiter with the given limits
    pub fn new(limits: HashMap<String, RateLimit>) -> Self {
        let limits = limits
            .into_iter()
            .map(|(platform, limit)| (platform.to_lowercase(), limit))
            .collect();
        Self {
            limits,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Check if a request may proceed (without recording)
    ///
    /// Platforms with no configured limit always proceed.
    pub fn can_proceed(&self, platform: &str, now: i64) -> bool {
        let key = platform.to_lowercase();
        let limit = match self.limits.get(&key) {
            Some(l) => *l,
            None => return true,
        };

        let state = self.lock_state();
        match state.windows.get(&key) {
            Some(window) if !is_expired(window, &limit, now) => window.count < limit.limit,
            _ => true,
        }
    }

    /// Record a request against the platform's current window
    pub fn record(&self, platform: &str, now: i64) {
        let key = platform.to_lowercase();
        let limit = match self.limits.get(&key) {
            Some(l) => *l,
            None => return,
        };

        self.lock_state().record(&key, &limit, now);
    }

    /// Hold a slot for a request that is about to go out
    ///
    /// Counts recorded requests plus other open reservations. A granted
    /// reservation must be finished with [`commit`](Self::commit) on success
    /// or [`release`](Self::release) on failure.
    pub fn reserve(&self, platform: &str, now: i64) -> bool {
        let key = platform.to_lowercase();
        let limit = match self.limits.get(&key) {
            Some(l) => *l,
            None => return true,
        };

        let mut state = self.lock_state();
        if state.used(&key, &limit, now) >= limit.limit {
            return false;
        }
        *state.in_flight.entry(key).or_insert(0) += 1;
        true
    }

    /// Turn a reservation into a recorded request
    pub fn commit(&self, platform: &str, now: i64) {
        let key = platform.to_lowercase();
        let Some(limit) = self.limits.get(&key).copied() else {
            return;
        };

        let mut state = self.lock_state();
        state.release(&key);
        state.record(&key, &limit, now);
    }

    /// Give back a reservation without recording anything
    pub fn release(&self, platform: &str) {
        let key = platform.to_lowercase();
        if self.limits.contains_key(&key) {
            self.lock_state().release(&key);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        // The map holds plain counters, so a poisoned guard is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_expired(window: &Window, limit: &RateLimit, now: i64) -> bool {
    now.saturating_sub(window.start) >= limit.interval_ms()
}
