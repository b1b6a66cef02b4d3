//! Admission-control algorithms.
//!
//! Three interchangeable answers to "may this client proceed right now?",
//! each with a different fairness/burst trade-off:
//!
//! - [`FixedWindowCounter`]: cheap, epoch-aligned windows, bursty at boundaries
//! - [`SlidingWindowLimiter`]: exact over a moving interval, stores timestamps
//! - [`TokenBucketLimiter`]: continuous refill, supports weighted requests
//!
//! All per-key bookkeeping is synchronous and in-memory. Each key's state
//! lives behind its own `Mutex`; the outer map lock is only taken to look up
//! or create an entry, so unrelated clients never contend.
pub mod fixed_window;
pub mod sliding_window;
pub mod token_bucket;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

pub use fixed_window::FixedWindowCounter;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

use crate::error::{GatewayError, Result};
use crate::settings::{LimiterAlgorithm, LimiterSettings};

/// Common interface over the three admission-control algorithms.
/// Call sites pick an implementation by configuration and never change.
pub trait RateLimiter: Send + Sync {
    /// Decide whether `key` may proceed right now, consuming quota if so
    fn allow_request(&self, key: &str) -> Result<bool>;

    /// How many requests `key` may still make right now
    fn remaining_requests(&self, key: &str) -> Result<u32>;

    /// Seconds until `key` should retry after a denial
    fn retry_after_seconds(&self, key: &str) -> Result<f64>;

    /// Drop per-key state that no longer constrains admission, returning
    /// how many keys were swept. Keeps the store from growing with every
    /// client ever seen.
    fn expire_keys(&self) -> Result<usize>;
}

/// Construct the configured algorithm behind the common interface
pub fn build_limiter(
    algorithm: LimiterAlgorithm,
    settings: LimiterSettings,
) -> Arc<dyn RateLimiter> {
    match algorithm {
        LimiterAlgorithm::FixedWindow => Arc::new(FixedWindowCounter::new(settings)),
        LimiterAlgorithm::SlidingWindow => Arc::new(SlidingWindowLimiter::new(settings)),
        LimiterAlgorithm::TokenBucket => Arc::new(TokenBucketLimiter::new(settings)),
    }
}

/// Per-key state store shared by the limiter implementations.
/// The map lock is held only long enough to clone out the entry's `Arc`;
/// the per-key mutex serializes the read-modify-write sequences.
#[derive(Debug, Default)]
pub(crate) struct KeyedState<T> {
    entries: RwLock<HashMap<String, Arc<Mutex<T>>>>,
}

impl<T> KeyedState<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the entry for `key`, creating it with `init` on first reference
    pub(crate) fn entry_or_insert_with(
        &self,
        key: &str,
        init: impl FnOnce() -> T,
    ) -> Result<Arc<Mutex<T>>> {
        {
            let entries = self.entries.read().map_err(|e| {
                GatewayError::Concurrency(format!("Failed to acquire limiter read lock: {}", e))
            })?;
            if let Some(entry) = entries.get(key) {
                return Ok(entry.clone());
            }
        }
        let mut entries = self.entries.write().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire limiter write lock: {}", e))
        })?;
        // Another writer may have created the entry between the two locks
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())));
        Ok(entry.clone())
    }

    /// Sweep the store, keeping only entries for which `keep` returns true.
    /// Returns how many entries were removed. Holds the map write lock for
    /// the duration, so callers should keep `keep` cheap.
    pub(crate) fn retain(&self, mut keep: impl FnMut(&mut T) -> bool) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire limiter write lock: {}", e))
        })?;
        let before = entries.len();
        entries.retain(|_, entry| match entry.lock() {
            Ok(mut state) => keep(&mut state),
            // A poisoned entry is unusable; sweep it with the stale ones
            Err(_) => false,
        });
        Ok(before - entries.len())
    }

    pub(crate) fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire limiter read lock: {}", e))
        })?;
        Ok(entries.len())
    }
}

/// Lock a per-key entry, translating poisoning into a crate error
pub(crate) fn lock_entry<T>(entry: &Arc<Mutex<T>>) -> Result<std::sync::MutexGuard<'_, T>> {
    entry.lock().map_err(|e| {
        GatewayError::Concurrency(format!("Failed to acquire limiter entry lock: {}", e))
    })
}

/// Millisecond clock shared by all three algorithms
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
