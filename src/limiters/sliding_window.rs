//! Sliding window admission control.
//!
//! Tracks a FIFO of request timestamps per key and counts only those inside
//! the moving interval `[now - window_seconds, now]`. More accurate than the
//! fixed window at the cost of storing one timestamp per admitted request.
use std::collections::VecDeque;
use std::sync::Arc;

use super::{lock_entry, now_millis, KeyedState, RateLimiter};
use crate::error::Result;
use crate::settings::LimiterSettings;

pub struct SlidingWindowLimiter {
    settings: LimiterSettings,
    requests: Arc<KeyedState<VecDeque<i64>>>,
}

impl SlidingWindowLimiter {
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            settings,
            requests: Arc::new(KeyedState::new()),
        }
    }

    /// Drop timestamps that have aged out of the window.
    /// Timestamps are chronologically ordered, so a prefix trim suffices.
    fn evict_expired(&self, timestamps: &mut VecDeque<i64>, now: i64) {
        let cutoff = now - self.settings.window_millis();
        while timestamps.front().is_some_and(|&ts| ts < cutoff) {
            timestamps.pop_front();
        }
    }

    pub fn get_remaining_requests(&self, key: &str) -> Result<u32> {
        let now = now_millis();
        let entry = self.requests.entry_or_insert_with(key, VecDeque::new)?;
        let mut timestamps = lock_entry(&entry)?;
        self.evict_expired(&mut timestamps, now);
        Ok(self
            .settings
            .max_requests
            .saturating_sub(timestamps.len() as u32))
    }

    /// Seconds until the oldest surviving timestamp exits the window,
    /// 0 when the key has no recorded requests
    pub fn get_reset_time(&self, key: &str) -> Result<f64> {
        let now = now_millis();
        let entry = self.requests.entry_or_insert_with(key, VecDeque::new)?;
        let mut timestamps = lock_entry(&entry)?;
        self.evict_expired(&mut timestamps, now);
        match timestamps.front() {
            Some(&oldest) => {
                let reset_at = oldest + self.settings.window_millis();
                Ok(((reset_at - now).max(0)) as f64 / 1000.0)
            }
            None => Ok(0.0),
        }
    }

    pub fn tracked_keys(&self) -> Result<usize> {
        self.requests.len()
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn allow_request(&self, key: &str) -> Result<bool> {
        let now = now_millis();
        let entry = self.requests.entry_or_insert_with(key, VecDeque::new)?;
        let mut timestamps = lock_entry(&entry)?;
        self.evict_expired(&mut timestamps, now);

        if (timestamps.len() as u32) < self.settings.max_requests {
            timestamps.push_back(now);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remaining_requests(&self, key: &str) -> Result<u32> {
        self.get_remaining_requests(key)
    }

    fn retry_after_seconds(&self, key: &str) -> Result<f64> {
        self.get_reset_time(key)
    }

    /// Drop keys whose every timestamp has aged out of the window
    fn expire_keys(&self) -> Result<usize> {
        let now = now_millis();
        self.requests.retain(|timestamps| {
            self.evict_expired(timestamps, now);
            !timestamps.is_empty()
        })
    }
}
