//! Token bucket admission control.
//!
//! Each key owns a bucket that refills continuously at `refill_rate` tokens
//! per second, capped at `capacity`. A granted request spends its cost
//! (default 1 token). The only algorithm here that admits bursts up to
//! capacity and supports variable-cost requests.
use std::sync::Arc;

use super::{lock_entry, now_millis, KeyedState, RateLimiter};
use crate::error::Result;
use crate::settings::LimiterSettings;

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: i64,
}

pub struct TokenBucketLimiter {
    settings: LimiterSettings,
    buckets: Arc<KeyedState<Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            settings,
            buckets: Arc::new(KeyedState::new()),
        }
    }

    fn new_bucket(&self, now: i64) -> Bucket {
        Bucket {
            tokens: f64::from(self.settings.capacity),
            last_update: now,
        }
    }

    /// Add tokens for the time elapsed since the last update, capped at
    /// capacity. Keeps `0 <= tokens <= capacity`.
    fn refill(&self, bucket: &mut Bucket, now: i64) {
        let elapsed_secs = (now - bucket.last_update).max(0) as f64 / 1000.0;
        let refilled = bucket.tokens + elapsed_secs * self.settings.refill_rate;
        bucket.tokens = refilled.min(f64::from(self.settings.capacity));
        bucket.last_update = now;
    }

    /// Admission with an explicit cost. Spends `tokens_needed` iff the
    /// bucket holds at least that many; a denial spends nothing.
    pub fn allow_request_weighted(&self, key: &str, tokens_needed: f64) -> Result<bool> {
        let now = now_millis();
        let entry = self
            .buckets
            .entry_or_insert_with(key, || self.new_bucket(now))?;
        let mut bucket = lock_entry(&entry)?;
        self.refill(&mut bucket, now);

        if bucket.tokens >= tokens_needed {
            bucket.tokens -= tokens_needed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Seconds until at least one full token is available, 0 if one already is
    pub fn get_wait_time(&self, key: &str) -> Result<f64> {
        let now = now_millis();
        let entry = self
            .buckets
            .entry_or_insert_with(key, || self.new_bucket(now))?;
        let mut bucket = lock_entry(&entry)?;
        self.refill(&mut bucket, now);

        if bucket.tokens >= 1.0 {
            Ok(0.0)
        } else {
            Ok((1.0 - bucket.tokens) / self.settings.refill_rate)
        }
    }

    /// Whole tokens currently available for `key`
    pub fn available_tokens(&self, key: &str) -> Result<u32> {
        let now = now_millis();
        let entry = self
            .buckets
            .entry_or_insert_with(key, || self.new_bucket(now))?;
        let mut bucket = lock_entry(&entry)?;
        self.refill(&mut bucket, now);
        Ok(bucket.tokens.trunc().clamp(0.0, f64::from(u32::MAX)) as u32)
    }

    pub fn tracked_keys(&self) -> Result<usize> {
        self.buckets.len()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn allow_request(&self, key: &str) -> Result<bool> {
        self.allow_request_weighted(key, 1.0)
    }

    fn remaining_requests(&self, key: &str) -> Result<u32> {
        self.available_tokens(key)
    }

    fn retry_after_seconds(&self, key: &str) -> Result<f64> {
        self.get_wait_time(key)
    }

    /// Drop keys whose bucket has refilled to capacity; a full bucket is
    /// indistinguishable from one created on the next request
    fn expire_keys(&self) -> Result<usize> {
        let now = now_millis();
        self.buckets.retain(|bucket| {
            self.refill(bucket, now);
            bucket.tokens < f64::from(self.settings.capacity)
        })
    }
}
