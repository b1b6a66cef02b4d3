//! Fixed window admission control.
//!
//! Time is divided into epoch-aligned windows of `window_seconds`; each key
//! carries a counter that resets when the clock crosses into a new window.
//! Simple and memory-cheap, but a client can be admitted up to
//! `2 * max_requests` times in a short span straddling a window boundary.
//! Callers who care about that burst should use the sliding window instead.
use std::sync::Arc;

use super::{lock_entry, now_millis, KeyedState, RateLimiter};
use crate::error::Result;
use crate::settings::LimiterSettings;

#[derive(Clone, Debug)]
struct Window {
    start: i64,
    count: u32,
}

pub struct FixedWindowCounter {
    settings: LimiterSettings,
    windows: Arc<KeyedState<Window>>,
}

impl FixedWindowCounter {
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            settings,
            windows: Arc::new(KeyedState::new()),
        }
    }

    /// Epoch-aligned start of the window containing `now`
    fn window_start(&self, now: i64) -> i64 {
        (now / self.settings.window_millis()) * self.settings.window_millis()
    }

    /// Roll the window forward if the clock has crossed a boundary
    fn roll(&self, window: &mut Window, now: i64) {
        let current_start = self.window_start(now);
        if window.start != current_start {
            window.start = current_start;
            window.count = 0;
        }
    }

    pub fn get_remaining_requests(&self, key: &str) -> Result<u32> {
        let now = now_millis();
        let entry = self.windows.entry_or_insert_with(key, || Window {
            start: self.window_start(now),
            count: 0,
        })?;
        let mut window = lock_entry(&entry)?;
        self.roll(&mut window, now);
        Ok(self.settings.max_requests.saturating_sub(window.count))
    }

    pub fn tracked_keys(&self) -> Result<usize> {
        self.windows.len()
    }
}

impl RateLimiter for FixedWindowCounter {
    fn allow_request(&self, key: &str) -> Result<bool> {
        let now = now_millis();
        let entry = self.windows.entry_or_insert_with(key, || Window {
            start: self.window_start(now),
            count: 0,
        })?;
        let mut window = lock_entry(&entry)?;
        self.roll(&mut window, now);

        if window.count < self.settings.max_requests {
            window.count += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remaining_requests(&self, key: &str) -> Result<u32> {
        self.get_remaining_requests(key)
    }

    fn retry_after_seconds(&self, key: &str) -> Result<f64> {
        let now = now_millis();
        let entry = self.windows.entry_or_insert_with(key, || Window {
            start: self.window_start(now),
            count: 0,
        })?;
        let mut window = lock_entry(&entry)?;
        self.roll(&mut window, now);

        if window.count < self.settings.max_requests {
            return Ok(0.0);
        }
        // Quota returns at the next window boundary
        let window_end = window.start + self.settings.window_millis();
        Ok(((window_end - now).max(0)) as f64 / 1000.0)
    }

    /// Drop keys with no activity in the current window
    fn expire_keys(&self) -> Result<usize> {
        let now = now_millis();
        self.windows.retain(|window| {
            self.roll(window, now);
            window.count > 0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{self, Duration};

    fn small_window() -> FixedWindowCounter {
        FixedWindowCounter::new(LimiterSettings {
            max_requests: 5,
            window_seconds: 1,
            ..Default::default()
        })
    }

    #[test]
    fn admits_up_to_max_within_window() {
        let limiter = small_window();
        for _ in 0..5 {
            assert!(limiter.allow_request("client").unwrap());
        }
        // 6th request in the same window is rejected without incrementing
        assert!(!limiter.allow_request("client").unwrap());
        assert_eq!(limiter.get_remaining_requests("client").unwrap(), 0);
    }

    #[tokio::test]
    async fn counter_resets_after_window_boundary() {
        let limiter = small_window();
        for _ in 0..5 {
            assert!(limiter.allow_request("client").unwrap());
        }
        assert!(!limiter.allow_request("client").unwrap());

        // Wait past the epoch-aligned boundary; a fresh window admits again
        time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow_request("client").unwrap());
        assert_eq!(limiter.get_remaining_requests("client").unwrap(), 4);
    }

    #[test]
    fn remaining_recomputes_window_first() {
        let limiter = small_window();
        assert_eq!(limiter.get_remaining_requests("fresh").unwrap(), 5);
        assert!(limiter.allow_request("fresh").unwrap());
        assert_eq!(limiter.get_remaining_requests("fresh").unwrap(), 4);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = small_window();
        for _ in 0..5 {
            assert!(limiter.allow_request("a").unwrap());
        }
        assert!(!limiter.allow_request("a").unwrap());
        assert!(limiter.allow_request("b").unwrap());
        assert_eq!(limiter.tracked_keys().unwrap(), 2);
    }

    #[tokio::test]
    async fn expire_keys_drops_stale_windows() {
        let limiter = small_window();
        assert!(limiter.allow_request("early").unwrap());

        time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow_request("late").unwrap());
        assert_eq!(limiter.tracked_keys().unwrap(), 2);

        // "early" rolled into an empty window; "late" is still counting
        assert_eq!(limiter.expire_keys().unwrap(), 1);
        assert_eq!(limiter.tracked_keys().unwrap(), 1);
        assert_eq!(limiter.get_remaining_requests("late").unwrap(), 4);
    }

    #[test]
    fn retry_after_is_zero_with_quota_left() {
        let limiter = small_window();
        assert_eq!(limiter.retry_after_seconds("client").unwrap(), 0.0);
        for _ in 0..5 {
            limiter.allow_request("client").unwrap();
        }
        let wait = limiter.retry_after_seconds("client").unwrap();
        assert!(wait > 0.0);
        assert!(wait <= 1.0);
    }
}
