//! Sliding-window rate limiting.
//!
//! # Responsibilities
//! - Admit at most `max_requests` per key within a trailing `window_ms`
//! - Report how long a rejected caller should wait
//! - Purge keys with no in-window records on a periodic task
//!
//! # Design Decisions
//! - Per-key records live in a `DashMap`; each key's deque is locked only
//!   for the duration of one check
//! - A record is expired once its age reaches the window length
//! - The limiter signals, it never sleeps or retries on the caller's behalf

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::{RdapError, Result};
use crate::lifecycle::PeriodicTask;
use crate::observability::metrics;

/// One admitted burst of requests.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    timestamp: Instant,
    count: u32,
}

/// Read-only usage snapshot for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitUsage {
    /// Requests counted in the current window.
    pub current: u32,
    /// Configured maximum.
    pub limit: u32,
    /// Requests still admissible right now.
    pub remaining: u32,
    /// When the oldest counted request leaves the window. `now` when nothing
    /// is counted or the window runs past the clock's range.
    pub reset_at: Instant,
}

/// Per-key sliding window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, VecDeque<WindowRecord>>>,
    config: RateLimitConfig,
    cleanup: Mutex<Option<PeriodicTask>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            config,
            cleanup: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Admit one request for `key`, or fail with the time until a slot frees up.
    pub fn check_limit(&self, key: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = Instant::now();
        let window = self.config.window();
        let mut records = self.windows.entry(key.to_string()).or_default();
        prune(&mut records, now, window);

        let current: u32 = records.iter().map(|r| r.count).sum();
        if current >= self.config.max_requests {
            let oldest = records.front().map_or(now, |r| r.timestamp);
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            drop(records);

            metrics::record_rate_limited();
            tracing::warn!(key, current, retry_after = ?retry_after, "Rate limit exceeded");
            return Err(RdapError::RateLimited {
                key: key.to_string(),
                retry_after,
            });
        }

        records.push_back(WindowRecord {
            timestamp: now,
            count: 1,
        });
        Ok(())
    }

    /// Usage for `key` without recording anything.
    pub fn get_usage(&self, key: &str) -> RateLimitUsage {
        let now = Instant::now();
        let limit = self.config.max_requests;
        if !self.config.enabled {
            return RateLimitUsage {
                current: 0,
                limit,
                remaining: limit,
                reset_at: now,
            };
        }

        let window = self.config.window();
        let (current, oldest) = self.windows.get(key).map_or((0, None), |records| {
            let live = records.iter().filter(|r| is_live(r, now, window));
            let oldest = live.clone().next().map(|r| r.timestamp);
            (live.map(|r| r.count).sum::<u32>(), oldest)
        });

        RateLimitUsage {
            current,
            limit,
            remaining: limit.saturating_sub(current),
            reset_at: oldest
                .and_then(|t| t.checked_add(window))
                .unwrap_or(now),
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop keys with no in-window records. Returns how many keys were removed.
    pub fn cleanup(&self) -> usize {
        purge_stale(&self.windows, self.config.window())
    }

    /// Start the periodic stale-key purge. Replaces a running purge.
    pub fn start_cleanup(&self) {
        if !self.config.enabled || self.config.cleanup_interval_secs == 0 {
            return;
        }
        let windows = Arc::clone(&self.windows);
        let window = self.config.window();
        let task = PeriodicTask::spawn(
            "rate-limit-cleanup",
            Duration::from_secs(self.config.cleanup_interval_secs),
            move || {
                let removed = purge_stale(&windows, window);
                if removed > 0 {
                    tracing::debug!(removed, "Purged idle rate limit keys");
                }
            },
        );
        *self.cleanup.lock() = Some(task);
    }

    /// Stop the periodic purge.
    pub fn destroy(&self) {
        if let Some(mut task) = self.cleanup.lock().take() {
            task.stop();
        }
    }
}

fn is_live(record: &WindowRecord, now: Instant, window: Duration) -> bool {
    now.duration_since(record.timestamp) < window
}

/// Records are appended in time order, so expired ones are always at the front.
fn prune(records: &mut VecDeque<WindowRecord>, now: Instant, window: Duration) {
    while records.front().is_some_and(|r| !is_live(r, now, window)) {
        records.pop_front();
    }
}

fn purge_stale(windows: &DashMap<String, VecDeque<WindowRecord>>, window: Duration) -> usize {
    let now = Instant::now();
    let before = windows.len();
    windows.retain(|_, records| {
        prune(records, now, window);
        !records.is_empty()
    });
    before.saturating_sub(windows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            max_requests,
            window_ms,
            cleanup_interval_secs: 60,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_request_rejected_within_window() {
        let limiter = limiter(2, 1000);
        limiter.check_limit("rdap.example").unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        limiter.check_limit("rdap.example").unwrap();
        tokio::time::advance(Duration::from_millis(300)).await;

        let err = limiter.check_limit("rdap.example").unwrap_err();
        match err {
            RdapError::RateLimited { retry_after, .. } => {
                assert!(retry_after <= Duration::from_millis(1000));
                assert_eq!(retry_after, Duration::from_millis(500));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_after_window_elapses() {
        let limiter = limiter(2, 1000);
        limiter.check_limit("k").unwrap();
        limiter.check_limit("k").unwrap();
        assert!(limiter.check_limit("k").is_err());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(limiter.check_limit("k").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_are_not_recorded() {
        let limiter = limiter(1, 1000);
        limiter.check_limit("k").unwrap();
        for _ in 0..5 {
            assert!(limiter.check_limit("k").is_err());
        }
        assert_eq!(limiter.get_usage("k").current, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 1000);
        limiter.check_limit("a").unwrap();
        limiter.check_limit("b").unwrap();
        assert!(limiter.check_limit("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_does_not_mutate() {
        let limiter = limiter(3, 1000);
        limiter.check_limit("k").unwrap();
        let start = Instant::now();

        let usage = limiter.get_usage("k");
        assert_eq!(usage.current, 1);
        assert_eq!(usage.remaining, 2);
        assert_eq!(usage.limit, 3);
        assert_eq!(usage.reset_at, start + Duration::from_millis(1000));
        assert_eq!(limiter.get_usage("k"), usage);

        let unknown = limiter.get_usage("other");
        assert_eq!(unknown.current, 0);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_with_unrepresentable_window() {
        let limiter = limiter(1, u64::MAX);
        limiter.check_limit("k").unwrap();
        assert!(limiter.check_limit("k").is_err());

        let usage = limiter.get_usage("k");
        assert_eq!(usage.current, 1);
        assert_eq!(usage.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_always_admits() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            max_requests: 1,
            ..RateLimitConfig::default()
        });
        for _ in 0..10 {
            limiter.check_limit("k").unwrap();
        }
        let usage = limiter.get_usage("k");
        assert_eq!(usage.remaining, usage.limit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_purges_idle_keys() {
        let limiter = limiter(5, 1000);
        limiter.check_limit("old").unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        limiter.check_limit("fresh").unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: true,
            max_requests: 5,
            window_ms: 1000,
            cleanup_interval_secs: 60,
        });
        limiter.check_limit("k").unwrap();
        limiter.start_cleanup();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.tracked_keys(), 0);
        limiter.destroy();
    }
}
