//! Fixed-window rate limiting for throttled routes.
//!
//! Counters are keyed by (client key, route name). The client key is the
//! principal id when authenticated, otherwise the client address.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::AppError;
use crate::observability::metrics;
use crate::routing::guards::RateLimit;

/// A single counting window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Counter state after a permitted hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

/// A hit refused because the window budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after: Duration,
}

impl From<RateLimitExceeded> for AppError {
    fn from(e: RateLimitExceeded) -> Self {
        AppError::TooManyAttempts {
            retry_after: e.retry_after,
        }
    }
}

/// Shared limiter state. Cloning shares the counters.
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<DashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt for `key` on `route`.
    ///
    /// The entry guard holds the shard lock, so the reset, compare and
    /// increment happen atomically for that key.
    pub fn hit(
        &self,
        key: &str,
        route: &str,
        limit: RateLimit,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let now = Instant::now();
        let window = limit.window();

        let mut entry = self
            .windows
            .entry((key.to_string(), route.to_string()))
            .or_insert(Window {
                started: now,
                hits: 0,
            });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }

        if entry.hits >= limit.max_attempts {
            let retry_after = window.saturating_sub(now.saturating_duration_since(entry.started));
            tracing::warn!(client = %key, route = %route, "Rate limit exceeded");
            metrics::record_rate_limited(route);
            return Err(RateLimitExceeded {
                limit: limit.max_attempts,
                retry_after,
            });
        }

        entry.hits += 1;
        Ok(RateLimitStatus {
            limit: limit.max_attempts,
            remaining: limit.max_attempts - entry.hits,
        })
    }

    /// Drop windows older than `max_window`. Returns how many were removed.
    pub fn prune(&self, max_window: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < max_window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIX_PER_MINUTE: RateLimit = RateLimit {
        max_attempts: 6,
        per_minutes: 1,
    };

    #[tokio::test(start_paused = true)]
    async fn test_seventh_attempt_rejected_until_window_passes() {
        let limiter = RateLimiter::new();

        for attempt in 1..=6 {
            let status = limiter.hit("user:1", "verification.resend", SIX_PER_MINUTE).unwrap();
            assert_eq!(status.remaining, 6 - attempt);
        }

        tokio::time::advance(Duration::from_secs(20)).await;
        let err = limiter
            .hit("user:1", "verification.resend", SIX_PER_MINUTE)
            .unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(40)).await;
        let status = limiter.hit("user:1", "verification.resend", SIX_PER_MINUTE).unwrap();
        assert_eq!(status.remaining, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_and_routes_are_isolated() {
        let limiter = RateLimiter::new();
        let one = RateLimit {
            max_attempts: 1,
            per_minutes: 1,
        };

        assert!(limiter.hit("user:1", "a", one).is_ok());
        assert!(limiter.hit("user:1", "a", one).is_err());
        assert!(limiter.hit("user:2", "a", one).is_ok());
        assert!(limiter.hit("user:1", "b", one).is_ok());
        assert_eq!(limiter.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_removes_stale_windows() {
        let limiter = RateLimiter::new();
        limiter.hit("ip:10.0.0.1", "a", SIX_PER_MINUTE).unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.hit("ip:10.0.0.2", "a", SIX_PER_MINUTE).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(limiter.prune(Duration::from_secs(60)), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_hits_respect_budget() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            max_attempts: 50,
            per_minutes: 1,
        };

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            tasks.push(tokio::spawn(async move {
                (0..20)
                    .filter(|_| limiter.hit("shared", "r", limit).is_ok())
                    .count()
            }));
        }

        let mut allowed = 0;
        for task in tasks {
            allowed += task.await.unwrap();
        }
        assert_eq!(allowed, 50);
    }
}
