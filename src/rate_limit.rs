use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use thiserror::Error;

// Rate window - tracks operations per client key
struct RateWindow {
    count: u32,
    expires_at: Option<Instant>, // window start + window length, None past the clock's range
}

impl RateWindow {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit window must be longer than zero")]
    ZeroWindow,
    #[error("rate limiter must track at least one key")]
    ZeroCapacity,
}

// Outcome of a single admission check.
// `reset` is epoch millis, recomputed as now + window on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

// Fixed-window counter keyed by client identity, bounded by LRU eviction.
// Every call increments the count, rejected ones too, so the limit-th call
// in a window is the first one refused. Per-process, in-memory only.
pub struct RateLimiter {
    windows: Mutex<LruCache<String, RateWindow>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration, tracked_keys: usize) -> Result<Self, RateLimitError> {
        if window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }
        let capacity = NonZeroUsize::new(tracked_keys).ok_or(RateLimitError::ZeroCapacity)?;

        Ok(Self {
            windows: Mutex::new(LruCache::new(capacity)),
            window,
        })
    }

    pub fn check(&self, limit: u32, key: &str) -> RateLimitResult {
        self.check_at(limit, key, Instant::now())
    }

    pub(crate) fn check_at(&self, limit: u32, key: &str, now: Instant) -> RateLimitResult {
        let mut windows = self.windows.lock();

        // live window? bump it in place
        let bumped = match windows.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.count = entry.count.saturating_add(1);
                Some(entry.count)
            }
            _ => None,
        };

        let count = match bumped {
            Some(count) => count,
            None => {
                let fresh = RateWindow {
                    count: 1,
                    expires_at: now.checked_add(self.window),
                };
                if let Some((evicted, _)) = windows.push(key.to_string(), fresh) {
                    if evicted != key {
                        tracing::debug!(evicted = %evicted, "rate limiter full, evicted least recently used key");
                    }
                }
                1
            }
        };
        drop(windows);

        let window_ms = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);

        RateLimitResult {
            success: count < limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset: Utc::now().timestamp_millis().saturating_add(window_ms),
        }
    }

    // Current count for a key, without touching LRU order
    #[cfg(test)]
    pub fn current_count(&self, key: &str) -> Option<u32> {
        let now = Instant::now();
        self.windows
            .lock()
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.count)
    }

    // Resident entries, expired ones included until they are touched or evicted
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
