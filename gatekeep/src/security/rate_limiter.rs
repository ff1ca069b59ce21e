//! Per-key fixed-window throttle.

use super::errors::{RateLimitError, RateLimiterResult};
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Acquisitions allowed per window
    pub max_attempts: u32,

    /// Window length, starting at the first acquisition
    pub window: Duration,
}

impl RateLimitConfig {
    /// # Errors
    ///
    /// * `RateLimitError::Configuration` - Zero attempts or an empty window
    pub fn new(max_attempts: u32, window: Duration) -> RateLimiterResult<Self> {
        if max_attempts == 0 {
            return Err(RateLimitError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(RateLimitError::Configuration(
                "window must be longer than zero".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            window,
        })
    }

    /// One outbound e-mail per identity every five minutes
    pub fn email() -> Self {
        Self {
            max_attempts: 1,
            window: Duration::from_secs(300),
        }
    }
}

/// Outcome of an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Acquired; `remaining` more are allowed in this window
    Allowed { remaining: u32 },

    /// Throttled for another `retry_after` seconds (rounded up)
    Locked { retry_after: u64 },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            RateLimitResult::Locked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    attempts: u32,
}

struct State {
    windows: HashMap<String, Window>,
    last_sweep: Instant,
}

/// Generic per-key throttle.
///
/// Expired windows are dropped lazily: the touched key on every call, the
/// whole map at most once per window length.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Atomically check `key` and record the attempt if allowed
    ///
    /// # Example
    ///
    /// ```
    /// use gatekeep::security::{RateLimitConfig, RateLimitResult, RateLimiter};
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let limiter = RateLimiter::new(RateLimitConfig::new(2, Duration::from_secs(60)).unwrap());
    /// assert_eq!(limiter.try_acquire("bob"), RateLimitResult::Allowed { remaining: 1 });
    /// assert_eq!(limiter.try_acquire("bob"), RateLimitResult::Allowed { remaining: 0 });
    /// assert!(!limiter.try_acquire("bob").is_allowed());
    /// # }
    /// ```
    pub fn try_acquire(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let window_len = self.config.window;
        let mut state = self.state.lock();

        if now.duration_since(state.last_sweep) >= window_len {
            state
                .windows
                .retain(|_, w| now.duration_since(w.started) < window_len);
            state.last_sweep = now;
        }

        let window = state
            .windows
            .entry(key.to_string())
            .or_insert(Window {
                started: now,
                attempts: 0,
            });

        if now.duration_since(window.started) >= window_len {
            *window = Window {
                started: now,
                attempts: 0,
            };
        }

        if window.attempts >= self.config.max_attempts {
            let left = window_len.saturating_sub(now.duration_since(window.started));
            let retry_after = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            return RateLimitResult::Locked { retry_after };
        }

        window.attempts += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_attempts - window.attempts,
        }
    }

    /// [`RateLimiter::try_acquire`] with a lock mapped to an error
    pub fn acquire(&self, key: &str) -> RateLimiterResult<u32> {
        match self.try_acquire(key) {
            RateLimitResult::Allowed { remaining } => Ok(remaining),
            RateLimitResult::Locked { retry_after } => Err(RateLimitError::Exceeded {
                key: key.to_string(),
                retry_after,
            }),
        }
    }

    /// Whether `key` would be throttled right now, without recording anything
    pub fn is_throttled(&self, key: &str) -> bool {
        let now = Instant::now();
        self.state.lock().windows.get(key).is_some_and(|w| {
            now.duration_since(w.started) < self.config.window
                && w.attempts >= self.config.max_attempts
        })
    }

    pub fn reset(&self, key: &str) {
        self.state.lock().windows.remove(key);
    }

    /// Keys currently tracked, expired ones included until the next sweep
    pub fn tracked(&self) -> usize {
        self.state.lock().windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(max, Duration::from_secs(secs)).unwrap())
    }

    #[test]
    fn test_invalid_config() {
        assert!(RateLimitConfig::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimitConfig::new(1, Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_until_window_expires() {
        let limiter = limiter(3, 60);

        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.try_acquire("bob"),
                RateLimitResult::Allowed { remaining: expected }
            );
        }

        assert_eq!(limiter.try_acquire("bob"), RateLimitResult::Locked { retry_after: 60 });
        assert!(limiter.is_throttled("bob"));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.try_acquire("bob"), RateLimitResult::Locked { retry_after: 30 });

        tokio::time::advance(Duration::from_millis(29_500)).await;
        assert_eq!(limiter.try_acquire("bob"), RateLimitResult::Locked { retry_after: 1 });

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!limiter.is_throttled("bob"));
        assert!(limiter.try_acquire("bob").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 10);
        assert!(limiter.try_acquire("a").is_allowed());
        assert!(!limiter.try_acquire("a").is_allowed());
        assert!(limiter.try_acquire("b").is_allowed());

        limiter.reset("a");
        assert!(limiter.try_acquire("a").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entries_swept() {
        let limiter = limiter(1, 10);
        limiter.try_acquire("a");
        limiter.try_acquire("b");
        assert_eq!(limiter.tracked(), 2);

        tokio::time::advance(Duration::from_secs(11)).await;
        limiter.try_acquire("c");
        assert_eq!(limiter.tracked(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_maps_lock_to_error() {
        let limiter = limiter(1, 5);
        assert_eq!(limiter.acquire("k").unwrap(), 0);
        assert!(matches!(
            limiter.acquire("k"),
            Err(RateLimitError::Exceeded { retry_after: 5, .. })
        ));
    }
}
