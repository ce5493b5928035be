//! Fixed-window per-address rate limiting

use dashmap::DashMap;
use ipaforge_config::GuardConfig;
use ipaforge_errors::GuardError;
use std::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

/// Caps job-initiating requests per client address within a fixed
/// window. Windows reset wholesale when they lapse; there is no
/// sliding decay.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            limit: config.rate_limit,
            window: config.rate_window(),
            windows: DashMap::new(),
        }
    }

    /// Count one request for `address`.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` once the address has exhausted its
    /// allowance for the current window.
    pub fn check(&self, address: &str) -> Result<(), GuardError> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(address.to_string())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            return Err(GuardError::RateLimited {
                limit: self.limit,
                window_secs: self.window.as_secs(),
            });
        }
        entry.count += 1;
        Ok(())
    }

    /// Drop windows that lapsed, keeping the map bounded by active
    /// clients.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
    }

    #[cfg(test)]
    fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&GuardConfig {
            rate_limit: limit,
            rate_window_secs: window_secs,
            ..GuardConfig::default()
        })
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, 900);
        for _ in 0..3 {
            limiter.check("10.0.0.1").unwrap();
        }
        let err = limiter.check("10.0.0.1").unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
    }

    #[test]
    fn addresses_are_independent() {
        let limiter = limiter(1, 900);
        limiter.check("10.0.0.1").unwrap();
        limiter.check("10.0.0.2").unwrap();
        assert!(limiter.check("10.0.0.1").is_err());
    }

    #[test]
    fn window_resets_after_lapse() {
        let limiter = limiter(1, 0);
        limiter.check("10.0.0.1").unwrap();
        // zero-length window lapses immediately
        limiter.check("10.0.0.1").unwrap();
    }

    #[test]
    fn prune_drops_lapsed_windows() {
        let limiter = limiter(5, 0);
        limiter.check("10.0.0.1").unwrap();
        assert_eq!(limiter.window_count(), 1);
        limiter.prune();
        assert_eq!(limiter.window_count(), 0);
    }
}
