//! Minimum spacing between external calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay between consecutive permits.
///
/// Callers queue on an async mutex, so concurrent lookups are serialized
/// in arrival order. Only external calls acquire a permit; cache hits never
/// wait.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter. A zero delay makes [`Self::acquire`] free.
    #[must_use]
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last: Mutex::new(None),
        }
    }

    /// The configured spacing.
    #[must_use]
    pub const fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until at least `min_delay` has passed since the previous
    /// permit, then records a new one.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.min_delay).await;
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_consecutive_permits() {
        let limiter = RateLimiter::new(Duration::from_millis(25));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(75));
    }

    #[tokio::test(start_paused = true)]
    async fn first_permit_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }
}
