//! Token-bucket rate limiting for outbound deliveries

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum burst size.
    pub burst: u32,
    /// Steady-state refill rate, tokens per second.
    pub per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 3 deliveries/second with a burst of 5, shared by all workers.
        Self { burst: 5, per_second: 3.0 }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket shared by the worker pool. Every delivery attempt reserves
/// exactly one token; when the bucket is empty the limiter advertises how
/// long to wait for the next token.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: config.burst as f64,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Reserve one token, or report how long until one is available.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.per_second)
            .min(self.config.burst as f64);
        state.refilled_at = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.config.per_second))
        }
    }

    /// Reserve one token, sleeping out the advertised delay as needed.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_limited() {
        let limiter = RateLimiter::new(RateLimitConfig { burst: 5, per_second: 3.0 });

        for _ in 0..5 {
            assert!(limiter.try_acquire().await.is_ok());
        }

        let wait = limiter.try_acquire().await.unwrap_err();
        assert!(wait > Duration::ZERO);
        // One token refills in 1/3 s.
        assert!(wait <= Duration::from_secs_f64(1.0 / 3.0 + 0.01));
    }

    #[tokio::test]
    async fn refills_over_time() {
        tokio::time::pause();
        let limiter = RateLimiter::new(RateLimitConfig { burst: 2, per_second: 2.0 });

        assert!(limiter.try_acquire().await.is_ok());
        assert!(limiter.try_acquire().await.is_ok());
        assert!(limiter.try_acquire().await.is_err());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn acquire_waits_instead_of_failing() {
        tokio::time::pause();
        let limiter = RateLimiter::new(RateLimitConfig { burst: 1, per_second: 10.0 });

        limiter.acquire().await;
        // Bucket is empty; acquire should sleep ~100ms and then succeed.
        limiter.acquire().await;
    }
}
