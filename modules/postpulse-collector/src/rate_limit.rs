use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use bluesky_client::Pacer;
use postpulse_common::CollectError;

/// Single-slot request pacer: consecutive turns are at least `1 / R` seconds
/// apart. Bursts are never allowed, even after a long idle period.
///
/// The last-grant instant is held under an async mutex for the whole wait, so
/// concurrent callers sharing one collector are served one at a time.
#[derive(Debug)]
pub struct RateLimiter {
    gap: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self, CollectError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(CollectError::Configuration(format!(
                "rate limit must be a positive number of requests per second, got {requests_per_second}"
            )));
        }
        Ok(Self {
            gap: Duration::from_secs_f64(1.0 / requests_per_second),
            last_grant: Mutex::new(None),
        })
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Suspend until the next request may go out, then claim the turn.
    pub async fn wait_turn(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.gap;
            if Instant::now() < ready_at {
                tracing::trace!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "rate limiter waiting");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl Pacer for RateLimiter {
    async fn wait_turn(&self) {
        RateLimiter::wait_turn(self).await
    }
}
