//! Minimum spacing between requests to one provider.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Enforces a fixed interval between consecutive request starts.
///
/// The clock is advanced by every `wait`, whether the request that follows
/// succeeds or not.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the interval since the previous request has passed.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let ready_at = last + self.interval;
            if ready_at > Instant::now() {
                trace!(delay_ms = (ready_at - Instant::now()).as_millis() as u64, "Throttling");
                sleep_until(ready_at).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
