/*!
 * Minimum spacing between consecutive provider calls.
 */

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between calls
///
/// The interval is the larger of the fixed delay and the spacing implied by
/// a requests-per-minute limit. Callers wait in turn; the first call passes
/// immediately.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay_ms: u64, rpm: Option<u32>) -> Self {
        Self::with_interval(Self::interval_for(delay_ms, rpm))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// `max(delay_ms, 60000 / rpm)`
    pub fn interval_for(delay_ms: u64, rpm: Option<u32>) -> Duration {
        let from_rpm = match rpm {
            Some(rpm) if rpm > 0 => 60_000 / u64::from(rpm),
            _ => 0,
        };
        Duration::from_millis(delay_ms.max(from_rpm))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call may start, then claim the slot
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready = last + self.interval;
            if ready > Instant::now() {
                tokio::time::sleep_until(ready).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
