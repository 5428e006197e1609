// Cancellable sleeping and retry backoff
use crate::error::{Result, SsoError};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless `cancel` fires first
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SsoError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Exponential backoff with equal jitter, capped at `max`
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Upper bound of the delay before retry number `attempt` (0 based)
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Half of the ceiling is fixed, the other half random
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        half + Duration::from_millis(jitter)
    }
}
