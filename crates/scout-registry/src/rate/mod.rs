//! Sliding-window request budget

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use scout_core::error::ScoutError;
use crate::clock::{Clock, TokioClock};
use crate::RegistryResult;

/// Outcome of a successful admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Instant recorded in the window for this request
    pub at: Instant,
    /// Total time spent suspended before a slot was free
    pub waited: Duration,
}

/// Point-in-time view of the local budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetSnapshot {
    /// Maximum requests per window
    pub limit: usize,
    /// Slots used in the trailing window
    pub used: usize,
    /// Slots available right now
    pub remaining: usize,
    /// Time until the oldest recorded slot leaves the window
    pub next_release: Option<Duration>,
}

/// Limits upstream calls to `max_requests` per trailing `window`.
///
/// The timestamp sequence is guarded by one lock which is never held across
/// an await, so a cancelled waiter leaves the window untouched.
#[derive(Debug)]
pub struct RateBudget {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateBudget {
    /// Create budget driven by the tokio timer
    pub fn new(max_requests: u32, window: Duration) -> RegistryResult<Self> {
        Self::with_clock(max_requests, window, Arc::new(TokioClock))
    }

    /// Create budget with an explicit clock
    pub fn with_clock(
        max_requests: u32,
        window: Duration,
        clock: Arc<dyn Clock>,
    ) -> RegistryResult<Self> {
        if max_requests == 0 {
            return Err(ScoutError::ConfigValidation {
                field: "rate_limit_requests".to_string(),
                reason: "must allow at least one request per window".to_string(),
            });
        }
        if window.is_zero() {
            return Err(ScoutError::ConfigValidation {
                field: "rate_limit_window_seconds".to_string(),
                reason: "window must be longer than zero".to_string(),
            });
        }

        Ok(Self {
            max_requests: max_requests as usize,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
            clock,
        })
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a slot is free, then record it
    pub async fn admit(&self) -> Admission {
        let mut waited = Duration::ZERO;

        loop {
            match self.try_admit() {
                Ok(at) => return Admission { at, waited },
                Err(wait) => {
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        limit = self.max_requests,
                        "rate budget exhausted, waiting for a slot"
                    );
                    self.clock.sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }

    /// Record a slot if one is free, otherwise return how long until one frees up
    pub fn try_admit(&self) -> Result<Instant, Duration> {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock();
        self.prune(&mut timestamps, now);

        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            return Ok(now);
        }

        // Non-empty: max_requests >= 1 and the window is full.
        let oldest = timestamps[0];
        Err(self.window - now.duration_since(oldest))
    }

    /// Current usage of the trailing window
    pub fn snapshot(&self) -> BudgetSnapshot {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock();
        self.prune(&mut timestamps, now);

        BudgetSnapshot {
            limit: self.max_requests,
            used: timestamps.len(),
            remaining: self.max_requests - timestamps.len(),
            next_release: timestamps
                .front()
                .map(|oldest| self.window - now.duration_since(*oldest)),
        }
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests;
