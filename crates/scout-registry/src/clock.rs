//! Time source behind every suspension point of the access layer.
//!
//! Production code uses `TokioClock`; tests drive `ManualClock` so rate waits,
//! backoff sleeps and cache expiry run without real delays.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Injectable clock and timer
#[async_trait]
pub trait Clock: Debug + Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Simulated clock.
///
/// Time only moves through `advance` or `sleep`; a sleep advances the clock by
/// its full duration and then yields so other tasks observe the new time.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.state.lock().offset += duration;
    }

    /// Simulated time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.state.lock().offset
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().offset
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock();
            state.sleeps.push(duration);
            state.offset += duration;
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));

        assert_eq!(clock.now() - start, Duration::from_secs(5));
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_moves_time() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.sleep(Duration::from_millis(1500)).await;
        clock.sleep(Duration::from_millis(500)).await;

        assert_eq!(clock.now() - start, Duration::from_secs(2));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1500), Duration::from_millis(500)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock;
        let start = clock.now();

        clock.sleep(Duration::from_secs(30)).await;

        assert!(clock.now() - start >= Duration::from_secs(30));
    }
}
