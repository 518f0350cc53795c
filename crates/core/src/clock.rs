// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction.
//!
//! The executor reads wall-clock time for `startedAt`/`finishedAt` stamps
//! and sleeps for retry/repeat intervals. Both go through this trait so
//! tests can advance time deterministically instead of sleeping for real.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstracts "now" and "sleep" so the engine's timing can be tested
/// without real delays.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Sleep for `duration`. On [`FakeClock`] this returns once the fake
    /// clock has been advanced past the deadline.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production clock backed by [`SystemTime`] and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct FakeClockInner {
    now_ms: u64,
}

/// Deterministic clock for tests: `now_ms` only advances when [`FakeClock::advance`]
/// is called, and [`Clock::sleep`] resolves immediately (tests that care about
/// ordering advance the clock themselves and assert on recorded timestamps rather
/// than on wall-clock delay).
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockInner>>,
}

impl FakeClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockInner { now_ms: start_ms })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.inner.lock().now_ms += duration.as_millis() as u64;
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.inner.lock().now_ms
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = FakeClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[tokio::test]
    async fn fake_clock_sleep_advances_time() {
        let clock = FakeClock::new(0);
        clock.sleep(Duration::from_secs(3)).await;
        assert_eq!(clock.now_ms(), 3_000);
    }
}
