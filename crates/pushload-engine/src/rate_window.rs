//! Fixed-window request quota with an injectable clock.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Time source for throttling and polling waits.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Deterministic clock: `sleep` returns immediately after advancing time
/// and recording the requested duration.
///
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    state: Arc<Mutex<ManualState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        self.lock().elapsed += by;
    }

    /// Time passed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}

/// Rolling request counter: at most `quota` acquisitions per `window`.
///
/// The window restarts when the quota is used up or the duration has passed.
/// Only one caller drives it; concurrent use needs external serialization.
#[derive(Debug)]
pub struct RateWindow<C> {
    clock: C,
    quota: u32,
    window: Duration,
    started: Instant,
    count: u32,
    throttled: u32,
    total_wait: Duration,
}

impl<C: Clock> RateWindow<C> {
    pub fn new(clock: C, quota: u32, window: Duration) -> Self {
        let started = clock.now();
        Self {
            clock,
            quota: quota.max(1),
            window,
            started,
            count: 0,
            throttled: 0,
            total_wait: Duration::ZERO,
        }
    }

    /// Take one slot, waiting out the rest of the window when the quota is
    /// spent. Returns the time slept.
    pub async fn acquire(&mut self) -> Duration {
        let elapsed = self.clock.now().saturating_duration_since(self.started);
        if elapsed <= self.window && self.count < self.quota {
            self.count += 1;
            return Duration::ZERO;
        }

        let wait = self.window.saturating_sub(elapsed);
        if !wait.is_zero() {
            #[allow(clippy::cast_possible_truncation)]
            let wait_ms = wait.as_millis() as u64;
            tracing::info!(
                wait_ms,
                requests = self.count,
                quota = self.quota,
                "Rate window exhausted, waiting"
            );
            self.clock.sleep(wait).await;
            self.throttled += 1;
            self.total_wait += wait;
        }
        self.started = self.clock.now();
        self.count = 1;
        wait
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of acquisitions that had to sleep.
    pub fn throttled(&self) -> u32 {
        self.throttled
    }

    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = clock.now();
        other.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - before, Duration::from_secs(5));
        block_on(other.sleep(Duration::from_secs(2)));
        assert_eq!(clock.elapsed(), Duration::from_secs(7));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn quota_within_window_never_sleeps() {
        block_on(async {
            let clock = ManualClock::new();
            let mut window = RateWindow::new(clock.clone(), 3, Duration::from_secs(60));
            for _ in 0..3 {
                assert_eq!(window.acquire().await, Duration::ZERO);
                clock.advance(Duration::from_secs(1));
            }
            assert_eq!(window.count(), 3);
            assert!(clock.sleeps().is_empty());
        });
    }

    #[test]
    fn call_past_quota_sleeps_remaining_window() {
        block_on(async {
            let clock = ManualClock::new();
            let mut window = RateWindow::new(clock.clone(), 2, Duration::from_secs(60));
            window.acquire().await;
            clock.advance(Duration::from_secs(10));
            window.acquire().await;
            clock.advance(Duration::from_secs(5));

            let slept = window.acquire().await;
            assert_eq!(slept, Duration::from_secs(45));
            assert_eq!(window.count(), 1);
            assert_eq!(window.throttled(), 1);
            assert_eq!(clock.sleeps(), vec![Duration::from_secs(45)]);
        });
    }

    #[test]
    fn expired_window_resets_without_sleeping() {
        block_on(async {
            let clock = ManualClock::new();
            let mut window = RateWindow::new(clock.clone(), 5, Duration::from_secs(60));
            window.acquire().await;
            window.acquire().await;
            clock.advance(Duration::from_secs(61));
            assert_eq!(window.acquire().await, Duration::ZERO);
            assert_eq!(window.count(), 1);
            assert_eq!(window.throttled(), 0);
        });
    }

    #[test]
    fn window_restarts_after_sleep() {
        block_on(async {
            let clock = ManualClock::new();
            let mut window = RateWindow::new(clock.clone(), 1, Duration::from_secs(10));
            window.acquire().await;
            assert_eq!(window.acquire().await, Duration::from_secs(10));
            assert_eq!(window.acquire().await, Duration::from_secs(10));
            assert_eq!(window.total_wait(), Duration::from_secs(20));
            assert_eq!(clock.elapsed(), Duration::from_secs(20));
        });
    }
}
