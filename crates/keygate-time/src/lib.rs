//! Wall-clock access for keygate.
//!
//! Expiry checks and rate-limit windows both read "now" through the [`Clock`]
//! trait so tests can pin and advance time instead of sleeping.
//!
//! # Tiger Style
//!
//! - No `.expect()` or `.unwrap()`: a clock before the Unix epoch reads as 0
//! - Milliseconds as `u64` everywhere

#[cfg(feature = "simulation")]
use std::sync::atomic::AtomicU64;
#[cfg(feature = "simulation")]
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Current Unix timestamp in milliseconds, or 0 if the system clock is before the epoch.
#[inline]
pub fn current_time_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Source of "now" for verification decisions.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds.
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    #[inline]
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Production clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same underlying instant, so a clock handed to the
/// verifier can be advanced from the test body.
///
/// ```ignore
/// use keygate_time::{Clock, SimulatedClock};
///
/// let clock = SimulatedClock::new(1_000);
/// clock.advance_ms(60_000);
/// assert_eq!(clock.now_ms(), 61_000);
/// ```
#[cfg(feature = "simulation")]
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now_ms: Arc<AtomicU64>,
}

#[cfg(feature = "simulation")]
impl SimulatedClock {
    /// Create a clock pinned at `initial_ms`.
    pub fn new(initial_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(initial_ms)),
        }
    }

    /// Create a clock pinned at the current system time.
    pub fn from_system_time() -> Self {
        Self::new(current_time_ms())
    }

    /// Move time forward by `delta_ms`.
    pub fn advance_ms(&self, delta_ms: u64) {
        let _ = self
            .now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(delta_ms)));
    }

    /// Pin time to `time_ms`. Moving backwards is allowed.
    pub fn set_ms(&self, time_ms: u64) {
        self.now_ms.store(time_ms, Ordering::SeqCst);
    }
}

#[cfg(feature = "simulation")]
impl Default for SimulatedClock {
    fn default() -> Self {
        Self::from_system_time()
    }
}

#[cfg(feature = "simulation")]
impl Clock for SimulatedClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_time_ms_reasonable_range() {
        let time = current_time_ms();
        let year_2020_ms = 1_577_836_800_000u64;
        let year_2100_ms = 4_102_444_800_000u64;
        assert!(time > year_2020_ms, "current_time_ms {} should be after year 2020", time);
        assert!(time < year_2100_ms, "current_time_ms {} should be before year 2100", time);
    }

    #[test]
    fn system_clock_tracks_free_function() {
        let before = current_time_ms();
        let now = SystemClock.now_ms();
        assert!(now >= before && now <= before + 50);
    }

    #[test]
    fn arc_clock_delegates() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        assert!(clock.now_ms() > 0);
    }

    #[test]
    fn clocks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemClock>();
    }
}

#[cfg(all(test, feature = "simulation"))]
mod simulation_tests {
    use super::*;

    #[test]
    fn simulated_clock_starts_pinned() {
        let clock = SimulatedClock::new(1_000_000);
        assert_eq!(clock.now_ms(), 1_000_000);
    }

    #[test]
    fn simulated_clock_advance_and_set() {
        let clock = SimulatedClock::new(1_000_000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1_000_500);
        clock.set_ms(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn simulated_clock_clones_share_state() {
        let a = SimulatedClock::new(0);
        let b = a.clone();
        a.advance_ms(42);
        assert_eq!(b.now_ms(), 42);
    }

    #[test]
    fn simulated_clock_advance_saturates() {
        let clock = SimulatedClock::new(u64::MAX - 1);
        clock.advance_ms(10);
        assert_eq!(clock.now_ms(), u64::MAX);
    }
}
