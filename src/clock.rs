//! Monotonic millisecond clock.
//!
//! The hardware exposes a free-running 32-bit millisecond counter that
//! wraps roughly every 49.7 days.  [`MonotonicClock`] folds that counter
//! into a 64-bit timestamp that never goes backwards, so the scheduler
//! and the flood timeout can compare deadlines with plain `<=`.
//!
//! ```text
//!   raw ticks   … 0xFFFF_FFF0 ─ 0xFFFF_FFFF ─ 0x0000_0005 …
//!                                 │ wrap │
//!   Instant     … T ─────────────── T+15 ────── T+21 …
//! ```
//!
//! The logical epoch starts one year in, so no reachable timestamp is
//! ever zero.
//!
//! ## Polling contract
//!
//! [`MonotonicClock::now`] must be called at least once per wrap period
//! of the raw counter.  Two wraps between consecutive calls cannot be
//! told apart from one and the elapsed time is under-counted.

use core::ops::Add;
use core::time::Duration;

/// Offset of the logical epoch: one year of milliseconds.
pub const EPOCH_OFFSET_MS: u64 = 31_536_000_000;

// ───────────────────────────────────────────────────────────────
// Tick source port
// ───────────────────────────────────────────────────────────────

/// Free-running hardware millisecond counter.
///
/// Implementations return the raw counter value, which is allowed to wrap
/// from `u32::MAX` back to zero.
pub trait TickSource {
    fn millis(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Instant
// ───────────────────────────────────────────────────────────────

/// A point on the monotonic timeline, in milliseconds since the logical epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(u64);

impl Instant {
    /// The first instant a fresh clock reports.
    pub const EPOCH: Self = Self(EPOCH_OFFSET_MS);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Instant(self.0.saturating_add(ms))
    }
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Milliseconds elapsed between two raw counter readings, assuming at most
/// one wrap in between.
pub const fn wrapping_elapsed(last: u32, current: u32) -> u64 {
    if current < last {
        (u32::MAX - last) as u64 + 1 + current as u64
    } else {
        (current - last) as u64
    }
}

/// Folds a wrapping 32-bit counter into a non-decreasing [`Instant`].
pub struct MonotonicClock<T> {
    ticks: T,
    last_raw: u32,
    now: Instant,
}

impl<T: TickSource> MonotonicClock<T> {
    /// Create a clock at [`Instant::EPOCH`].
    ///
    /// The raw counter is treated as having started at zero, so the
    /// first [`now`](Self::now) includes whatever uptime the counter
    /// already shows.
    pub fn new(ticks: T) -> Self {
        Self {
            ticks,
            last_raw: 0,
            now: Instant::EPOCH,
        }
    }

    /// Sample the counter, advance the accumulated total, and return it.
    pub fn now(&mut self) -> Instant {
        let raw = self.ticks.millis();
        let elapsed = wrapping_elapsed(self.last_raw, raw);
        self.now = Instant(self.now.0 + elapsed);
        self.last_raw = raw;
        self.now
    }

    /// The value returned by the most recent [`now`](Self::now), without
    /// sampling the counter.
    pub fn last(&self) -> Instant {
        self.now
    }
}
