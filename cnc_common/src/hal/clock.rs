//! Monotonic tick clock and bounded busy-wait.
//!
//! Scan functions never sleep. The two timing-critical waits in the driver
//! layer (reset-pulse dwell, ADC settling) compare an explicit [`Deadline`]
//! against a [`TickClock`], spinning for at most a bounded number of polls.

/// Monotonic hardware tick counter.
pub trait TickClock: Send {
    /// Current tick count. Never decreases.
    fn ticks(&self) -> u64;

    /// Tick rate in ticks per second.
    fn ticks_per_sec(&self) -> u64;

    /// Convert nanoseconds to ticks, rounding up.
    fn ns_to_ticks(&self, ns: u64) -> u64 {
        let tps = u128::from(self.ticks_per_sec());
        ((u128::from(ns) * tps).div_ceil(1_000_000_000)) as u64
    }

    /// Convert ticks to nanoseconds, rounding down.
    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        let tps = u128::from(self.ticks_per_sec().max(1));
        ((u128::from(ticks) * 1_000_000_000) / tps) as u64
    }
}

impl<C: TickClock + ?Sized> TickClock for Box<C> {
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }
    fn ticks_per_sec(&self) -> u64 {
        (**self).ticks_per_sec()
    }
}

/// An absolute point on a [`TickClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(pub u64);

impl Deadline {
    /// Deadline `dwell_ticks` after `start`.
    pub const fn after(start: u64, dwell_ticks: u64) -> Self {
        Self(start.saturating_add(dwell_ticks))
    }

    /// Whether the deadline has been reached at `now`.
    #[inline]
    pub const fn reached(self, now: u64) -> bool {
        now >= self.0
    }

    /// Ticks left until the deadline, zero once reached.
    #[inline]
    pub const fn remaining(self, now: u64) -> u64 {
        self.0.saturating_sub(now)
    }
}

/// Spin until `deadline` or until `max_polls` clock reads have been made.
///
/// Returns the tick count at which the deadline was observed reached, or
/// `None` if the poll budget ran out first.
pub fn spin_until<C: TickClock + ?Sized>(clock: &C, deadline: Deadline, max_polls: u32) -> Option<u64> {
    for _ in 0..max_polls {
        let now = clock.ticks();
        if deadline.reached(now) {
            return Some(now);
        }
        std::hint::spin_loop();
    }
    let now = clock.ticks();
    deadline.reached(now).then_some(now)
}
