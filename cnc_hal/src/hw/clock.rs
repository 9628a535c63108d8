//! Host monotonic clock.

use cnc_common::hal::clock::TickClock;
use nix::time::{ClockId, clock_gettime};

/// `CLOCK_MONOTONIC` with one tick per nanosecond.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl TickClock for MonotonicClock {
    #[inline]
    fn ticks(&self) -> u64 {
        // CLOCK_MONOTONIC cannot fail on Linux; a zero reading only makes
        // deadlines appear not yet reached.
        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => (ts.tv_sec() as u64)
                .wrapping_mul(1_000_000_000)
                .wrapping_add(ts.tv_nsec() as u64),
            Err(_) => 0,
        }
    }

    fn ticks_per_sec(&self) -> u64 {
        1_000_000_000
    }
}
