//! Counter reconstruction for channels narrower than their logical range.
//!
//! Hardware counters and transport fields often carry only the low `n` bits
//! of a value the host tracks at full width. [`extend`] recovers the full
//! value by picking the congruent candidate nearest the previous one, which
//! is correct as long as the true value moves by less than half a period
//! between samples.

/// Reconstruct a full-range value from a truncated low-order sample.
///
/// Returns the value congruent to `newlow` modulo `2^nbits` that is closest
/// to `old`. Ties (exactly half a period away) resolve to the direct
/// candidate.
///
/// `nbits` must be in `1..=63`; `newlow` is masked to `nbits`.
///
/// ```
/// use cnc_common::rollover::extend;
///
/// assert_eq!(extend(130, 3, 8), 3);
/// assert_eq!(extend(250, 3, 8), 259);
/// assert_eq!(extend(5, 250, 8), -6);
/// ```
#[inline]
pub fn extend(old: i64, newlow: u64, nbits: u32) -> i64 {
    debug_assert!(nbits > 0 && nbits < 64);
    let period: i64 = 1i64 << nbits;
    let mask = period - 1;
    let newlow = (newlow as i64) & mask;
    let oldlow = old & mask;

    let candidate = (old & !mask) | newlow;
    let twin = if oldlow < newlow {
        candidate.wrapping_sub(period)
    } else {
        candidate.wrapping_add(period)
    };

    let d_candidate = old.wrapping_sub(candidate).unsigned_abs();
    let d_twin = old.wrapping_sub(twin).unsigned_abs();
    if d_twin < d_candidate { twin } else { candidate }
}

/// Sign-extend the low `bits` of `raw` to a full `i32`.
///
/// `bits` must be in `1..=32`.
#[inline]
pub const fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_picks_nearest_candidate() {
        // 130 with period 256: candidates 3 (|127|) and 259 (|129|).
        assert_eq!(extend(130, 3, 8), 3);
        // 250 just below the wrap: 259 is 9 away, 3 is 247 away.
        assert_eq!(extend(250, 3, 8), 259);
    }

    #[test]
    fn extend_wraps_backwards() {
        assert_eq!(extend(5, 250, 8), -6);
        assert_eq!(extend(-6, 4, 8), 4);
        assert_eq!(extend(256, 255, 8), 255);
    }

    #[test]
    fn extend_tracks_across_many_periods() {
        let mut full = 0i64;
        let mut truth = 0i64;
        for _ in 0..2000 {
            truth += 97;
            full = extend(full, truth as u64 & 0xFFF, 12);
            assert_eq!(full, truth);
        }
        for _ in 0..4000 {
            truth -= 113;
            full = extend(full, (truth as u64) & 0xFFF, 12);
            assert_eq!(full, truth);
        }
    }

    #[test]
    fn extend_result_is_congruent_and_minimal() {
        for nbits in [1u32, 3, 8, 16, 24] {
            let period = 1i64 << nbits;
            for old in [-1000i64, -1, 0, 1, 77, 1 << 20, -(1 << 22)] {
                for newlow in [0u64, 1, (period / 2) as u64, (period - 1) as u64] {
                    let v = extend(old, newlow, nbits);
                    assert_eq!(v.rem_euclid(period) as u64, newlow);
                    let d = (v - old).abs();
                    assert!(d <= (v - period - old).abs());
                    assert!(d <= (v + period - old).abs());
                }
            }
        }
    }

    #[test]
    fn extend_masks_oversized_sample() {
        assert_eq!(extend(0, 0x1_03, 8), 3);
    }

    #[test]
    fn sign_extend_narrow_fields() {
        assert_eq!(sign_extend(0x7F_FFFF, 24), 8_388_607);
        assert_eq!(sign_extend(0x80_0000, 24), -8_388_608);
        assert_eq!(sign_extend(0xFF_FFFF, 24), -1);
        assert_eq!(sign_extend(0x1FFF, 13), -1);
        assert_eq!(sign_extend(0x0FFF, 13), 4095);
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
    }
}
