//! Cached reciprocal of an operator-settable scale.

use cnc_common::consts::{DEFAULT_SCALE, SCALE_EPSILON};

/// Reciprocal of a scale parameter, recomputed only when the scale changes.
///
/// The scan path multiplies by [`ScaleCache::recip`] instead of dividing by
/// the scale every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCache {
    prev: f64,
    recip: f64,
}

impl ScaleCache {
    /// Cache primed for `scale` (substituted if unusable).
    pub fn new(scale: f64) -> Self {
        let mut cache = Self { prev: f64::NAN, recip: 1.0 };
        cache.update(scale);
        cache
    }

    /// Refresh against the current parameter value.
    ///
    /// Returns `Some(substitute)` when `scale` was unusable (near zero or
    /// not finite) and the default was used instead, so the caller can
    /// write it back to the parameter.
    #[inline]
    pub fn update(&mut self, scale: f64) -> Option<f64> {
        // NaN != NaN, so a NaN parameter is re-examined (and replaced) every call.
        if scale == self.prev {
            return None;
        }
        let (effective, substituted) = if scale.is_finite() && scale.abs() >= SCALE_EPSILON {
            (scale, None)
        } else {
            (DEFAULT_SCALE, Some(DEFAULT_SCALE))
        };
        self.prev = effective;
        self.recip = 1.0 / effective;
        substituted
    }

    /// Current reciprocal.
    #[inline]
    pub fn recip(&self) -> f64 {
        self.recip
    }

    /// Scale the reciprocal was computed from.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.prev
    }
}
