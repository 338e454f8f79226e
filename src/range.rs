// SPDX: CC0-1.0

//! Vertical display range for a sampled curve.

use crate::Number;
use core::ops::Range;

/// Upper bound on samples drawn for range estimation, independent of the
/// display sample count.
pub const RANGE_SAMPLES: usize = 400;

/// Fraction of the value span added as padding on each end.
pub const RANGE_PAD: Number = 0.1;

/// Sweep `f` over `domain` and derive a padded vertical range from the
/// finite outputs. Non-finite samples are skipped, not zeroed. Falls back to
/// `-1..1` when nothing finite turns up, and widens a flat range by ±1.
pub fn estimate(
    f: impl Fn(Number) -> Number,
    domain: &Range<Number>,
    sample_cap: usize,
) -> Range<Number> {
    let n = sample_cap.clamp(2, RANGE_SAMPLES);
    let step = (domain.end - domain.start) / (n - 1) as Number;

    let mut min = Number::INFINITY;
    let mut max = Number::NEG_INFINITY;
    for i in 0..n {
        let x = domain.start + step * i as Number;
        let y = f(x);
        if y.is_finite() {
            min = min.min(y);
            max = max.max(y);
        }
    }

    if min > max {
        // nothing finite in the whole sweep
        return -1.0..1.0;
    }
    if min == max {
        return (min - 1.0)..(max + 1.0);
    }
    // the epsilon keeps the padding nonzero when the span is denormal-tiny
    let pad = RANGE_PAD * (max - min) + 1e-9;
    (min - pad)..(max + pad)
}
