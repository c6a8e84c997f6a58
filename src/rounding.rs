//! Rounding policies shared by the calculators
//!
//! Pricing tiers are keyed to these exact boundaries, so each rule is a
//! literal table of cut-offs rather than an approximation.

/// Fractional part above which [`strict_threshold`] rounds up.
pub const STRICT_THRESHOLD: f64 = 0.09;

/// Round down unless the fractional part exceeds 0.09.
///
/// Used for pleat/panel counts, channel runs and running feet. The
/// fractional part is cleaned to 3 decimals first so float noise such as
/// `2.0900000000000003` stays on the lower side.
pub fn strict_threshold(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return 0.0;
    }
    let whole = x.floor();
    let fraction = clean_fraction(x - whole, 1000.0);
    if fraction > STRICT_THRESHOLD {
        whole + 1.0
    } else {
        whole
    }
}

/// Round a fabric length up to the next quarter.
///
/// | fraction      | result  |
/// |---------------|---------|
/// | 0             | i       |
/// | (0, 0.30]     | i + .25 |
/// | (0.30, 0.55]  | i + .50 |
/// | (0.55, 0.75]  | i + .75 |
/// | above 0.75    | i + 1   |
pub fn quarter_step(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return 0.0;
    }
    let whole = x.floor();
    let fraction = clean_fraction(x - whole, 100.0);
    let step = if fraction == 0.0 {
        0.0
    } else if fraction <= 0.30 {
        0.25
    } else if fraction <= 0.55 {
        0.50
    } else if fraction <= 0.75 {
        0.75
    } else {
        1.0
    };
    whole + step
}

/// Bill at least `min`, otherwise round up.
///
/// A zero (or invalid) quantity stays zero so empty measurements are not
/// charged the minimum.
pub fn minimum_floor(min: f64, x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return 0.0;
    }
    if x < min {
        min
    } else {
        x.ceil()
    }
}

/// Round to 2 decimals (the precision stored for display quantities).
pub fn round2(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    (v * 100.0).round() / 100.0
}

fn clean_fraction(fraction: f64, scale: f64) -> f64 {
    (fraction * scale).round() / scale
}
