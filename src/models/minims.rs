//! Minim arithmetic
//!
//! All durations and offsets are counted in minims. Coloration and the
//! estimate heuristics produce thirds, so counts are kept as exact rationals.

use num_rational::Ratio;

/// A duration or offset measured in minims
pub type Minims = Ratio<i64>;

/// Whole number of minims
pub fn whole(n: i64) -> Minims {
    Minims::from_integer(n)
}

/// Convert to floating point (for export and display)
pub fn to_f64(value: Minims) -> f64 {
    *value.numer() as f64 / *value.denom() as f64
}

/// Render a minim count the way the MEI annotations carry it: a decimal
/// number followed by `b` (e.g. `2b`, `1.5b`, `1.3333333333333333b`).
pub fn format_beats(value: Minims) -> String {
    if value.is_integer() {
        format!("{}b", value.to_integer())
    } else {
        format!("{}b", to_f64(value))
    }
}

/// Parse a `b`-suffixed minim count written by [`format_beats`].
///
/// Integral and terminating decimals come back exact; repeating decimals
/// are snapped to the nearest third, sixth or ninth when one is within
/// 1e-9, which covers every value the interpreter writes.
pub fn parse_beats(text: &str) -> Option<Minims> {
    let number = text.trim().strip_suffix('b')?;
    if let Ok(n) = number.parse::<i64>() {
        return Some(whole(n));
    }
    let value: f64 = number.parse().ok()?;
    for denom in [2_i64, 3, 4, 6, 8, 9, 12, 16, 18, 27, 32] {
        let scaled = value * denom as f64;
        if (scaled - scaled.round()).abs() < 1e-9 {
            return Some(Minims::new(scaled.round() as i64, denom));
        }
    }
    None
}
