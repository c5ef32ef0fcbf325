//! Fixed-point helpers for 18-decimal (wad) arithmetic.
//!
//! All vault math runs on integer `U256` values; floats only appear at the
//! deviation-percentage boundary where tolerances are compared.

use ethers::types::U256;

/// One unit in 18-decimal fixed point (10^18).
pub fn wad() -> U256 {
    U256::exp10(18)
}

/// Scale an integer amount expressed with `decimals` decimal places to
/// 18-decimal precision.
///
/// Returns `None` on multiplication overflow. Scaling down truncates
/// toward zero, matching on-chain fixed-point conventions.
pub fn scale_to_18(value: U256, decimals: u32) -> Option<U256> {
    match decimals.cmp(&18) {
        std::cmp::Ordering::Equal => Some(value),
        std::cmp::Ordering::Less => value.checked_mul(U256::exp10((18 - decimals) as usize)),
        std::cmp::Ordering::Greater => {
            // exp10 panics once 10^n leaves the U256 range (n >= 78).
            let shift = decimals - 18;
            if shift > 77 {
                return None;
            }
            Some(value / U256::exp10(shift as usize))
        }
    }
}

/// Lossy conversion to `f64` for percentage comparisons and log output.
pub fn to_f64(value: U256) -> f64 {
    value.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}

/// Absolute percentage deviation of `observed` from `reference`:
/// `|observed - reference| / reference * 100`.
///
/// A zero reference yields an infinite deviation so it always trips the
/// failure tolerance instead of dividing by zero.
pub fn deviation_pct(observed: U256, reference: U256) -> f64 {
    if reference.is_zero() {
        return f64::INFINITY;
    }
    let diff = if observed >= reference {
        observed - reference
    } else {
        reference - observed
    };
    to_f64(diff) / to_f64(reference) * 100.0
}
