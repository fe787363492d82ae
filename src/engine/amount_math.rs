//! Exact integer arithmetic for amounts
//!
//! All math is on `U256` with truncating integer division. No floating point
//! ever touches an amount that ends up in a call.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::types::decimal;

/// Basis-point denominator (100%)
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Default auto-adjust tolerance in wei. A UI policy constant, not a protocol rule.
pub const DEFAULT_AUTO_ADJUST_TOLERANCE_WEI: u64 = 10_000;

/// `expected * (10000 - tolerance_bps) / 10000`, truncating toward zero.
///
/// Tolerances above 10000 bps are clamped to 10000 (result zero).
pub fn apply_slippage(expected: U256, tolerance_bps: u16) -> U256 {
    let bps = tolerance_bps.min(BPS_DENOMINATOR);
    mul_bps_floor(expected, BPS_DENOMINATOR - bps)
}

/// `value * bps / 10000` rounded down, without intermediate overflow.
///
/// Splits `value = q * 10000 + r` so the product never exceeds `value`.
pub fn mul_bps_floor(value: U256, bps: u16) -> U256 {
    let denom = U256::from(BPS_DENOMINATOR);
    let factor = U256::from(bps);
    let whole = value / denom;
    let rem = value % denom;
    whole * factor + rem * factor / denom
}

/// Smallest gross deposit whose amount after the entry fee still reaches
/// `min_deposit`: `ceil(min_deposit * 10000 / (10000 - fee_bps))`.
pub fn fee_adjusted_minimum(min_deposit: U256, entry_fee_bps: u16) -> U256 {
    if entry_fee_bps == 0 {
        return min_deposit;
    }
    if entry_fee_bps >= BPS_DENOMINATOR {
        return U256::MAX;
    }
    let net_bps = U256::from(BPS_DENOMINATOR - entry_fee_bps);
    let scaled = match min_deposit.checked_mul(U256::from(BPS_DENOMINATOR)) {
        Some(v) => v,
        None => return U256::MAX,
    };
    let (q, r) = (scaled / net_bps, scaled % net_bps);
    if r.is_zero() {
        q
    } else {
        q + U256::from(1u8)
    }
}

/// How close to a minimum an amount may fall and still be rounded up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAdjustPolicy {
    #[serde(with = "decimal")]
    pub tolerance_wei: U256,
}

impl Default for AutoAdjustPolicy {
    fn default() -> Self {
        Self {
            tolerance_wei: U256::from(DEFAULT_AUTO_ADJUST_TOLERANCE_WEI),
        }
    }
}

/// Outcome of [`auto_adjust`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjusted {
    /// Amount already meets the minimum
    Unchanged(U256),
    /// Amount was within tolerance and rounded up to the minimum
    RoundedUp { from: U256, to: U256 },
    /// Shortfall exceeds tolerance; amount left as-is for the caller to reject
    Short { amount: U256, shortfall: U256 },
}

impl Adjusted {
    /// Amount to use going forward (the original amount when short)
    pub fn value(&self) -> U256 {
        match *self {
            Adjusted::Unchanged(v) => v,
            Adjusted::RoundedUp { to, .. } => to,
            Adjusted::Short { amount, .. } => amount,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Adjusted::Short { .. })
    }
}

/// Round `amount` up to `min_required` when the shortfall is within
/// `policy.tolerance_wei`; otherwise leave it untouched.
pub fn auto_adjust(amount: U256, min_required: U256, policy: AutoAdjustPolicy) -> Adjusted {
    if amount >= min_required {
        return Adjusted::Unchanged(amount);
    }
    let shortfall = min_required - amount;
    if shortfall <= policy.tolerance_wei {
        Adjusted::RoundedUp {
            from: amount,
            to: min_required,
        }
    } else {
        Adjusted::Short { amount, shortfall }
    }
}

/// Sum with saturation; totals are display/validation values, never call inputs
pub fn sum<'a>(values: impl IntoIterator<Item = &'a U256>) -> U256 {
    values
        .into_iter()
        .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
}
