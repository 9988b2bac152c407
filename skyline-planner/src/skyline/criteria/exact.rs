//! Exact accumulation of float-weighted path counts.
//!
//! Every finite `f64` is an integer multiple of `2^-1074`, so sums of
//! `f64 × BigUint` products are held exactly as a `BigInt` scaled by
//! `2^1074`. Conversion back to `f64` happens only when a quotient is taken.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

const FRACTION_BITS: u64 = 1074;

/// Exact sum of `weight × count` terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExactSum(BigInt);

impl ExactSum {
    pub(crate) fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Add `weight × count`. Non-finite weights contribute nothing.
    pub(crate) fn add_scaled(&mut self, weight: f64, count: &BigUint) {
        if count.is_zero() || weight == 0.0 || !weight.is_finite() {
            return;
        }
        self.0 += fixed_point(weight) * BigInt::from(count.clone());
    }

    /// Add `other × count`.
    pub(crate) fn add_product(&mut self, other: &ExactSum, count: &BigUint) {
        if count.is_zero() || other.is_zero() {
            return;
        }
        self.0 += &other.0 * BigInt::from(count.clone());
    }

    pub(crate) fn add(&mut self, other: &ExactSum) {
        self.0 += &other.0;
    }

    /// `self / count` as a float; zero when `count` is zero.
    pub(crate) fn quotient(&self, count: &BigUint) -> f64 {
        if count.is_zero() {
            return 0.0;
        }
        let denominator = BigInt::from(count.clone()) << FRACTION_BITS;
        ratio_to_f64(&self.0, &denominator)
    }
}

/// `numerator / count` as a float for two plain integers.
pub(crate) fn count_ratio(numerator: &BigUint, count: &BigUint) -> f64 {
    if count.is_zero() {
        return 0.0;
    }
    ratio_to_f64(&BigInt::from(numerator.clone()), &BigInt::from(count.clone()))
}

fn fixed_point(value: f64) -> BigInt {
    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let exponent = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, shift) = if exponent == 0 {
        (fraction, 0)
    } else {
        (fraction | (1u64 << 52), (exponent - 1) as usize)
    };
    let magnitude = BigUint::from(mantissa) << shift;
    BigInt::from_biguint(if negative { Sign::Minus } else { Sign::Plus }, magnitude)
}

/// Divide two big integers, keeping 64 significant bits of the quotient.
fn ratio_to_f64(numerator: &BigInt, denominator: &BigInt) -> f64 {
    if numerator.is_zero() {
        return 0.0;
    }
    let scale = 64 + denominator.bits() as i64 - numerator.bits() as i64;
    let quotient = if scale >= 0 {
        (numerator << scale as usize) / denominator
    } else {
        numerator / (denominator << (-scale) as usize)
    };
    let mantissa = quotient.to_f64().unwrap_or(0.0);
    scale_by_power_of_two(mantissa, -scale)
}

fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    // Step in chunks so intermediate powers stay representable.
    while exponent > 1000 {
        value *= 2f64.powi(1000);
        exponent -= 1000;
    }
    while exponent < -1000 {
        value *= 2f64.powi(-1000);
        exponent += 1000;
    }
    value * 2f64.powi(exponent as i32)
}
