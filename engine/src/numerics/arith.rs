//! Exact-Then-Round Arithmetic
//!
//! Every operation forms the exact result (or an exact prefix plus a sticky
//! marker for the discarded tail) as a `WideFloat` and rounds it once with
//! the rounding kernel. Special operands follow IEEE 754 with the NaN sign
//! and propagation choices taken from the `RoundingPolicy`.

use std::cmp::Ordering;

use super::bitvec::BitVector;
use super::float::BuiltFloat;
use super::rounding::{
    direction, round, should_increment, NanCase, RoundingConfig, RoundingMode, WideFloat,
};

/// Guard bits carried beyond the target precision when a sticky tail exists
const GUARD_BITS: usize = 5;

fn assert_same_format(a: &BuiltFloat, b: &BuiltFloat) {
    assert_eq!(
        a.format(),
        b.format(),
        "operands of different formats cannot be combined"
    );
}

// ============================================================================
// NaN handling
// ============================================================================

/// NaN produced by an invalid operation
fn invalid(value_like: &BuiltFloat, positive: bool, case: NanCase, config: &mut RoundingConfig) -> BuiltFloat {
    config.flags.nan_case = Some(case);
    BuiltFloat::quiet_nan(value_like.format(), !positive)
}

/// Propagate the NaN among `operands`: the first signaling NaN, otherwise
/// the first quiet one
fn propagate_nan(operands: &[&BuiltFloat], config: &mut RoundingConfig) -> BuiltFloat {
    let chosen = operands
        .iter()
        .find(|x| x.is_signaling())
        .or_else(|| operands.iter().find(|x| x.is_nan()))
        .copied()
        .unwrap_or(operands[0]);
    config.flags.nan_case = Some(NanCase::Propagated);
    let policy = config.policy;
    let mut result = if policy.quiet_signaling_nan {
        chosen.quieted()
    } else {
        chosen.clone()
    };
    if !policy.keep_nan_sign {
        result = result.with_sign(policy.convert_nan_negative);
    }
    result
}

fn any_nan(operands: &[&BuiltFloat]) -> bool {
    operands.iter().any(|x| x.is_nan())
}

/// Sign of an exact zero sum of operands with opposite signs
fn cancellation_sign(config: &RoundingConfig) -> bool {
    config.policy.mode == RoundingMode::Lowest && !config.policy.positive_zero_mixed_add
}

// ============================================================================
// Wide kernels
// ============================================================================

/// Exact sum of two exact wide values, or a rounded-safe approximation with
/// a sticky tail when their magnitudes are too far apart
pub(crate) fn wide_add(a: &WideFloat, b: &WideFloat, precision: usize) -> WideFloat {
    debug_assert!(!a.sticky && !b.sticky, "wide_add expects exact operands");
    let (lead_a, lead_b) = match (a.lead_exponent(), b.lead_exponent()) {
        (None, _) => return b.clone(),
        (_, None) => return a.clone(),
        (Some(la), Some(lb)) => (la, lb),
    };
    let (big, small, lead_big, lead_small) = if lead_a >= lead_b {
        (a, b, lead_a, lead_b)
    } else {
        (b, a, lead_b, lead_a)
    };

    let window = precision + GUARD_BITS;
    if lead_big - lead_small > window as i64 + 2 {
        // The small operand lies entirely below half a unit of the widened
        // big operand: keep the big one and record the tail as sticky.
        let bits = big.significand.omsb();
        let extend = (window + 2).saturating_sub(bits);
        let mut significand = big.significand.resized(bits + extend + 1);
        significand.shl_assign(extend);
        if big.negative != small.negative {
            significand.decrement();
        }
        return WideFloat {
            negative: big.negative,
            significand,
            exponent: big.exponent - extend as i64,
            sticky: true,
        };
    }

    let base = a.exponent.min(b.exponent);
    let shift_a = (a.exponent - base) as usize;
    let shift_b = (b.exponent - base) as usize;
    let width = (a.significand.omsb() + shift_a).max(b.significand.omsb() + shift_b) + 1;
    let mut sa = a.significand.resized(width);
    sa.shl_assign(shift_a);
    let mut sb = b.significand.resized(width);
    sb.shl_assign(shift_b);

    if a.negative == b.negative {
        sa.add_assign(&sb);
        return WideFloat::new(a.negative, sa, base);
    }
    match sa.cmp_value(&sb) {
        Ordering::Equal => WideFloat::new(false, BitVector::new(1), base),
        Ordering::Greater => {
            sa.sub_assign(&sb);
            WideFloat::new(a.negative, sa, base)
        }
        Ordering::Less => {
            sb.sub_assign(&sa);
            WideFloat::new(b.negative, sb, base)
        }
    }
}

/// Exact product of two exact wide values
pub(crate) fn wide_mul(a: &WideFloat, b: &WideFloat) -> WideFloat {
    WideFloat::new(
        a.negative != b.negative,
        a.significand.mul(&b.significand),
        a.exponent + b.exponent,
    )
}

/// Quotient with at least `precision + 3` significant bits and a sticky
/// remainder; the divisor must be non-zero
pub(crate) fn wide_div(a: &WideFloat, b: &WideFloat, precision: usize) -> WideFloat {
    let na = a.significand.omsb();
    let nb = b.significand.omsb();
    let shift = (precision + 3 + nb).saturating_sub(na);
    let mut numerator = a.significand.resized(na + shift + 1);
    numerator.shl_assign(shift);
    let (quotient, remainder) = numerator.div_rem(&b.significand);
    WideFloat {
        negative: a.negative != b.negative,
        significand: quotient,
        exponent: a.exponent - b.exponent - shift as i64,
        sticky: !remainder.is_zero(),
    }
}

/// Square root with at least `precision + 3` significant bits and a sticky
/// remainder; the operand must be positive
pub(crate) fn wide_sqrt(a: &WideFloat, precision: usize) -> WideFloat {
    let mut significand = a.significand.clone();
    let mut exponent = a.exponent;
    if exponent.rem_euclid(2) != 0 {
        significand = significand.resized(significand.width() + 1);
        significand.shl_assign(1);
        exponent -= 1;
    }
    let bits = significand.omsb();
    let target = 2 * (precision + 3);
    let half_shift = target.saturating_sub(bits).div_ceil(2);
    let mut widened = significand.resized(bits + 2 * half_shift + 1);
    widened.shl_assign(2 * half_shift);
    let (root, remainder) = widened.isqrt_rem();
    WideFloat {
        negative: false,
        significand: root,
        exponent: (exponent - 2 * half_shift as i64) / 2,
        sticky: !remainder.is_zero(),
    }
}

// ============================================================================
// Basic operations
// ============================================================================

/// `a + b`
pub fn add(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    add_signed(a, b, false, config)
}

/// `a - b`
pub fn sub(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    add_signed(a, b, true, config)
}

fn add_signed(a: &BuiltFloat, b: &BuiltFloat, negate_b: bool, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    let format = a.format();
    if any_nan(&[a, b]) {
        return propagate_nan(&[a, b], config);
    }
    let b_negative = b.is_negative() != negate_b;
    match (a.is_infinite(), b.is_infinite()) {
        (true, true) => {
            if a.is_negative() == b_negative {
                return a.clone();
            }
            let positive = config.policy.produce_add_nan_positive;
            return invalid(a, positive, NanCase::InfMinusInf, config);
        }
        (true, false) => return a.clone(),
        (false, true) => return BuiltFloat::infinity(format, b_negative),
        _ => {}
    }
    if a.is_zero() && b.is_zero() {
        let negative = if a.is_negative() == b_negative {
            a.is_negative()
        } else {
            cancellation_sign(config)
        };
        return BuiltFloat::zero(format, negative);
    }
    if b.is_zero() {
        return a.clone();
    }
    if a.is_zero() {
        return b.with_sign(b_negative);
    }

    let (Some(wa), Some(wb)) = (WideFloat::from_float(a), WideFloat::from_float(b)) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    let wb = if negate_b { wb.negated() } else { wb };
    let sum = wide_add(&wa, &wb, format.precision());
    if sum.is_zero() {
        return BuiltFloat::zero(format, cancellation_sign(config));
    }
    round(&sum, format, config)
}

/// `a * b`
pub fn mul(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    let format = a.format();
    if any_nan(&[a, b]) {
        return propagate_nan(&[a, b], config);
    }
    let negative = a.is_negative() != b.is_negative();
    if (a.is_infinite() && b.is_zero()) || (a.is_zero() && b.is_infinite()) {
        let positive = config.policy.produce_mult_nan_positive;
        return invalid(a, positive, NanCase::ZeroTimesInf, config);
    }
    if a.is_infinite() || b.is_infinite() {
        return BuiltFloat::infinity(format, negative);
    }
    if a.is_zero() || b.is_zero() {
        return BuiltFloat::zero(format, negative);
    }
    let (Some(wa), Some(wb)) = (WideFloat::from_float(a), WideFloat::from_float(b)) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    round(&wide_mul(&wa, &wb), format, config)
}

/// `a / b`
pub fn div(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    let format = a.format();
    if any_nan(&[a, b]) {
        return propagate_nan(&[a, b], config);
    }
    let negative = a.is_negative() != b.is_negative();
    let positive_nan = config.policy.produce_div_nan_positive;
    if a.is_infinite() && b.is_infinite() {
        return invalid(a, positive_nan, NanCase::InfDivInf, config);
    }
    if a.is_infinite() {
        return BuiltFloat::infinity(format, negative);
    }
    if b.is_infinite() {
        return BuiltFloat::zero(format, negative);
    }
    if b.is_zero() {
        if a.is_zero() {
            return invalid(a, positive_nan, NanCase::ZeroDivZero, config);
        }
        config.flags.division_by_zero = true;
        return BuiltFloat::infinity(format, negative);
    }
    if a.is_zero() {
        return BuiltFloat::zero(format, negative);
    }
    let (Some(wa), Some(wb)) = (WideFloat::from_float(a), WideFloat::from_float(b)) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    round(&wide_div(&wa, &wb, format.precision()), format, config)
}

/// Correctly rounded square root
pub fn sqrt(a: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    let format = a.format();
    if a.is_nan() {
        return propagate_nan(&[a], config);
    }
    if a.is_zero() {
        return a.clone();
    }
    if a.is_negative() {
        let positive = config.policy.produce_sqrt_nan_positive;
        return invalid(a, positive, NanCase::SqrtNegative, config);
    }
    if a.is_infinite() {
        return a.clone();
    }
    let Some(wa) = WideFloat::from_float(a) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    round(&wide_sqrt(&wa, format.precision()), format, config)
}

/// Fused `a * b + c` with a single rounding
pub fn mul_add(a: &BuiltFloat, b: &BuiltFloat, c: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    assert_same_format(a, c);
    let format = a.format();
    if any_nan(&[a, b, c]) {
        let order: [&BuiltFloat; 3] = if config.policy.choose_nan_add_before_mult {
            [c, a, b]
        } else {
            [a, b, c]
        };
        return propagate_nan(&order, config);
    }
    let product_negative = a.is_negative() != b.is_negative();
    if (a.is_infinite() && b.is_zero()) || (a.is_zero() && b.is_infinite()) {
        let positive = config.policy.produce_mult_nan_positive;
        return invalid(a, positive, NanCase::ZeroTimesInf, config);
    }
    if a.is_infinite() || b.is_infinite() {
        if c.is_infinite() && c.is_negative() != product_negative {
            let positive = config.policy.produce_add_nan_positive;
            return invalid(a, positive, NanCase::InfMinusInf, config);
        }
        return BuiltFloat::infinity(format, product_negative);
    }
    if c.is_infinite() {
        return c.clone();
    }
    if a.is_zero() || b.is_zero() {
        if c.is_zero() {
            let negative = if c.is_negative() == product_negative {
                product_negative
            } else {
                cancellation_sign(config)
            };
            return BuiltFloat::zero(format, negative);
        }
        return c.clone();
    }
    let (Some(wa), Some(wb)) = (WideFloat::from_float(a), WideFloat::from_float(b)) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    let product = wide_mul(&wa, &wb);
    if c.is_zero() {
        return round(&product, format, config);
    }
    let Some(wc) = WideFloat::from_float(c) else {
        return BuiltFloat::quiet_nan(format, false);
    };
    let sum = wide_add(&product, &wc, format.precision());
    if sum.is_zero() {
        return BuiltFloat::zero(format, cancellation_sign(config));
    }
    round(&sum, format, config)
}

/// Round to an integral value in the current rounding mode
pub fn round_to_integral(a: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    if a.is_nan() {
        return propagate_nan(&[a], config);
    }
    if !a.is_finite() || a.is_zero() || a.is_integral() {
        return a.clone();
    }
    let Some(wa) = WideFloat::from_float(a) else {
        return a.clone();
    };
    let mut integer = wa.significand.resized(wa.significand.width() + 1);
    let loss = integer.shr_assign((-wa.exponent) as usize);
    let increment = should_increment(&config.policy, wa.negative, loss, integer.bit(0));
    if increment {
        integer.increment();
    }
    config.flags.approximation = direction(wa.negative, increment);
    if integer.is_zero() {
        return BuiltFloat::zero(a.format(), a.is_negative());
    }
    let mut exact = RoundingConfig::new(config.policy);
    round(&WideFloat::new(wa.negative, integer, 0), a.format(), &mut exact)
}

/// `a * 2^n`
pub fn scale_by_power_of_two(a: &BuiltFloat, n: i64, config: &mut RoundingConfig) -> BuiltFloat {
    if a.is_nan() {
        return propagate_nan(&[a], config);
    }
    if !a.is_finite() || a.is_zero() {
        return a.clone();
    }
    let Some(mut wa) = WideFloat::from_float(a) else {
        return a.clone();
    };
    wa.exponent += n;
    round(&wa, a.format(), config)
}

/// IEEE minNum: a NaN operand is ignored unless both are NaN
pub fn min(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    match (a.is_nan(), b.is_nan()) {
        (true, true) => propagate_nan(&[a, b], config),
        (true, false) => b.clone(),
        (false, true) => a.clone(),
        _ => match a.compare(b) {
            Some(Ordering::Greater) => b.clone(),
            Some(Ordering::Equal) if a.is_zero() && b.is_negative() => b.clone(),
            _ => a.clone(),
        },
    }
}

/// IEEE maxNum: a NaN operand is ignored unless both are NaN
pub fn max(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_same_format(a, b);
    match (a.is_nan(), b.is_nan()) {
        (true, true) => propagate_nan(&[a, b], config),
        (true, false) => b.clone(),
        (false, true) => a.clone(),
        _ => match a.compare(b) {
            Some(Ordering::Less) => b.clone(),
            Some(Ordering::Equal) if a.is_zero() && a.is_negative() => b.clone(),
            _ => a.clone(),
        },
    }
}
