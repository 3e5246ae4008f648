//! Deterministic Transcendental Functions
//!
//! Sound enclosures of `exp`, `log`, `sin`, `cos` and `pow` computed with
//! interval arithmetic in the operand's format (normally the real working
//! format): truncated series with an explicit remainder bound after an
//! exact-enough argument reduction. On top of the enclosures, the
//! `BuiltFloat` entry points model a correctly rounded math library: the
//! enclosure is computed in the real format and rounded once.

use std::cmp::Ordering;
use std::f64::consts::{FRAC_PI_2, LN_2, PI, SQRT_2};

use super::arith;
use super::convert::{convert, from_f64, from_i64, parse_literal, to_f64, widen};
use super::float::{BuiltFloat, FloatFormat};
use super::interval::Interval;
use super::rounding::{NanCase, RoundingConfig, RoundingContexts};

/// ln 2 truncated to 64 decimals
const LN2_DIGITS: &str = "0.6931471805599453094172321214581765680755001343602552541206800094";
/// pi/2 truncated to 64 decimals
const HALF_PI_DIGITS: &str = "1.5707963267948966192313216916397514420985846996875529104874722961";
/// Bound on the truncation error of the constants above
const CONSTANT_SLACK: &str = "1e-64";

/// Series lengths
const EXP_TERMS: u32 = 30;
const LOG_TERMS: u32 = 26;
const TRIG_TERMS: u32 = 22;

/// Arguments beyond this magnitude get the trivial `[-1, 1]` enclosure
const TRIG_REDUCTION_LIMIT: f64 = 1048576.0;

/// Enclosure of a constant known to `digits` with an absolute error below
/// `CONSTANT_SLACK`
fn constant(digits: &str, format: FloatFormat, r: &mut RoundingContexts) -> Interval {
    let parse = |text: &str, cfg: &mut RoundingConfig| {
        parse_literal(text, format, cfg).unwrap_or_else(|_| BuiltFloat::quiet_nan(format, false))
    };
    let lo = parse(digits, &mut r.min_params);
    let hi = parse(digits, &mut r.max_params);
    let slack = parse(CONSTANT_SLACK, &mut r.max_params);
    let slack = Interval::new(slack.neg(), slack);
    Interval::new(lo, hi).add(&slack, r)
}

fn small_integer(n: i64, format: FloatFormat) -> Interval {
    let mut exact = RoundingConfig::nearest();
    Interval::point(from_i64(n, format, &mut exact))
}

/// `[-t, t]` for a remainder bound estimated in double precision; the
/// estimate is doubled and floored at the smallest normal double so that a
/// non-zero tail never vanishes
fn tail_bound(estimate: f64, format: FloatFormat, r: &mut RoundingContexts) -> Interval {
    if estimate == 0.0 {
        return Interval::point(BuiltFloat::zero(format, false));
    }
    let t = (2.0 * estimate).max(f64::MIN_POSITIVE);
    let t = if t.is_finite() { t } else { f64::MAX };
    let hi = from_f64(t, format, &mut r.max_params);
    Interval::new(hi.neg(), hi)
}

/// `x^n / n!` estimated in double precision
fn power_over_factorial(x: f64, n: u32) -> f64 {
    let mut term = 1.0;
    for k in 1..=n {
        term *= x / k as f64;
    }
    term
}

fn unit_interval(format: FloatFormat) -> Interval {
    let one = BuiltFloat::one(format);
    Interval::new(one.neg(), one)
}

// ============================================================================
// Point enclosures
// ============================================================================

/// Enclosure of `exp(x)` for a single value
pub fn exp_point(x: &BuiltFloat, r: &mut RoundingContexts) -> Interval {
    let format = x.format();
    if x.is_nan() {
        return Interval::entire(format);
    }
    if x.is_infinite() {
        return if x.is_negative() {
            Interval::point(BuiltFloat::zero(format, false))
        } else {
            Interval::point(BuiltFloat::infinity(format, false))
        };
    }
    if x.is_zero() {
        return Interval::point(BuiltFloat::one(format));
    }
    let xf = to_f64(x);
    let overflow_at = (format.max_exponent() + 1) as f64 * LN_2 + 1.0;
    let underflow_at =
        (format.min_exponent() - format.mantissa_bits() as i64 - 2) as f64 * LN_2 - 1.0;
    if xf > overflow_at {
        return Interval::new(
            BuiltFloat::largest(format, false),
            BuiltFloat::infinity(format, false),
        );
    }
    if xf < underflow_at {
        return Interval::new(
            BuiltFloat::zero(format, false),
            BuiltFloat::smallest(format, false),
        );
    }

    let k = (xf / LN_2).round() as i64;
    let ln2 = constant(LN2_DIGITS, format, r);
    let reduced = Interval::point(x.clone()).sub(&small_integer(k, format).mul(&ln2, r), r);

    let one = Interval::point(BuiltFloat::one(format));
    let mut sum = one.clone();
    for n in (1..=EXP_TERMS).rev() {
        sum = one.add(&reduced.mul(&sum, r).div(&small_integer(n as i64, format), r), r);
    }
    let rmax = to_f64(&reduced.mag()).abs() * (1.0 + 1e-12);
    let tail = power_over_factorial(rmax, EXP_TERMS + 1) * rmax.exp();
    sum = sum.add(&tail_bound(tail, format, r), r);
    sum.scale2(k, r)
}

/// Enclosure of `log(x)` for a single non-negative value; `log(0) = -inf`
pub fn log_point(x: &BuiltFloat, r: &mut RoundingContexts) -> Interval {
    let format = x.format();
    if x.is_nan() || (x.is_negative() && !x.is_zero()) {
        return Interval::entire(format);
    }
    if x.is_zero() {
        return Interval::point(BuiltFloat::infinity(format, true));
    }
    if x.is_infinite() {
        return Interval::point(BuiltFloat::infinity(format, false));
    }
    let Some(mut exponent) = x.lead_exponent() else {
        return Interval::entire(format);
    };
    let mut exact = RoundingConfig::nearest();
    let mut m = arith::scale_by_power_of_two(x, -exponent, &mut exact);
    if to_f64(&m) > SQRT_2 {
        m = arith::scale_by_power_of_two(&m, -1, &mut exact);
        exponent += 1;
    }
    let one = Interval::point(BuiltFloat::one(format));
    let m = Interval::point(m);
    let z = m.sub(&one, r).div(&m.add(&one, r), r);
    let w = z.sqr(r);

    let mut sum = one.div(&small_integer(2 * LOG_TERMS as i64 + 1, format), r);
    for k in (0..LOG_TERMS).rev() {
        let coefficient = one.div(&small_integer(2 * k as i64 + 1, format), r);
        sum = coefficient.add(&w.mul(&sum, r), r);
    }
    let zmax = to_f64(&z.mag()).abs() * (1.0 + 1e-12);
    let power = zmax.powi(2 * LOG_TERMS as i32 + 3);
    let tail = power / ((2 * LOG_TERMS + 3) as f64 * (1.0 - zmax * zmax));
    let series = z.mul(&sum, r).add(&tail_bound(tail, format, r), r).scale2(1, r);

    let ln2 = constant(LN2_DIGITS, format, r);
    small_integer(exponent, format).mul(&ln2, r).add(&series, r)
}

/// Enclosures of `sin(x)` and `cos(x)` for a single value
pub fn sin_cos_point(x: &BuiltFloat, r: &mut RoundingContexts) -> (Interval, Interval) {
    let format = x.format();
    let unit = unit_interval(format);
    if !x.is_finite() {
        return (unit.clone(), unit);
    }
    if x.is_zero() {
        return (
            Interval::point(x.clone()),
            Interval::point(BuiltFloat::one(format)),
        );
    }
    let xf = to_f64(x);
    if xf.abs() > TRIG_REDUCTION_LIMIT {
        return (unit.clone(), unit);
    }
    let k = (xf / FRAC_PI_2).round() as i64;
    let half_pi = constant(HALF_PI_DIGITS, format, r);
    let reduced = Interval::point(x.clone()).sub(&small_integer(k, format).mul(&half_pi, r), r);
    let w = reduced.sqr(r);
    let one = Interval::point(BuiltFloat::one(format));

    let mut sin_sum = one.clone();
    let mut cos_sum = one.clone();
    for n in (1..=TRIG_TERMS as i64).rev() {
        let sin_den = small_integer((2 * n) * (2 * n + 1), format);
        sin_sum = one.sub(&w.mul(&sin_sum, r).div(&sin_den, r), r);
        let cos_den = small_integer((2 * n - 1) * (2 * n), format);
        cos_sum = one.sub(&w.mul(&cos_sum, r).div(&cos_den, r), r);
    }
    let rmax = to_f64(&reduced.mag()).abs() * (1.0 + 1e-12);
    let sin_tail = power_over_factorial(rmax, 2 * TRIG_TERMS + 3);
    let cos_tail = power_over_factorial(rmax, 2 * TRIG_TERMS + 2);
    let sin_r = reduced.mul(&sin_sum, r).add(&tail_bound(sin_tail, format, r), r);
    let cos_r = cos_sum.add(&tail_bound(cos_tail, format, r), r);

    let (sin, cos) = match k.rem_euclid(4) {
        0 => (sin_r, cos_r),
        1 => (cos_r, sin_r.neg()),
        2 => (sin_r.neg(), cos_r.neg()),
        _ => (cos_r.neg(), sin_r),
    };
    let clamp = |i: Interval| i.intersect(&unit).unwrap_or_else(|| unit.clone());
    (clamp(sin), clamp(cos))
}

// ============================================================================
// Interval enclosures
// ============================================================================

/// `exp` over an interval (monotone)
pub fn exp_enclosure(x: &Interval, r: &mut RoundingContexts) -> Interval {
    let lo = exp_point(x.lo(), r);
    let hi = exp_point(x.hi(), r);
    Interval::new(lo.lo().clone(), hi.hi().clone())
}

/// `log` over the non-negative part of an interval (monotone); `None` when
/// the interval is entirely negative
pub fn log_enclosure(x: &Interval, r: &mut RoundingContexts) -> Option<Interval> {
    if x.is_negative() {
        return None;
    }
    let zero = BuiltFloat::zero(x.format(), false);
    let lo_arg = x.lo().max_of(&zero).clone();
    let lo = log_point(&lo_arg, r);
    let hi = log_point(x.hi(), r);
    Some(Interval::new(lo.lo().clone(), hi.hi().clone()))
}

/// Whether some `offset + period * j` may lie in `[lo, hi]`, with slack for
/// the double-precision estimate
fn may_contain_critical(lo: f64, hi: f64, offset: f64) -> bool {
    let period = 2.0 * PI;
    let slack = 1e-9 + (lo.abs() + hi.abs()) * 1e-15;
    let a = ((lo - offset) / period - slack).ceil();
    let b = ((hi - offset) / period + slack).floor();
    a <= b
}

fn trig_enclosure(x: &Interval, r: &mut RoundingContexts, cosine: bool) -> Interval {
    let format = x.format();
    let unit = unit_interval(format);
    if !x.is_bounded() {
        return unit;
    }
    let lo_f = to_f64(x.lo());
    let hi_f = to_f64(x.hi());
    if hi_f - lo_f >= 2.0 * PI || lo_f.abs().max(hi_f.abs()) > TRIG_REDUCTION_LIMIT {
        return unit;
    }
    let pick = |pair: (Interval, Interval)| if cosine { pair.1 } else { pair.0 };
    let mut result = pick(sin_cos_point(x.lo(), r)).hull(&pick(sin_cos_point(x.hi(), r)));
    let (max_offset, min_offset) = if cosine { (0.0, PI) } else { (FRAC_PI_2, -FRAC_PI_2) };
    let one = BuiltFloat::one(format);
    if may_contain_critical(lo_f, hi_f, max_offset) {
        result = result.hull_point(&one);
    }
    if may_contain_critical(lo_f, hi_f, min_offset) {
        result = result.hull_point(&one.neg());
    }
    result
}

/// `sin` over an interval
pub fn sin_enclosure(x: &Interval, r: &mut RoundingContexts) -> Interval {
    trig_enclosure(x, r, false)
}

/// `cos` over an interval
pub fn cos_enclosure(x: &Interval, r: &mut RoundingContexts) -> Interval {
    trig_enclosure(x, r, true)
}

/// `|x|^n` rounded in the direction of `config`, for a non-negative base
fn pow_magnitude(x: &BuiltFloat, n: u64, config: &mut RoundingConfig) -> BuiltFloat {
    let mut result = BuiltFloat::one(x.format());
    let mut base = x.abs();
    let mut e = n;
    while e > 0 {
        if e & 1 == 1 {
            result = arith::mul(&result, &base, config);
        }
        e >>= 1;
        if e > 0 {
            base = arith::mul(&base, &base, config);
        }
    }
    result
}

/// `x^n` over an interval for an integer exponent
pub fn powi_enclosure(x: &Interval, n: i64, r: &mut RoundingContexts) -> Interval {
    let format = x.format();
    if n == 0 {
        return Interval::point(BuiltFloat::one(format));
    }
    let e = n.unsigned_abs();
    if n < 0 {
        return powi_enclosure_unsigned(x, e, r).recip(r);
    }
    powi_enclosure_unsigned(x, e, r)
}

fn powi_enclosure_unsigned(x: &Interval, e: u64, r: &mut RoundingContexts) -> Interval {
    if e % 2 == 0 {
        let a = x.abs();
        let lo = pow_magnitude(a.lo(), e, &mut r.min_params);
        let hi = pow_magnitude(a.hi(), e, &mut r.max_params);
        return Interval::new(lo, hi);
    }
    // Odd powers are increasing over the whole line.
    let odd_bound = |v: &BuiltFloat, r: &mut RoundingContexts, upward: bool| {
        if v.is_negative() {
            let cfg = if upward { &mut r.min_params } else { &mut r.max_params };
            pow_magnitude(v, e, cfg).neg()
        } else {
            let cfg = if upward { &mut r.max_params } else { &mut r.min_params };
            pow_magnitude(v, e, cfg)
        }
    };
    let lo = odd_bound(x.lo(), r, false);
    let hi = odd_bound(x.hi(), r, true);
    Interval::new(lo, hi)
}

/// `x^y` over intervals for a positive base, as `exp(y * log(x))`
pub fn pow_enclosure(x: &Interval, y: &Interval, r: &mut RoundingContexts) -> Option<Interval> {
    let log_x = log_enclosure(x, r)?;
    Some(exp_enclosure(&y.mul(&log_x, r), r))
}

// ============================================================================
// Correctly rounded entry points
// ============================================================================

/// Round an enclosure of an exact result to `format`. When both ends round
/// to the same value that value is the correctly rounded result; otherwise
/// the midpoint is rounded.
pub fn round_enclosure(
    enclosure: &Interval,
    format: FloatFormat,
    config: &mut RoundingConfig,
) -> BuiltFloat {
    let mut lo_cfg = RoundingConfig::new(config.policy);
    let lo = convert(enclosure.lo(), format, &mut lo_cfg);
    let mut hi_cfg = RoundingConfig::new(config.policy);
    let hi = convert(enclosure.hi(), format, &mut hi_cfg);
    if lo.compare(&hi) == Some(Ordering::Equal) {
        let exact = enclosure.is_point() && !lo_cfg.flags.inexact();
        let mut flags = lo_cfg.flags;
        if !exact && !flags.inexact() {
            flags.approximation = hi_cfg.flags.approximation;
        }
        config.flags.merge(&flags);
        return lo;
    }
    let mut mid_cfg = RoundingConfig::new(config.policy);
    let result = convert(&enclosure.midpoint(), format, &mut mid_cfg);
    config.flags.merge(&mid_cfg.flags);
    result
}

fn real_contexts(config: &RoundingConfig) -> RoundingContexts {
    RoundingContexts::new(config.policy)
}

/// Correctly rounded `exp` in the value's own format
pub fn exp(x: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    if x.is_nan() {
        config.flags.nan_case = Some(NanCase::Propagated);
        return x.quieted();
    }
    let mut r = real_contexts(config);
    let wide = widen(x, FloatFormat::REAL);
    round_enclosure(&exp_point(&wide, &mut r), x.format(), config)
}

/// Correctly rounded natural logarithm in the value's own format
pub fn log(x: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    if x.is_nan() {
        config.flags.nan_case = Some(NanCase::Propagated);
        return x.quieted();
    }
    if x.is_zero() {
        config.flags.division_by_zero = true;
        return BuiltFloat::infinity(x.format(), true);
    }
    if x.is_negative() {
        config.flags.nan_case = Some(NanCase::Domain);
        return BuiltFloat::quiet_nan(x.format(), false);
    }
    let mut r = real_contexts(config);
    let wide = widen(x, FloatFormat::REAL);
    round_enclosure(&log_point(&wide, &mut r), x.format(), config)
}

fn trig(x: &BuiltFloat, config: &mut RoundingConfig, cosine: bool) -> BuiltFloat {
    if x.is_nan() {
        config.flags.nan_case = Some(NanCase::Propagated);
        return x.quieted();
    }
    if x.is_infinite() {
        config.flags.nan_case = Some(NanCase::Domain);
        return BuiltFloat::quiet_nan(x.format(), false);
    }
    let mut r = real_contexts(config);
    let wide = widen(x, FloatFormat::REAL);
    let (sin, cos) = sin_cos_point(&wide, &mut r);
    let enclosure = if cosine { cos } else { sin };
    round_enclosure(&enclosure, x.format(), config)
}

/// Correctly rounded sine (arguments above 2^20 in magnitude are rounded
/// from the trivial enclosure)
pub fn sin(x: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    trig(x, config, false)
}

/// Correctly rounded cosine
pub fn cos(x: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    trig(x, config, true)
}

/// Integer value of an integral float when it fits an `i64`
pub fn integral_value(x: &BuiltFloat) -> Option<i64> {
    if !x.is_integral() {
        return None;
    }
    let (significand, exponent) = x.decompose()?;
    let mut magnitude = significand;
    if exponent < 0 {
        magnitude.shr_assign((-exponent) as usize);
    } else {
        if magnitude.omsb() as i64 + exponent > 62 {
            return None;
        }
        magnitude.resize(64);
        magnitude.shl_assign(exponent as usize);
    }
    let value = magnitude.to_u64()? as i64;
    Some(if x.is_negative() { -value } else { value })
}

/// `x^y` with the special cases of the C `pow` function
pub fn pow(x: &BuiltFloat, y: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    assert_eq!(x.format(), y.format(), "operands of different formats cannot be combined");
    let format = x.format();
    let one = BuiltFloat::one(format);
    if y.is_zero() || x.compare(&one) == Some(Ordering::Equal) {
        return one;
    }
    if x.is_nan() || y.is_nan() {
        config.flags.nan_case = Some(NanCase::Propagated);
        return if x.is_nan() { x.quieted() } else { y.quieted() };
    }
    if !x.is_finite() || !y.is_finite() {
        let host = to_f64(x).powf(to_f64(y));
        return from_f64(host, format, config);
    }
    let integer = integral_value(y);
    if x.is_zero() {
        let odd = integer.map(|n| n % 2 != 0).unwrap_or(false);
        let negative = odd && x.is_negative();
        if y.is_negative() {
            config.flags.division_by_zero = true;
            return BuiltFloat::infinity(format, negative);
        }
        return BuiltFloat::zero(format, negative);
    }
    let mut r = real_contexts(config);
    let wide_x = Interval::point(widen(x, FloatFormat::REAL));
    let enclosure = match integer {
        Some(n) => powi_enclosure(&wide_x, n, &mut r),
        None if x.is_negative() => {
            config.flags.nan_case = Some(NanCase::Domain);
            return BuiltFloat::quiet_nan(format, false);
        }
        None => {
            let wide_y = Interval::point(widen(y, FloatFormat::REAL));
            match pow_enclosure(&wide_x, &wide_y, &mut r) {
                Some(e) => e,
                None => return BuiltFloat::quiet_nan(format, false),
            }
        }
    };
    round_enclosure(&enclosure, format, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(x: f64) -> BuiltFloat {
        from_f64(x, FloatFormat::REAL, &mut RoundingConfig::nearest())
    }

    fn double(x: f64) -> BuiltFloat {
        BuiltFloat::from_bits(FloatFormat::DOUBLE, x.to_bits() as u128)
    }

    fn host(x: &BuiltFloat) -> f64 {
        f64::from_bits(x.to_bits() as u64)
    }

    /// Distance in units in the last place between two doubles
    fn ulps(a: f64, b: f64) -> u64 {
        (a.to_bits() as i64 - b.to_bits() as i64).unsigned_abs()
    }

    #[test]
    fn test_exp_enclosure_is_tight() {
        let mut r = RoundingContexts::default();
        for x in [1.0, -2.5, 0.001, 10.0, -700.0] {
            let e = exp_point(&real(x), &mut r);
            let (lo, hi) = (to_f64(e.lo()), to_f64(e.hi()));
            assert!(ulps(lo, x.exp()) <= 1 && ulps(hi, x.exp()) <= 1, "exp({})", x);
        }
    }

    #[test]
    fn test_exp_of_one_contains_e() {
        let mut r = RoundingContexts::default();
        let e = exp_point(&real(1.0), &mut r);
        let mut cfg = RoundingConfig::nearest();
        let e_digits = parse_literal(
            "2.71828182845904523536028747135266249775724709369995",
            FloatFormat::REAL,
            &mut cfg,
        )
        .unwrap();
        assert!(e.contains(&e_digits));
        let mut w = RoundingContexts::default();
        let width = to_f64(&e.width(&mut w));
        assert!(width < 1e-33, "width {}", width);
    }

    #[test]
    fn test_log_enclosure() {
        let mut r = RoundingContexts::default();
        for x in [2.0, 0.5, 10.0, 1.0 + 1e-12, 1e-300, 123456.789] {
            let l = log_point(&real(x), &mut r);
            let (lo, hi) = (to_f64(l.lo()), to_f64(l.hi()));
            assert!(ulps(lo, x.ln()) <= 1 && ulps(hi, x.ln()) <= 1, "log({})", x);
        }
        assert!(log_point(&real(0.0), &mut r).lo().is_infinite());
    }

    #[test]
    fn test_sin_cos_enclosures() {
        let mut r = RoundingContexts::default();
        for x in [0.5, 1.0, 3.0, -4.0, 100.0, 12345.678] {
            let (s, c) = sin_cos_point(&real(x), &mut r);
            assert!(ulps(to_f64(s.lo()), x.sin()) <= 2, "sin({})", x);
            assert!(ulps(to_f64(c.hi()), x.cos()) <= 2, "cos({})", x);
        }
    }

    #[test]
    fn test_trig_interval_extrema() {
        let mut r = RoundingContexts::default();
        let mut cfg = RoundingConfig::nearest();
        let x = Interval::new(
            from_f64(1.0, FloatFormat::REAL, &mut cfg),
            from_f64(2.0, FloatFormat::REAL, &mut cfg),
        );
        let s = sin_enclosure(&x, &mut r);
        assert_eq!(to_f64(s.hi()), 1.0);
        assert!((to_f64(s.lo()) - 1.0f64.sin()).abs() < 1e-15);
        let c = cos_enclosure(&x, &mut r);
        assert!((to_f64(c.lo()) - 2.0f64.cos()).abs() < 1e-15);
        assert!((to_f64(c.hi()) - 1.0f64.cos()).abs() < 1e-15);
    }

    #[test]
    fn test_powi_enclosure() {
        let mut r = RoundingContexts::default();
        let mut cfg = RoundingConfig::nearest();
        let x = Interval::new(
            from_f64(-2.0, FloatFormat::REAL, &mut cfg),
            from_f64(3.0, FloatFormat::REAL, &mut cfg),
        );
        let sq = powi_enclosure(&x, 2, &mut r);
        assert_eq!((to_f64(sq.lo()), to_f64(sq.hi())), (0.0, 9.0));
        let cube = powi_enclosure(&x, 3, &mut r);
        assert_eq!((to_f64(cube.lo()), to_f64(cube.hi())), (-8.0, 27.0));
    }

    #[test]
    fn test_powi_enclosure_of_the_most_negative_exponent() {
        let mut r = RoundingContexts::default();
        let mut cfg = RoundingConfig::nearest();
        let x = Interval::new(
            from_f64(1.5, FloatFormat::REAL, &mut cfg),
            from_f64(2.5, FloatFormat::REAL, &mut cfg),
        );
        let zero = BuiltFloat::zero(FloatFormat::REAL, false);
        for n in [i64::MIN, -i64::MAX] {
            let p = powi_enclosure(&x, n, &mut r);
            assert!(!p.lo().is_nan() && !p.hi().is_nan());
            assert_ne!(p.lo().compare(&zero), Some(Ordering::Less));
            assert!(p.hi().is_finite());
        }
    }

    #[test]
    fn test_correctly_rounded_entry_points() {
        let mut cfg = RoundingConfig::nearest();
        for x in [0.1, 1.0, 2.5, -3.75, 20.0] {
            assert!(ulps(host(&exp(&double(x), &mut cfg)), x.exp()) <= 1);
            assert!(ulps(host(&sin(&double(x), &mut cfg)), x.sin()) <= 1);
            assert!(ulps(host(&cos(&double(x), &mut cfg)), x.cos()) <= 1);
        }
        assert_eq!(host(&exp(&double(0.0), &mut cfg)), 1.0);
        assert_eq!(host(&log(&double(1.0), &mut cfg)), 0.0);
        assert_eq!(host(&pow(&double(2.0), &double(10.0), &mut cfg)), 1024.0);
        assert_eq!(host(&pow(&double(-2.0), &double(3.0), &mut cfg)), -8.0);
        assert!(ulps(host(&pow(&double(2.0), &double(0.5), &mut cfg)), SQRT_2) <= 1);
        assert!(pow(&double(-2.0), &double(0.5), &mut cfg).is_nan());
        assert_eq!(cfg.flags.nan_case, Some(NanCase::Domain));
        let mut cfg = RoundingConfig::nearest();
        assert!(log(&double(0.0), &mut cfg).is_infinite());
        assert!(cfg.flags.division_by_zero);
    }

    #[test]
    fn test_integral_value() {
        assert_eq!(integral_value(&double(-7.0)), Some(-7));
        assert_eq!(integral_value(&double(7.5)), None);
        assert_eq!(integral_value(&double(1e30)), None);
    }
}
