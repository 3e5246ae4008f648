//! Interval arithmetic support for error tracking
//!
//! Closed intervals of `BuiltFloat` endpoints with outward rounding: lower
//! bounds go through `min_params` (toward -inf), upper bounds through
//! `max_params` (toward +inf). An endpoint computation that produces NaN
//! (`inf - inf` on unbounded intervals) widens to the matching infinity.

use std::cmp::Ordering;
use std::fmt;

use super::arith;
use super::float::{BuiltFloat, FloatFormat};
use super::rounding::{RoundingConfig, RoundingContexts};

/// Closed interval `[lo, hi]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    lo: BuiltFloat,
    hi: BuiltFloat,
}

fn lower(value: BuiltFloat) -> BuiltFloat {
    if value.is_nan() {
        BuiltFloat::infinity(value.format(), true)
    } else {
        value
    }
}

fn upper(value: BuiltFloat) -> BuiltFloat {
    if value.is_nan() {
        BuiltFloat::infinity(value.format(), false)
    } else {
        value
    }
}

/// Product where a zero factor absorbs an infinite one
fn bound_mul(a: &BuiltFloat, b: &BuiltFloat, config: &mut RoundingConfig) -> BuiltFloat {
    if a.is_zero() || b.is_zero() {
        return BuiltFloat::zero(a.format(), false);
    }
    arith::mul(a, b, config)
}

fn min_of(values: &[BuiltFloat]) -> BuiltFloat {
    let mut best = values[0].clone();
    for v in &values[1..] {
        if v.compare(&best) == Some(Ordering::Less) {
            best = v.clone();
        }
    }
    best
}

fn max_of(values: &[BuiltFloat]) -> BuiltFloat {
    let mut best = values[0].clone();
    for v in &values[1..] {
        if v.compare(&best) == Some(Ordering::Greater) {
            best = v.clone();
        }
    }
    best
}

impl Interval {
    /// Create an interval from bounds
    pub fn new(lo: BuiltFloat, hi: BuiltFloat) -> Self {
        assert_eq!(lo.format(), hi.format(), "interval bounds of different formats");
        debug_assert!(
            lo.compare(&hi) != Some(Ordering::Greater),
            "interval bounds out of order: {:?} > {:?}",
            lo,
            hi
        );
        Self { lo, hi }
    }

    /// Create a point interval
    pub fn point(x: BuiltFloat) -> Self {
        Self {
            lo: x.clone(),
            hi: x,
        }
    }

    /// The whole extended real line
    pub fn entire(format: FloatFormat) -> Self {
        Self {
            lo: BuiltFloat::infinity(format, true),
            hi: BuiltFloat::infinity(format, false),
        }
    }

    pub fn lo(&self) -> &BuiltFloat {
        &self.lo
    }

    pub fn hi(&self) -> &BuiltFloat {
        &self.hi
    }

    pub fn format(&self) -> FloatFormat {
        self.lo.format()
    }

    pub fn is_point(&self) -> bool {
        self.lo.compare(&self.hi) == Some(Ordering::Equal)
    }

    pub fn is_bounded(&self) -> bool {
        self.lo.is_finite() && self.hi.is_finite()
    }

    pub fn is_entire(&self) -> bool {
        self.lo.is_infinite() && self.hi.is_infinite()
    }

    /// Whether `x` lies in the interval (formats may differ)
    pub fn contains(&self, x: &BuiltFloat) -> bool {
        matches!(
            self.lo.compare(x),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ) && matches!(
            x.compare(&self.hi),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }

    /// Check if interval contains zero
    pub fn contains_zero(&self) -> bool {
        self.contains(&BuiltFloat::zero(self.format(), false))
    }

    /// Entirely above zero
    pub fn is_positive(&self) -> bool {
        self.lo.compare(&BuiltFloat::zero(self.format(), false)) == Some(Ordering::Greater)
    }

    /// Entirely below zero
    pub fn is_negative(&self) -> bool {
        self.hi.compare(&BuiltFloat::zero(self.format(), false)) == Some(Ordering::Less)
    }

    /// Smallest interval containing both
    pub fn hull(&self, other: &Interval) -> Interval {
        Interval {
            lo: self.lo.min_of(&other.lo).clone(),
            hi: self.hi.max_of(&other.hi).clone(),
        }
    }

    /// Smallest interval containing `self` and the point `x` (same format)
    pub fn hull_point(&self, x: &BuiltFloat) -> Interval {
        self.hull(&Interval::point(x.clone()))
    }

    /// Intersection, `None` when disjoint
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let lo = self.lo.max_of(&other.lo).clone();
        let hi = self.hi.min_of(&other.hi).clone();
        if lo.compare(&hi) == Some(Ordering::Greater) {
            return None;
        }
        Some(Interval { lo, hi })
    }

    pub fn neg(&self) -> Interval {
        Interval {
            lo: self.hi.neg(),
            hi: self.lo.neg(),
        }
    }

    pub fn abs(&self) -> Interval {
        let zero = BuiltFloat::zero(self.format(), false);
        if self.is_negative() {
            self.neg()
        } else if self.contains_zero() {
            Interval {
                lo: zero,
                hi: self.mag(),
            }
        } else {
            self.clone()
        }
    }

    /// Largest magnitude
    pub fn mag(&self) -> BuiltFloat {
        let a = self.lo.abs();
        let b = self.hi.abs();
        a.max_of(&b).clone()
    }

    /// Smallest magnitude (zero when the interval contains zero)
    pub fn mig(&self) -> BuiltFloat {
        if self.contains_zero() {
            return BuiltFloat::zero(self.format(), false);
        }
        let a = self.lo.abs();
        let b = self.hi.abs();
        a.min_of(&b).clone()
    }

    // ========================================================================
    // Arithmetic (with outward rounding)
    // ========================================================================

    /// Add intervals
    pub fn add(&self, other: &Interval, r: &mut RoundingContexts) -> Interval {
        Interval {
            lo: lower(arith::add(&self.lo, &other.lo, &mut r.min_params)),
            hi: upper(arith::add(&self.hi, &other.hi, &mut r.max_params)),
        }
    }

    /// Subtract intervals
    pub fn sub(&self, other: &Interval, r: &mut RoundingContexts) -> Interval {
        Interval {
            lo: lower(arith::sub(&self.lo, &other.hi, &mut r.min_params)),
            hi: upper(arith::sub(&self.hi, &other.lo, &mut r.max_params)),
        }
    }

    /// Multiply intervals
    pub fn mul(&self, other: &Interval, r: &mut RoundingContexts) -> Interval {
        let pairs = [
            (&self.lo, &other.lo),
            (&self.lo, &other.hi),
            (&self.hi, &other.lo),
            (&self.hi, &other.hi),
        ];
        let lows: Vec<BuiltFloat> = pairs
            .iter()
            .map(|(a, b)| lower(bound_mul(a, b, &mut r.min_params)))
            .collect();
        let highs: Vec<BuiltFloat> = pairs
            .iter()
            .map(|(a, b)| upper(bound_mul(a, b, &mut r.max_params)))
            .collect();
        Interval {
            lo: min_of(&lows),
            hi: max_of(&highs),
        }
    }

    /// Square, tight when the interval straddles zero
    pub fn sqr(&self, r: &mut RoundingContexts) -> Interval {
        let a = self.abs();
        Interval {
            lo: lower(bound_mul(&a.lo, &a.lo, &mut r.min_params)),
            hi: upper(bound_mul(&a.hi, &a.hi, &mut r.max_params)),
        }
    }

    /// Divide intervals; a divisor containing zero gives the entire line
    pub fn div(&self, other: &Interval, r: &mut RoundingContexts) -> Interval {
        if other.contains_zero() {
            return Interval::entire(self.format());
        }
        let pairs = [
            (&self.lo, &other.lo),
            (&self.lo, &other.hi),
            (&self.hi, &other.lo),
            (&self.hi, &other.hi),
        ];
        let lows: Vec<BuiltFloat> = pairs
            .iter()
            .map(|(a, b)| lower(arith::div(a, b, &mut r.min_params)))
            .collect();
        let highs: Vec<BuiltFloat> = pairs
            .iter()
            .map(|(a, b)| upper(arith::div(a, b, &mut r.max_params)))
            .collect();
        Interval {
            lo: min_of(&lows),
            hi: max_of(&highs),
        }
    }

    pub fn recip(&self, r: &mut RoundingContexts) -> Interval {
        Interval::point(BuiltFloat::one(self.format())).div(self, r)
    }

    /// Square root of the non-negative part, `None` when nothing is left
    pub fn sqrt(&self, r: &mut RoundingContexts) -> Option<Interval> {
        if self.is_negative() {
            return None;
        }
        let zero = BuiltFloat::zero(self.format(), false);
        let lo = if self.lo.compare(&zero) == Some(Ordering::Greater) {
            lower(arith::sqrt(&self.lo, &mut r.min_params))
        } else {
            zero
        };
        Some(Interval {
            lo,
            hi: upper(arith::sqrt(&self.hi, &mut r.max_params)),
        })
    }

    /// Multiply both bounds by `2^n`
    pub fn scale2(&self, n: i64, r: &mut RoundingContexts) -> Interval {
        Interval {
            lo: lower(arith::scale_by_power_of_two(&self.lo, n, &mut r.min_params)),
            hi: upper(arith::scale_by_power_of_two(&self.hi, n, &mut r.max_params)),
        }
    }

    /// Upper bound on `hi - lo`
    pub fn width(&self, r: &mut RoundingContexts) -> BuiltFloat {
        upper(arith::sub(&self.hi, &self.lo, &mut r.max_params))
    }

    /// A representable point inside the interval, near its middle
    pub fn midpoint(&self) -> BuiltFloat {
        let format = self.format();
        match (self.lo.is_infinite(), self.hi.is_infinite()) {
            (true, true) => return BuiltFloat::zero(format, false),
            (true, false) => return self.hi.clone(),
            (false, true) => return self.lo.clone(),
            _ => {}
        }
        let mut nearest = RoundingConfig::nearest();
        let half_lo = arith::scale_by_power_of_two(&self.lo, -1, &mut nearest);
        let half_hi = arith::scale_by_power_of_two(&self.hi, -1, &mut nearest);
        let mid = arith::add(&half_lo, &half_hi, &mut nearest);
        let mid = mid.max_of(&self.lo).clone();
        mid.min_of(&self.hi).clone()
    }

    /// Midpoint and an upper bound on the distance to either end
    pub fn center_radius(&self, r: &mut RoundingContexts) -> (BuiltFloat, BuiltFloat) {
        let center = self.midpoint();
        let right = upper(arith::sub(&self.hi, &center, &mut r.max_params));
        let left = upper(arith::sub(&center, &self.lo, &mut r.max_params));
        let radius = right.max_of(&left).clone();
        (center, radius)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::convert::{from_f64, to_f64};

    fn iv(lo: f64, hi: f64) -> Interval {
        let mut cfg = RoundingConfig::nearest();
        Interval::new(
            from_f64(lo, FloatFormat::DOUBLE, &mut cfg),
            from_f64(hi, FloatFormat::DOUBLE, &mut cfg),
        )
    }

    fn bounds(i: &Interval) -> (f64, f64) {
        (to_f64(i.lo()), to_f64(i.hi()))
    }

    #[test]
    fn test_interval_arithmetic() {
        let mut r = RoundingContexts::default();
        let a = iv(1.0, 2.0);
        let b = iv(3.0, 4.0);
        assert_eq!(bounds(&a.add(&b, &mut r)), (4.0, 6.0));
        assert_eq!(bounds(&a.sub(&b, &mut r)), (-3.0, -1.0));
        assert_eq!(bounds(&a.mul(&b, &mut r)), (3.0, 8.0));
        assert_eq!(bounds(&iv(-1.0, 2.0).mul(&b, &mut r)), (-4.0, 8.0));
        assert_eq!(bounds(&iv(-3.0, 2.0).sqr(&mut r)), (0.0, 9.0));
    }

    #[test]
    fn test_outward_rounding() {
        let mut r = RoundingContexts::default();
        let third = iv(1.0, 1.0).div(&iv(3.0, 3.0), &mut r);
        let (lo, hi) = bounds(&third);
        assert_eq!(lo, 1.0 / 3.0);
        assert_eq!(hi, f64::from_bits((1.0f64 / 3.0).to_bits() + 1));
        assert!(third.contains(&third.midpoint()));
    }

    #[test]
    fn test_division_by_interval_containing_zero() {
        let mut r = RoundingContexts::default();
        let q = iv(1.0, 2.0).div(&iv(-1.0, 1.0), &mut r);
        assert!(q.is_entire());
    }

    #[test]
    fn test_sqrt_clamps_negative_part() {
        let mut r = RoundingContexts::default();
        let s = iv(-1.0, 4.0).sqrt(&mut r).unwrap();
        assert_eq!(bounds(&s), (0.0, 2.0));
        assert!(iv(-2.0, -1.0).sqrt(&mut r).is_none());
    }

    #[test]
    fn test_unbounded_endpoints_stay_sound() {
        let mut r = RoundingContexts::default();
        let e = Interval::entire(FloatFormat::DOUBLE);
        let s = e.sub(&e, &mut r);
        assert!(s.is_entire());
        let p = iv(0.0, 0.0).mul(&e, &mut r);
        assert_eq!(bounds(&p), (0.0, 0.0));
    }

    #[test]
    fn test_hull_intersect_mag_mig() {
        let a = iv(-1.0, 2.0);
        let b = iv(1.5, 3.0);
        assert_eq!(bounds(&a.hull(&b)), (-1.0, 3.0));
        assert_eq!(bounds(&a.intersect(&b).unwrap()), (1.5, 2.0));
        assert!(iv(0.0, 1.0).intersect(&iv(2.0, 3.0)).is_none());
        assert_eq!(to_f64(&a.mag()), 2.0);
        assert_eq!(to_f64(&a.mig()), 0.0);
        assert_eq!(to_f64(&iv(-3.0, -2.0).mig()), 2.0);
    }

    #[test]
    fn test_center_radius_covers_interval() {
        let mut r = RoundingContexts::default();
        let a = iv(0.1, 0.7);
        let (c, rad) = a.center_radius(&mut r);
        let left = arith::sub(&c, &rad, &mut RoundingConfig::downward());
        let right = arith::add(&c, &rad, &mut RoundingConfig::upward());
        assert!(a.contains(&c));
        assert_ne!(left.compare(a.lo()), Some(Ordering::Greater));
        assert_ne!(right.compare(a.hi()), Some(Ordering::Less));
    }
}
