//! Elementary functions on zonotopes.
//!
//! Each function linearizes around the center: the slope is the derivative
//! at the center and the remainder is bounded by `M/2 · dev²`, where `M`
//! bounds the second derivative over the real domain and `dev` is the
//! deviation range of the argument. Real enclosures come from
//! [`crate::numerics::transcendental`]; the implementation models a
//! correctly rounded math library.

use std::cmp::Ordering;

use tracing::warn;

use super::equation::mul_up;
use super::ops::deviation_range;
use super::zonotope::Zonotope;
use crate::context::AnalysisContext;
use crate::diagnostics::DomainEvent;
use crate::numerics::transcendental::{
    self, cos_enclosure, exp_enclosure, exp_point, integral_value, log_enclosure, log_point,
    powi_enclosure, sin_cos_point, sin_enclosure,
};
use crate::numerics::{arith, from_i64, from_u64, BuiltFloat, Interval, RoundingConfig};

/// Linearized part of a unary function around the argument's center
struct Taylor {
    /// Enclosure of `f(center)`
    value: Interval,
    /// Enclosure of `f'(center)`
    slope: Interval,
    /// Upper bound on `sup |f''| / 2` over the domain
    half_curvature: BuiltFloat,
}

impl Zonotope {
    /// Common tail of the unary functions: propagate `taylor` when the
    /// argument has an affine form, fall back to the interval otherwise
    fn apply_taylor(
        &self,
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        bound: Interval,
        taylor: Option<Taylor>,
    ) -> Zonotope {
        let (Some(taylor), Some(equation), true) = (
            taylor,
            self.equation.as_ref(),
            self.implementation.is_finite(),
        ) else {
            return Zonotope::interval_only(ctx, implementation, bound);
        };
        if !taylor.half_curvature.is_finite() || !taylor.slope.is_bounded() {
            return Zonotope::interval_only(ctx, implementation, bound);
        }
        let r = ctx.rounding_mut();
        let dev = deviation_range(self, equation, r);
        let remainder = mul_up(&taylor.half_curvature, &mul_up(&dev, &dev, r), r);
        let linear = equation.scaled(&taylor.slope, r);
        Zonotope::from_operation(
            ctx,
            implementation,
            Some(linear),
            &taylor.value,
            Some(remainder),
            bound,
        )
    }

    fn notify_domain(
        &self,
        ctx: &mut AnalysisContext,
        operation: &'static str,
        notify: fn(&mut dyn crate::diagnostics::Observer, &DomainEvent<'_>),
    ) {
        warn!(operation, bound = %self.real_bound(), "argument outside the real domain");
        let event = DomainEvent {
            operation,
            argument: self,
        };
        notify(ctx.observer_mut(), &event);
    }

    /// Square root; the negative part of the real domain is clamped to zero
    pub fn sqrt(&self, ctx: &mut AnalysisContext) -> Zonotope {
        let implementation = ctx.issue(|active| arith::sqrt(&self.implementation, active));
        let domain = self.real_bound();
        let zero = BuiltFloat::zero(self.real_format(), false);
        if domain.lo().compare(&zero) == Some(Ordering::Less) {
            self.notify_domain(ctx, "sqrt", |o, e| o.on_negative_sqrt(e));
        }
        let r = ctx.rounding_mut();
        let Some(bound) = domain.sqrt(r) else {
            return Zonotope::top(ctx, implementation);
        };
        let low = domain.lo().max_of(&zero).clone();
        let center = self.center();
        let taylor = if low.compare(&zero) == Some(Ordering::Greater) {
            let root = Interval::point(center).sqrt(r).unwrap_or_else(|| bound.clone());
            let slope = Interval::point(BuiltFloat::one(self.real_format())).div(&root.scale2(1, r), r);
            // |f''| / 2 = 1 / (8 low^(3/2))
            let low_root = arith::sqrt(&low, &mut r.min_params);
            let cube = arith::mul(&low, &low_root, &mut r.min_params);
            let eight_cube = arith::scale_by_power_of_two(&cube, 3, &mut r.min_params);
            let half_curvature = arith::div(&BuiltFloat::one(self.real_format()), &eight_cube, &mut r.max_params);
            Some(Taylor {
                value: root,
                slope,
                half_curvature,
            })
        } else {
            None
        };
        self.apply_taylor(ctx, implementation, bound, taylor)
    }

    pub fn exp(&self, ctx: &mut AnalysisContext) -> Zonotope {
        let implementation = ctx.issue(|active| transcendental::exp(&self.implementation, active));
        let domain = self.real_bound();
        let r = ctx.rounding_mut();
        let bound = exp_enclosure(&domain, r);
        let value = exp_point(&self.center(), r);
        let half_curvature = bound.hi().clone();
        let half_curvature = arith::scale_by_power_of_two(&half_curvature, -1, &mut r.max_params);
        let taylor = Taylor {
            slope: value.clone(),
            value,
            half_curvature,
        };
        self.apply_taylor(ctx, implementation, bound, Some(taylor))
    }

    /// Natural logarithm; a real domain reaching zero or below notifies the
    /// observer and is clamped to the positive part
    pub fn log(&self, ctx: &mut AnalysisContext) -> Zonotope {
        self.log_with(ctx, true)
    }

    fn log_with(&self, ctx: &mut AnalysisContext, notify: bool) -> Zonotope {
        let implementation = ctx.issue(|active| transcendental::log(&self.implementation, active));
        let domain = self.real_bound();
        let zero = BuiltFloat::zero(self.real_format(), false);
        let positive = domain.lo().compare(&zero) == Some(Ordering::Greater);
        if !positive && notify {
            self.notify_domain(ctx, "log", |o, e| o.on_negative_log(e));
        }
        if domain.hi().compare(&zero) != Some(Ordering::Greater) {
            return Zonotope::top(ctx, implementation);
        }
        let r = ctx.rounding_mut();
        let Some(bound) = log_enclosure(&domain, r) else {
            return Zonotope::top(ctx, implementation);
        };
        let taylor = if positive {
            let center = Interval::point(self.center());
            let one = Interval::point(BuiltFloat::one(self.real_format()));
            let slope = one.div(&center, r);
            // |f''| / 2 = 1 / (2 low²)
            let square = arith::mul(domain.lo(), domain.lo(), &mut r.min_params);
            let twice = arith::scale_by_power_of_two(&square, 1, &mut r.min_params);
            let half_curvature = arith::div(one.lo(), &twice, &mut r.max_params);
            Some(Taylor {
                value: log_point(center.lo(), r),
                slope,
                half_curvature,
            })
        } else {
            None
        };
        self.apply_taylor(ctx, implementation, bound, taylor)
    }

    fn trig(&self, ctx: &mut AnalysisContext, cosine: bool) -> Zonotope {
        let implementation = ctx.issue(|active| {
            if cosine {
                transcendental::cos(&self.implementation, active)
            } else {
                transcendental::sin(&self.implementation, active)
            }
        });
        let domain = self.real_bound();
        let r = ctx.rounding_mut();
        let bound = if cosine {
            cos_enclosure(&domain, r)
        } else {
            sin_enclosure(&domain, r)
        };
        let taylor = if self.implementation.is_finite() {
            let (sin, cos) = sin_cos_point(&self.center(), r);
            let (value, slope) = if cosine { (cos, sin.neg()) } else { (sin, cos) };
            // |f''| = |f| over the domain
            let half_curvature = arith::scale_by_power_of_two(&bound.mag(), -1, &mut r.max_params);
            Some(Taylor {
                value,
                slope,
                half_curvature,
            })
        } else {
            None
        };
        self.apply_taylor(ctx, implementation, bound, taylor)
    }

    pub fn sin(&self, ctx: &mut AnalysisContext) -> Zonotope {
        self.trig(ctx, false)
    }

    pub fn cos(&self, ctx: &mut AnalysisContext) -> Zonotope {
        self.trig(ctx, true)
    }

    /// Integer power; a negative exponent over a real domain containing
    /// zero notifies a division by zero and gives a top real value
    pub fn powi(&self, ctx: &mut AnalysisContext, n: i64) -> Zonotope {
        let format = self.format();
        if n == 0 {
            return Zonotope::constant(ctx, BuiltFloat::one(format));
        }
        if n == 1 {
            return self.clone();
        }
        let mut exact = RoundingConfig::nearest();
        let exponent = from_i64(n, format, &mut exact);
        let implementation =
            ctx.issue(|active| transcendental::pow(&self.implementation, &exponent, active));
        let domain = self.real_bound();
        if n < 0 && domain.contains_zero() {
            warn!(n, bound = %domain, "negative power of a value that may be zero");
            let event = DomainEvent {
                operation: "powi",
                argument: self,
            };
            ctx.observer_mut().on_division_by_zero(&event);
            return Zonotope::top(ctx, implementation);
        }
        let real = self.real_format();
        let r = ctx.rounding_mut();
        let bound = powi_enclosure(&domain, n, r);
        let center = Interval::point(self.center());
        // Exponents at the edge of i64 keep only the interval bound
        let (Some(below), Some(second_below)) = (n.checked_sub(1), n.checked_sub(2)) else {
            return self.apply_taylor(ctx, implementation, bound, None);
        };
        let factor = from_i64(n, real, &mut exact);
        let slope = powi_enclosure(&center, below, r).mul(&Interval::point(factor), r);
        // |f''| / 2 = |n (n - 1)| / 2 · |x|^(n - 2)
        let pairs = (n as i128 * (n as i128 - 1) / 2).unsigned_abs();
        let half_curvature = match u64::try_from(pairs) {
            Ok(p) => {
                let coefficient = from_u64(p, real, &mut r.max_params);
                let power = powi_enclosure(&domain, second_below, r).mag();
                mul_up(&coefficient, &power, r)
            }
            Err(_) => BuiltFloat::infinity(real, false),
        };
        let taylor = Taylor {
            value: powi_enclosure(&center, n, r),
            slope,
            half_curvature,
        };
        self.apply_taylor(ctx, implementation, bound, Some(taylor))
    }

    /// `self^exponent`. A constant integral exponent goes through
    /// [`Self::powi`]; otherwise the value is `exp(exponent · log(self))`
    /// re-expressed around the correctly rounded power.
    pub fn pow(&self, ctx: &mut AnalysisContext, exponent: &Zonotope) -> Zonotope {
        assert_eq!(
            self.format(),
            exponent.format(),
            "operands of different formats cannot be combined"
        );
        if exponent.term_count() == 0 && exponent.real_bound().is_point() {
            if let Some(n) = integral_value(exponent.implementation()) {
                return self.powi(ctx, n);
            }
        }
        let implementation = ctx.issue(|active| {
            transcendental::pow(&self.implementation, &exponent.implementation, active)
        });
        let domain = self.real_bound();
        let zero = BuiltFloat::zero(self.real_format(), false);
        if domain.lo().compare(&zero) == Some(Ordering::Less) {
            self.notify_domain(ctx, "pow", |o, e| o.on_negative_pow(e));
        }
        if domain.hi().compare(&zero) == Some(Ordering::Less) {
            return Zonotope::top(ctx, implementation);
        }
        let flags = ctx.last_flags();
        let logarithm = self.log_with(ctx, false);
        let scaled = exponent.mul(ctx, &logarithm);
        let power = scaled.exp(ctx);
        let result = power.recenter(ctx, &implementation);
        ctx.set_last_flags(flags);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticRecorder, Observer};
    use crate::numerics::{from_f64, to_f64, widen, FloatFormat};

    fn recording() -> (AnalysisContext, DiagnosticRecorder) {
        let recorder = DiagnosticRecorder::new();
        let ctx = AnalysisContext::default().with_observer(recorder.clone());
        (ctx, recorder)
    }

    /// Host libm results are within one ulp of the exact value, so a sound
    /// lower bound never exceeds the host result's successor
    fn below_host(bound: &BuiltFloat, host: f64) -> bool {
        let host = from_f64(host, FloatFormat::DOUBLE, &mut RoundingConfig::nearest());
        let limit = widen(&host.next_up(), bound.format());
        bound.compare(&limit) != Some(Ordering::Greater)
    }

    fn above_host(bound: &BuiltFloat, host: f64) -> bool {
        let host = from_f64(host, FloatFormat::DOUBLE, &mut RoundingConfig::nearest());
        let limit = widen(&host.next_down(), bound.format());
        bound.compare(&limit) != Some(Ordering::Less)
    }

    #[test]
    fn test_sqrt_of_positive_input() {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, 4.0, 0.5, FloatFormat::DOUBLE);
        let y = x.sqrt(&mut ctx);
        assert_eq!(to_f64(y.implementation()), 2.0);
        // sqrt([3.75, 4.25])
        assert!(to_f64(y.real_min()) <= 3.75f64.sqrt());
        assert!(to_f64(y.real_max()) >= 4.25f64.sqrt());
        assert!(to_f64(y.real_max()) - to_f64(y.real_min()) < 0.2);
    }

    #[test]
    fn test_sqrt_clamps_negative_side() {
        let (mut ctx, recorder) = recording();
        let x = Zonotope::input_f64(&mut ctx, 0.0, 2.0, FloatFormat::DOUBLE);
        let y = x.sqrt(&mut ctx);
        assert_eq!(to_f64(y.real_min()), 0.0);
        assert_eq!(to_f64(y.real_max()), 1.0);
        assert_eq!(recorder.log().negative_sqrt_count, 1);
    }

    #[test]
    fn test_exp_and_log_enclose_host_results() {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, 1.0, 0.1, FloatFormat::DOUBLE);
        let e = x.exp(&mut ctx);
        assert!((to_f64(e.implementation()) - 1.0f64.exp()).abs() <= 4.0 * f64::EPSILON);
        assert!(below_host(e.real_min(), 0.95f64.exp()));
        assert!(above_host(e.real_max(), 1.05f64.exp()));
        let l = e.log(&mut ctx);
        assert!(below_host(l.real_min(), 0.95) && above_host(l.real_max(), 1.05));
        assert!(to_f64(l.real_max()) - to_f64(l.real_min()) < 0.2);
    }

    #[test]
    fn test_log_of_nonpositive_notifies() {
        let (mut ctx, recorder) = recording();
        let x = Zonotope::input_f64(&mut ctx, 0.5, 2.0, FloatFormat::DOUBLE);
        let l = x.log(&mut ctx);
        assert!(l.real_min().is_infinite());
        assert_eq!(recorder.log().negative_log_count, 1);
    }

    #[test]
    fn test_trig_bounds() {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, 0.5, 0.01, FloatFormat::DOUBLE);
        let s = x.sin(&mut ctx);
        let c = x.cos(&mut ctx);
        assert!((to_f64(s.implementation()) - 0.5f64.sin()).abs() <= f64::EPSILON);
        assert!((to_f64(c.implementation()) - 0.5f64.cos()).abs() <= f64::EPSILON);
        assert!(below_host(s.real_min(), 0.495f64.sin()));
        assert!(above_host(s.real_max(), 0.505f64.sin()));
        assert!(below_host(c.real_min(), 0.505f64.cos()));
        assert!(above_host(c.real_max(), 0.495f64.cos()));
    }

    #[test]
    fn test_powi_and_pow() {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, 3.0, 0.2, FloatFormat::DOUBLE);
        let cube = x.powi(&mut ctx, 3);
        assert_eq!(to_f64(cube.implementation()), 27.0);
        assert!(below_host(cube.real_min(), 2.9f64.powi(3)));
        assert!(above_host(cube.real_max(), 3.1f64.powi(3)));

        let half = Zonotope::from_f64(&mut ctx, 0.5, FloatFormat::DOUBLE);
        let root = x.pow(&mut ctx, &half);
        assert_eq!(to_f64(root.implementation()), 3.0f64.sqrt());
        assert!(below_host(root.real_min(), 2.9f64.sqrt()));
        assert!(above_host(root.real_max(), 3.1f64.sqrt()));

        let two = Zonotope::from_f64(&mut ctx, 2.0, FloatFormat::DOUBLE);
        let square = x.pow(&mut ctx, &two);
        assert_eq!(to_f64(square.implementation()), 9.0);
    }

    #[test]
    fn test_powi_at_the_edge_of_the_exponent_range() {
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, 2.0, 0.5, FloatFormat::DOUBLE);

        let tiny = x.powi(&mut ctx, i64::MIN);
        assert!(tiny.implementation().is_zero());
        assert!(!tiny.real_min().is_nan() && !tiny.real_max().is_nan());
        let zero = BuiltFloat::zero(tiny.real_min().format(), false);
        assert_ne!(tiny.real_min().compare(&zero), Some(Ordering::Less));
        assert!(tiny.may_be(tiny.implementation()));

        let reciprocal = x.powi(&mut ctx, -i64::MAX);
        assert!(reciprocal.implementation().is_zero());
        assert_ne!(reciprocal.real_min().compare(&zero), Some(Ordering::Less));
        assert!(reciprocal.may_be(reciprocal.implementation()));

        let huge = x.powi(&mut ctx, i64::MAX);
        assert!(huge.implementation().is_infinite());
        assert!(huge.real_max().is_infinite());
    }

    #[test]
    fn test_negative_base_pow_notifies_once() {
        let (mut ctx, recorder) = recording();
        let x = Zonotope::input_f64(&mut ctx, 0.5, 2.0, FloatFormat::DOUBLE);
        let half = Zonotope::from_f64(&mut ctx, 0.5, FloatFormat::DOUBLE);
        let _ = x.pow(&mut ctx, &half);
        let log = recorder.log();
        assert_eq!(log.negative_pow_count, 1);
        assert_eq!(log.negative_log_count, 0);
    }

    #[test]
    fn test_observer_trait_object() {
        let recorder = DiagnosticRecorder::new();
        let mut boxed: Box<dyn Observer> = Box::new(recorder.clone());
        let mut ctx = AnalysisContext::default();
        let x = Zonotope::input_f64(&mut ctx, -1.0, 0.5, FloatFormat::DOUBLE);
        boxed.on_negative_sqrt(&DomainEvent {
            operation: "sqrt",
            argument: &x,
        });
        assert_eq!(recorder.log().negative_sqrt_count, 1);
    }
}
