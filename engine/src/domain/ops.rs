//! Arithmetic on zonotopes.
//!
//! Every operation has the same three steps:
//! 1. the implementation is rounded by the active configuration;
//! 2. the linear parts propagate exactly up to a coefficient slack, and
//!    `mul`/`div` bound their second-order remainder with one nonlinear
//!    symbol;
//! 3. one rounding symbol covers the distance between the exact result on
//!    the centers and the new implementation, and the real bound is the
//!    interval result intersected with the affine range.

use tracing::warn;

use super::equation::{add_up, deviation, mul_up, Equation};
use super::zonotope::Zonotope;
use crate::context::AnalysisContext;
use crate::diagnostics::DomainEvent;
use crate::numerics::{arith, BuiltFloat, Interval, RoundingContexts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Bound on the deviation of a value's real part from its center: the
/// smaller of the affine radius and the interval distance
pub(crate) fn deviation_range(value: &Zonotope, equation: &Equation, r: &mut RoundingContexts) -> BuiltFloat {
    let radius = equation.radius(value.real_format(), r);
    let distance = deviation(&value.real_bound(), &value.center(), r);
    radius.min_of(&distance).clone()
}

fn one(value: &Zonotope) -> Interval {
    Interval::point(BuiltFloat::one(value.real_format()))
}

impl Zonotope {
    fn binary(&self, ctx: &mut AnalysisContext, other: &Zonotope, op: BinaryOp) -> Zonotope {
        assert_eq!(
            self.format(),
            other.format(),
            "operands of different formats cannot be combined"
        );
        let (a, b) = (&self.implementation, &other.implementation);
        let implementation = ctx.issue(|active| match op {
            BinaryOp::Add => arith::add(a, b, active),
            BinaryOp::Sub => arith::sub(a, b, active),
            BinaryOp::Mul => arith::mul(a, b, active),
            BinaryOp::Div => arith::div(a, b, active),
        });

        let ia = self.real_bound();
        let ib = other.real_bound();
        if op == BinaryOp::Div && ib.contains_zero() {
            warn!(divisor = %ib, "divisor may be zero");
            let event = DomainEvent {
                operation: "div",
                argument: other,
            };
            ctx.observer_mut().on_division_by_zero(&event);
            return Zonotope::top(ctx, implementation);
        }
        let r = ctx.rounding_mut();
        let bound = match op {
            BinaryOp::Add => ia.add(&ib, r),
            BinaryOp::Sub => ia.sub(&ib, r),
            BinaryOp::Mul => ia.mul(&ib, r),
            BinaryOp::Div => ia.div(&ib, r),
        };

        let (Some(ea), Some(eb), true, true) = (
            self.equation.as_ref(),
            other.equation.as_ref(),
            a.is_finite(),
            b.is_finite(),
        ) else {
            return Zonotope::interval_only(ctx, implementation, bound);
        };

        let ca = self.center();
        let cb = other.center();
        let pa = Interval::point(ca.clone());
        let pb = Interval::point(cb.clone());
        let unit = one(self);
        let (linear, exact, nonlinear) = match op {
            BinaryOp::Add => (
                Equation::combine(ea, &unit, eb, &unit, r),
                pa.add(&pb, r),
                None,
            ),
            BinaryOp::Sub => (
                Equation::combine(ea, &unit, eb, &unit.neg(), r),
                pa.sub(&pb, r),
                None,
            ),
            BinaryOp::Mul => {
                let am = deviation_range(self, ea, r);
                let bm = deviation_range(other, eb, r);
                (
                    Equation::combine(ea, &pb, eb, &pa, r),
                    pa.mul(&pb, r),
                    Some(mul_up(&am, &bm, r)),
                )
            }
            BinaryOp::Div => {
                // a/b = ca/cb + da/cb − (ca/cb²)·db + remainder
                let quotient = pa.div(&pb, r);
                let ka = unit.div(&pb, r);
                let kb = quotient.div(&pb, r).neg();
                let am = deviation_range(self, ea, r);
                let bm = deviation_range(other, eb, r);
                let numerator = add_up(
                    &mul_up(&ca.abs(), &mul_up(&bm, &bm, r), r),
                    &mul_up(&mul_up(&am, &bm, r), &cb.abs(), r),
                    r,
                );
                let cb_square = arith::mul(&cb, &cb, &mut r.min_params);
                let denominator = arith::mul(&cb_square, &ib.mig(), &mut r.min_params);
                let remainder = if numerator.is_zero() {
                    numerator
                } else {
                    arith::div(&numerator, &denominator, &mut r.max_params)
                };
                (
                    Equation::combine(ea, &ka, eb, &kb, r),
                    quotient,
                    Some(remainder),
                )
            }
        };
        Zonotope::from_operation(ctx, implementation, Some(linear), &exact, nonlinear, bound)
    }

    pub fn add(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Zonotope {
        self.binary(ctx, other, BinaryOp::Add)
    }

    pub fn sub(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Zonotope {
        self.binary(ctx, other, BinaryOp::Sub)
    }

    pub fn mul(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Zonotope {
        self.binary(ctx, other, BinaryOp::Mul)
    }

    /// Division; a divisor whose real part may be zero notifies the
    /// observer and gives a top real value
    pub fn div(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Zonotope {
        self.binary(ctx, other, BinaryOp::Div)
    }

    /// Exact negation
    pub fn neg(&self) -> Zonotope {
        Zonotope {
            implementation: self.implementation.neg(),
            equation: self.equation.as_ref().map(Equation::neg),
            real_min: self.real_max.neg(),
            real_max: self.real_min.neg(),
        }
    }

    /// Absolute value; exact unless the sign of the real value is unknown
    pub fn abs(&self, ctx: &mut AnalysisContext) -> Zonotope {
        let bound = self.real_bound();
        let zero = BuiltFloat::zero(self.real_format(), false);
        let nonnegative = bound.lo().compare(&zero) != Some(std::cmp::Ordering::Less);
        let nonpositive = bound.hi().compare(&zero) != Some(std::cmp::Ordering::Greater);
        if nonnegative && !self.implementation.is_negative() {
            return self.clone();
        }
        if nonpositive && (self.implementation.is_negative() || self.implementation.is_zero()) {
            return self.neg();
        }
        let implementation = self.implementation.abs();
        Zonotope::interval_only(ctx, implementation, bound.abs())
    }

    /// `1 / self`
    pub fn recip(&self, ctx: &mut AnalysisContext) -> Zonotope {
        let one = Zonotope::constant(ctx, BuiltFloat::one(self.format()));
        one.div(ctx, self)
    }
}
