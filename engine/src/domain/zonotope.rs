//! Zonotope values.
//!
//! A [`Zonotope`] pairs the value an instrumented program computes in its
//! target format (the *implementation*) with a sound enclosure of the value
//! the same program computes over the reals. The enclosure is the
//! intersection of an affine form and an explicit interval:
//!
//! ```text
//! real ∈ (center + Σ cᵢ·εᵢ, εᵢ ∈ [-1, 1]) ∩ [real_min, real_max]
//! ```
//!
//! The center of the affine form is the implementation widened exactly to
//! the real format, so the implementation is the rounding of the center by
//! construction, and the interval always contains the center.
//!
//! A value without an affine form (`equation() == None`) has lost all
//! correlation: only the interval carries information. This happens for
//! non-finite implementations and for unbounded deviations.

use std::cmp::Ordering;

use super::equation::{add_up, deviation, Equation};
use super::symbol::SymbolKind;
use crate::context::AnalysisContext;
use crate::error::ReadError;
use crate::numerics::{
    convert, from_i64, parse_literal, to_f64, widen, BuiltFloat, FloatFormat, Interval,
    RoundingContexts,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Zonotope {
    pub(super) implementation: BuiltFloat,
    pub(super) equation: Option<Equation>,
    pub(super) real_min: BuiltFloat,
    pub(super) real_max: BuiltFloat,
}

/// Enclosure of a value given in any format, in the real format
pub(crate) fn enclose(value: &BuiltFloat, real: FloatFormat, r: &mut RoundingContexts) -> Interval {
    if value.is_nan() {
        return Interval::entire(real);
    }
    if real.contains(value.format()) {
        return Interval::point(widen(value, real));
    }
    Interval::new(
        convert(value, real, &mut r.min_params),
        convert(value, real, &mut r.max_params),
    )
}

impl Zonotope {
    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn implementation(&self) -> &BuiltFloat {
        &self.implementation
    }

    /// Target format
    pub fn format(&self) -> FloatFormat {
        self.implementation.format()
    }

    /// Format of the real bounds and coefficients
    pub fn real_format(&self) -> FloatFormat {
        self.real_min.format()
    }

    pub fn equation(&self) -> Option<&Equation> {
        self.equation.as_ref()
    }

    /// Number of live noise symbols
    pub fn term_count(&self) -> usize {
        self.equation.as_ref().map(Equation::len).unwrap_or(0)
    }

    pub fn real_min(&self) -> &BuiltFloat {
        &self.real_min
    }

    pub fn real_max(&self) -> &BuiltFloat {
        &self.real_max
    }

    /// `[real_min, real_max]`
    pub fn real_bound(&self) -> Interval {
        Interval::new(self.real_min.clone(), self.real_max.clone())
    }

    /// Affine center: the implementation in the real format
    pub fn center(&self) -> BuiltFloat {
        widen(&self.implementation, self.real_format())
    }

    /// No information on the real value
    pub fn is_top(&self) -> bool {
        self.real_min.is_infinite() && self.real_max.is_infinite() && self.equation.is_none()
    }

    /// Range of the affine form alone
    pub fn affine_range(&self, r: &mut RoundingContexts) -> Interval {
        match &self.equation {
            Some(equation) if self.implementation.is_finite() => {
                equation.range(&Interval::point(self.center()), r)
            }
            _ => Interval::entire(self.real_format()),
        }
    }

    /// Upper bound on `|real − implementation|`
    pub fn error_bound(&self, r: &mut RoundingContexts) -> BuiltFloat {
        if !self.implementation.is_finite() {
            return BuiltFloat::infinity(self.real_format(), false);
        }
        deviation(&self.real_bound(), &self.center(), r)
    }

    /// `(real_max − real_min) / |implementation|`, approximated in double
    /// precision
    pub fn relative_error(&self) -> f64 {
        let width = to_f64(&self.real_max) - to_f64(&self.real_min);
        let magnitude = to_f64(&self.implementation).abs();
        if width == 0.0 {
            0.0
        } else {
            width / magnitude
        }
    }

    /// Whether `x` (any format) may be the real value
    pub fn may_be(&self, x: &BuiltFloat) -> bool {
        self.real_bound().contains(x)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Build a value and normalize it: absorption, intersection of the
    /// interval with the affine range, hull with the center
    pub(crate) fn assemble(
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        equation: Option<Equation>,
        bound: Interval,
    ) -> Zonotope {
        if !implementation.is_finite() {
            return Zonotope {
                implementation,
                equation: None,
                real_min: bound.lo().clone(),
                real_max: bound.hi().clone(),
            };
        }
        let center = widen(&implementation, ctx.real_format());
        let mut equation = equation;
        let mut bound = bound;
        if let Some(eq) = equation.as_mut() {
            ctx.absorb(eq);
            let range = eq.range(&Interval::point(center.clone()), ctx.rounding_mut());
            if let Some(narrowed) = bound.intersect(&range) {
                bound = narrowed;
            }
        }
        let bound = bound.hull_point(&center);
        Zonotope {
            implementation,
            equation,
            real_min: bound.lo().clone(),
            real_max: bound.hi().clone(),
        }
    }

    /// Value known only through an interval: one fresh symbol covers the
    /// whole bound, or no affine form at all when the bound is unbounded
    pub(crate) fn interval_only(
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        bound: Interval,
    ) -> Zonotope {
        if !implementation.is_finite() {
            return Self::assemble(ctx, implementation, None, bound);
        }
        let center = widen(&implementation, ctx.real_format());
        let bound = bound.hull_point(&center);
        let radius = deviation(&bound, &center, ctx.rounding_mut());
        if !radius.is_finite() {
            return Self::assemble(ctx, implementation, None, bound);
        }
        let mut equation = Equation::new();
        if !radius.is_zero() {
            let symbol = ctx.fresh_symbol(SymbolKind::Nonlinear);
            equation.insert(symbol, radius);
        }
        Self::assemble(ctx, implementation, Some(equation), bound)
    }

    /// Result of an operation: `linear` is the propagated linear part with
    /// its coefficient slack, `exact_center` encloses the exact result of
    /// the operation on the operand centers and `nonlinear` bounds the
    /// linearization remainder. `None` for `linear` degrades to an
    /// interval-only value.
    pub(crate) fn from_operation(
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        linear: Option<(Equation, BuiltFloat)>,
        exact_center: &Interval,
        nonlinear: Option<BuiltFloat>,
        bound: Interval,
    ) -> Zonotope {
        if !implementation.is_finite() {
            return Self::assemble(ctx, implementation, None, bound);
        }
        let Some((mut equation, slack)) = linear else {
            return Self::interval_only(ctx, implementation, bound);
        };
        let center = widen(&implementation, ctx.real_format());
        let rounding = deviation(exact_center, &center, ctx.rounding_mut());
        let rounding = add_up(&rounding, &slack, ctx.rounding_mut());
        let nonlinear_ok = nonlinear.as_ref().map(BuiltFloat::is_finite).unwrap_or(true);
        if !rounding.is_finite() || !nonlinear_ok {
            return Self::interval_only(ctx, implementation, bound);
        }
        if let Some(remainder) = nonlinear.filter(|n| !n.is_zero()) {
            let symbol = ctx.fresh_symbol(SymbolKind::Nonlinear);
            equation.insert(symbol, remainder);
        }
        if !rounding.is_zero() {
            let symbol = ctx.fresh_symbol(SymbolKind::Rounding);
            equation.insert(symbol, rounding);
        }
        Self::assemble(ctx, implementation, Some(equation), bound)
    }

    /// Value whose real part is a known enclosure; the distance between the
    /// implementation and the enclosure becomes one symbol of `kind`
    pub fn from_enclosure(
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        enclosure: Interval,
        kind: SymbolKind,
    ) -> Zonotope {
        assert_eq!(
            enclosure.format(),
            ctx.real_format(),
            "enclosure must be in the real format"
        );
        if !implementation.is_finite() {
            return Self::assemble(ctx, implementation, None, enclosure);
        }
        let center = widen(&implementation, ctx.real_format());
        let distance = deviation(&enclosure, &center, ctx.rounding_mut());
        if !distance.is_finite() {
            return Self::assemble(ctx, implementation, None, enclosure);
        }
        let mut equation = Equation::new();
        if !distance.is_zero() {
            let symbol = ctx.fresh_symbol(kind);
            equation.insert(symbol, distance);
        }
        Self::assemble(ctx, implementation, Some(equation), enclosure)
    }

    /// Value with no information on the real part
    pub fn top(ctx: &mut AnalysisContext, implementation: BuiltFloat) -> Zonotope {
        let real = ctx.real_format();
        Zonotope {
            implementation,
            equation: None,
            real_min: BuiltFloat::infinity(real, true),
            real_max: BuiltFloat::infinity(real, false),
        }
    }

    /// Exact constant of the target format
    pub fn constant(ctx: &mut AnalysisContext, value: BuiltFloat) -> Zonotope {
        let enclosure = enclose(&value, ctx.real_format(), ctx.rounding_mut());
        Self::from_enclosure(ctx, value, enclosure, SymbolKind::Rounding)
    }

    /// A literal of any format, rounded to `format` by the active
    /// configuration; the representation error becomes a rounding symbol
    pub fn literal(ctx: &mut AnalysisContext, value: &BuiltFloat, format: FloatFormat) -> Zonotope {
        let implementation = ctx.issue(|active| convert(value, format, active));
        let enclosure = enclose(value, ctx.real_format(), ctx.rounding_mut());
        Self::from_enclosure(ctx, implementation, enclosure, SymbolKind::Rounding)
    }

    pub fn from_f64(ctx: &mut AnalysisContext, x: f64, format: FloatFormat) -> Zonotope {
        let value = BuiltFloat::from_bits(FloatFormat::DOUBLE, x.to_bits() as u128);
        Self::literal(ctx, &value, format)
    }

    pub fn from_i64(ctx: &mut AnalysisContext, n: i64, format: FloatFormat) -> Zonotope {
        let mut exact = crate::numerics::RoundingConfig::nearest();
        let value = from_i64(n, ctx.real_format(), &mut exact);
        Self::literal(ctx, &value, format)
    }

    /// Parse a decimal or hexadecimal literal
    pub fn parse(ctx: &mut AnalysisContext, text: &str, format: FloatFormat) -> Result<Zonotope, ReadError> {
        let real = ctx.real_format();
        let implementation = ctx.issue(|active| parse_literal(text, format, active))?;
        if implementation.is_nan() {
            return Ok(Self::top(ctx, implementation));
        }
        let lo = parse_literal(text, real, &mut ctx.rounding_mut().min_params)?;
        let hi = parse_literal(text, real, &mut ctx.rounding_mut().max_params)?;
        Ok(Self::from_enclosure(
            ctx,
            implementation,
            Interval::new(lo, hi),
            SymbolKind::Rounding,
        ))
    }

    /// Program input known to lie within `nominal ± tolerance / 2`; one
    /// fresh input symbol covers the tolerance and the representation error
    /// of the nominal value
    pub fn input(
        ctx: &mut AnalysisContext,
        nominal: &BuiltFloat,
        tolerance: &BuiltFloat,
        format: FloatFormat,
    ) -> Zonotope {
        let real = ctx.real_format();
        let implementation = ctx.issue(|active| convert(nominal, format, active));
        if nominal.is_nan() || tolerance.is_nan() {
            return Self::top(ctx, implementation);
        }
        let r = ctx.rounding_mut();
        let nominal = enclose(nominal, real, r);
        let tolerance = enclose(&tolerance.abs(), real, r);
        let half = tolerance.scale2(-1, r);
        let spread = Interval::new(half.hi().neg(), half.hi().clone());
        let enclosure = nominal.add(&spread, r);
        Self::from_enclosure(ctx, implementation, enclosure, SymbolKind::Input)
    }

    pub fn input_f64(ctx: &mut AnalysisContext, nominal: f64, tolerance: f64, format: FloatFormat) -> Zonotope {
        let nominal = BuiltFloat::from_bits(FloatFormat::DOUBLE, nominal.to_bits() as u128);
        let tolerance = BuiltFloat::from_bits(FloatFormat::DOUBLE, tolerance.to_bits() as u128);
        Self::input(ctx, &nominal, &tolerance, format)
    }

    /// Value with a given implementation whose real part lies in
    /// `[min, max]` (bounds of any format)
    pub fn from_bounds(
        ctx: &mut AnalysisContext,
        implementation: BuiltFloat,
        min: &BuiltFloat,
        max: &BuiltFloat,
    ) -> Zonotope {
        let real = ctx.real_format();
        let r = ctx.rounding_mut();
        let lo = enclose(min, real, r).lo().clone();
        let hi = enclose(max, real, r).hi().clone();
        let enclosure = if lo.compare(&hi) == Some(Ordering::Greater) {
            Interval::new(hi, lo)
        } else {
            Interval::new(lo, hi)
        };
        Self::from_enclosure(ctx, implementation, enclosure, SymbolKind::Input)
    }

    // ========================================================================
    // Refinement and joins
    // ========================================================================

    /// Narrow the real bound to `[min, max]` (real format), for ranges known
    /// from outside the analysis. The implementation is never altered; an
    /// empty intersection keeps the center only.
    pub fn restrict(&self, min: &BuiltFloat, max: &BuiltFloat) -> Zonotope {
        let mut result = self.clone();
        let current = self.real_bound();
        let requested = Interval::new(min.clone(), max.clone());
        let narrowed = match current.intersect(&requested) {
            Some(b) if self.implementation.is_finite() => b.hull_point(&self.center()),
            Some(b) => b,
            None if self.implementation.is_finite() => Interval::point(self.center()),
            None => current,
        };
        result.real_min = narrowed.lo().clone();
        result.real_max = narrowed.hi().clone();
        result
    }

    /// Same real value re-expressed around another implementation; the
    /// center shift becomes one fresh join symbol
    pub fn recenter(&self, ctx: &mut AnalysisContext, implementation: &BuiltFloat) -> Zonotope {
        assert_eq!(implementation.format(), self.format(), "recentering across formats");
        if implementation == &self.implementation {
            return self.clone();
        }
        let bound = self.real_bound();
        let (Some(equation), true, true) = (
            self.equation.as_ref(),
            self.implementation.is_finite(),
            implementation.is_finite(),
        ) else {
            return Self::interval_only(ctx, implementation.clone(), bound);
        };
        let new_center = widen(implementation, ctx.real_format());
        let shift = deviation(&Interval::point(self.center()), &new_center, ctx.rounding_mut());
        let mut equation = equation.clone();
        if !shift.is_zero() {
            let symbol = ctx.fresh_symbol(SymbolKind::Join);
            equation.insert(symbol, shift);
        }
        Self::assemble(ctx, implementation.clone(), Some(equation), bound)
    }

    /// Join with `other`, keeping `self`'s implementation as the center.
    /// Common symbols with same-signed coefficients keep the smaller
    /// magnitude; everything else is covered by one fresh join symbol.
    pub fn merge_with(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Zonotope {
        assert_eq!(self.format(), other.format(), "joining values of different formats");
        let bound = self.real_bound().hull(&other.real_bound());
        let (Some(a), Some(b), true, true) = (
            self.equation.as_ref(),
            other.equation.as_ref(),
            self.implementation.is_finite(),
            other.implementation.is_finite(),
        ) else {
            return Self::interval_only(ctx, self.implementation.clone(), bound);
        };

        let mut kept = Equation::new();
        for (symbol, ca) in a.iter() {
            if let Some(cb) = b.get(symbol) {
                if ca.is_negative() == cb.is_negative() {
                    let smaller = if ca.compare_magnitude(cb) == Ordering::Greater { cb } else { ca };
                    kept.insert(*symbol, smaller.clone());
                }
            }
        }

        // Distance of each operand's linear part from the kept one
        let real = ctx.real_format();
        let r = ctx.rounding_mut();
        let distance = |eq: &Equation, r: &mut RoundingContexts| {
            let mut total = BuiltFloat::zero(real, false);
            for (symbol, c) in eq.iter() {
                let kept_c = kept.get(symbol).cloned().unwrap_or_else(|| BuiltFloat::zero(real, false));
                let d = Interval::point(c.clone()).sub(&Interval::point(kept_c), r).mag();
                total = add_up(&total, &d, r);
            }
            total
        };
        let from_a = distance(a, r);
        let from_b = distance(b, r);
        let shift = deviation(&Interval::point(other.center()), &self.center(), r);
        let from_b = add_up(&from_b, &shift, r);
        let join = from_a.max_of(&from_b).clone();

        if !join.is_finite() {
            return Self::interval_only(ctx, self.implementation.clone(), bound);
        }
        if !join.is_zero() {
            let symbol = ctx.fresh_symbol(SymbolKind::Join);
            kept.insert(symbol, join);
        }
        Self::assemble(ctx, self.implementation.clone(), Some(kept), bound)
    }

    /// Join of several values around the first one's implementation
    pub fn join_all<'a>(
        ctx: &mut AnalysisContext,
        values: impl IntoIterator<Item = &'a Zonotope>,
    ) -> Option<Zonotope> {
        let mut values = values.into_iter();
        let first = values.next()?.clone();
        Some(values.fold(first, |acc, v| acc.merge_with(ctx, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::RoundingConfig;

    fn ctx() -> AnalysisContext {
        AnalysisContext::default()
    }

    #[test]
    fn test_exact_literal_has_no_symbols() {
        let mut ctx = ctx();
        let z = Zonotope::from_f64(&mut ctx, 0.5, FloatFormat::SINGLE);
        assert_eq!(z.term_count(), 0);
        assert_eq!(to_f64(z.real_min()), 0.5);
        assert_eq!(to_f64(z.real_max()), 0.5);
    }

    #[test]
    fn test_inexact_literal_tracks_representation_error() {
        let mut ctx = ctx();
        let z = Zonotope::parse(&mut ctx, "0.1", FloatFormat::SINGLE).unwrap();
        assert_eq!(z.term_count(), 1);
        assert!(ctx.last_flags().inexact());
        let mut exact = RoundingConfig::nearest();
        let tenth = parse_literal("0.1", FloatFormat::REAL, &mut exact).unwrap();
        assert!(z.may_be(&tenth));
        assert!(z.may_be(&z.center()));
    }

    #[test]
    fn test_malformed_literal_is_a_read_error() {
        let mut ctx = ctx();
        assert!(Zonotope::parse(&mut ctx, "1.2.3", FloatFormat::DOUBLE).is_err());
    }

    #[test]
    fn test_input_covers_tolerance() {
        let mut ctx = ctx();
        let z = Zonotope::input_f64(&mut ctx, 1.0, 0.5, FloatFormat::DOUBLE);
        assert_eq!(to_f64(z.real_min()), 0.75);
        assert_eq!(to_f64(z.real_max()), 1.25);
        assert_eq!(z.term_count(), 1);
        let (symbol, coefficient) = z.equation().unwrap().iter().next().unwrap();
        assert_eq!(symbol.kind(), SymbolKind::Input);
        assert_eq!(to_f64(coefficient), 0.25);
    }

    #[test]
    fn test_merge_contains_both() {
        let mut ctx = ctx();
        let a = Zonotope::input_f64(&mut ctx, 1.0, 0.5, FloatFormat::DOUBLE);
        let b = Zonotope::input_f64(&mut ctx, 3.0, 1.0, FloatFormat::DOUBLE);
        let m = a.merge_with(&mut ctx, &b);
        assert_eq!(m.implementation(), a.implementation());
        assert_eq!(to_f64(m.real_min()), 0.75);
        assert_eq!(to_f64(m.real_max()), 3.5);
        let range = m.affine_range(ctx.rounding_mut());
        assert!(to_f64(range.lo()) <= 0.75 && to_f64(range.hi()) >= 3.5);
    }

    #[test]
    fn test_merge_keeps_shared_symbols() {
        let mut ctx = ctx();
        let a = Zonotope::input_f64(&mut ctx, 2.0, 1.0, FloatFormat::DOUBLE);
        let b = a.clone();
        let m = a.merge_with(&mut ctx, &b);
        assert_eq!(m.equation(), a.equation());
        assert_eq!(m.real_bound(), a.real_bound());
    }

    #[test]
    fn test_recenter_keeps_enclosure() {
        let mut ctx = ctx();
        let a = Zonotope::input_f64(&mut ctx, 1.0, 0.5, FloatFormat::DOUBLE);
        let two = BuiltFloat::from_bits(FloatFormat::DOUBLE, 2.0f64.to_bits() as u128);
        let moved = a.recenter(&mut ctx, &two);
        assert_eq!(to_f64(moved.implementation()), 2.0);
        assert_eq!(to_f64(moved.real_min()), 0.75);
        assert_eq!(to_f64(moved.real_max()), 2.0);
        assert_eq!(moved.term_count(), 2);
    }

    #[test]
    fn test_restrict_never_moves_implementation() {
        let mut ctx = ctx();
        let a = Zonotope::input_f64(&mut ctx, 1.0, 2.0, FloatFormat::DOUBLE);
        let lo = widen(
            &BuiltFloat::from_bits(FloatFormat::DOUBLE, 1.5f64.to_bits() as u128),
            FloatFormat::REAL,
        );
        let hi = widen(
            &BuiltFloat::from_bits(FloatFormat::DOUBLE, 4.0f64.to_bits() as u128),
            FloatFormat::REAL,
        );
        let narrowed = a.restrict(&lo, &hi);
        assert_eq!(narrowed.implementation(), a.implementation());
        assert_eq!(to_f64(narrowed.real_min()), 1.0);
        assert_eq!(to_f64(narrowed.real_max()), 2.0);
    }
}
