//! Affine forms over noise symbols.
//!
//! An [`Equation`] is the linear part `Σ cᵢ·εᵢ` of an affine form; the
//! center lives in the owning value. Coefficients are kept in the real
//! working format and are never zero. Every operation that rounds a
//! coefficient returns a `slack` bounding the total rounding error, which
//! the caller folds into a fresh symbol.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::symbol::{SymbolId, SymbolKind};
use crate::numerics::{arith, BuiltFloat, FloatFormat, Interval, RoundingContexts};

/// Upper bound on `a + b`
pub(crate) fn add_up(a: &BuiltFloat, b: &BuiltFloat, r: &mut RoundingContexts) -> BuiltFloat {
    arith::add(a, b, &mut r.max_params)
}

/// Upper bound on `a * b`, zero absorbing infinities
pub(crate) fn mul_up(a: &BuiltFloat, b: &BuiltFloat, r: &mut RoundingContexts) -> BuiltFloat {
    if a.is_zero() || b.is_zero() {
        return BuiltFloat::zero(a.format(), false);
    }
    arith::mul(a, b, &mut r.max_params)
}

/// Upper bound on the distance between `center` and any point of
/// `enclosure`
pub(crate) fn deviation(enclosure: &Interval, center: &BuiltFloat, r: &mut RoundingContexts) -> BuiltFloat {
    let right = arith::sub(enclosure.hi(), center, &mut r.max_params);
    let left = arith::sub(center, enclosure.lo(), &mut r.max_params);
    let zero = BuiltFloat::zero(center.format(), false);
    let worst = right.max_of(&left).max_of(&zero).clone();
    if worst.is_nan() {
        BuiltFloat::infinity(center.format(), false)
    } else {
        worst
    }
}

/// Linear part of an affine form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Equation {
    terms: BTreeMap<SymbolId, BuiltFloat>,
}

impl Equation {
    pub fn new() -> Self {
        Self::default()
    }

    /// One term, or nothing for a zero coefficient
    pub fn single(symbol: SymbolId, coefficient: BuiltFloat) -> Self {
        let mut equation = Self::new();
        equation.insert(symbol, coefficient);
        equation
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, symbol: &SymbolId) -> Option<&BuiltFloat> {
        self.terms.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolId, &BuiltFloat)> {
        self.terms.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolId> {
        self.terms.keys()
    }

    /// Set a coefficient; zero removes the term
    pub fn insert(&mut self, symbol: SymbolId, coefficient: BuiltFloat) {
        if coefficient.is_zero() {
            self.terms.remove(&symbol);
        } else {
            self.terms.insert(symbol, coefficient);
        }
    }

    pub fn remove(&mut self, symbol: &SymbolId) -> Option<BuiltFloat> {
        self.terms.remove(symbol)
    }

    /// Upper bound on `Σ |cᵢ|`
    pub fn radius(&self, format: FloatFormat, r: &mut RoundingContexts) -> BuiltFloat {
        let mut total = BuiltFloat::zero(format, false);
        for coefficient in self.terms.values() {
            total = add_up(&total, &coefficient.abs(), r);
        }
        total
    }

    /// Enclosure of `center + Σ cᵢ·εᵢ` over all `εᵢ ∈ [-1, 1]`
    pub fn range(&self, center: &Interval, r: &mut RoundingContexts) -> Interval {
        let radius = self.radius(center.format(), r);
        center.add(&Interval::new(radius.neg(), radius), r)
    }

    pub fn neg(&self) -> Equation {
        Equation {
            terms: self.terms.iter().map(|(s, c)| (*s, c.neg())).collect(),
        }
    }

    /// `a·ka + b·kb` term by term. Each coefficient is the midpoint of its
    /// exact enclosure; the returned slack bounds the sum of the distances.
    pub fn combine(
        a: &Equation,
        ka: &Interval,
        b: &Equation,
        kb: &Interval,
        r: &mut RoundingContexts,
    ) -> (Equation, BuiltFloat) {
        let format = ka.format();
        let mut result = Equation::new();
        let mut slack = BuiltFloat::zero(format, false);
        let symbols: BTreeSet<SymbolId> = a.symbols().chain(b.symbols()).copied().collect();
        for symbol in symbols {
            let from_a = a.get(&symbol).map(|c| Interval::point(c.clone()).mul(ka, r));
            let from_b = b.get(&symbol).map(|c| Interval::point(c.clone()).mul(kb, r));
            let exact = match (from_a, from_b) {
                (Some(x), Some(y)) => x.add(&y, r),
                (Some(x), None) | (None, Some(x)) => x,
                (None, None) => continue,
            };
            let (coefficient, radius) = exact.center_radius(r);
            slack = add_up(&slack, &radius, r);
            result.insert(symbol, coefficient);
        }
        (result, slack)
    }

    /// `self·k` term by term, with slack
    pub fn scaled(&self, k: &Interval, r: &mut RoundingContexts) -> (Equation, BuiltFloat) {
        let zero = Interval::point(BuiltFloat::zero(k.format(), false));
        Equation::combine(self, k, &Equation::new(), &zero, r)
    }

    /// Fold the least significant terms into one fresh symbol so that at
    /// most `limit` terms remain. With `protect_inputs`, input symbols are
    /// folded only when the other terms alone cannot reach the limit.
    pub fn absorb(
        &mut self,
        limit: usize,
        protect_inputs: bool,
        fresh: impl FnOnce() -> SymbolId,
        r: &mut RoundingContexts,
    ) -> Option<SymbolId> {
        if self.terms.len() <= limit || limit == 0 {
            return None;
        }
        let count = self.terms.len() - limit + 1;

        let by_significance = |x: &(&SymbolId, &BuiltFloat), y: &(&SymbolId, &BuiltFloat)| {
            match x.1.compare_magnitude(y.1) {
                Ordering::Equal => x.0.cmp(y.0),
                other => other,
            }
        };
        let (mut inputs, mut others): (Vec<_>, Vec<_>) = self
            .terms
            .iter()
            .partition(|(s, _)| protect_inputs && s.kind() == SymbolKind::Input);
        others.sort_by(by_significance);
        inputs.sort_by(by_significance);
        let victims: Vec<SymbolId> = others
            .into_iter()
            .chain(inputs)
            .take(count)
            .map(|(s, _)| *s)
            .collect();

        let format = match self.terms.values().next() {
            Some(c) => c.format(),
            None => return None,
        };
        let mut folded = BuiltFloat::zero(format, false);
        for symbol in &victims {
            if let Some(coefficient) = self.terms.remove(symbol) {
                folded = add_up(&folded, &coefficient.abs(), r);
            }
        }
        let symbol = fresh();
        debug!(folded = victims.len(), into = %symbol, "absorbing noise symbols");
        self.terms.insert(symbol, folded);
        Some(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbol::SymbolTable;
    use crate::numerics::{from_f64, to_f64, RoundingConfig};

    fn real(x: f64) -> BuiltFloat {
        from_f64(x, FloatFormat::REAL, &mut RoundingConfig::nearest())
    }

    #[test]
    fn test_zero_coefficients_are_dropped() {
        let mut table = SymbolTable::new();
        let s = table.fresh(SymbolKind::Input);
        let mut eq = Equation::single(s, real(0.0));
        assert!(eq.is_empty());
        eq.insert(s, real(2.0));
        assert_eq!(eq.len(), 1);
        eq.insert(s, real(-0.0));
        assert!(eq.is_empty());
    }

    #[test]
    fn test_combine_cancels_common_terms() {
        let mut r = RoundingContexts::default();
        let mut table = SymbolTable::new();
        let s = table.fresh(SymbolKind::Input);
        let t = table.fresh(SymbolKind::Rounding);
        let mut a = Equation::single(s, real(1.5));
        a.insert(t, real(0.25));
        let b = Equation::single(s, real(1.5));
        let one = Interval::point(real(1.0));
        let (diff, slack) = Equation::combine(&a, &one, &b, &one.neg(), &mut r);
        assert_eq!(diff.len(), 1);
        assert_eq!(to_f64(diff.get(&t).unwrap()), 0.25);
        assert!(slack.is_zero());
    }

    #[test]
    fn test_radius_and_range() {
        let mut r = RoundingContexts::default();
        let mut table = SymbolTable::new();
        let mut eq = Equation::new();
        eq.insert(table.fresh(SymbolKind::Input), real(-0.5));
        eq.insert(table.fresh(SymbolKind::Input), real(0.25));
        assert_eq!(to_f64(&eq.radius(FloatFormat::REAL, &mut r)), 0.75);
        let range = eq.range(&Interval::point(real(1.0)), &mut r);
        assert_eq!((to_f64(range.lo()), to_f64(range.hi())), (0.25, 1.75));
    }

    #[test]
    fn test_absorb_folds_smallest_terms() {
        let mut r = RoundingContexts::default();
        let mut table = SymbolTable::new();
        let mut eq = Equation::new();
        for k in 1..=6 {
            eq.insert(table.fresh(SymbolKind::Rounding), real(k as f64));
        }
        let before = eq.radius(FloatFormat::REAL, &mut r);
        let folded = eq
            .absorb(4, false, || table.fresh(SymbolKind::Absorption), &mut r)
            .unwrap();
        assert_eq!(eq.len(), 4);
        assert_eq!(to_f64(eq.get(&folded).unwrap()), 6.0);
        assert_eq!(eq.radius(FloatFormat::REAL, &mut r), before);
    }

    #[test]
    fn test_absorb_protects_inputs() {
        let mut r = RoundingContexts::default();
        let mut table = SymbolTable::new();
        let mut eq = Equation::new();
        let input = table.fresh(SymbolKind::Input);
        eq.insert(input, real(1e-9));
        for k in 1..=4 {
            eq.insert(table.fresh(SymbolKind::Rounding), real(k as f64));
        }
        eq.absorb(3, true, || table.fresh(SymbolKind::Absorption), &mut r);
        assert_eq!(eq.len(), 3);
        assert!(eq.get(&input).is_some());
    }

    #[test]
    fn test_deviation() {
        let mut r = RoundingContexts::default();
        let enclosure = Interval::new(real(0.5), real(2.0));
        assert_eq!(to_f64(&deviation(&enclosure, &real(1.0), &mut r)), 1.0);
        assert!(deviation(&enclosure, &real(1.5), &mut r).compare(&real(1.0)) == Some(Ordering::Equal));
    }
}
