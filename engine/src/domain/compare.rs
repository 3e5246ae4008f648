//! Comparisons between zonotopes.
//!
//! A comparison is evaluated twice: on the implementations (what the
//! instrumented program branches on, NaN unordered) and on the real
//! difference `a − b` (affine difference intersected with the interval
//! difference), which gives a three-valued answer.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::equation::Equation;
use super::zonotope::Zonotope;
use crate::context::AnalysisContext;
use crate::diagnostics::CompareEvent;
use crate::error::ReadError;
use crate::numerics::{BuiltFloat, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    /// Outcome for an IEEE ordering (`None` is unordered)
    pub fn holds(&self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (CompareOp::Ne, None) => true,
            (_, None) => false,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        }
    }

    /// Three-valued outcome of `d op 0` for every `d` in `difference`
    pub fn decide(&self, difference: &Interval) -> Tristate {
        let zero = BuiltFloat::zero(difference.format(), false);
        let lo = difference.lo().compare(&zero);
        let hi = difference.hi().compare(&zero);
        if lo.is_none() || hi.is_none() {
            return Tristate::Unknown;
        }
        let all = |op: CompareOp| op.holds(lo) && op.holds(hi);
        let none = |op: CompareOp| !op.holds(lo) && !op.holds(hi);
        match self {
            // the predicate set is an interval, so checking both ends of
            // the difference is enough except for `!=`
            CompareOp::Ne => match CompareOp::Eq.decide(difference) {
                Tristate::True => Tristate::False,
                Tristate::False => Tristate::True,
                Tristate::Unknown => Tristate::Unknown,
            },
            CompareOp::Eq if difference.contains_zero() && !difference.is_point() => Tristate::Unknown,
            op if all(*op) => Tristate::True,
            op if none(*op) && !(difference.contains_zero() && op.holds(Some(Ordering::Equal))) => {
                Tristate::False
            }
            _ => Tristate::Unknown,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for CompareOp {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            other => Err(ReadError::new(other, "unknown comparison operator")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tristate {
    True,
    False,
    Unknown,
}

impl From<bool> for Tristate {
    fn from(b: bool) -> Self {
        if b {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

/// Float and real outcomes of one comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOutcome {
    pub op: CompareOp,
    pub implementation: bool,
    pub real: Tristate,
}

impl CompareOutcome {
    /// The real outcome is decided and agrees with the float one
    pub fn is_stable(&self) -> bool {
        self.real == Tristate::from(self.implementation)
    }

    /// Outcomes the real execution may take
    pub fn real_outcomes(&self) -> Vec<bool> {
        match self.real {
            Tristate::True => vec![true],
            Tristate::False => vec![false],
            Tristate::Unknown => vec![true, false],
        }
    }
}

impl Zonotope {
    /// Enclosure of the real value of `self − other`
    pub fn real_difference(&self, ctx: &mut AnalysisContext, other: &Zonotope) -> Interval {
        assert_eq!(self.format(), other.format(), "comparing values of different formats");
        let r = ctx.rounding_mut();
        let interval = self.real_bound().sub(&other.real_bound(), r);
        let (Some(ea), Some(eb), true, true) = (
            self.equation(),
            other.equation(),
            self.implementation().is_finite(),
            other.implementation().is_finite(),
        ) else {
            return interval;
        };
        let one = Interval::point(BuiltFloat::one(self.real_format()));
        let (linear, slack) = Equation::combine(ea, &one, eb, &one.neg(), r);
        let center = Interval::point(self.center()).sub(&Interval::point(other.center()), r);
        let spread = Interval::new(slack.neg(), slack);
        let affine = linear.range(&center.add(&spread, r), r);
        interval.intersect(&affine).unwrap_or(interval)
    }

    /// Compare two values and report the outcome to the observer
    pub fn compare(&self, ctx: &mut AnalysisContext, other: &Zonotope, op: CompareOp) -> CompareOutcome {
        let implementation = op.holds(self.implementation().compare(other.implementation()));
        let difference = self.real_difference(ctx, other);
        let outcome = CompareOutcome {
            op,
            implementation,
            real: op.decide(&difference),
        };
        let event = CompareEvent {
            outcome,
            lhs: self,
            rhs: other,
        };
        ctx.observer_mut().on_compare(&event);
        outcome
    }
}
