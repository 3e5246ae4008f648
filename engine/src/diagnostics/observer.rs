//! Notification hooks.
//!
//! The domain and the path engine report comparisons, decisions and domain
//! violations through an [`Observer`]. Observers never alter numeric
//! results; every method has a no-op default so an implementation only
//! overrides what it needs.

use crate::domain::compare::CompareOutcome;
use crate::domain::Zonotope;
use crate::path::{BranchOption, ForkRole};

/// A comparison between two values
#[derive(Debug, Clone, Copy)]
pub struct CompareEvent<'a> {
    pub outcome: CompareOutcome,
    pub lhs: &'a Zonotope,
    pub rhs: &'a Zonotope,
}

/// A resolved decision point
#[derive(Debug, Clone, Copy)]
pub struct BranchEvent<'a> {
    pub site: &'a str,
    pub outcome: CompareOutcome,
    pub option: BranchOption,
    /// Role of the fork before the decision
    pub role: ForkRole,
}

impl BranchEvent<'_> {
    /// The real outcome was undecided or disagreed with the float one
    pub fn is_unstable(&self) -> bool {
        !self.outcome.is_stable()
    }
}

/// An operation applied outside its real domain
#[derive(Debug, Clone, Copy)]
pub struct DomainEvent<'a> {
    pub operation: &'static str,
    pub argument: &'a Zonotope,
}

pub trait Observer {
    fn on_compare(&mut self, _event: &CompareEvent<'_>) {}

    fn on_branch(&mut self, _event: &BranchEvent<'_>) {}

    fn on_division_by_zero(&mut self, _event: &DomainEvent<'_>) {}

    fn on_negative_sqrt(&mut self, _event: &DomainEvent<'_>) {}

    /// Logarithm of a value that may be zero or negative
    fn on_negative_log(&mut self, _event: &DomainEvent<'_>) {}

    /// Negative base raised to a non-integer power
    fn on_negative_pow(&mut self, _event: &DomainEvent<'_>) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Fan-out to several observers, in insertion order
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn Observer>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: impl Observer + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Observer for ObserverSet {
    fn on_compare(&mut self, event: &CompareEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_compare(event);
        }
    }

    fn on_branch(&mut self, event: &BranchEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_branch(event);
        }
    }

    fn on_division_by_zero(&mut self, event: &DomainEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_division_by_zero(event);
        }
    }

    fn on_negative_sqrt(&mut self, event: &DomainEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_negative_sqrt(event);
        }
    }

    fn on_negative_log(&mut self, event: &DomainEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_negative_log(event);
        }
    }

    fn on_negative_pow(&mut self, event: &DomainEvent<'_>) {
        for observer in &mut self.observers {
            observer.on_negative_pow(event);
        }
    }
}
