//! Fork memories and their merge.
//!
//! Every fork of a split runs on its own copy of the [`Memory`] saved at
//! the split. [`MergeMemory`] collects the fork results and joins them
//! variable by variable through [`MergeBranches`].

use std::collections::BTreeMap;

use tracing::debug;

use super::explorer::ForkRole;
use crate::context::AnalysisContext;
use crate::domain::Zonotope;
use crate::error::{EngineError, EngineResult};
use crate::numerics::{BuiltFloat, RoundingContexts};

/// Named values live at a program point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Memory {
    vars: BTreeMap<String, Zonotope>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Zonotope> {
        self.vars.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Zonotope) -> Option<Zonotope> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Zonotope> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Zonotope)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Zonotope)> for Memory {
    fn from_iter<I: IntoIterator<Item = (String, Zonotope)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Per-variable join
// =============================================================================

/// Accumulator of the values one variable takes in the real-valid forks,
/// with the error bound of each; consumed once at the merge point
#[derive(Debug, Clone)]
pub struct MergeBranches {
    implementation: BuiltFloat,
    values: Vec<(Zonotope, BuiltFloat)>,
}

impl MergeBranches {
    /// `implementation` is the float result kept by the join
    pub fn new(implementation: BuiltFloat) -> Self {
        Self {
            implementation,
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Zonotope, r: &mut RoundingContexts) {
        let bound = value.error_bound(r);
        self.values.push((value, bound));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest error bound among the accumulated values
    pub fn worst_error_bound(&self) -> Option<&BuiltFloat> {
        self.values
            .iter()
            .map(|(_, bound)| bound)
            .reduce(|a, b| a.max_of(b))
    }

    /// Join of the accumulated values around the kept implementation. The
    /// first value seeds the join; no value at all gives top.
    pub fn consume(self, ctx: &mut AnalysisContext) -> Zonotope {
        let mut values = self.values.into_iter().map(|(value, _)| value);
        let Some(first) = values.next() else {
            return Zonotope::top(ctx, self.implementation);
        };
        let seed = first.recenter(ctx, &self.implementation);
        values.fold(seed, |acc, value| acc.merge_with(ctx, &value))
    }
}

// =============================================================================
// Whole-memory join
// =============================================================================

/// Results of the forks of one split
#[derive(Debug, Clone)]
pub struct MergeMemory {
    site: String,
    forks: Vec<(ForkRole, Memory)>,
    dropped: usize,
}

impl MergeMemory {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            forks: Vec::new(),
            dropped: 0,
        }
    }

    /// Memory of a fork that ran to completion in `role`
    pub fn push(&mut self, role: ForkRole, memory: Memory) {
        self.forks.push((role, memory));
    }

    /// Count a fork that terminated abnormally
    pub fn drop_fork(&mut self) {
        self.dropped += 1;
    }

    pub fn len(&self) -> usize {
        self.forks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forks.is_empty()
    }

    pub fn forks_dropped(&self) -> usize {
        self.dropped
    }

    /// Join the fork memories. Implementations come from the first
    /// float-valid fork (the first fork when none is), real parts are
    /// joined over the real-valid forks. Only variables present in every
    /// fork survive.
    pub fn finish(self, ctx: &mut AnalysisContext) -> EngineResult<(Memory, ForkRole)> {
        if self.forks.is_empty() {
            return Err(EngineError::EmptyBranch { site: self.site });
        }
        let reference = self
            .forks
            .iter()
            .position(|(role, _)| role.is_float_valid())
            .unwrap_or(0);

        let float_valid = self.forks.iter().any(|(role, _)| role.is_float_valid());
        let real_valid = self.forks.iter().any(|(role, _)| role.is_real_valid());
        let role = match (float_valid, real_valid) {
            (true, true) => ForkRole::Both,
            (true, false) => ForkRole::FloatOnly,
            _ => ForkRole::RealOnly,
        };

        let (_, base) = &self.forks[reference];
        let mut merged = Memory::new();
        for (name, value) in base.iter() {
            if !self.forks.iter().all(|(_, m)| m.contains(name)) {
                debug!(site = %self.site, variable = name, "variable missing from a fork, dropped");
                continue;
            }
            let mut branches = MergeBranches::new(value.implementation().clone());
            for (fork_role, memory) in &self.forks {
                if let (true, Some(v)) = (fork_role.is_real_valid(), memory.get(name)) {
                    branches.push(v.clone(), ctx.rounding_mut());
                }
            }
            merged.insert(name, branches.consume(ctx));
        }
        debug!(
            site = %self.site,
            forks = self.forks.len(),
            dropped = self.dropped,
            variables = merged.len(),
            "merged forks"
        );
        Ok((merged, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::{to_f64, FloatFormat};

    fn value(ctx: &mut AnalysisContext, nominal: f64, tolerance: f64) -> Zonotope {
        Zonotope::input_f64(ctx, nominal, tolerance, FloatFormat::DOUBLE)
    }

    #[test]
    fn test_empty_merge_is_an_error() {
        let mut ctx = AnalysisContext::default();
        let mut merge = MergeMemory::new("if@1");
        merge.drop_fork();
        let err = merge.finish(&mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::EmptyBranch { ref site } if site == "if@1"));
    }

    #[test]
    fn test_float_fork_gives_implementation() {
        let mut ctx = AnalysisContext::default();
        let float_side = value(&mut ctx, 1.0, 0.5);
        let real_side = value(&mut ctx, 3.0, 1.0);
        let mut merge = MergeMemory::new("if@1");
        merge.push(ForkRole::FloatOnly, [("x".to_string(), float_side)].into_iter().collect());
        merge.push(ForkRole::RealOnly, [("x".to_string(), real_side)].into_iter().collect());
        let (memory, role) = merge.finish(&mut ctx).unwrap();
        assert_eq!(role, ForkRole::Both);
        let x = memory.get("x").unwrap();
        assert_eq!(to_f64(x.implementation()), 1.0);
        // only the real-only fork contributes to the real part
        assert_eq!(to_f64(x.real_min()), 1.0);
        assert_eq!(to_f64(x.real_max()), 3.5);
    }

    #[test]
    fn test_variables_missing_from_a_fork_are_dropped() {
        let mut ctx = AnalysisContext::default();
        let a = value(&mut ctx, 1.0, 0.0);
        let b = value(&mut ctx, 2.0, 0.0);
        let mut left = Memory::new();
        left.insert("x", a.clone());
        left.insert("t", b.clone());
        let mut right = Memory::new();
        right.insert("x", b);
        let mut merge = MergeMemory::new("if@2");
        merge.push(ForkRole::Both, left);
        merge.push(ForkRole::RealOnly, right);
        let (memory, _) = merge.finish(&mut ctx).unwrap();
        assert_eq!(memory.names().collect::<Vec<_>>(), vec!["x"]);
        let x = memory.get("x").unwrap();
        assert_eq!(to_f64(x.real_min()), 1.0);
        assert_eq!(to_f64(x.real_max()), 2.0);
    }

    #[test]
    fn test_merge_branches_without_real_values_is_top() {
        let mut ctx = AnalysisContext::default();
        let v = value(&mut ctx, 1.0, 0.5);
        let branches = MergeBranches::new(v.implementation().clone());
        assert!(branches.worst_error_bound().is_none());
        assert!(branches.consume(&mut ctx).is_top());
    }
}
