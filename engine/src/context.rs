//! Analysis context.
//!
//! Everything an analysis run mutates besides the values themselves: the
//! configuration, the symbol table, the three rounding configurations, the
//! stack of path explorers of the enclosing splits and the observer. The
//! context is threaded by `&mut` through every entry point; nested state
//! changes go through the scope guards defined here, which restore the
//! previous state when dropped.

use std::ops::{Deref, DerefMut};

use tracing::{trace, warn};

use crate::config::{EngineConfig, FloatKind};
use crate::diagnostics::{BranchEvent, NoopObserver, Observer};
use crate::domain::compare::CompareOutcome;
use crate::domain::equation::Equation;
use crate::domain::symbol::{SymbolId, SymbolKind, SymbolTable};
use crate::error::EngineResult;
use crate::numerics::{FloatFormat, RoundingConfig, RoundingContexts, RoundingFlags, RoundingMode};
use crate::path::{BranchOption, ForkRole, PathExplorer};

/// State restored at the start of every fork of a split
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    symbols: u64,
    rounding: RoundingContexts,
}

impl Checkpoint {
    /// Symbol index at the split
    pub fn symbol_index(&self) -> u64 {
        self.symbols
    }
}

pub struct AnalysisContext {
    config: EngineConfig,
    symbols: SymbolTable,
    rounding: RoundingContexts,
    last_flags: RoundingFlags,
    explorers: Vec<PathExplorer>,
    observer: Box<dyn Observer>,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("config", &self.config)
            .field("symbols", &self.symbols)
            .field("rounding", &self.rounding)
            .field("explorers", &self.explorers.len())
            .finish()
    }
}

impl AnalysisContext {
    pub fn new(config: EngineConfig) -> Self {
        let rounding = RoundingContexts::new(config.rounding);
        Self {
            config,
            symbols: SymbolTable::new(),
            rounding,
            last_flags: RoundingFlags::default(),
            explorers: Vec::new(),
            observer: Box::new(NoopObserver),
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Format of real bounds and coefficients
    pub fn real_format(&self) -> FloatFormat {
        self.config.real
    }

    pub fn format_of(&self, kind: FloatKind) -> FloatFormat {
        self.config.format_of(kind)
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn fresh_symbol(&mut self, kind: SymbolKind) -> SymbolId {
        self.symbols.fresh(kind)
    }

    /// Apply the configured absorption policy to `equation`
    pub fn absorb(&mut self, equation: &mut Equation) -> Option<SymbolId> {
        let limit = self.config.symbol_absorption_limit;
        let protect = self.config.absorption_excludes_constants;
        let symbols = &mut self.symbols;
        equation.absorb(
            limit,
            protect,
            || symbols.fresh(SymbolKind::Absorption),
            &mut self.rounding,
        )
    }

    // ========================================================================
    // Rounding
    // ========================================================================

    pub fn rounding(&self) -> &RoundingContexts {
        &self.rounding
    }

    pub fn rounding_mut(&mut self) -> &mut RoundingContexts {
        &mut self.rounding
    }

    /// Mode of the active configuration
    pub fn rounding_mode(&self) -> RoundingMode {
        self.rounding.active.mode()
    }

    /// Switch the active mode until the returned guard is dropped
    pub fn with_rounding_mode(&mut self, mode: RoundingMode) -> RoundingModeScope<'_> {
        self.rounding.active.push_mode(mode);
        RoundingModeScope { ctx: self }
    }

    /// Flags of the last operation issued through the active configuration
    pub fn last_flags(&self) -> RoundingFlags {
        self.last_flags
    }

    pub(crate) fn set_last_flags(&mut self, flags: RoundingFlags) {
        self.last_flags = flags;
    }

    /// Issue one operation through the active configuration, clearing its
    /// flags first and keeping them as `last_flags`
    pub fn issue<T>(&mut self, op: impl FnOnce(&mut RoundingConfig) -> T) -> T {
        self.rounding.active.clear();
        let result = op(&mut self.rounding.active);
        self.last_flags = self.rounding.active.flags();
        result
    }

    // ========================================================================
    // Observer
    // ========================================================================

    pub fn observer_mut(&mut self) -> &mut dyn Observer {
        self.observer.as_mut()
    }

    // ========================================================================
    // Execution paths
    // ========================================================================

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            symbols: self.symbols.next_index(),
            rounding: self.rounding.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: &Checkpoint) {
        self.symbols.rewind(checkpoint.symbols);
        self.rounding = checkpoint.rounding.clone();
    }

    pub(crate) fn advance_symbols(&mut self, index: u64) {
        self.symbols.advance_to(index);
    }

    /// Role of the innermost fork, `Both` outside any split
    pub fn current_role(&self) -> ForkRole {
        self.explorers
            .last()
            .map(PathExplorer::role)
            .unwrap_or_default()
    }

    /// Number of enclosing splits
    pub fn split_depth(&self) -> usize {
        self.explorers.len()
    }

    /// Resolve the decision point `site`. Outside any split the
    /// implementation outcome is taken.
    pub fn branch(&mut self, site: &str, outcome: &CompareOutcome) -> EngineResult<bool> {
        let role = self.current_role();
        let option = match self.explorers.last_mut() {
            Some(explorer) => explorer.decide(site, outcome)?,
            None if outcome.real_outcomes().contains(&outcome.implementation) => {
                BranchOption::Consistent(outcome.implementation)
            }
            None => BranchOption::FloatSide(outcome.implementation),
        };
        if !outcome.is_stable() {
            warn!(site, %option, real = ?outcome.real, "unstable branch");
        } else {
            trace!(site, %option, "branch");
        }
        let event = BranchEvent {
            site,
            outcome: *outcome,
            option,
            role,
        };
        self.observer.on_branch(&event);
        Ok(option.taken())
    }
}

/// Active rounding mode override, undone on drop
pub struct RoundingModeScope<'a> {
    ctx: &'a mut AnalysisContext,
}

impl Deref for RoundingModeScope<'_> {
    type Target = AnalysisContext;

    fn deref(&self) -> &AnalysisContext {
        self.ctx
    }
}

impl DerefMut for RoundingModeScope<'_> {
    fn deref_mut(&mut self) -> &mut AnalysisContext {
        self.ctx
    }
}

impl Drop for RoundingModeScope<'_> {
    fn drop(&mut self) {
        self.ctx.rounding.active.pop_mode();
    }
}

/// An explorer pushed for the duration of one split; dropping the scope
/// pops it and anything nested above it
pub struct ExplorerScope<'a> {
    ctx: &'a mut AnalysisContext,
    depth: usize,
}

impl<'a> ExplorerScope<'a> {
    pub fn new(ctx: &'a mut AnalysisContext, explorer: PathExplorer) -> Self {
        ctx.explorers.push(explorer);
        let depth = ctx.explorers.len();
        Self { ctx, depth }
    }

    pub fn explorer(&self) -> &PathExplorer {
        &self.ctx.explorers[self.depth - 1]
    }

    pub fn explorer_mut(&mut self) -> &mut PathExplorer {
        &mut self.ctx.explorers[self.depth - 1]
    }
}

impl Deref for ExplorerScope<'_> {
    type Target = AnalysisContext;

    fn deref(&self) -> &AnalysisContext {
        self.ctx
    }
}

impl DerefMut for ExplorerScope<'_> {
    fn deref_mut(&mut self) -> &mut AnalysisContext {
        self.ctx
    }
}

impl Drop for ExplorerScope<'_> {
    fn drop(&mut self) {
        self.ctx.explorers.truncate(self.depth - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compare::{CompareOp, Tristate};

    fn unstable() -> CompareOutcome {
        CompareOutcome {
            op: CompareOp::Gt,
            implementation: true,
            real: Tristate::Unknown,
        }
    }

    #[test]
    fn test_branch_outside_split_follows_implementation() {
        let mut ctx = AnalysisContext::default();
        assert!(ctx.branch("if@0", &unstable()).unwrap());
        assert_eq!(ctx.current_role(), ForkRole::Both);
    }

    #[test]
    fn test_explorer_scope_restores_stack() {
        let mut ctx = AnalysisContext::default();
        {
            let mut outer = ExplorerScope::new(&mut ctx, PathExplorer::new(ForkRole::Both));
            {
                let inner = ExplorerScope::new(&mut outer, PathExplorer::new(ForkRole::RealOnly));
                assert_eq!(inner.split_depth(), 2);
                assert_eq!(inner.current_role(), ForkRole::RealOnly);
            }
            assert_eq!(outer.split_depth(), 1);
            outer.branch("a", &unstable()).unwrap();
            assert_eq!(outer.explorer().forks_opened(), 1);
        }
        assert_eq!(ctx.split_depth(), 0);
    }

    #[test]
    fn test_rounding_mode_scope() {
        let mut ctx = AnalysisContext::default();
        {
            let scope = ctx.with_rounding_mode(RoundingMode::Zero);
            assert_eq!(scope.rounding_mode(), RoundingMode::Zero);
        }
        assert_eq!(ctx.rounding_mode(), RoundingMode::Nearest);
    }

    #[test]
    fn test_checkpoint_restores_symbols() {
        let mut ctx = AnalysisContext::default();
        let checkpoint = ctx.checkpoint();
        let first = ctx.fresh_symbol(SymbolKind::Input);
        ctx.fresh_symbol(SymbolKind::Input);
        ctx.restore(&checkpoint);
        assert_eq!(ctx.fresh_symbol(SymbolKind::Input), first);
        assert_eq!(checkpoint.symbol_index(), 0);
    }
}
