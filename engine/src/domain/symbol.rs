//! Noise symbols.
//!
//! A symbol stands for an unknown quantity in `[-1, 1]`. Symbols are minted
//! by the [`SymbolTable`] of the analysis context with monotonically
//! increasing indices, so ordering by index is ordering by age.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What introduced a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Uncertainty of a program input or constant
    Input,
    /// Error of one rounding step
    Rounding,
    /// Remainder of a linearized operation
    Nonlinear,
    /// Several symbols folded together
    Absorption,
    /// Join of execution paths
    Join,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Input => "input",
            SymbolKind::Rounding => "rounding",
            SymbolKind::Nonlinear => "nonlinear",
            SymbolKind::Absorption => "absorption",
            SymbolKind::Join => "join",
        }
    }
}

/// Identifier of a noise symbol, ordered by minting index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId {
    index: u64,
    kind: SymbolKind,
}

impl SymbolId {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.as_str(), self.index)
    }
}

/// Source of fresh symbols
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    next: u64,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new symbol
    pub fn fresh(&mut self, kind: SymbolKind) -> SymbolId {
        let id = SymbolId {
            index: self.next,
            kind,
        };
        self.next += 1;
        id
    }

    /// Index the next symbol will get
    pub fn next_index(&self) -> u64 {
        self.next
    }

    /// Restart minting from a checkpoint taken with [`Self::next_index`]
    pub fn rewind(&mut self, index: u64) {
        self.next = index;
    }

    /// Never mint an index below `index` again
    pub fn advance_to(&mut self, index: u64) {
        self.next = self.next.max(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_order_by_age() {
        let mut table = SymbolTable::new();
        let a = table.fresh(SymbolKind::Join);
        let b = table.fresh(SymbolKind::Input);
        assert!(a < b);
        assert_eq!(b.to_string(), "input#1");
    }

    #[test]
    fn test_rewind_and_advance() {
        let mut table = SymbolTable::new();
        table.fresh(SymbolKind::Rounding);
        let checkpoint = table.next_index();
        let first = table.fresh(SymbolKind::Rounding);
        table.fresh(SymbolKind::Rounding);
        let reached = table.next_index();
        table.rewind(checkpoint);
        assert_eq!(table.fresh(SymbolKind::Rounding), first);
        table.advance_to(reached);
        table.advance_to(1);
        assert_eq!(table.next_index(), 3);
    }
}
