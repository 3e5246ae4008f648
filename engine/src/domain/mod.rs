//! Affine error domain.
//!
//! [`Zonotope`] values carry the float result of a computation together
//! with a sound enclosure of its real counterpart, expressed with noise
//! symbols shared across values so that correlated errors cancel.

pub mod compare;
pub mod equation;
pub mod functions;
pub mod ops;
pub mod persist;
pub mod symbol;
pub mod zonotope;

pub use compare::{CompareOp, CompareOutcome, Tristate};
pub use equation::Equation;
pub use symbol::{SymbolId, SymbolKind, SymbolTable};
pub use zonotope::Zonotope;
