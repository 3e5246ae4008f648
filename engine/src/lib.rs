//! zonofloat precision-analysis library.
//!
//! This crate computes, for a floating-point computation, both the result
//! a program obtains in its target format and a sound enclosure of the
//! result the same computation has over the reals:
//!
//! - [`numerics`]: arbitrary-width binary floats and the rounding kernel
//! - [`domain`]: the zonotope error domain built on them
//! - [`path`]: split/merge of execution paths where float and real
//!   branches disagree
//! - [`diagnostics`]: notifications, recording and branch traces
//! - [`expr`]: a small expression language driving the engine

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod expr;
pub mod numerics;
pub mod path;

pub use config::{EngineConfig, FloatKind};
pub use context::AnalysisContext;
pub use domain::{CompareOp, CompareOutcome, Tristate, Zonotope};
pub use error::{ConfigError, EngineError, EngineResult, ReadError};
pub use numerics::{BuiltFloat, FloatFormat, RoundingMode};
