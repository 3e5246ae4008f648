//! Arbitrary-Precision Floating-Point Numerics
//!
//! Bit-exact binary floating-point arithmetic at any mantissa/exponent width.
//! Results are computed exactly (or with a sticky bit) and rounded once by
//! the kernel in [`rounding`], so a format with the widths of the host
//! `f32`/`f64` reproduces the host results bit for bit.
//!
//! # Layers
//!
//! - **Storage**: [`BitVector`] word arrays with carry, shift and loss tracking
//! - **Values**: [`BuiltFloat`] parametrized by a [`FloatFormat`]
//! - **Rounding kernel**: [`round`] driven by a [`RoundingConfig`]
//! - **Arithmetic**: exact-then-round operations in [`arith`]
//! - **Projection**: widening, narrowing and literal parsing in [`convert`]
//! - **Enclosures**: directed-rounding [`Interval`]s and sound
//!   transcendental enclosures in [`transcendental`]

pub mod arith;
pub mod bitvec;
pub mod convert;
pub mod float;
pub mod interval;
pub mod rounding;
pub mod transcendental;

pub use bitvec::{BitVector, Loss};
pub use convert::{
    convert, from_f32, from_f64, from_i64, from_u64, parse_literal, to_f32, to_f64, widen,
};
pub use float::{BuiltFloat, FloatFormat};
pub use interval::Interval;
pub use rounding::{
    round, Approximation, NanCase, RoundingConfig, RoundingContexts, RoundingFlags,
    RoundingMode, RoundingPolicy, WideFloat,
};
