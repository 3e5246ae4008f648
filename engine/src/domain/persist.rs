//! Textual dumps of zonotopes.
//!
//! `persist` writes everything needed to inspect a value by hand, one field
//! per line; `light_persist` writes a single line; `Display` is the short
//! form used in log fields.

use std::fmt;
use std::io::{self, Write};

use super::zonotope::Zonotope;

impl Zonotope {
    /// Full dump: implementation (hex and decimal), real bounds and every
    /// term of the affine form, each line starting with `prefix`
    pub fn persist(&self, prefix: &str, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "{}implementation: {} ({}) [{}]",
            prefix,
            self.implementation().to_hex_string(),
            self.implementation(),
            self.format()
        )?;
        writeln!(
            out,
            "{}real: [{}, {}] ~ [{}, {}]",
            prefix,
            self.real_min().to_hex_string(),
            self.real_max().to_hex_string(),
            self.real_min(),
            self.real_max()
        )?;
        match self.equation() {
            None => writeln!(out, "{}terms: none", prefix)?,
            Some(equation) => {
                writeln!(out, "{}terms: {}", prefix, equation.len())?;
                for (symbol, coefficient) in equation.iter() {
                    writeln!(
                        out,
                        "{}  {}: {} ({})",
                        prefix,
                        symbol,
                        coefficient.to_hex_string(),
                        coefficient
                    )?;
                }
            }
        }
        Ok(())
    }

    /// One-line dump
    pub fn light_persist(&self, prefix: &str, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "{}{} in [{}, {}] terms={} rel={:e}",
            prefix,
            self.implementation(),
            self.real_min(),
            self.real_max(),
            self.term_count(),
            self.relative_error()
        )
    }
}

impl fmt::Display for Zonotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ∈ [{}, {}]", self.implementation(), self.real_min(), self.real_max())
    }
}
