//! Engine configuration.
//!
//! [`EngineConfig`] selects the target float formats, the real working
//! precision, the symbol-absorption policy, the loop bound and the default
//! rounding policy. It is serializable via [`serde`] so it can be stored to
//! and restored from JSON files.
//!
//! # Example
//!
//! ```rust
//! use zonofloat::config::{EngineConfig, FloatKind};
//!
//! let cfg = EngineConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.symbol_absorption_limit, 48);
//! assert_eq!(cfg.format_of(FloatKind::Double).precision(), 53);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::numerics::{FloatFormat, RoundingPolicy};

// ---------------------------------------------------------------------------
// FloatKind
// ---------------------------------------------------------------------------

/// Source-level floating-point type of an analysed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FloatKind {
    Float,
    #[default]
    Double,
    LongDouble,
}

impl std::str::FromStr for FloatKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "single" | "f32" => Ok(FloatKind::Float),
            "double" | "f64" => Ok(FloatKind::Double),
            "long_double" | "long-double" | "extended" => Ok(FloatKind::LongDouble),
            other => Err(ConfigError::invalid(
                "float_kind",
                format!("unknown float kind '{}'", other),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Complete configuration of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // -----------------------------------------------------------------------
    // Formats
    // -----------------------------------------------------------------------
    /// Format of `float` values. Default: **m23e8**.
    pub single: FloatFormat,

    /// Format of `double` values. Default: **m52e11**.
    pub double: FloatFormat,

    /// Format of `long double` values. Default: **m63e15**.
    pub extended: FloatFormat,

    /// Working format of real bounds and affine coefficients. Must contain
    /// every target format. Default: **m123e16**.
    pub real: FloatFormat,

    // -----------------------------------------------------------------------
    // Affine domain
    // -----------------------------------------------------------------------
    /// Maximum number of noise symbols kept per value. Default: **48**.
    pub symbol_absorption_limit: usize,

    /// Keep input symbols out of absorption while other terms remain.
    /// Default: **false**.
    pub absorption_excludes_constants: bool,

    // -----------------------------------------------------------------------
    // Execution paths
    // -----------------------------------------------------------------------
    /// Iteration bound of `continuous_flow`. Default: **10000**.
    pub max_loop_iterations: usize,

    // -----------------------------------------------------------------------
    // Rounding
    // -----------------------------------------------------------------------
    /// Policy of the nearest context; the directed contexts derive from it.
    pub rounding: RoundingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            single: FloatFormat::SINGLE,
            double: FloatFormat::DOUBLE,
            extended: FloatFormat::EXTENDED,
            real: FloatFormat::REAL,
            symbol_absorption_limit: 48,
            absorption_excludes_constants: false,
            max_loop_iterations: 10_000,
            rounding: RoundingPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(contents)
            .map_err(|e| ConfigError::invalid("(file)", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Target format for a source float kind.
    pub fn format_of(&self, kind: FloatKind) -> FloatFormat {
        match kind {
            FloatKind::Float => self.single,
            FloatKind::Double => self.double,
            FloatKind::LongDouble => self.extended,
        }
    }

    /// Check that all fields are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Formats deserialize without the constructor checks.
        for (field, format) in [
            ("single", self.single),
            ("double", self.double),
            ("extended", self.extended),
            ("real", self.real),
        ] {
            FloatFormat::try_new(format.mantissa_bits(), format.exponent_bits())
                .map_err(|_| ConfigError::invalid(field, format!("invalid format {}", format)))?;
        }

        for (field, format) in [
            ("single", self.single),
            ("double", self.double),
            ("extended", self.extended),
        ] {
            if !self.real.contains(format) {
                return Err(ConfigError::invalid(
                    "real",
                    format!("{} is narrower than the {} format {}", self.real, field, format),
                ));
            }
        }

        if self.symbol_absorption_limit < 2 {
            return Err(ConfigError::invalid(
                "symbol_absorption_limit",
                "must be >= 2",
            ));
        }
        if self.max_loop_iterations == 0 {
            return Err(ConfigError::invalid("max_loop_iterations", "must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
