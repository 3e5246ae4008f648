//! Rounding Mode Control
//!
//! The rounding kernel narrows a wide, exactly computed intermediate to a
//! target `FloatFormat`. A `RoundingConfig` carries the static rounding
//! policy together with the dynamic flags written by each operation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bitvec::{BitVector, Loss};
use super::float::{BuiltFloat, FloatFormat};

/// IEEE 754 rounding directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round to nearest (ties per `round_to_even`)
    #[default]
    Nearest,
    /// Round toward positive infinity
    Highest,
    /// Round toward negative infinity
    Lowest,
    /// Round toward zero (truncate)
    Zero,
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" | "tonearest" => Ok(RoundingMode::Nearest),
            "highest" | "upward" | "up" => Ok(RoundingMode::Highest),
            "lowest" | "downward" | "down" => Ok(RoundingMode::Lowest),
            "zero" | "towardzero" | "truncate" => Ok(RoundingMode::Zero),
            other => Err(format!("unknown rounding mode '{}'", other)),
        }
    }
}

/// Static half of the rounding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingPolicy {
    pub mode: RoundingMode,
    /// Ties to even under `Nearest`; ties away from zero otherwise
    pub round_to_even: bool,
    /// Saturate overflow at the largest finite value
    pub avoid_infinity: bool,
    /// Propagated NaNs keep their sign
    pub keep_nan_sign: bool,
    /// Without `keep_nan_sign`, propagated NaNs become negative
    pub convert_nan_negative: bool,
    /// In a fused multiply-add, a NaN addend wins over NaN factors
    pub choose_nan_add_before_mult: bool,
    pub produce_div_nan_positive: bool,
    pub produce_add_nan_positive: bool,
    pub produce_mult_nan_positive: bool,
    pub produce_sqrt_nan_positive: bool,
    /// Exact cancellation yields +0 even when rounding toward -inf
    pub positive_zero_mixed_add: bool,
    /// Propagated signaling NaNs are quieted
    pub quiet_signaling_nan: bool,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            mode: RoundingMode::Nearest,
            round_to_even: true,
            avoid_infinity: false,
            keep_nan_sign: true,
            convert_nan_negative: false,
            choose_nan_add_before_mult: false,
            produce_div_nan_positive: true,
            produce_add_nan_positive: true,
            produce_mult_nan_positive: true,
            produce_sqrt_nan_positive: true,
            positive_zero_mixed_add: false,
            quiet_signaling_nan: true,
        }
    }
}

impl RoundingPolicy {
    pub fn with_mode(mut self, mode: RoundingMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Direction of the rounding error of the last operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Approximation {
    #[default]
    Exact,
    /// Result is below the exact value
    Down,
    /// Result is above the exact value
    Up,
}

/// Why an operation produced a NaN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NanCase {
    Propagated,
    InfMinusInf,
    ZeroTimesInf,
    ZeroDivZero,
    InfDivInf,
    SqrtNegative,
    Domain,
}

/// Dynamic half of the rounding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundingFlags {
    pub approximation: Approximation,
    pub overflow: bool,
    pub underflow: bool,
    pub division_by_zero: bool,
    pub nan_case: Option<NanCase>,
}

impl RoundingFlags {
    pub fn inexact(&self) -> bool {
        self.approximation != Approximation::Exact
    }

    /// Accumulate the flags of a later operation
    pub fn merge(&mut self, other: &RoundingFlags) {
        if other.inexact() {
            self.approximation = other.approximation;
        }
        self.overflow |= other.overflow;
        self.underflow |= other.underflow;
        self.division_by_zero |= other.division_by_zero;
        if other.nan_case.is_some() {
            self.nan_case = other.nan_case;
        }
    }
}

/// Rounding policy plus the flags of the operations issued through it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundingConfig {
    pub policy: RoundingPolicy,
    pub flags: RoundingFlags,
    /// Saved rounding modes (for restore)
    saved_modes: Vec<RoundingMode>,
}

impl RoundingConfig {
    pub fn new(policy: RoundingPolicy) -> Self {
        Self {
            policy,
            flags: RoundingFlags::default(),
            saved_modes: Vec::new(),
        }
    }

    /// Default policy with a specific mode
    pub fn with_mode(mode: RoundingMode) -> Self {
        Self::new(RoundingPolicy::default().with_mode(mode))
    }

    pub fn nearest() -> Self {
        Self::with_mode(RoundingMode::Nearest)
    }

    /// Directed rounding toward +inf with infinities allowed
    pub fn upward() -> Self {
        Self::with_mode(RoundingMode::Highest)
    }

    /// Directed rounding toward -inf with infinities allowed
    pub fn downward() -> Self {
        Self::with_mode(RoundingMode::Lowest)
    }

    pub fn mode(&self) -> RoundingMode {
        self.policy.mode
    }

    pub fn set_mode(&mut self, mode: RoundingMode) {
        self.policy.mode = mode;
    }

    /// Save current mode and switch to a new one
    pub fn push_mode(&mut self, mode: RoundingMode) {
        self.saved_modes.push(self.policy.mode);
        self.policy.mode = mode;
    }

    /// Restore previously saved mode
    pub fn pop_mode(&mut self) {
        if let Some(mode) = self.saved_modes.pop() {
            self.policy.mode = mode;
        }
    }

    /// Reset the dynamic flags, keeping the policy
    pub fn clear(&mut self) {
        self.flags = RoundingFlags::default();
    }

    /// Flags written since the last `clear`
    pub fn flags(&self) -> RoundingFlags {
        self.flags
    }
}

/// The three rounding configurations an analysis keeps alive: the active
/// one for instrumented values and the two directed ones for enclosures
#[derive(Debug, Clone, PartialEq)]
pub struct RoundingContexts {
    pub active: RoundingConfig,
    pub min_params: RoundingConfig,
    pub max_params: RoundingConfig,
}

impl RoundingContexts {
    pub fn new(policy: RoundingPolicy) -> Self {
        let directed = RoundingPolicy {
            avoid_infinity: false,
            ..policy
        };
        Self {
            active: RoundingConfig::new(policy),
            min_params: RoundingConfig::new(directed.with_mode(RoundingMode::Lowest)),
            max_params: RoundingConfig::new(directed.with_mode(RoundingMode::Highest)),
        }
    }
}

impl Default for RoundingContexts {
    fn default() -> Self {
        Self::new(RoundingPolicy::default())
    }
}

/// Exact (or sticky-marked) intermediate value
/// `(-1)^negative * (significand + sticky) * 2^exponent`, where `sticky`
/// stands for a non-zero fraction strictly below the significand's last bit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideFloat {
    pub negative: bool,
    pub significand: BitVector,
    pub exponent: i64,
    pub sticky: bool,
}

impl WideFloat {
    pub fn new(negative: bool, significand: BitVector, exponent: i64) -> Self {
        Self {
            negative,
            significand,
            exponent,
            sticky: false,
        }
    }

    /// Exact image of a finite value, `None` for infinities and NaNs
    pub fn from_float(value: &BuiltFloat) -> Option<Self> {
        let (significand, exponent) = value.decompose()?;
        Some(Self::new(value.is_negative(), significand, exponent))
    }

    pub fn from_i64(value: i64) -> Self {
        Self::new(
            value < 0,
            BitVector::from_u64(64, value.unsigned_abs()),
            0,
        )
    }

    /// True zero (no significand bits and no sticky fraction)
    pub fn is_zero(&self) -> bool {
        self.significand.is_zero() && !self.sticky
    }

    /// Exponent of the leading significand bit
    pub fn lead_exponent(&self) -> Option<i64> {
        match self.significand.omsb() {
            0 => None,
            bits => Some(self.exponent + bits as i64 - 1),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negative = !self.negative;
        self
    }
}

pub(crate) fn should_increment(policy: &RoundingPolicy, negative: bool, loss: Loss, lsb: bool) -> bool {
    if loss == Loss::ExactlyZero {
        return false;
    }
    match policy.mode {
        RoundingMode::Nearest => match loss {
            Loss::MoreThanHalf => true,
            Loss::ExactlyHalf => !policy.round_to_even || lsb,
            _ => false,
        },
        RoundingMode::Highest => !negative,
        RoundingMode::Lowest => negative,
        RoundingMode::Zero => false,
    }
}

pub(crate) fn direction(negative: bool, magnitude_up: bool) -> Approximation {
    match (negative, magnitude_up) {
        (false, true) | (true, false) => Approximation::Up,
        (false, false) | (true, true) => Approximation::Down,
    }
}

/// Result of an operation whose exact magnitude exceeds the format
pub fn overflow_result(format: FloatFormat, negative: bool, config: &mut RoundingConfig) -> BuiltFloat {
    let policy = config.policy;
    let toward_infinity = match policy.mode {
        RoundingMode::Nearest => true,
        RoundingMode::Highest => !negative,
        RoundingMode::Lowest => negative,
        RoundingMode::Zero => false,
    } && !policy.avoid_infinity;
    config.flags.overflow = true;
    config.flags.approximation = direction(negative, toward_infinity);
    if toward_infinity {
        BuiltFloat::infinity(format, negative)
    } else {
        BuiltFloat::largest(format, negative)
    }
}

/// Round a wide intermediate to `format` under `config`, writing the
/// approximation direction, overflow and underflow into its flags.
///
/// When `sticky` is set the significand must carry at least one bit below
/// the target precision, so the sticky fraction lies below the round bit.
pub fn round(wide: &WideFloat, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    let policy = config.policy;
    let negative = wide.negative;
    let p = format.precision() as i64;
    let bits = wide.significand.omsb();

    if bits == 0 {
        if !wide.sticky {
            config.flags.approximation = Approximation::Exact;
            return BuiltFloat::zero(format, negative);
        }
        // Only a fraction below an empty significand: a tiny non-zero value.
        config.flags.underflow = true;
        let up = should_increment(&policy, negative, Loss::LessThanHalf, false);
        config.flags.approximation = direction(negative, up);
        return if up {
            BuiltFloat::smallest(format, negative)
        } else {
            BuiltFloat::zero(format, negative)
        };
    }

    let lead = wide.exponent + bits as i64 - 1;
    let tiny_lsb = format.min_exponent() - (p - 1);
    let mut lsb_exponent = (lead - (p - 1)).max(tiny_lsb);
    let shift = lsb_exponent - wide.exponent;
    debug_assert!(!wide.sticky || shift >= 1, "sticky value without guard bits");

    let width = (p + 1) as usize;
    let (mut kept, mut loss) = if shift > 0 {
        let mut kept = wide.significand.clone();
        let loss = kept.shr_assign(shift as usize);
        kept.resize(width);
        (kept, loss)
    } else {
        let mut kept = wide.significand.resized(width);
        kept.shl_assign((-shift) as usize);
        (kept, Loss::ExactlyZero)
    };
    if wide.sticky {
        loss = loss.combine(Loss::LessThanHalf);
    }

    let increment = should_increment(&policy, negative, loss, kept.bit(0));
    if increment {
        kept.increment();
        if kept.omsb() as i64 == p + 1 {
            kept.shr_assign(1);
            lsb_exponent += 1;
        }
    }

    let kept_bits = kept.omsb() as i64;
    let inexact = !loss.is_exact();
    config.flags.approximation = if inexact {
        direction(negative, increment)
    } else {
        Approximation::Exact
    };

    if kept_bits == 0 {
        config.flags.underflow |= inexact;
        return BuiltFloat::zero(format, negative);
    }

    let result_lead = lsb_exponent + kept_bits - 1;
    if result_lead > format.max_exponent() {
        return overflow_result(format, negative, config);
    }

    if kept_bits == p {
        let biased = (result_lead + format.bias()) as u64;
        BuiltFloat::from_fields(format, negative, biased, &kept)
    } else {
        debug_assert_eq!(lsb_exponent, tiny_lsb);
        config.flags.underflow |= inexact;
        BuiltFloat::from_fields(format, negative, 0, &kept)
    }
}
