//! Arbitrary-Width Binary Floating Point
//!
//! A `BuiltFloat` is an IEEE-754 style value whose mantissa and exponent
//! widths come from a runtime `FloatFormat`. The encoding follows the
//! standard interchange layout: a sign, a biased exponent field and a stored
//! fraction with an implicit leading bit for normal numbers.
//!
//! Equality (`==`) is bit identity of the encoding. Numeric ordering with
//! IEEE semantics goes through [`BuiltFloat::compare`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::bitvec::BitVector;
use crate::error::ConfigError;

/// Widths of a binary floating-point format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatFormat {
    /// Stored fraction width (precision is one more)
    mantissa_bits: u32,
    /// Exponent field width
    exponent_bits: u32,
}

impl FloatFormat {
    /// IEEE binary16
    pub const HALF: FloatFormat = FloatFormat::new(10, 5);
    /// IEEE binary32
    pub const SINGLE: FloatFormat = FloatFormat::new(23, 8);
    /// IEEE binary64
    pub const DOUBLE: FloatFormat = FloatFormat::new(52, 11);
    /// x87 extended precision (64-bit significand)
    pub const EXTENDED: FloatFormat = FloatFormat::new(63, 15);
    /// IEEE binary128
    pub const QUAD: FloatFormat = FloatFormat::new(112, 15);
    /// Working format for real-number enclosures
    pub const REAL: FloatFormat = FloatFormat::new(123, 16);

    /// Create a format; panics on widths the encoding cannot support
    pub const fn new(mantissa_bits: u32, exponent_bits: u32) -> Self {
        assert!(mantissa_bits > 0, "a format needs at least one fraction bit");
        assert!(
            exponent_bits >= 2 && exponent_bits <= 30,
            "exponent width must be within 2..=30"
        );
        Self {
            mantissa_bits,
            exponent_bits,
        }
    }

    /// Checked construction for configuration-driven formats
    pub fn try_new(mantissa_bits: u32, exponent_bits: u32) -> Result<Self, ConfigError> {
        if mantissa_bits == 0 {
            return Err(ConfigError::invalid(
                "mantissa_bits",
                "must be at least 1",
            ));
        }
        if !(2..=30).contains(&exponent_bits) {
            return Err(ConfigError::invalid(
                "exponent_bits",
                format!("{} is outside 2..=30", exponent_bits),
            ));
        }
        Ok(Self::new(mantissa_bits, exponent_bits))
    }

    pub fn mantissa_bits(&self) -> u32 {
        self.mantissa_bits
    }

    pub fn exponent_bits(&self) -> u32 {
        self.exponent_bits
    }

    /// Significand precision including the implicit bit
    pub fn precision(&self) -> usize {
        self.mantissa_bits as usize + 1
    }

    /// Exponent bias
    pub fn bias(&self) -> i64 {
        (1i64 << (self.exponent_bits - 1)) - 1
    }

    /// Largest unbiased exponent of a finite value
    pub fn max_exponent(&self) -> i64 {
        self.bias()
    }

    /// Smallest unbiased exponent of a normal value
    pub fn min_exponent(&self) -> i64 {
        1 - self.bias()
    }

    /// Total encoding width
    pub fn total_bits(&self) -> u32 {
        1 + self.exponent_bits + self.mantissa_bits
    }

    /// Whether every value of `other` is exactly representable in `self`
    pub fn contains(&self, other: FloatFormat) -> bool {
        self.mantissa_bits >= other.mantissa_bits
            && self.exponent_bits >= other.exponent_bits
    }

    fn exponent_all_ones(&self) -> u64 {
        (1u64 << self.exponent_bits) - 1
    }
}

impl fmt::Display for FloatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}e{}", self.mantissa_bits, self.exponent_bits)
    }
}

/// Floating-point value of a runtime format
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BuiltFloat {
    format: FloatFormat,
    negative: bool,
    exponent: BitVector,
    mantissa: BitVector,
}

impl BuiltFloat {
    // ==================================================================
    // Construction
    // ==================================================================

    /// Build from raw fields; the mantissa is truncated to the format width
    pub fn from_fields(
        format: FloatFormat,
        negative: bool,
        biased_exponent: u64,
        mantissa: &BitVector,
    ) -> Self {
        assert!(
            biased_exponent <= format.exponent_all_ones(),
            "biased exponent {} does not fit {} bits",
            biased_exponent,
            format.exponent_bits
        );
        Self {
            format,
            negative,
            exponent: BitVector::from_u64(format.exponent_bits as usize, biased_exponent),
            mantissa: mantissa.resized(format.mantissa_bits as usize),
        }
    }

    pub fn zero(format: FloatFormat, negative: bool) -> Self {
        Self::from_fields(format, negative, 0, &BitVector::new(0))
    }

    pub fn one(format: FloatFormat) -> Self {
        Self::from_fields(format, false, format.bias() as u64, &BitVector::new(0))
    }

    pub fn infinity(format: FloatFormat, negative: bool) -> Self {
        Self::from_fields(
            format,
            negative,
            format.exponent_all_ones(),
            &BitVector::new(0),
        )
    }

    /// Default quiet NaN (only the quiet bit set)
    pub fn quiet_nan(format: FloatFormat, negative: bool) -> Self {
        let m = format.mantissa_bits as usize;
        Self::from_fields(
            format,
            negative,
            format.exponent_all_ones(),
            &BitVector::power_of_two(m, m - 1),
        )
    }

    /// Signaling NaN with the smallest payload
    pub fn signaling_nan(format: FloatFormat, negative: bool) -> Self {
        let m = format.mantissa_bits as usize;
        assert!(m >= 2, "a signaling NaN needs a payload bit besides the quiet bit");
        Self::from_fields(
            format,
            negative,
            format.exponent_all_ones(),
            &BitVector::from_u64(m, 1),
        )
    }

    /// Largest finite magnitude
    pub fn largest(format: FloatFormat, negative: bool) -> Self {
        Self::from_fields(
            format,
            negative,
            format.exponent_all_ones() - 1,
            &BitVector::ones(format.mantissa_bits as usize),
        )
    }

    pub fn smallest_normal(format: FloatFormat, negative: bool) -> Self {
        Self::from_fields(format, negative, 1, &BitVector::new(0))
    }

    /// Smallest subnormal magnitude
    pub fn smallest(format: FloatFormat, negative: bool) -> Self {
        Self::from_fields(
            format,
            negative,
            0,
            &BitVector::from_u64(format.mantissa_bits as usize, 1),
        )
    }

    /// `2^exponent`, flushed to zero below the subnormal range and to
    /// infinity above the finite range
    pub fn power_of_two(format: FloatFormat, exponent: i64) -> Self {
        let m = format.mantissa_bits as i64;
        if exponent > format.max_exponent() {
            Self::infinity(format, false)
        } else if exponent >= format.min_exponent() {
            Self::from_fields(
                format,
                false,
                (exponent + format.bias()) as u64,
                &BitVector::new(0),
            )
        } else if exponent >= format.min_exponent() - m {
            let position = (exponent - (format.min_exponent() - m)) as usize;
            Self::from_fields(
                format,
                false,
                0,
                &BitVector::power_of_two(m as usize, position),
            )
        } else {
            Self::zero(format, false)
        }
    }

    /// Decode an interchange encoding of at most 128 bits
    pub fn from_bits(format: FloatFormat, bits: u128) -> Self {
        assert!(format.total_bits() <= 128, "raw import is limited to 128 bits");
        let m = format.mantissa_bits;
        let e = format.exponent_bits;
        let mantissa = BitVector::from_u128(m as usize, bits);
        let exponent = ((bits >> m) as u64) & format.exponent_all_ones();
        let negative = (bits >> (m + e)) & 1 == 1;
        Self::from_fields(format, negative, exponent, &mantissa)
    }

    /// Encode to the interchange layout of at most 128 bits
    pub fn to_bits(&self) -> u128 {
        assert!(
            self.format.total_bits() <= 128,
            "raw export is limited to 128 bits"
        );
        let m = self.format.mantissa_bits;
        let e = self.format.exponent_bits;
        let mut bits = self.mantissa.low_u128();
        bits |= (self.biased_exponent() as u128) << m;
        if self.negative {
            bits |= 1u128 << (m + e);
        }
        bits
    }

    // ==================================================================
    // Accessors and classification
    // ==================================================================

    pub fn format(&self) -> FloatFormat {
        self.format
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Stored fraction field
    pub fn mantissa(&self) -> &BitVector {
        &self.mantissa
    }

    /// Raw biased exponent field
    pub fn biased_exponent(&self) -> u64 {
        self.exponent.cells().first().copied().unwrap_or(0)
    }

    fn has_max_exponent(&self) -> bool {
        self.biased_exponent() == self.format.exponent_all_ones()
    }

    pub fn is_nan(&self) -> bool {
        self.has_max_exponent() && !self.mantissa.is_zero()
    }

    pub fn is_signaling(&self) -> bool {
        self.is_nan() && !self.mantissa.bit(self.format.mantissa_bits as usize - 1)
    }

    pub fn is_infinite(&self) -> bool {
        self.has_max_exponent() && self.mantissa.is_zero()
    }

    pub fn is_finite(&self) -> bool {
        !self.has_max_exponent()
    }

    pub fn is_zero(&self) -> bool {
        self.biased_exponent() == 0 && self.mantissa.is_zero()
    }

    pub fn is_subnormal(&self) -> bool {
        self.biased_exponent() == 0 && !self.mantissa.is_zero()
    }

    /// Finite value with no fractional part
    pub fn is_integral(&self) -> bool {
        match self.decompose() {
            Some((significand, exponent)) => {
                exponent >= 0
                    || significand.is_zero()
                    || significand.trailing_zeros() as i64 >= -exponent
            }
            None => false,
        }
    }

    /// Integer significand and binary exponent of a finite value, so that
    /// `|self| = significand * 2^exponent`
    pub fn decompose(&self) -> Option<(BitVector, i64)> {
        if !self.is_finite() {
            return None;
        }
        let m = self.format.mantissa_bits as usize;
        let precision = self.format.precision();
        let mut significand = self.mantissa.resized(precision);
        let biased = self.biased_exponent() as i64;
        if biased == 0 {
            return Some((significand, self.format.min_exponent() - m as i64));
        }
        significand.set_bit(m, true);
        Some((significand, biased - self.format.bias() - m as i64))
    }

    /// Unbiased exponent of the leading bit of a finite non-zero value
    pub fn lead_exponent(&self) -> Option<i64> {
        let (significand, exponent) = self.decompose()?;
        let bits = significand.omsb();
        if bits == 0 {
            return None;
        }
        Some(exponent + bits as i64 - 1)
    }

    // ==================================================================
    // Sign manipulation
    // ==================================================================

    pub fn neg(&self) -> Self {
        let mut result = self.clone();
        result.negative = !result.negative;
        result
    }

    pub fn abs(&self) -> Self {
        self.with_sign(false)
    }

    pub fn with_sign(&self, negative: bool) -> Self {
        let mut result = self.clone();
        result.negative = negative;
        result
    }

    pub fn copy_sign(&self, other: &BuiltFloat) -> Self {
        self.with_sign(other.negative)
    }

    /// Quiet a signaling NaN by setting the top fraction bit
    pub fn quieted(&self) -> Self {
        let mut result = self.clone();
        if result.is_nan() {
            let top = self.format.mantissa_bits as usize - 1;
            result.mantissa.set_bit(top, true);
        }
        result
    }

    // ==================================================================
    // Neighbours
    // ==================================================================

    /// Exponent and fraction as one unsigned integer
    fn magnitude_bits(&self) -> BitVector {
        let m = self.format.mantissa_bits as usize;
        let mut bits = self.exponent.resized(m + self.format.exponent_bits as usize);
        bits.shl_assign(m);
        bits.add_assign(&self.mantissa);
        bits
    }

    fn from_magnitude_bits(format: FloatFormat, negative: bool, bits: &BitVector) -> Self {
        let m = format.mantissa_bits as usize;
        let mantissa = bits.resized(m);
        let mut exponent = bits.clone();
        exponent.shr_assign(m);
        let biased = exponent.to_u64().unwrap_or(format.exponent_all_ones());
        Self::from_fields(format, negative, biased, &mantissa)
    }

    /// Least value greater than `self`
    pub fn next_up(&self) -> Self {
        if self.is_nan() {
            return self.quieted();
        }
        if self.is_zero() {
            return Self::smallest(self.format, false);
        }
        if self.is_infinite() {
            return if self.negative {
                Self::largest(self.format, true)
            } else {
                self.clone()
            };
        }
        let mut bits = self.magnitude_bits();
        if self.negative {
            bits.decrement();
        } else {
            bits.increment();
        }
        Self::from_magnitude_bits(self.format, self.negative, &bits)
    }

    /// Greatest value less than `self`
    pub fn next_down(&self) -> Self {
        self.neg().next_up().neg()
    }

    /// Weight of the last fraction bit at this value's binade
    pub fn ulp(&self) -> Self {
        if self.is_nan() {
            return self.quieted();
        }
        if self.is_infinite() {
            return Self::infinity(self.format, false);
        }
        let m = self.format.mantissa_bits as i64;
        let binade = match self.lead_exponent() {
            Some(lead) => lead.max(self.format.min_exponent()),
            None => self.format.min_exponent(),
        };
        Self::power_of_two(self.format, binade - m)
    }

    // ==================================================================
    // Ordering
    // ==================================================================

    /// IEEE comparison: `None` when either side is NaN, `-0 == +0`
    pub fn compare(&self, other: &BuiltFloat) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        if self.is_zero() && other.is_zero() {
            return Some(Ordering::Equal);
        }
        if self.negative != other.negative {
            return Some(if self.negative {
                Ordering::Less
            } else {
                Ordering::Greater
            });
        }
        let magnitude = self.compare_magnitude(other);
        Some(if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        })
    }

    /// Compare absolute values of encodings of possibly different formats
    pub fn compare_magnitude(&self, other: &BuiltFloat) -> Ordering {
        if self.format == other.format {
            return self.magnitude_bits().cmp_value(&other.magnitude_bits());
        }
        match (self.is_finite(), other.is_finite()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (true, true) => {
                let (sa, ea) = self.decompose().unwrap_or((BitVector::new(1), 0));
                let (sb, eb) = other.decompose().unwrap_or((BitVector::new(1), 0));
                compare_scaled(&sa, ea, &sb, eb)
            }
        }
    }

    /// IEEE totalOrder
    pub fn total_cmp(&self, other: &BuiltFloat) -> Ordering {
        match (self.negative, other.negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.magnitude_bits().cmp_value(&other.magnitude_bits()),
            (true, true) => other.magnitude_bits().cmp_value(&self.magnitude_bits()),
        }
    }

    /// Larger of two values under IEEE ordering (`self` wins ties and NaNs)
    pub fn max_of<'a>(&'a self, other: &'a BuiltFloat) -> &'a BuiltFloat {
        match self.compare(other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }

    /// Smaller of two values under IEEE ordering (`self` wins ties and NaNs)
    pub fn min_of<'a>(&'a self, other: &'a BuiltFloat) -> &'a BuiltFloat {
        match self.compare(other) {
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    // ==================================================================
    // Debug output
    // ==================================================================

    /// Hexadecimal floating-point notation, e.g. `0x1.8p+1`
    pub fn to_hex_string(&self) -> String {
        let sign = if self.negative { "-" } else { "" };
        if self.is_nan() {
            let kind = if self.is_signaling() { "snan" } else { "nan" };
            return format!("{}{}", sign, kind);
        }
        if self.is_infinite() {
            return format!("{}inf", sign);
        }
        if self.is_zero() {
            return format!("{}0x0p+0", sign);
        }
        let m = self.format.mantissa_bits as usize;
        let pad = (4 - m % 4) % 4;
        let mut fraction = self.mantissa.resized(m + pad);
        fraction.shl_assign(pad);
        let digits = (m + pad) / 4;
        let mut hex = format!("{:0>width$}", fraction.to_hex(), width = digits);
        while hex.ends_with('0') {
            hex.pop();
        }
        let (lead, exponent) = if self.is_subnormal() {
            ('0', self.format.min_exponent())
        } else {
            ('1', self.biased_exponent() as i64 - self.format.bias())
        };
        if hex.is_empty() {
            format!("{}0x{}p{:+}", sign, lead, exponent)
        } else {
            format!("{}0x{}.{}p{:+}", sign, lead, hex, exponent)
        }
    }
}

/// Compare `a * 2^ea` against `b * 2^eb`
pub(crate) fn compare_scaled(a: &BitVector, ea: i64, b: &BitVector, eb: i64) -> Ordering {
    match (a.is_zero(), b.is_zero()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let lead_a = ea + a.omsb() as i64;
    let lead_b = eb + b.omsb() as i64;
    if lead_a != lead_b {
        return lead_a.cmp(&lead_b);
    }
    let base = ea.min(eb);
    let width = (lead_a - base) as usize + 1;
    let mut wa = a.resized(width);
    wa.shl_assign((ea - base) as usize);
    let mut wb = b.resized(width);
    wb.shl_assign((eb - base) as usize);
    wa.cmp_value(&wb)
}

impl fmt::Debug for BuiltFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltFloat({}: {})", self.format, self.to_hex_string())
    }
}

impl fmt::Display for BuiltFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", super::convert::to_f64(self))
    }
}
