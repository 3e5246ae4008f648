//! Projection Between Formats
//!
//! Forward projection widens a value exactly into a format that contains
//! it; backward projection narrows it through the rounding kernel. Host
//! `f32`/`f64`, integers and textual literals enter the engine here.

use super::arith::wide_div;
use super::bitvec::BitVector;
use super::float::{BuiltFloat, FloatFormat};
use super::rounding::{round, NanCase, RoundingConfig, WideFloat};
use crate::error::ReadError;

/// Project `value` into `format`, rounding under `config` when narrowing
pub fn convert(value: &BuiltFloat, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    if value.format() == format {
        return value.clone();
    }
    if value.is_nan() {
        return convert_nan(value, format, config);
    }
    if value.is_infinite() {
        return BuiltFloat::infinity(format, value.is_negative());
    }
    match WideFloat::from_float(value) {
        Some(wide) if !value.is_zero() => round(&wide, format, config),
        _ => BuiltFloat::zero(format, value.is_negative()),
    }
}

/// NaN payloads keep their most significant bits across formats
fn convert_nan(value: &BuiltFloat, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    let from = value.format().mantissa_bits() as usize;
    let to = format.mantissa_bits() as usize;
    let mut payload = value.mantissa().clone();
    if to >= from {
        payload.resize(to);
        payload.shl_assign(to - from);
    } else {
        payload.shr_assign(from - to);
        payload.resize(to);
    }
    let all_ones = (1u64 << format.exponent_bits()) - 1;
    let mut result = BuiltFloat::from_fields(format, value.is_negative(), all_ones, &payload);
    if !result.is_nan() {
        result = BuiltFloat::quiet_nan(format, value.is_negative());
    }
    if result.is_signaling() && config.policy.quiet_signaling_nan {
        config.flags.nan_case = Some(NanCase::Propagated);
        result = result.quieted();
    }
    result
}

/// Exact widening; panics if `format` does not contain the value's format
pub fn widen(value: &BuiltFloat, format: FloatFormat) -> BuiltFloat {
    assert!(
        format.contains(value.format()),
        "cannot widen {} into {}",
        value.format(),
        format
    );
    let mut exact = RoundingConfig::nearest();
    exact.policy.quiet_signaling_nan = false;
    convert(value, format, &mut exact)
}

pub fn from_f64(x: f64, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    let host = BuiltFloat::from_bits(FloatFormat::DOUBLE, x.to_bits() as u128);
    convert(&host, format, config)
}

pub fn from_f32(x: f32, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    let host = BuiltFloat::from_bits(FloatFormat::SINGLE, x.to_bits() as u128);
    convert(&host, format, config)
}

pub fn from_i64(n: i64, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    if n == 0 {
        return BuiltFloat::zero(format, false);
    }
    round(&WideFloat::from_i64(n), format, config)
}

pub fn from_u64(n: u64, format: FloatFormat, config: &mut RoundingConfig) -> BuiltFloat {
    if n == 0 {
        return BuiltFloat::zero(format, false);
    }
    round(
        &WideFloat::new(false, BitVector::from_u64(64, n), 0),
        format,
        config,
    )
}

/// Nearest host double
pub fn to_f64(value: &BuiltFloat) -> f64 {
    let mut nearest = RoundingConfig::nearest();
    let double = convert(value, FloatFormat::DOUBLE, &mut nearest);
    f64::from_bits(double.to_bits() as u64)
}

/// Nearest host single
pub fn to_f32(value: &BuiltFloat) -> f32 {
    let mut nearest = RoundingConfig::nearest();
    let single = convert(value, FloatFormat::SINGLE, &mut nearest);
    f32::from_bits(single.to_bits() as u32)
}

// ============================================================================
// Literal parsing
// ============================================================================

/// Shape of a scanned literal before it is evaluated in a format
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scanned {
    /// `digits * 10^exponent`
    Decimal {
        digits: BitVector,
        significant_digits: usize,
        exponent: i64,
    },
    /// `digits * 2^exponent`
    Binary { digits: BitVector, exponent: i64 },
    Infinity,
    NaN,
}

/// Parse a decimal or hexadecimal floating-point literal and round it into
/// `format`. Accepts `-12.5e-3`, `.5`, `1e10`, `0x1.8p3`, `inf`, `nan`.
pub fn parse_literal(
    text: &str,
    format: FloatFormat,
    config: &mut RoundingConfig,
) -> Result<BuiltFloat, ReadError> {
    let (negative, scanned) = scan(text.trim()).map_err(|message| ReadError::new(text, message))?;
    let value = match scanned {
        Scanned::Infinity => BuiltFloat::infinity(format, negative),
        Scanned::NaN => BuiltFloat::quiet_nan(format, negative),
        Scanned::Binary { digits, exponent } => {
            if digits.is_zero() {
                BuiltFloat::zero(format, negative)
            } else {
                round(&WideFloat::new(negative, digits, exponent), format, config)
            }
        }
        Scanned::Decimal {
            digits,
            significant_digits,
            exponent,
        } => decimal_to_float(negative, &digits, significant_digits, exponent, format, config),
    };
    Ok(value)
}

fn decimal_to_float(
    negative: bool,
    digits: &BitVector,
    significant_digits: usize,
    exponent: i64,
    format: FloatFormat,
    config: &mut RoundingConfig,
) -> BuiltFloat {
    if digits.is_zero() {
        return BuiltFloat::zero(format, negative);
    }
    let log10_2 = std::f64::consts::LOG10_2;
    let order = exponent.saturating_add(significant_digits as i64);
    let max_order = ((format.max_exponent() + 2) as f64 * log10_2).ceil() as i64 + 1;
    let min_order = -((((1 - format.min_exponent()) + format.mantissa_bits() as i64 + 2) as f64
        * log10_2)
        .ceil() as i64
        + 1);

    if order > max_order {
        let huge = WideFloat::new(negative, BitVector::from_u64(1, 1), format.max_exponent() + 2);
        return round(&huge, format, config);
    }
    if order < min_order {
        let tiny_exponent = format.min_exponent() - format.mantissa_bits() as i64 - 3;
        let tiny = WideFloat::new(negative, BitVector::from_u64(1, 1), tiny_exponent);
        return round(&tiny, format, config);
    }

    let numerator = WideFloat::new(negative, digits.clone(), 0);
    if exponent >= 0 {
        let scale = BitVector::pow10(exponent as u32);
        let exact = WideFloat::new(negative, digits.mul(&scale), 0);
        round(&exact, format, config)
    } else {
        let denominator = WideFloat::new(false, BitVector::pow10((-exponent) as u32), 0);
        let quotient = wide_div(&numerator, &denominator, format.precision());
        round(&quotient, format, config)
    }
}

fn scan(text: &str) -> Result<(bool, Scanned), String> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        Some(_) => (false, text),
        None => return Err("empty literal".into()),
    };
    let lower = body.to_ascii_lowercase();
    if lower == "inf" || lower == "infinity" {
        return Ok((negative, Scanned::Infinity));
    }
    if lower == "nan" {
        return Ok((negative, Scanned::NaN));
    }
    if let Some(hex) = lower.strip_prefix("0x") {
        return scan_hex(hex).map(|s| (negative, s));
    }
    scan_decimal(&lower).map(|s| (negative, s))
}

/// Split `mantissa[.fraction][<marker>exponent]`
fn split_parts(text: &str, marker: char) -> Result<(&str, &str, Option<&str>), String> {
    let (mantissa, exponent) = match text.find(marker) {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    };
    let (integer, fraction) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if integer.is_empty() && fraction.is_empty() {
        return Err("missing digits".into());
    }
    Ok((integer, fraction, exponent))
}

fn parse_exponent(text: Option<&str>) -> Result<i64, String> {
    let Some(text) = text else {
        return Ok(0);
    };
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return Err("missing exponent digits".into());
    }
    let mut value: i64 = 0;
    for ch in digits.chars() {
        let d = ch
            .to_digit(10)
            .ok_or_else(|| format!("invalid exponent digit '{}'", ch))?;
        value = value.saturating_mul(10).saturating_add(d as i64);
    }
    Ok(if negative { -value } else { value })
}

fn scan_decimal(text: &str) -> Result<Scanned, String> {
    let (integer, fraction, exponent) = split_parts(text, 'e')?;
    let exponent = parse_exponent(exponent)?;
    let all_digits = format!("{}{}", integer, fraction);
    let digits = BitVector::from_digits(&all_digits, 10)
        .ok_or_else(|| "invalid decimal digit".to_string())?;
    let significant_digits = all_digits.trim_start_matches('0').len();
    Ok(Scanned::Decimal {
        digits,
        significant_digits,
        exponent: exponent.saturating_sub(fraction.len() as i64),
    })
}

fn scan_hex(text: &str) -> Result<Scanned, String> {
    let (integer, fraction, exponent) = split_parts(text, 'p')?;
    let exponent = parse_exponent(exponent)?;
    let all_digits = format!("{}{}", integer, fraction);
    let digits = BitVector::from_digits(&all_digits, 16)
        .ok_or_else(|| "invalid hexadecimal digit".to_string())?;
    Ok(Scanned::Binary {
        digits,
        exponent: exponent.saturating_sub(4 * fraction.len() as i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_double(text: &str) -> f64 {
        let mut cfg = RoundingConfig::nearest();
        to_f64(&parse_literal(text, FloatFormat::DOUBLE, &mut cfg).unwrap())
    }

    #[test]
    fn test_decimal_literals_match_host() {
        for text in [
            "0.1",
            "-12.5e-3",
            ".5",
            "1e10",
            "3.141592653589793238462643383279",
            "1e-320",
            "2.2250738585072014e-308",
            "1.7976931348623157e308",
            "123456789012345678901234567890",
        ] {
            assert_eq!(parse_double(text), text.parse::<f64>().unwrap(), "{}", text);
        }
    }

    #[test]
    fn test_extreme_decimal_exponents() {
        assert_eq!(parse_double("1e400"), f64::INFINITY);
        assert_eq!(parse_double("-1e999999999"), f64::NEG_INFINITY);
        assert_eq!(parse_double("1e-999999999"), 0.0);
        let mut up = RoundingConfig::upward();
        let tiny = parse_literal("1e-999999", FloatFormat::DOUBLE, &mut up).unwrap();
        assert_eq!(tiny, BuiltFloat::smallest(FloatFormat::DOUBLE, false));
        assert!(up.flags.underflow);
    }

    #[test]
    fn test_hex_and_special_literals() {
        assert_eq!(parse_double("0x1.8p3"), 12.0);
        assert_eq!(parse_double("-0X.1P-2"), -0.015625);
        assert_eq!(parse_double("0xff"), 255.0);
        assert_eq!(parse_double("INF"), f64::INFINITY);
        assert_eq!(parse_double("-infinity"), f64::NEG_INFINITY);
        assert!(parse_double("NaN").is_nan());
        assert!(parse_double("-0.0").is_sign_negative());
    }

    #[test]
    fn test_malformed_literals() {
        let mut cfg = RoundingConfig::nearest();
        for text in ["", "abc", "1e", ".", "1.2.3", "0x", "0x1.gp2", "--1", "1e+"] {
            assert!(
                parse_literal(text, FloatFormat::DOUBLE, &mut cfg).is_err(),
                "'{}' should not parse",
                text
            );
        }
    }

    #[test]
    fn test_directed_literal_rounding() {
        let mut down = RoundingConfig::downward();
        let lo = parse_literal("0.1", FloatFormat::DOUBLE, &mut down).unwrap();
        let mut up = RoundingConfig::upward();
        let hi = parse_literal("0.1", FloatFormat::DOUBLE, &mut up).unwrap();
        assert_eq!(hi.to_bits(), 0.1f64.to_bits() as u128);
        assert_eq!(lo.to_bits(), (0.1f64.to_bits() - 1) as u128);
    }

    #[test]
    fn test_host_conversions() {
        let mut cfg = RoundingConfig::nearest();
        let x = from_f64(0.1, FloatFormat::SINGLE, &mut cfg);
        assert_eq!(to_f32(&x), 0.1f64 as f32);
        assert!(cfg.flags.inexact());
        let big = from_i64(-(1i64 << 60) - 1, FloatFormat::DOUBLE, &mut cfg);
        assert_eq!(to_f64(&big), (-(1i64 << 60) - 1) as f64);
        assert_eq!(to_f64(&from_u64(u64::MAX, FloatFormat::DOUBLE, &mut cfg)), u64::MAX as f64);
        let wide = widen(&x, FloatFormat::REAL);
        let mut back = RoundingConfig::nearest();
        assert_eq!(convert(&wide, FloatFormat::SINGLE, &mut back), x);
        assert!(!back.flags.inexact());
    }

    #[test]
    fn test_nan_payload_conversion() {
        let mut cfg = RoundingConfig::nearest();
        let nan = BuiltFloat::quiet_nan(FloatFormat::SINGLE, true);
        let wide = convert(&nan, FloatFormat::DOUBLE, &mut cfg);
        assert!(wide.is_nan() && wide.is_negative() && !wide.is_signaling());
        let signaling = BuiltFloat::signaling_nan(FloatFormat::DOUBLE, false);
        let narrow = convert(&signaling, FloatFormat::SINGLE, &mut cfg);
        assert!(narrow.is_nan() && !narrow.is_signaling());
    }
}
