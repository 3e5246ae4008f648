//! Fixed-Width Bit Vectors
//!
//! `BitVector` is the digit store under every mantissa, exponent and wide
//! intermediate significand. Values are unsigned integers held in
//! little-endian 64-bit cells; the declared width is authoritative and every
//! mutation re-masks the unused high bits of the top cell.

use std::cmp::Ordering;
use std::fmt;

/// One storage cell
pub type Cell = u64;

/// Bits per storage cell
pub const CELL_BITS: usize = 64;

fn cells_for(width: usize) -> usize {
    width.div_ceil(CELL_BITS)
}

/// Fraction of a unit lost when low bits are discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// Nothing was discarded
    ExactlyZero,
    /// Discarded part is in (0, 1/2)
    LessThanHalf,
    /// Discarded part is exactly 1/2
    ExactlyHalf,
    /// Discarded part is in (1/2, 1)
    MoreThanHalf,
}

impl Loss {
    /// Combine with a loss from strictly less significant bits.
    pub fn combine(self, less_significant: Loss) -> Loss {
        if less_significant == Loss::ExactlyZero {
            return self;
        }
        match self {
            Loss::ExactlyZero => Loss::LessThanHalf,
            Loss::ExactlyHalf => Loss::MoreThanHalf,
            other => other,
        }
    }

    /// Whether nothing was discarded
    pub fn is_exact(self) -> bool {
        self == Loss::ExactlyZero
    }
}

/// Unsigned integer of a declared bit width
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    cells: Vec<Cell>,
    width: usize,
}

impl BitVector {
    /// Zero of the given width
    pub fn new(width: usize) -> Self {
        Self {
            cells: vec![0; cells_for(width)],
            width,
        }
    }

    /// Build from a `u64`, truncated to `width`
    pub fn from_u64(width: usize, value: u64) -> Self {
        let mut result = Self::new(width);
        if let Some(first) = result.cells.first_mut() {
            *first = value;
        }
        result.normalize();
        result
    }

    /// Build from a `u128`, truncated to `width`
    pub fn from_u128(width: usize, value: u128) -> Self {
        let mut result = Self::new(width);
        for (i, cell) in result.cells.iter_mut().take(2).enumerate() {
            *cell = (value >> (i * CELL_BITS)) as Cell;
        }
        result.normalize();
        result
    }

    /// All ones of the given width
    pub fn ones(width: usize) -> Self {
        let mut result = Self {
            cells: vec![Cell::MAX; cells_for(width)],
            width,
        };
        result.normalize();
        result
    }

    /// `2^position` in a vector of the given width
    pub fn power_of_two(width: usize, position: usize) -> Self {
        let mut result = Self::new(width);
        result.set_bit(position, true);
        result
    }

    /// Declared width in bits
    pub fn width(&self) -> usize {
        self.width
    }

    /// Raw little-endian cells
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// Bit at `index`; bits beyond the width read as zero
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.width {
            return false;
        }
        (self.cells[index / CELL_BITS] >> (index % CELL_BITS)) & 1 == 1
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        assert!(
            index < self.width,
            "bit {} out of range for width {}",
            index,
            self.width
        );
        let mask = 1 << (index % CELL_BITS);
        if value {
            self.cells[index / CELL_BITS] |= mask;
        } else {
            self.cells[index / CELL_BITS] &= !mask;
        }
    }

    /// One-based position of the most significant set bit, zero for zero
    pub fn omsb(&self) -> usize {
        for (i, &cell) in self.cells.iter().enumerate().rev() {
            if cell != 0 {
                return i * CELL_BITS + (CELL_BITS - cell.leading_zeros() as usize);
            }
        }
        0
    }

    /// Number of trailing zero bits, the width for zero
    pub fn trailing_zeros(&self) -> usize {
        for (i, &cell) in self.cells.iter().enumerate() {
            if cell != 0 {
                return i * CELL_BITS + cell.trailing_zeros() as usize;
            }
        }
        self.width
    }

    /// Mask the bits above the declared width
    pub fn normalize(&mut self) {
        let extra = self.cells.len() * CELL_BITS - self.width;
        if extra > 0 {
            if let Some(top) = self.cells.last_mut() {
                *top &= Cell::MAX >> extra;
            }
        }
    }

    /// Change the width in place, truncating or zero-extending
    pub fn resize(&mut self, width: usize) {
        self.cells.resize(cells_for(width), 0);
        self.width = width;
        self.normalize();
    }

    /// Copy with a different width, truncating or zero-extending
    pub fn resized(&self, width: usize) -> Self {
        let mut copy = self.clone();
        copy.resize(width);
        copy
    }

    /// Copy shrunk to the smallest width that holds the value (at least one bit)
    pub fn minimal(&self) -> Self {
        self.resized(self.omsb().max(1))
    }

    /// Whether any bit strictly below `bits` is set
    pub fn any_below(&self, bits: usize) -> bool {
        let full = (bits / CELL_BITS).min(self.cells.len());
        if self.cells[..full].iter().any(|&c| c != 0) {
            return true;
        }
        let part = bits % CELL_BITS;
        part > 0 && full < self.cells.len() && self.cells[full] & ((1 << part) - 1) != 0
    }

    /// Loss incurred by discarding the lowest `bits` bits
    pub fn loss_below(&self, bits: usize) -> Loss {
        if bits == 0 {
            return Loss::ExactlyZero;
        }
        let half = self.bit(bits - 1);
        let rest = self.any_below(bits - 1);
        match (half, rest) {
            (false, false) => Loss::ExactlyZero,
            (false, true) => Loss::LessThanHalf,
            (true, false) => Loss::ExactlyHalf,
            (true, true) => Loss::MoreThanHalf,
        }
    }

    /// Shift left within the width; bits shifted past the top are lost
    pub fn shl_assign(&mut self, bits: usize) {
        if bits == 0 {
            return;
        }
        if bits >= self.width {
            self.cells.iter_mut().for_each(|c| *c = 0);
            return;
        }
        let jump = bits / CELL_BITS;
        let shift = bits % CELL_BITS;
        for i in (0..self.cells.len()).rev() {
            let mut cell = 0;
            if i >= jump {
                cell = self.cells[i - jump] << shift;
                if shift > 0 && i > jump {
                    cell |= self.cells[i - jump - 1] >> (CELL_BITS - shift);
                }
            }
            self.cells[i] = cell;
        }
        self.normalize();
    }

    /// Shift right, reporting the discarded fraction
    pub fn shr_assign(&mut self, bits: usize) -> Loss {
        let loss = self.loss_below(bits);
        if bits == 0 {
            return loss;
        }
        if bits >= self.width {
            self.cells.iter_mut().for_each(|c| *c = 0);
            return loss;
        }
        let jump = bits / CELL_BITS;
        let shift = bits % CELL_BITS;
        let n = self.cells.len();
        for i in 0..n {
            let mut cell = 0;
            if i + jump < n {
                cell = self.cells[i + jump] >> shift;
                if shift > 0 && i + jump + 1 < n {
                    cell |= self.cells[i + jump + 1] << (CELL_BITS - shift);
                }
            }
            self.cells[i] = cell;
        }
        loss
    }

    /// Bits that overflowed past the width in the top cell, cleared afterwards
    fn take_top_overflow(&mut self) -> bool {
        let extra = self.cells.len() * CELL_BITS - self.width;
        let overflow = match self.cells.last() {
            Some(&top) if extra > 0 => top >> (CELL_BITS - extra) != 0,
            _ => false,
        };
        self.normalize();
        overflow
    }

    /// Add one modulo `2^width`; returns the carry out
    pub fn increment(&mut self) -> bool {
        let mut carry = true;
        for cell in self.cells.iter_mut() {
            let (sum, overflow) = cell.overflowing_add(1);
            *cell = sum;
            if !overflow {
                carry = false;
                break;
            }
        }
        let top = self.take_top_overflow();
        carry || top
    }

    /// Subtract one modulo `2^width`; returns the borrow out
    pub fn decrement(&mut self) -> bool {
        let mut borrow = true;
        for cell in self.cells.iter_mut() {
            let (diff, underflow) = cell.overflowing_sub(1);
            *cell = diff;
            if !underflow {
                borrow = false;
                break;
            }
        }
        self.normalize();
        borrow
    }

    /// Add `other` modulo `2^width`; returns the carry out
    pub fn add_assign(&mut self, other: &BitVector) -> bool {
        debug_assert!(other.omsb() <= self.width, "addend wider than accumulator");
        let mut carry = false;
        for (i, cell) in self.cells.iter_mut().enumerate() {
            let rhs = other.cells.get(i).copied().unwrap_or(0);
            let (s1, o1) = cell.overflowing_add(rhs);
            let (s2, o2) = s1.overflowing_add(carry as Cell);
            *cell = s2;
            carry = o1 || o2;
        }
        let top = self.take_top_overflow();
        carry || top
    }

    /// Subtract `other` modulo `2^width`; returns the borrow out
    pub fn sub_assign(&mut self, other: &BitVector) -> bool {
        debug_assert!(other.omsb() <= self.width, "subtrahend wider than accumulator");
        let mut borrow = false;
        for (i, cell) in self.cells.iter_mut().enumerate() {
            let rhs = other.cells.get(i).copied().unwrap_or(0);
            let (d1, u1) = cell.overflowing_sub(rhs);
            let (d2, u2) = d1.overflowing_sub(borrow as Cell);
            *cell = d2;
            borrow = u1 || u2;
        }
        self.normalize();
        borrow
    }

    /// Compare numeric values regardless of declared widths
    pub fn cmp_value(&self, other: &BitVector) -> Ordering {
        let n = self.cells.len().max(other.cells.len());
        for i in (0..n).rev() {
            let a = self.cells.get(i).copied().unwrap_or(0);
            let b = other.cells.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    /// Full product; the result width is the sum of both widths
    pub fn mul(&self, other: &BitVector) -> BitVector {
        let mut out = vec![0 as Cell; self.cells.len() + other.cells.len()];
        for (i, &x) in self.cells.iter().enumerate() {
            if x == 0 {
                continue;
            }
            let mut carry: u128 = 0;
            for (j, &y) in other.cells.iter().enumerate() {
                let t = (x as u128) * (y as u128) + out[i + j] as u128 + carry;
                out[i + j] = t as Cell;
                carry = t >> CELL_BITS;
            }
            out[i + other.cells.len()] = carry as Cell;
        }
        let width = self.width + other.width;
        out.truncate(cells_for(width));
        let mut result = BitVector { cells: out, width };
        result.normalize();
        result
    }

    /// Multiply by a small factor in place; returns true when the product
    /// did not fit the width
    pub fn mul_small_assign(&mut self, factor: u64) -> bool {
        let mut carry: u128 = 0;
        for cell in self.cells.iter_mut() {
            let t = (*cell as u128) * (factor as u128) + carry;
            *cell = t as Cell;
            carry = t >> CELL_BITS;
        }
        let top = self.take_top_overflow();
        top || carry != 0
    }

    /// Add a small value in place; returns the carry out
    pub fn add_small_assign(&mut self, value: u64) -> bool {
        let addend = BitVector::from_u64(CELL_BITS, value);
        if self.width < CELL_BITS {
            let mut wide = self.resized(CELL_BITS);
            wide.add_assign(&addend);
            let overflow = wide.omsb() > self.width;
            *self = wide.resized(self.width);
            return overflow;
        }
        self.add_assign(&addend)
    }

    /// Quotient and remainder by long division; panics on a zero divisor
    pub fn div_rem(&self, divisor: &BitVector) -> (BitVector, BitVector) {
        assert!(!divisor.is_zero(), "division of bit vectors by zero");
        let bits = self.omsb();
        let mut quotient = BitVector::new(self.width.max(1));
        let mut remainder = BitVector::new(divisor.width + 1);
        for i in (0..bits).rev() {
            remainder.shl_assign(1);
            if self.bit(i) {
                remainder.cells[0] |= 1;
            }
            if remainder.cmp_value(divisor) != Ordering::Less {
                remainder.sub_assign(divisor);
                quotient.set_bit(i, true);
            }
        }
        remainder.resize(divisor.width);
        (quotient, remainder)
    }

    /// Integer square root and remainder, `self = root^2 + remainder`
    pub fn isqrt_rem(&self) -> (BitVector, BitVector) {
        let width = self.width + 2;
        let mut num = self.resized(width);
        let mut root = BitVector::new(width);
        let bits = self.omsb();
        if bits == 0 {
            return (BitVector::new(self.width.max(1)), BitVector::new(self.width.max(1)));
        }
        let mut position = (bits - 1) & !1;
        loop {
            let mut trial = root.clone();
            trial.add_assign(&BitVector::power_of_two(width, position));
            if num.cmp_value(&trial) != Ordering::Less {
                num.sub_assign(&trial);
                root.shr_assign(1);
                root.add_assign(&BitVector::power_of_two(width, position));
            } else {
                root.shr_assign(1);
            }
            if position < 2 {
                break;
            }
            position -= 2;
        }
        (root.resized(self.width.max(1)), num.resized(self.width.max(1)))
    }

    /// Value if it fits in a `u64`
    pub fn to_u64(&self) -> Option<u64> {
        if self.omsb() > 64 {
            return None;
        }
        Some(self.cells.first().copied().unwrap_or(0))
    }

    /// Lowest 128 bits
    pub fn low_u128(&self) -> u128 {
        let lo = self.cells.first().copied().unwrap_or(0) as u128;
        let hi = self.cells.get(1).copied().unwrap_or(0) as u128;
        lo | (hi << CELL_BITS)
    }

    /// Parse a string of ASCII digits in the given radix (2..=16)
    pub fn from_digits(digits: &str, radix: u32) -> Option<BitVector> {
        if digits.is_empty() || !(2..=16).contains(&radix) {
            return None;
        }
        let bits_per_digit = (32 - (radix - 1).leading_zeros()) as usize;
        let mut value = BitVector::new(digits.len() * bits_per_digit + 1);
        for ch in digits.chars() {
            let digit = ch.to_digit(radix)?;
            value.mul_small_assign(radix as u64);
            value.add_small_assign(digit as u64);
        }
        Some(value.minimal())
    }

    /// `10^exponent` with exactly enough width
    pub fn pow10(exponent: u32) -> BitVector {
        const CHUNK: u32 = 19;
        let width = (exponent as f64 * std::f64::consts::LOG2_10).ceil() as usize + 2;
        let mut value = BitVector::from_u64(width.max(2), 1);
        let mut remaining = exponent;
        while remaining > 0 {
            let step = remaining.min(CHUNK);
            value.mul_small_assign(10u64.pow(step));
            remaining -= step;
        }
        value.minimal()
    }

    /// Lowercase hexadecimal digits without prefix
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        for (i, &cell) in self.cells.iter().enumerate().rev() {
            if out.is_empty() {
                if cell != 0 || i == 0 {
                    out.push_str(&format!("{:x}", cell));
                }
            } else {
                out.push_str(&format!("{:016x}", cell));
            }
        }
        if out.is_empty() {
            out.push('0');
        }
        out
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector<{}>(0x{})", self.width, self.to_hex())
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_masks_high_bits() {
        let v = BitVector::from_u64(5, 0xff);
        assert_eq!(v.to_u64(), Some(0x1f));
        assert_eq!(v.omsb(), 5);
    }

    #[test]
    fn test_shift_across_cells() {
        let mut v = BitVector::from_u64(200, 0b1011);
        v.shl_assign(130);
        assert_eq!(v.omsb(), 134);
        assert!(v.bit(130) && v.bit(131) && v.bit(133));
        let loss = v.shr_assign(131);
        assert_eq!(loss, Loss::ExactlyHalf);
        assert_eq!(v.to_u64(), Some(0b101));
    }

    #[test]
    fn test_loss_classification() {
        let v = BitVector::from_u64(16, 0b1011_0000);
        assert_eq!(v.loss_below(4), Loss::ExactlyZero);
        assert_eq!(v.loss_below(5), Loss::ExactlyHalf);
        assert_eq!(v.loss_below(6), Loss::MoreThanHalf);
        assert_eq!(v.loss_below(7), Loss::LessThanHalf);
        assert_eq!(v.loss_below(8), Loss::MoreThanHalf);
        assert_eq!(Loss::ExactlyHalf.combine(Loss::LessThanHalf), Loss::MoreThanHalf);
    }

    #[test]
    fn test_add_sub_carry() {
        let mut v = BitVector::ones(70);
        assert!(v.increment());
        assert!(v.is_zero());
        assert!(v.decrement());
        assert_eq!(v, BitVector::ones(70));

        let mut a = BitVector::from_u128(100, 1u128 << 64);
        let b = BitVector::from_u64(100, 1);
        assert!(!a.sub_assign(&b));
        assert_eq!(a.to_u64(), Some(u64::MAX));
    }

    #[test]
    fn test_mul_matches_u128() {
        let a = BitVector::from_u64(64, 0xdead_beef_1234_5678);
        let b = BitVector::from_u64(64, 0x0fed_cba9_8765_4321);
        let p = a.mul(&b);
        assert_eq!(p.width(), 128);
        assert_eq!(
            p.low_u128(),
            0xdead_beef_1234_5678u128 * 0x0fed_cba9_8765_4321u128
        );
    }

    #[test]
    fn test_div_rem() {
        let n = BitVector::from_u128(128, 123_456_789_012_345_678_901_234_567u128);
        let d = BitVector::from_u64(64, 987_654_321);
        let (q, r) = n.div_rem(&d);
        assert_eq!(q.low_u128(), 123_456_789_012_345_678_901_234_567u128 / 987_654_321);
        assert_eq!(r.low_u128(), 123_456_789_012_345_678_901_234_567u128 % 987_654_321);
    }

    #[test]
    fn test_isqrt_rem() {
        for n in [0u64, 1, 2, 3, 4, 15, 16, 17, 1_000_000, 999_999_999_999] {
            let (root, rem) = BitVector::from_u64(64, n).isqrt_rem();
            let r = root.to_u64().unwrap();
            assert!(r * r <= n && (r + 1) * (r + 1) > n, "isqrt({})", n);
            assert_eq!(rem.to_u64(), Some(n - r * r));
        }
    }

    #[test]
    fn test_digits_and_pow10() {
        let v = BitVector::from_digits("18446744073709551616", 10).unwrap();
        assert_eq!(v.omsb(), 65);
        assert_eq!(BitVector::from_digits("ff", 16).unwrap().to_u64(), Some(255));
        assert!(BitVector::from_digits("12a", 10).is_none());
        assert_eq!(BitVector::pow10(3).to_u64(), Some(1000));
        assert_eq!(
            BitVector::pow10(30).low_u128(),
            1_000_000_000_000_000_000_000_000_000_000u128
        );
    }
}
