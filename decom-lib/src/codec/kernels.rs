//! Numeric decode kernels for the standard interpretation formats.
//!
//! Kernels operate on the raw word bytes in big-endian significance order, i.e., the first
//! byte carries the most significant bits of the word. Words produced by little-endian or
//! word-swapped hardware (VAX memory order, for instance) must be reordered before decoding.
//!
//! Kernels are pure and never fail; width and length validation is done by the
//! [CodecRegistry](super::CodecRegistry) before a kernel is invoked.
use super::Value;

/// Right-aligned integer value of the low `bits` bits of `word`.
///
/// `word` must not be longer than 8 bytes.
#[must_use]
pub fn word_value(word: &[u8], bits: u32) -> u64 {
    let raw = word.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    raw & mask(bits)
}

/// Bit mask with the low `bits` bits set.
#[must_use]
pub fn mask(bits: u32) -> u64 {
    match bits {
        0 => 0,
        64.. => u64::MAX,
        _ => (1u64 << bits) - 1,
    }
}

/// Sign extend the low `bits` bits of `raw`.
fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    let shift = 64 - bits.min(64);
    ((raw << shift) as i64) >> shift
}

pub fn unsigned(word: &[u8], bits: u32) -> Value {
    Value::Unsigned(word_value(word, bits))
}

pub fn ones_complement(word: &[u8], bits: u32) -> Value {
    let raw = word_value(word, bits);
    if bits == 0 || raw >> (bits - 1) & 1 == 0 {
        return Value::Signed(raw as i64);
    }
    // magnitude of a negative value never has the sign bit set
    let magnitude = !raw & mask(bits);
    Value::Signed(-(magnitude as i64))
}

pub fn twos_complement(word: &[u8], bits: u32) -> Value {
    Value::Signed(sign_extend(word_value(word, bits), bits))
}

pub fn ieee16(word: &[u8], bits: u32) -> f64 {
    let raw = word_value(word, bits);
    let sign = if raw >> 15 & 1 == 1 { -1.0 } else { 1.0 };
    let exp = (raw >> 10 & 0x1f) as i32;
    let frac = (raw & 0x3ff) as f64;
    match exp {
        0 => sign * frac * 2f64.powi(-24),
        0x1f if frac == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + frac / 1024.0) * 2f64.powi(exp - 15),
    }
}

pub fn ieee32(word: &[u8], bits: u32) -> f64 {
    f64::from(f32::from_bits(word_value(word, bits) as u32))
}

pub fn ieee64(word: &[u8], bits: u32) -> f64 {
    f64::from_bits(word_value(word, bits))
}

/// MIL-STD-1750A single precision: 24 bit two's complement mantissa followed by an 8 bit
/// two's complement exponent.
pub fn milstd1750a32(word: &[u8], bits: u32) -> f64 {
    let raw = word_value(word, bits);
    let mantissa = sign_extend(raw >> 8, 24);
    let exp = sign_extend(raw & 0xff, 8) as i32;
    mantissa as f64 * 2f64.powi(exp - 23)
}

/// MIL-STD-1750A extended precision: 24 bit mantissa MSW, 8 bit exponent, then a 16 bit
/// mantissa LSW. The two mantissa parts form a single 40 bit two's complement value.
pub fn milstd1750a48(word: &[u8], bits: u32) -> f64 {
    let raw = word_value(word, bits);
    let exp = sign_extend(raw >> 16 & 0xff, 8) as i32;
    let mantissa = sign_extend((raw >> 24) << 16 | raw & 0xffff, 40);
    mantissa as f64 * 2f64.powi(exp - 39)
}

fn ti(raw: u64, fraction_bits: u32) -> f64 {
    let exp = sign_extend(raw >> (fraction_bits + 1), 8) as i32;
    if exp == -128 {
        return 0.0;
    }
    let sign = raw >> fraction_bits & 1;
    let frac = (raw & mask(fraction_bits)) as f64 / 2f64.powi(fraction_bits as i32);
    let lead = if sign == 1 { -2.0 } else { 1.0 };
    (lead + frac) * 2f64.powi(exp)
}

/// TI TMS320 single precision: 8 bit two's complement exponent, sign, 23 bit fraction.
pub fn ti32(word: &[u8], bits: u32) -> f64 {
    ti(word_value(word, bits), 23)
}

/// TI TMS320 extended precision: 8 bit two's complement exponent, sign, 31 bit fraction.
pub fn ti40(word: &[u8], bits: u32) -> f64 {
    ti(word_value(word, bits), 31)
}

fn ibm(raw: u64, fraction_bits: u32) -> f64 {
    let sign = if raw >> (fraction_bits + 7) & 1 == 1 {
        -1.0
    } else {
        1.0
    };
    let exp = (raw >> fraction_bits & 0x7f) as i32;
    let frac = (raw & mask(fraction_bits)) as f64 / 2f64.powi(fraction_bits as i32);
    sign * frac * 2f64.powi(4 * (exp - 64))
}

/// IBM System/370 single precision, base 16 excess-64 exponent.
pub fn ibm32(word: &[u8], bits: u32) -> f64 {
    ibm(word_value(word, bits), 24)
}

/// IBM System/370 double precision.
pub fn ibm64(word: &[u8], bits: u32) -> f64 {
    ibm(word_value(word, bits), 56)
}

fn dec(raw: u64, exp_bits: u32, fraction_bits: u32, bias: i32) -> f64 {
    let negative = raw >> (exp_bits + fraction_bits) & 1 == 1;
    let exp = (raw >> fraction_bits & mask(exp_bits)) as i32;
    if exp == 0 {
        // sign set with a zero exponent is the reserved operand
        return if negative { f64::NAN } else { 0.0 };
    }
    // hidden bit is the 0.1 binary place
    let frac = 0.5 + (raw & mask(fraction_bits)) as f64 / 2f64.powi(fraction_bits as i32 + 1);
    let value = frac * 2f64.powi(exp - bias);
    if negative {
        -value
    } else {
        value
    }
}

/// DEC F-floating.
pub fn dec32(word: &[u8], bits: u32) -> f64 {
    dec(word_value(word, bits), 8, 23, 128)
}

/// DEC D-floating.
pub fn dec64(word: &[u8], bits: u32) -> f64 {
    dec(word_value(word, bits), 8, 55, 128)
}

/// DEC G-floating.
pub fn dec64g(word: &[u8], bits: u32) -> f64 {
    dec(word_value(word, bits), 11, 52, 1024)
}
