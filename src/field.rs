//! Raw field codecs.
//!
//! One pure decoder per manufacturer encoding, selected by a single
//! character type code in the field operator. Every decoder rejects
//! malformed input with a [`FieldParseError`] instead of returning a
//! silent zero. Width and position of the field are the caller's problem,
//! the decoders only see the extracted byte slice.

use crate::errors::FieldParseError;
use crate::value::Value;

/// Smallest legal pseudo-binary byte
const PB_MIN: u8 = 0x3F;
/// Largest legal pseudo-binary byte
const PB_MAX: u8 = 0x7F;

/// Field encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `a`: ASCII decimal literal
    Ascii,
    /// `z`: ASCII literal, but blank fields reach the sample path as
    /// flagged samples instead of being skipped
    AsciiZero,
    /// `s`: raw string, no numeric conversion
    Str,
    /// `b`: unsigned pseudo-binary, 6 bits per byte
    PseudoBinary,
    /// `i`: signed pseudo-binary, sign in bit 5 of the first byte
    SignedPseudoBinary,
    /// `l`: Labarge weighted-digit format
    Labarge,
    /// `x`: ASCII hex digits
    Hex,
    /// `c`: Campbell Scientific floating point pseudo-binary
    CampbellBinary,
    /// `o`: Design Analysis / Telonics sign-bit pseudo-binary
    SignBitBinary,
    /// `d`: pure binary two's complement, MSB first
    BinSignedMsb,
    /// `e`: pure binary unsigned, MSB first
    BinUnsignedMsb,
    /// `f`: pure binary two's complement, LSB first
    BinSignedLsb,
    /// `g`: pure binary unsigned, LSB first
    BinUnsignedLsb,
}

impl FieldType {
    /// Resolves a one-character type code, case insensitive.
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'a' => Some(Self::Ascii),
            'z' => Some(Self::AsciiZero),
            's' => Some(Self::Str),
            'b' => Some(Self::PseudoBinary),
            'i' => Some(Self::SignedPseudoBinary),
            'l' => Some(Self::Labarge),
            'x' => Some(Self::Hex),
            'c' => Some(Self::CampbellBinary),
            'o' => Some(Self::SignBitBinary),
            'd' => Some(Self::BinSignedMsb),
            'e' => Some(Self::BinUnsignedMsb),
            'f' => Some(Self::BinSignedLsb),
            'g' => Some(Self::BinUnsignedLsb),
            _ => None,
        }
    }

    /// Resolves the spelled-out aliases scripts use for binary fields.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.len() == 1 {
            return Self::from_code(name.chars().next()?);
        }
        match name.to_ascii_lowercase().as_str() {
            "bc" => Some(Self::CampbellBinary),
            "bt" | "bd" => Some(Self::SignBitBinary),
            "bin" => Some(Self::BinSignedMsb),
            "ubin" => Some(Self::BinUnsignedMsb),
            "binl" => Some(Self::BinSignedLsb),
            "ubinl" => Some(Self::BinUnsignedLsb),
            _ => None,
        }
    }

    /// True for the pure binary codes, whose fields must be extracted
    /// without end-of-line or delimiter handling.
    pub fn is_pure_binary(self) -> bool {
        matches!(
            self,
            Self::BinSignedMsb | Self::BinUnsignedMsb | Self::BinSignedLsb | Self::BinUnsignedLsb
        )
    }

    /// Decodes one extracted field.
    pub fn parse(self, field: &[u8]) -> Result<Value, FieldParseError> {
        if field.is_empty() {
            return Err(FieldParseError::new("attempt to parse an empty field"));
        }
        match self {
            Self::Ascii | Self::AsciiZero => parse_ascii(field),
            Self::Str => Ok(Value::Str(String::from_utf8_lossy(field).into_owned())),
            Self::PseudoBinary => parse_pseudo_binary(field, false),
            Self::SignedPseudoBinary => parse_pseudo_binary(field, true),
            Self::Labarge => parse_labarge(field),
            Self::Hex => parse_hex(field),
            Self::CampbellBinary => parse_campbell(field),
            Self::SignBitBinary => parse_sign_bit(field),
            Self::BinSignedMsb | Self::BinUnsignedMsb | Self::BinSignedLsb
            | Self::BinUnsignedLsb => parse_pure_binary(field, self),
        }
    }

    /// Convenience wrapper for fields that must be whole numbers.
    pub fn parse_int(self, field: &[u8]) -> Result<i64, FieldParseError> {
        match self.parse(field)? {
            Value::Int(i) => Ok(i),
            Value::Double(d) if d == (d as i64) as f64 => Ok(d as i64),
            other => Err(FieldParseError::new(format!(
                "field requires an integer, got '{}'",
                other
            ))),
        }
    }
}

/// Standard decimal literal scan: optional sign, digits, at most one
/// decimal point, optional exponent. Only trailing whitespace tolerated.
fn parse_ascii(field: &[u8]) -> Result<Value, FieldParseError> {
    let mut n = 0;
    let mut dec_points = 0;
    let mut exponential = false;

    while n < field.len() && field[n] == b' ' {
        n += 1;
    }
    let start = n;

    if n < field.len() && (field[n] == b'+' || field[n] == b'-') {
        n += 1;
    }
    if n == field.len() || (!field[n].is_ascii_digit() && field[n] != b'.') {
        return Err(FieldParseError::new("no start digit"));
    }
    if field[n] == b'.' {
        dec_points += 1;
        n += 1;
        if n == field.len() || !field[n].is_ascii_digit() {
            return Err(FieldParseError::new("no start digit after decimal point"));
        }
    }
    while n < field.len() && field[n].is_ascii_digit() {
        n += 1;
    }

    if n < field.len() {
        if field[n] == b'.' {
            if dec_points > 0 {
                return Err(FieldParseError::new("multiple decimal points"));
            }
            n += 1;
            dec_points += 1;
        }
        while n < field.len() && field[n].is_ascii_digit() {
            n += 1;
        }
        if n < field.len() && (field[n] == b'e' || field[n] == b'E') {
            exponential = true;
            n += 1;
            if n < field.len() && (field[n] == b'+' || field[n] == b'-') {
                n += 1;
            }
            if n == field.len() {
                return Err(FieldParseError::new("expected exponent digits"));
            }
            if !field[n].is_ascii_digit() {
                return Err(FieldParseError::new("invalid exponent field in number"));
            }
            while n < field.len() && field[n].is_ascii_digit() {
                n += 1;
            }
        }
    }
    let end = n;

    // only whitespace may follow the number
    while n < field.len() {
        if field[n].is_ascii_whitespace() {
            n += 1;
        } else {
            return Err(FieldParseError::new("garbage in field after number"));
        }
    }

    let mut s = std::str::from_utf8(&field[start..end])
        .map_err(|_| FieldParseError::new("non-ascii bytes in numeric field"))?;
    s = s.strip_prefix('+').unwrap_or(s);

    if dec_points == 0 && !exponential {
        s.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| FieldParseError::new("unable to parse field as integer"))
    } else {
        s.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| FieldParseError::new("unable to parse field as double"))
    }
}

fn pb_check(b: u8) -> Result<u8, FieldParseError> {
    if !(PB_MIN..=PB_MAX).contains(&b) {
        return Err(FieldParseError::new(format!(
            "illegal character 0x{:02X} in pseudo binary data field",
            b
        )));
    }
    Ok(b)
}

/// 6-bit big-endian accumulation. Signed variant takes the sign from bit
/// 5 of the first byte, leaving 5 magnitude bits there, and negates via
/// the two's complement of the total bit width.
fn parse_pseudo_binary(field: &[u8], signed: bool) -> Result<Value, FieldParseError> {
    let first = pb_check(field[0])?;
    let mut negative = false;
    let mut result: i64 = if signed {
        negative = first & 0x20 != 0;
        (first & 0x1F) as i64
    } else {
        (first & 0x3F) as i64
    };

    for &b in &field[1..] {
        let b = pb_check(b)?;
        result = (result << 6) + (b & 0x3F) as i64;
    }

    if negative {
        let numbits = field.len() as u32 * 6 - 1;
        result = (1i64 << numbits) - result;
        result = -result;
    }
    Ok(Value::Int(result))
}

/// Labarge weighted digits. 4-byte fields are base 10, everything else
/// base 16 with a fractional seed factor.
fn parse_labarge(field: &[u8]) -> Result<Value, FieldParseError> {
    let (limit, mut factor, multiplier) = if field.len() == 4 {
        (9u8, 1.0f64, 10.0f64)
    } else {
        (15u8, 0.01952941f64, 16.0f64)
    };

    let mut val = 0.0f64;
    for &b in field {
        let ival = b & 0x3F;
        if ival > limit {
            return Err(FieldParseError::new("labarge value out of limit"));
        }
        val += factor * ival as f64;
        factor *= multiplier;
    }
    Ok(Value::Double(val))
}

/// Campbell Scientific 3-byte record: the first byte's low bits select
/// sign, two decimal scale factors and a +4096 bias; the remaining two
/// bytes compose a 12-bit mantissa.
fn parse_campbell(field: &[u8]) -> Result<Value, FieldParseError> {
    if field.len() < 3 {
        return Err(FieldParseError::new("campbell binary field needs 3 bytes"));
    }
    let mut factor = if field[0] & 0x08 != 0 { -1.0 } else { 1.0 };
    if field[0] & 0x04 != 0 {
        factor *= 0.01;
    }
    if field[0] & 0x02 != 0 {
        factor *= 0.1;
    }
    let mut val = if field[0] & 0x01 != 0 { 4096.0 } else { 0.0 };

    val += (field[1] & 0x3F) as f64 * 64.0;
    val += (field[2] & 0x3F) as f64;
    Ok(Value::Double(val * factor))
}

/// ASCII hex digits, 4 bits per character, case insensitive. Surrounding
/// whitespace tolerated.
fn parse_hex(field: &[u8]) -> Result<Value, FieldParseError> {
    let s = std::str::from_utf8(field)
        .map_err(|_| FieldParseError::new("non-ascii bytes in hex field"))?
        .trim();
    if s.is_empty() {
        return Err(FieldParseError::new("empty hex field"));
    }
    let mut result: i64 = 0;
    for c in s.chars() {
        let digit = c
            .to_digit(16)
            .ok_or_else(|| FieldParseError::new("illegal character in hex field"))?;
        result = (result << 4) + digit as i64;
    }
    Ok(Value::Int(result))
}

/// Sign-bit pseudo-binary: bit 5 of the first byte is a plain sign, the
/// rest accumulates as 6-bit magnitude chunks.
fn parse_sign_bit(field: &[u8]) -> Result<Value, FieldParseError> {
    let factor = if field[0] & 0x20 != 0 { -1.0 } else { 1.0 };
    let mut ival: i64 = (field[0] & 0x1F) as i64;
    for &b in &field[1..] {
        ival = (ival << 6) + (b & 0x3F) as i64;
    }
    Ok(Value::Double(ival as f64 * factor))
}

/// Pure binary accumulation, 8 bits per byte. LSB variants are
/// byte-reversed first. Unsigned variants mask the leading byte to stop
/// sign extension.
fn parse_pure_binary(field: &[u8], ft: FieldType) -> Result<Value, FieldParseError> {
    let mut f: Vec<u8> = field.to_vec();
    if matches!(ft, FieldType::BinSignedLsb | FieldType::BinUnsignedLsb) {
        f.reverse();
    }

    let mut lv: i64 = f[0] as i8 as i64;
    if matches!(ft, FieldType::BinUnsignedMsb | FieldType::BinUnsignedLsb) {
        lv &= 0xFF;
    }
    for &b in &f[1..] {
        lv = (lv << 8) & !0xFF;
        lv |= b as i64;
    }
    Ok(Value::Int(lv))
}
