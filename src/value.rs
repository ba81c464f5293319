//! Sample values and quality flags.

use bitflags::bitflags;
use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-sample quality flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct SampleFlags: u8 {
        /// Sensor reported a missing-value placeholder
        const MISSING = 0x01;
        /// Raw field failed to parse
        const ERROR = 0x02;
        /// Value fell outside the configured sensor limits
        const LIMIT_VIOLATION = 0x04;
    }
}

/// One decoded value, before any presentation formatting.
///
/// Integral ASCII literals and the pure binary and pseudo-binary encodings
/// decode to [`Value::Int`]. Encodings with a fractional scale factor
/// (Labarge, Campbell) and ASCII literals with a decimal point or exponent
/// decode to [`Value::Double`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Str(_))
    }

    /// Numeric view of the value. Strings yield `None`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Str(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) => Some(*d as i64),
            Value::Str(_) => None,
        }
    }

    /// Replaces the numeric content, collapsing whole doubles back to
    /// integers so scale/offset application does not change the kind of
    /// values a series carries.
    pub(crate) fn set_numeric(&mut self, v: f64) {
        if v == (v as i64) as f64 {
            *self = Value::Int(v as i64);
        } else {
            *self = Value::Double(v);
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A time-stamped sample as stored in a [`crate::time::TimeSeries`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    pub value: Value,
    pub flags: SampleFlags,
    /// Absolute sample time. Partial times live in 1970 until upgraded by
    /// the post-message pass.
    pub time: DateTime<Utc>,
    /// 1-based message line the field was extracted from
    pub line: u32,
}

impl Sample {
    pub fn new(value: Value, time: DateTime<Utc>, line: u32) -> Self {
        Self {
            value,
            flags: SampleFlags::empty(),
            time,
            line,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.flags.contains(SampleFlags::MISSING)
    }

    pub fn is_error(&self) -> bool {
        self.flags.contains(SampleFlags::ERROR)
    }
}
