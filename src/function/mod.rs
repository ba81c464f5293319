//! Decoding function plugins.
//!
//! A decoding function is a named, cloneable unit a format statement can
//! invoke wherever a built-in operator is not enough, typically for whole
//! message formats (CSV blocks, self-describing sensor blocks). Argument
//! parsing happens once at script load; execution happens once per
//! occurrence per message, always on a fresh [`make_copy`] clone so no
//! mutable state leaks between concurrent decodes.
//!
//! [`make_copy`]: DecodingFunction::make_copy

mod csv;
mod selfdesc;

pub use csv::CsvFunction;
pub use selfdesc::SelfDescFunction;

use std::collections::HashMap;

use log::debug;

use crate::cursor::DataCursor;
use crate::errors::{DecoderError, ScriptFormatError};
use crate::message::DecodedMessage;
use crate::platform::DataOrder;
use crate::settings::DecoderSettings;

/// Script-level context available while a function parses its arguments.
pub struct ScriptContext<'a> {
    pub data_order: DataOrder,
    pub missing_symbol: Option<&'a str>,
    pub settings: &'a DecoderSettings,
}

/// A pluggable message-format decoder invocable from a format statement.
pub trait DecodingFunction: Send + Sync {
    /// Registry name, matched case-insensitively by the tokenizer.
    fn name(&self) -> &'static str;

    /// Independent clone sharing no mutable state with the original.
    fn make_copy(&self) -> Box<dyn DecodingFunction>;

    /// Parses the parenthesized argument string. Called once at script
    /// load time.
    fn set_arguments(&mut self, args: &str, ctx: &ScriptContext)
        -> Result<(), ScriptFormatError>;

    /// Consumes message data from the cursor and appends samples.
    fn execute(
        &mut self,
        cursor: &mut DataCursor,
        msg: &mut DecodedMessage,
    ) -> Result<(), DecoderError>;
}

impl std::fmt::Debug for dyn DecodingFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecodingFunction({})", self.name())
    }
}

/// Explicit name-to-prototype table. Built at startup, extended through
/// [`register`], no runtime discovery.
///
/// [`register`]: FunctionRegistry::register
pub struct FunctionRegistry {
    prototypes: HashMap<String, Box<dyn DecodingFunction>>,
}

impl Default for FunctionRegistry {
    /// Registry preloaded with the built-in functions.
    fn default() -> Self {
        let mut r = Self::empty();
        r.register(Box::new(CsvFunction::default()));
        r.register(Box::new(SelfDescFunction::default()));
        r
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            prototypes: HashMap::new(),
        }
    }

    pub fn register(&mut self, prototype: Box<dyn DecodingFunction>) {
        self.prototypes
            .insert(prototype.name().to_ascii_lowercase(), prototype);
    }

    /// Fresh clone of the named prototype, lowercase lookup.
    pub fn lookup(&self, name: &str) -> Option<Box<dyn DecodingFunction>> {
        self.prototypes
            .get(&name.to_ascii_lowercase())
            .map(|p| p.make_copy())
    }
}

/// Resolves a message-embedded label to a sensor number.
///
/// An exact match on the "label" data-type standard wins over any
/// fallback; the fallback accepts a matching code under any standard.
/// Returns `None` when nothing matches, in which case the caller must
/// discard the value with a warning rather than fail the decode.
pub fn sensor_for_label(msg: &DecodedMessage, label: &str) -> Option<i32> {
    let mut fallback = None;
    for ts in msg.all_time_series() {
        for dt in &ts.sensor().data_types {
            if !dt.code.eq_ignore_ascii_case(label) {
                continue;
            }
            if dt.standard.eq_ignore_ascii_case("label") {
                return Some(ts.sensor_number());
            }
            if fallback.is_none() {
                fallback = Some(ts.sensor_number());
            }
        }
    }
    if fallback.is_some() {
        debug!("label '{}' resolved through a non-label data type", label);
    }
    fallback
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::RawMessage;
    use crate::platform::{PlatformConfig, SensorConfig};

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let r = FunctionRegistry::default();
        assert!(r.lookup("CSV").is_some());
        assert!(r.lookup("csv").is_some());
        assert!(r.lookup("nosuch").is_none());
    }

    #[test]
    fn copies_do_not_share_arguments() {
        let r = FunctionRegistry::default();
        let settings = DecoderSettings::default();
        let ctx = ScriptContext {
            data_order: DataOrder::Undefined,
            missing_symbol: None,
            settings: &settings,
        };
        let mut a = r.lookup("csv").unwrap();
        a.set_arguments("1,2,3", &ctx).unwrap();
        let b = a.make_copy();
        // both run independently, nothing to assert beyond no panic and
        // distinct boxes
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn label_standard_wins_over_fallback() {
        let cfg = PlatformConfig::new(vec![
            SensorConfig::fixed(1, "one", 900).with_data_type("shef", "HG"),
            SensorConfig::fixed(2, "two", 900).with_data_type("label", "HG"),
        ]);
        let raw = RawMessage::new(b"".to_vec());
        let msg = DecodedMessage::new(
            &raw,
            &cfg,
            DataOrder::Undefined,
            &DecoderSettings::default(),
        );
        assert_eq!(sensor_for_label(&msg, "hg"), Some(2));
        assert_eq!(sensor_for_label(&msg, "XX"), None);
    }
}
