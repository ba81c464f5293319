//! This package decodes raw telemetry messages from environmental
//! monitoring stations (river gauges, tide stations, weather DCPs) into
//! time-stamped sensor samples.
//!
//! Messages are described by small per-platform scripts made of "format
//! statements". The interpreter executes a compiled script against the
//! message bytes, driving built-in operators (skip, position, check,
//! scan, field extraction, time truncation) and pluggable decoding
//! functions, while reconstructing sample times from whatever date and
//! time information the message carries.
//!
//! ```
//! use dcpdec::prelude::*;
//!
//! let registry = FunctionRegistry::default();
//! let settings = DecoderSettings::default();
//! let script = Script::compile(
//!     "gauge",
//!     &[("start", "f(s,a,4,1) 1x f(s,a,4,2)")],
//!     DataOrder::Ascending,
//!     &registry,
//!     &settings,
//! )
//! .unwrap();
//!
//! let cfg = PlatformConfig::new(vec![
//!     SensorConfig::fixed(1, "stage", 900),
//!     SensorConfig::fixed(2, "precip", 900),
//! ]);
//! let raw = RawMessage::new(b"12.5 07.2".to_vec());
//! let msg = decode(&script, &raw, &cfg, &settings).unwrap();
//! assert_eq!(msg.time_series(1).unwrap().len(), 1);
//! assert_eq!(msg.time_series(2).unwrap().len(), 1);
//! ```

pub mod cursor;
pub mod errors;
pub mod field;
pub mod function;
pub mod interpreter;
pub mod message;
pub mod platform;
pub mod script;
pub mod settings;
pub mod time;
pub mod value;

pub mod prelude {
    pub use crate::cursor::DataCursor;
    pub use crate::errors::{
        DecoderError, EndOfData, EndlessLoop, FieldParseError, ScriptFormatError,
    };
    pub use crate::field::FieldType;
    pub use crate::function::{
        CsvFunction, DecodingFunction, FunctionRegistry, ScriptContext, SelfDescFunction,
    };
    pub use crate::interpreter::{decode, decode_from};
    pub use crate::message::{DecodedMessage, RawMessage};
    pub use crate::platform::{
        DataOrder, DataTypeCode, PlatformConfig, RecordingMode, SensorConfig,
    };
    pub use crate::script::{FormatStatement, OpOutcome, Operation, Script};
    pub use crate::settings::{DecoderSettings, DstMode, LabelMode, TimeZoneSpec};
    pub use crate::time::{RecordedTimeStamp, TimeSeries, TimeStatus};
    pub use crate::value::{Sample, SampleFlags, Value};
}
