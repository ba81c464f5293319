//! Read-only snapshot of the platform and sensor configuration.
//!
//! Persistence of this metadata lives outside the decoder. Callers build a
//! [`PlatformConfig`] from whatever store they use and hand it to the
//! interpreter, which copies what it needs into the per-message model.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a sensor records samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordingMode {
    #[default]
    Fixed,
    Variable,
}

/// Chronological order of samples within one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataOrder {
    Ascending,
    Descending,
    #[default]
    Undefined,
}

impl DataOrder {
    /// Parses the single-character convention used in platform records.
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'A' => DataOrder::Ascending,
            'D' => DataOrder::Descending,
            _ => DataOrder::Undefined,
        }
    }
}

/// One data-type assignment on a sensor, used by decoding functions to
/// match message-embedded labels against configured sensors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataTypeCode {
    /// Naming standard the code belongs to ("label", "shef", ...)
    pub standard: String,
    pub code: String,
}

impl DataTypeCode {
    pub fn new<S: Into<String>, C: Into<String>>(standard: S, code: C) -> Self {
        Self {
            standard: standard.into(),
            code: code.into(),
        }
    }
}

/// Configuration for one sensor on a platform.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// Sensor number, unique per platform, `>= 1`
    pub number: i32,
    pub name: String,
    pub recording_mode: RecordingMode,
    /// Seconds between samples for fixed-interval sensors
    pub recording_interval: i64,
    /// Second-of-day of the first daily sample, anchors interval boundaries
    pub time_of_first_sample: i64,
    /// Per-sensor override of the script data order
    pub data_order: Option<DataOrder>,
    pub data_types: Vec<DataTypeCode>,
    /// Free-form properties ("omit", "scale", "offset", "preoffset",
    /// "TimeOffsetSec", "minReplaceValue", "maxReplaceValue", ...)
    pub properties: HashMap<String, String>,
    /// Discard values below this
    pub minimum: Option<f64>,
    /// Discard values above this
    pub maximum: Option<f64>,
}

impl SensorConfig {
    /// A fixed-interval sensor sampling every `interval_secs` seconds.
    pub fn fixed(number: i32, name: &str, interval_secs: i64) -> Self {
        Self {
            number,
            name: name.to_string(),
            recording_mode: RecordingMode::Fixed,
            recording_interval: interval_secs,
            time_of_first_sample: 0,
            data_order: None,
            data_types: Vec::new(),
            properties: HashMap::new(),
            minimum: None,
            maximum: None,
        }
    }

    /// A variable-interval (event driven) sensor.
    pub fn variable(number: i32, name: &str) -> Self {
        Self {
            recording_mode: RecordingMode::Variable,
            recording_interval: 0,
            ..Self::fixed(number, name, 0)
        }
    }

    pub fn with_data_type(mut self, standard: &str, code: &str) -> Self {
        self.data_types.push(DataTypeCode::new(standard, code));
        self
    }

    pub fn with_property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    /// Case-insensitive property lookup, matching how platform records
    /// store them.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if any data type carries this code, any standard.
    pub fn has_data_type(&self, code: &str) -> bool {
        self.data_types
            .iter()
            .any(|dt| dt.code.eq_ignore_ascii_case(code))
    }
}

/// The full sensor complement of one platform.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlatformConfig {
    pub sensors: Vec<SensorConfig>,
    /// Default chronological order for every sensor, overridable per sensor
    pub data_order: DataOrder,
}

impl PlatformConfig {
    pub fn new(sensors: Vec<SensorConfig>) -> Self {
        Self {
            sensors,
            data_order: DataOrder::Undefined,
        }
    }

    pub fn with_data_order(mut self, order: DataOrder) -> Self {
        self.data_order = order;
        self
    }

    pub fn sensor(&self, number: i32) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.number == number)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn property_lookup_ignores_case() {
        let s = SensorConfig::fixed(1, "HG", 900).with_property("TimeOffsetSec", "-30");
        assert_eq!(s.property("timeoffsetsec"), Some("-30"));
        assert_eq!(s.property("scale"), None);
    }

    #[test]
    fn data_order_from_char() {
        assert_eq!(DataOrder::from_char('a'), DataOrder::Ascending);
        assert_eq!(DataOrder::from_char('D'), DataOrder::Descending);
        assert_eq!(DataOrder::from_char('q'), DataOrder::Undefined);
    }
}
