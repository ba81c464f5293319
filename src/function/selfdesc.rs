//! Self-describing block decoder.
//!
//! Parses ASCII blocks of the form `:label minuteOffset#minuteInterval
//! value value ...`: the label names the sensor, the first sample lands
//! `minuteOffset` minutes before the message time and each further value
//! steps forward by `minuteInterval` minutes. Values beginning with `M`
//! or `/` are explicit missing markers, not parse errors.

use chrono::Duration;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;

use crate::cursor::DataCursor;
use crate::errors::{DecoderError, ScriptFormatError};
use crate::field::FieldType;
use crate::function::{sensor_for_label, DecodingFunction, ScriptContext};
use crate::message::DecodedMessage;
use crate::value::{Sample, SampleFlags, Value};

lazy_static! {
    static ref BLOCK_RE: Regex =
        Regex::new(r":\s*([A-Za-z0-9_]+)\s+(-?\d+)\s*#\s*(\d+)((?:\s+[^\s:]+)*)").unwrap();
}

/// The `selfdesc` decoding function.
#[derive(Debug, Clone, Default)]
pub struct SelfDescFunction {
    /// Explicit label assignments, uppercase label to sensor number.
    /// Labels not listed here fall back to data-type matching.
    label_map: HashMap<String, i32>,
}

impl DecodingFunction for SelfDescFunction {
    fn name(&self) -> &'static str {
        "selfdesc"
    }

    fn make_copy(&self) -> Box<dyn DecodingFunction> {
        Box::new(self.clone())
    }

    /// Optional `label=sensorNumber` assignments, comma or space
    /// separated.
    fn set_arguments(&mut self, args: &str, _ctx: &ScriptContext) -> Result<(), ScriptFormatError> {
        for tok in args
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let (label, num) = tok.split_once('=').ok_or_else(|| {
                ScriptFormatError::new(format!(
                    "selfdesc argument '{}' is not label=sensorNumber",
                    tok
                ))
            })?;
            let n: i32 = num.trim().parse().map_err(|_| {
                ScriptFormatError::new(format!("bad sensor number in '{}'", tok))
            })?;
            self.label_map.insert(label.trim().to_ascii_uppercase(), n);
        }
        Ok(())
    }

    /// Consumes everything from the cursor to the end of the message,
    /// decoding every block found.
    fn execute(
        &mut self,
        cursor: &mut DataCursor,
        msg: &mut DecodedMessage,
    ) -> Result<(), DecoderError> {
        let body = String::from_utf8_lossy(cursor.remaining()).into_owned();
        let base_line = cursor.current_line();

        for caps in BLOCK_RE.captures_iter(&body) {
            let label = &caps[1];
            let offset: i64 = caps[2].parse().unwrap_or(0);
            let interval: i64 = caps[3].parse().unwrap_or(0);
            let line = base_line
                + body[..caps.get(0).map(|m| m.start()).unwrap_or(0)]
                    .bytes()
                    .filter(|&b| b == b'\n')
                    .count() as u32;

            let sensor = match self
                .label_map
                .get(&label.to_ascii_uppercase())
                .copied()
                .or_else(|| sensor_for_label(msg, label))
            {
                Some(s) => s,
                None => {
                    // unresolvable labels discard their values, the rest
                    // of the message still decodes
                    warn!("no sensor for label '{}', block discarded", label);
                    continue;
                }
            };

            // first value lands offset minutes before the true message
            // time, truncated to the minute
            let base = msg.untruncated_message_time();
            let base_secs = base.timestamp().div_euclid(60) * 60;
            let mut t = chrono::DateTime::<chrono::Utc>::from_timestamp(base_secs, 0)
                .unwrap_or(base)
                - Duration::minutes(offset);

            for tok in caps[4].split_whitespace() {
                let mut sample = Sample::new(Value::Str("m".to_string()), t, line);
                if tok.starts_with('M') || tok.starts_with('/') {
                    sample.flags |= SampleFlags::MISSING;
                } else {
                    match FieldType::Ascii.parse(tok.as_bytes()) {
                        Ok(v) => sample.value = v,
                        Err(e) => {
                            debug!("selfdesc value '{}' failed to parse: {}", tok, e);
                            sample.value = Value::Str("e".to_string());
                            sample.flags |= SampleFlags::ERROR;
                        }
                    }
                }
                msg.timer().set_complete(t);
                msg.add_sample_with_flags(sensor, sample);
                t += Duration::minutes(interval);
            }
        }

        // the whole tail is consumed
        cursor.seek(usize::MAX);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::RawMessage;
    use crate::platform::{DataOrder, PlatformConfig, SensorConfig};
    use crate::settings::DecoderSettings;
    use chrono::{TimeZone, Utc};

    fn run(args: &str, data: &[u8]) -> DecodedMessage {
        let settings = DecoderSettings::default();
        let ctx = ScriptContext {
            data_order: DataOrder::Undefined,
            missing_symbol: None,
            settings: &settings,
        };
        let mut f = SelfDescFunction::default();
        f.set_arguments(args, &ctx).unwrap();

        let cfg = PlatformConfig::new(vec![
            SensorConfig::variable(1, "stage").with_data_type("label", "HG"),
            SensorConfig::variable(2, "precip").with_data_type("label", "PC"),
        ]);
        let raw = RawMessage::new(data.to_vec())
            .with_time_stamp(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());
        let mut msg = DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &settings);
        let mut cursor = DataCursor::new(data, 0);
        f.execute(&mut cursor, &mut msg).unwrap();
        msg
    }

    fn utc(h: u32, m: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    #[test]
    fn block_times_step_by_interval() {
        let msg = run("", b":HG 30#15 1.1 1.2 1.3");
        let ts = msg.time_series(1).unwrap();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.sample_at(0).unwrap().time, utc(11, 30));
        assert_eq!(ts.sample_at(1).unwrap().time, utc(11, 45));
        assert_eq!(ts.sample_at(2).unwrap().time, utc(12, 0));
        assert_eq!(ts.sample_at(0).unwrap().value, Value::Double(1.1));
    }

    #[test]
    fn multiple_blocks_and_label_fallback() {
        let msg = run("", b":HG 0#60 5 6\n:PC 0#60 0.1");
        assert_eq!(msg.time_series(1).unwrap().len(), 2);
        assert_eq!(msg.time_series(2).unwrap().len(), 1);
        assert_eq!(msg.time_series(2).unwrap().sample_at(0).unwrap().line, 2);
    }

    #[test]
    fn missing_markers_are_not_errors() {
        let msg = run("", b":HG 0#15 1.0 M 1.5 //");
        let ts = msg.time_series(1).unwrap();
        assert_eq!(ts.len(), 4);
        assert!(ts.sample_at(1).unwrap().is_missing());
        assert!(!ts.sample_at(1).unwrap().is_error());
        assert!(ts.sample_at(3).unwrap().is_missing());
        assert_eq!(ts.sample_at(2).unwrap().value, Value::Double(1.5));
    }

    #[test]
    fn explicit_map_overrides_data_types() {
        let msg = run("HG=2", b":HG 0#15 7");
        assert_eq!(msg.time_series(1).unwrap().len(), 0);
        assert_eq!(msg.time_series(2).unwrap().len(), 1);
    }

    #[test]
    fn unknown_label_discards_block() {
        let msg = run("", b":XX 0#15 7 :HG 0#15 8");
        assert_eq!(msg.time_series(1).unwrap().len(), 1);
        assert_eq!(
            msg.time_series(1).unwrap().sample_at(0).unwrap().value,
            Value::Int(8)
        );
    }

    #[test]
    fn bad_arguments_fail() {
        let settings = DecoderSettings::default();
        let ctx = ScriptContext {
            data_order: DataOrder::Undefined,
            missing_symbol: None,
            settings: &settings,
        };
        let mut f = SelfDescFunction::default();
        assert!(f.set_arguments("HG", &ctx).is_err());
        assert!(f.set_arguments("HG=abc", &ctx).is_err());
        assert!(f.set_arguments("HG=1, PC=2", &ctx).is_ok());
    }
}
