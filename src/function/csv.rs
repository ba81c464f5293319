//! Delimiter-separated column decoder.
//!
//! Maps the columns of the current line onto sensors, e.g.
//! `csv(1,2,x,3)` delivers columns one, two and four to sensors 1, 2
//! and 3 and skips the third. `delimiter=` and `missing=` arguments
//! override the column separator and the missing-value marker.

use log::debug;

use crate::cursor::DataCursor;
use crate::errors::{DecoderError, ScriptFormatError};
use crate::field::FieldType;
use crate::function::{DecodingFunction, ScriptContext};
use crate::message::DecodedMessage;
use crate::value::{Sample, SampleFlags, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Sensor(i32),
    Skip,
}

/// The `csv` decoding function.
#[derive(Debug, Clone)]
pub struct CsvFunction {
    columns: Vec<Column>,
    delimiter: String,
    missing: String,
}

impl Default for CsvFunction {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            delimiter: ",".to_string(),
            missing: "M".to_string(),
        }
    }
}

impl DecodingFunction for CsvFunction {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn make_copy(&self) -> Box<dyn DecodingFunction> {
        Box::new(self.clone())
    }

    /// Comma-separated column list: sensor numbers, `x` to skip a
    /// column, `delimiter=` and `missing=` settings anywhere in the list.
    fn set_arguments(&mut self, args: &str, _ctx: &ScriptContext) -> Result<(), ScriptFormatError> {
        for tok in args.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some((key, value)) = tok.split_once('=') {
                match key.trim().to_ascii_lowercase().as_str() {
                    "delimiter" => {
                        self.delimiter = match value.trim() {
                            "tab" => "\t".to_string(),
                            "space" => " ".to_string(),
                            other if !other.is_empty() => other.to_string(),
                            _ => {
                                return Err(ScriptFormatError::new("empty csv delimiter"));
                            }
                        };
                    }
                    "missing" => self.missing = value.trim().to_string(),
                    other => {
                        return Err(ScriptFormatError::new(format!(
                            "unknown csv setting '{}'",
                            other
                        )));
                    }
                }
            } else if tok.eq_ignore_ascii_case("x") {
                self.columns.push(Column::Skip);
            } else {
                let n: i32 = tok.parse().map_err(|_| {
                    ScriptFormatError::new(format!("bad csv column assignment '{}'", tok))
                })?;
                self.columns.push(Column::Sensor(n));
            }
        }
        if self.columns.is_empty() {
            return Err(ScriptFormatError::new(
                "csv function needs at least one column assignment",
            ));
        }
        Ok(())
    }

    /// Decodes one line of delimited columns at the cursor. The cursor is
    /// left on the end-of-line (or end of data), so a surrounding skip or
    /// line operator drives multi-line files.
    fn execute(
        &mut self,
        cursor: &mut DataCursor,
        msg: &mut DecodedMessage,
    ) -> Result<(), DecoderError> {
        for column in &self.columns {
            if !cursor.has_more() {
                break;
            }
            let line = cursor.current_line();
            let field = cursor.get_field(
                cursor.remaining().len().max(1),
                Some(self.delimiter.as_str()),
                false,
                true,
            )?;
            let at_delimiter = cursor
                .current_byte()
                .map(|b| self.delimiter.as_bytes().contains(&b))
                .unwrap_or(false);

            if let Column::Sensor(sensor) = column {
                let text = String::from_utf8_lossy(&field).trim().to_string();
                let mut sample = Sample::new(Value::Str("m".to_string()), msg.message_time(), line);
                if text.is_empty() || text.eq_ignore_ascii_case(&self.missing) {
                    sample.flags |= SampleFlags::MISSING;
                } else {
                    match FieldType::Ascii.parse(text.as_bytes()) {
                        Ok(v) => sample.value = v,
                        Err(e) => {
                            debug!("csv column failed to parse: {}", e);
                            sample.value = Value::Str("e".to_string());
                            sample.flags |= SampleFlags::ERROR;
                        }
                    }
                }
                msg.add_sample_with_flags(*sensor, sample);
            }

            // step over the separator, but never over the end-of-line
            if at_delimiter {
                cursor.advance()?;
            } else {
                break;
            }
        }
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
        let mut f = CsvFunction::default();
        f.set_arguments(args, &ctx).unwrap();

        let cfg = PlatformConfig::new(vec![
            SensorConfig::variable(1, "one"),
            SensorConfig::variable(2, "two"),
            SensorConfig::variable(3, "three"),
        ]);
        let raw = RawMessage::new(data.to_vec())
            .with_time_stamp(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());
        let mut msg = DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &settings);
        let mut cursor = DataCursor::new(data, 0);
        f.execute(&mut cursor, &mut msg).unwrap();
        msg
    }

    #[test]
    fn columns_map_to_sensors() {
        let msg = run("1,x,2", b"12.5,junk,-3");
        assert_eq!(
            msg.time_series(1).unwrap().sample_at(0).unwrap().value,
            Value::Double(12.5)
        );
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(-3)
        );
        assert_eq!(msg.time_series(3).unwrap().len(), 0);
    }

    #[test]
    fn missing_marker_and_empty_columns() {
        let msg = run("1,2,3", b"M,,7");
        assert!(msg.time_series(1).unwrap().sample_at(0).unwrap().is_missing());
        assert!(msg.time_series(2).unwrap().sample_at(0).unwrap().is_missing());
        assert_eq!(
            msg.time_series(3).unwrap().sample_at(0).unwrap().value,
            Value::Int(7)
        );
    }

    #[test]
    fn custom_marker_and_delimiter() {
        let msg = run("1,2,delimiter=;,missing=//", b"//;42");
        assert!(msg.time_series(1).unwrap().sample_at(0).unwrap().is_missing());
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(42)
        );
    }

    #[test]
    fn garbage_column_flags_error_but_continues() {
        let msg = run("1,2", b"abc,5");
        assert!(msg.time_series(1).unwrap().sample_at(0).unwrap().is_error());
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(5)
        );
    }

    #[test]
    fn stops_at_end_of_line() {
        let msg = run("1,2,3", b"4,5\n6,7,8");
        assert_eq!(msg.time_series(1).unwrap().len(), 1);
        assert_eq!(msg.time_series(2).unwrap().len(), 1);
        assert_eq!(msg.time_series(3).unwrap().len(), 0);
    }

    #[test]
    fn rejects_bad_arguments() {
        let settings = DecoderSettings::default();
        let ctx = ScriptContext {
            data_order: DataOrder::Undefined,
            missing_symbol: None,
            settings: &settings,
        };
        let mut f = CsvFunction::default();
        assert!(f.set_arguments("1,abc", &ctx).is_err());
        assert!(f.set_arguments("", &ctx).is_err());
        assert!(f.set_arguments("1,bogus=3", &ctx).is_err());
    }
}
