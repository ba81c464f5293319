//! The interpreter loop.
//!
//! Statements run one operation at a time against a shared cursor and
//! message. A `SwitchTo` outcome abandons the rest of the current
//! statement and resumes at the target's first operation; exhausting a
//! statement falls through to the next one in declaration order. The
//! loop, not the operations, owns the cycle guards: a bound on total
//! switches and a memory of (statement, cursor position) pairs, since
//! revisiting a statement without consuming anything can only repeat
//! forever.

use log::{debug, trace};

use crate::cursor::DataCursor;
use crate::errors::{DecoderError, EndlessLoop};
use crate::message::{DecodedMessage, RawMessage};
use crate::platform::PlatformConfig;
use crate::script::{OpOutcome, Script};
use crate::settings::DecoderSettings;

/// Recent (statement, position) pairs kept for cycle detection
const FORMAT_POSITION_WINDOW: usize = 50;

/// Decodes one raw message with a compiled script, starting at the first
/// statement.
pub fn decode(
    script: &Script,
    raw: &RawMessage,
    cfg: &PlatformConfig,
    settings: &DecoderSettings,
) -> Result<DecodedMessage, DecoderError> {
    decode_from(script, raw, cfg, settings, None)
}

/// Decodes one raw message, optionally starting at a labeled statement.
pub fn decode_from(
    script: &Script,
    raw: &RawMessage,
    cfg: &PlatformConfig,
    settings: &DecoderSettings,
    start_label: Option<&str>,
) -> Result<DecodedMessage, DecoderError> {
    let mut msg = DecodedMessage::new(raw, cfg, script.data_order, settings);
    let mut cursor =
        DataCursor::new(&raw.data, raw.start_line).with_scan_past_eol(settings.scan_past_eol);

    let mut idx = match start_label {
        Some(label) => script.statement_index(label, settings).ok_or_else(|| {
            DecoderError::Script(format!("no start statement with label '{}'", label))
        })?,
        None => 0,
    };

    let mut switches = 0usize;
    let mut visited: Vec<(usize, usize)> = Vec::new();

    'message: while let Some(statement) = script.statement(idx) {
        // a statement rerun at an unchanged position cannot make progress
        let here = (idx, cursor.position());
        if visited.contains(&here) {
            return Err(EndlessLoop {
                label: statement.label.clone(),
                position: cursor.position(),
            }
            .into());
        }
        visited.push(here);
        if visited.len() > FORMAT_POSITION_WINDOW {
            visited.remove(0);
        }

        trace!(
            "executing statement '{}' at position {}",
            statement.label,
            cursor.position()
        );

        let mut target: Option<String> = None;
        for op in &statement.ops {
            match op.execute(&mut cursor, &mut msg, script, settings) {
                Ok(OpOutcome::Continue) => {}
                Ok(OpOutcome::SwitchTo(label)) => {
                    target = Some(label);
                    break;
                }
                Err(DecoderError::EndOfData(e)) => {
                    // data ran out mid-operation, the decode pass is over
                    debug!("end of data at position {}: {}", cursor.position(), e);
                    break 'message;
                }
                Err(e) => return Err(e),
            }
        }

        match target {
            Some(label) => {
                switches += 1;
                if switches > settings.max_statement_switches {
                    return Err(EndlessLoop {
                        label,
                        position: cursor.position(),
                    }
                    .into());
                }
                idx = script.statement_index(&label, settings).ok_or_else(|| {
                    DecoderError::Script(format!("switch to unknown label '{}'", label))
                })?;
            }
            None => idx += 1,
        }
    }

    msg.finish_message();
    Ok(msg)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::function::FunctionRegistry;
    use crate::platform::{DataOrder, SensorConfig};
    use crate::value::Value;
    use chrono::{TimeZone, Utc};

    fn compile(statements: &[(&str, &str)]) -> Script {
        Script::compile(
            "test",
            statements,
            DataOrder::Undefined,
            &FunctionRegistry::default(),
            &DecoderSettings::default(),
        )
        .unwrap()
    }

    fn platform() -> PlatformConfig {
        PlatformConfig::new(vec![
            SensorConfig::variable(1, "one"),
            SensorConfig::variable(2, "two"),
        ])
    }

    fn raw(data: &[u8]) -> RawMessage {
        RawMessage::new(data.to_vec())
            .with_time_stamp(Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap())
    }

    #[test]
    fn switch_resumes_at_first_operation() {
        // the alternate statement must run from ITS start: it skips two
        // and reads a field, which only lines up if it began at index 0
        let script = compile(&[
            ("main", "c('X',alt) f(s,a,3,1)"),
            ("alt", "2x f(s,a,2,2)"),
        ]);
        let msg = decode(&script, &raw(b"AB42"), &platform(), &DecoderSettings::default())
            .unwrap();
        assert_eq!(msg.time_series(1).unwrap().len(), 0);
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(42)
        );
    }

    #[test]
    fn fallthrough_to_next_statement() {
        let script = compile(&[("a", "f(s,a,1,1)"), ("b", "f(s,a,1,2)")]);
        let msg = decode(&script, &raw(b"12"), &platform(), &DecoderSettings::default())
            .unwrap();
        assert_eq!(
            msg.time_series(1).unwrap().sample_at(0).unwrap().value,
            Value::Int(1)
        );
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(2)
        );
    }

    #[test]
    fn goto_cycle_is_detected() {
        let script = compile(&[("a", ">b"), ("b", ">a")]);
        let err = decode(&script, &raw(b"data"), &platform(), &DecoderSettings::default())
            .unwrap_err();
        assert!(matches!(err, DecoderError::EndlessLoop(_)));
    }

    #[test]
    fn switch_bound_catches_slow_cycles() {
        // consumes one byte per lap, so positions differ until the data
        // runs out; the switch bound has to fire first
        let script = compile(&[("a", "1x >a")]);
        let mut settings = DecoderSettings::default();
        settings.max_statement_switches = 3;
        let err = decode(&script, &raw(b"0123456789"), &platform(), &settings).unwrap_err();
        assert!(matches!(err, DecoderError::EndlessLoop(_)));
    }

    #[test]
    fn end_of_data_ends_decode_normally() {
        let script = compile(&[("a", "f(s,a,2,1) f(s,a,2,2) f(s,a,2,1)")]);
        let msg = decode(&script, &raw(b"1234"), &platform(), &DecoderSettings::default())
            .unwrap();
        // third field hits end of data, first two survive
        assert_eq!(msg.time_series(1).unwrap().len(), 1);
        assert_eq!(msg.time_series(2).unwrap().len(), 1);
    }

    #[test]
    fn start_label_override() {
        let script = compile(&[("skipme", "f(s,a,4,1)"), ("real", "f(s,a,2,2)")]);
        let msg = decode_from(
            &script,
            &raw(b"77"),
            &platform(),
            &DecoderSettings::default(),
            Some("real"),
        )
        .unwrap();
        assert_eq!(msg.time_series(1).unwrap().len(), 0);
        assert_eq!(
            msg.time_series(2).unwrap().sample_at(0).unwrap().value,
            Value::Int(77)
        );
    }
}
