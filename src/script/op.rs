//! Script operations and their execution.
//!
//! Every operation reports where it goes next through [`OpOutcome`]
//! instead of unwinding: `Continue` falls through to the next operation,
//! `SwitchTo` abandons the rest of the current statement and resumes at
//! the named statement's first operation. Check and Scan use the switch
//! path as their "this must be a different message variant" dispatch, so
//! it is routine control flow, not an error.

use chrono::Timelike;
use log::trace;

use crate::cursor::DataCursor;
use crate::errors::DecoderError;
use crate::function::DecodingFunction;
use crate::message::DecodedMessage;
use crate::script::field_op::FieldOp;
use crate::script::Script;
use crate::settings::{DecoderSettings, LabelMode};

/// Byte range of an operation's token within its statement text, kept
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Where execution goes after an operation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// Next operation of the current statement
    Continue,
    /// Abandon this statement, resume at the named statement
    SwitchTo(String),
}

/// What a Check operation expects at the current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckTarget {
    Sign,
    Digits(u32),
    Literal(String),
}

/// What a Scan operation searches forward for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Sign,
    Digit,
    Letter,
    PseudoBinary,
    Literal(String),
}

/// Boundary a time-truncate operation floors the register to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateBoundary {
    Minute,
    Hour,
    /// Floor minutes to a multiple of n
    Minutes(u32),
}

/// A function operation: the prototype keeps the parsed arguments, a
/// fresh copy runs per execution.
pub struct FunctionOp {
    pub name: String,
    pub prototype: Box<dyn DecodingFunction>,
    pub span: Span,
}

impl std::fmt::Debug for FunctionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionOp")
            .field("name", &self.name)
            .finish()
    }
}

/// One parsed script operation.
#[derive(Debug)]
pub enum Operation {
    /// `p`: absolute column on the current line
    Position { reps: i32, span: Span },
    /// `x`: skip characters, negative reverses direction
    SkipCharacters { reps: i32, span: Span },
    /// `/` and `\`: skip lines forward or backward
    SkipLines { reps: i32, span: Span },
    /// `w()`: skip to the next non-whitespace character
    WhitespaceSkip { span: Span },
    /// `t(...)`: truncate the current-time register
    TimeTruncate { boundary: TruncateBoundary, span: Span },
    /// `c(...)`: verify at the current position, else switch
    Check {
        target: CheckTarget,
        label: String,
        span: Span,
    },
    /// `s(...)`: bounded forward search, else switch
    Scan {
        count: u32,
        target: ScanTarget,
        label: String,
        span: Span,
    },
    /// `N(...)`: nested operation list run N times
    Group {
        reps: i32,
        ops: Vec<Operation>,
        span: Span,
    },
    /// `>label`: unconditional switch
    GotoLabel { label: String, span: Span },
    /// `f(...)`: field extraction family
    Field(FieldOp),
    /// named plugin invocation
    Function(FunctionOp),
}

impl Operation {
    pub fn span(&self) -> Span {
        match self {
            Operation::Position { span, .. }
            | Operation::SkipCharacters { span, .. }
            | Operation::SkipLines { span, .. }
            | Operation::WhitespaceSkip { span }
            | Operation::TimeTruncate { span, .. }
            | Operation::Check { span, .. }
            | Operation::Scan { span, .. }
            | Operation::Group { span, .. }
            | Operation::GotoLabel { span, .. } => *span,
            Operation::Field(f) => f.span,
            Operation::Function(f) => f.span,
        }
    }

    /// Executes one operation against the shared cursor and message.
    pub fn execute(
        &self,
        cursor: &mut DataCursor,
        msg: &mut DecodedMessage,
        script: &Script,
        settings: &DecoderSettings,
    ) -> Result<OpOutcome, DecoderError> {
        match self {
            Operation::Position { reps, .. } => {
                cursor.position_on_line(*reps)?;
                Ok(OpOutcome::Continue)
            }
            Operation::SkipCharacters { reps, .. } => {
                cursor.skip_characters(*reps)?;
                Ok(OpOutcome::Continue)
            }
            Operation::SkipLines { reps, .. } => {
                cursor.skip_lines(*reps)?;
                Ok(OpOutcome::Continue)
            }
            Operation::WhitespaceSkip { .. } => {
                cursor.skip_whitespace();
                Ok(OpOutcome::Continue)
            }
            Operation::TimeTruncate { boundary, .. } => {
                execute_truncate(*boundary, msg);
                Ok(OpOutcome::Continue)
            }
            Operation::Check { target, label, .. } => {
                let ignore_case = settings.label_mode == LabelMode::CaseInsensitive;
                let hit = match target {
                    CheckTarget::Sign => cursor.check_sign(),
                    CheckTarget::Digits(n) => cursor.check_digits(*n),
                    CheckTarget::Literal(s) => cursor.check_literal(s.as_bytes(), ignore_case),
                };
                // running out of data is a miss, not a fault: the message
                // is simply a different variant
                match hit {
                    Ok(true) => Ok(OpOutcome::Continue),
                    Ok(false) | Err(_) => {
                        trace!("check failed, switching to '{}'", label);
                        Ok(OpOutcome::SwitchTo(label.clone()))
                    }
                }
            }
            Operation::Scan {
                count,
                target,
                label,
                ..
            } => {
                let n = *count as i32;
                let ignore_case = settings.label_mode == LabelMode::CaseInsensitive;
                let hit = match target {
                    ScanTarget::Sign => cursor.scan_sign(n),
                    ScanTarget::Digit => cursor.scan_digit(n),
                    ScanTarget::Letter => cursor.scan_letter(n),
                    ScanTarget::PseudoBinary => cursor.scan_pseudo_binary(n),
                    ScanTarget::Literal(s) => cursor.scan_literal(n, s.as_bytes(), ignore_case),
                };
                match hit {
                    Ok(true) => Ok(OpOutcome::Continue),
                    Ok(false) | Err(_) => {
                        trace!("scan failed, switching to '{}'", label);
                        Ok(OpOutcome::SwitchTo(label.clone()))
                    }
                }
            }
            Operation::Group { reps, ops, .. } => {
                for _ in 0..reps.unsigned_abs() {
                    for op in ops {
                        match op.execute(cursor, msg, script, settings)? {
                            OpOutcome::Continue => {}
                            switch => return Ok(switch),
                        }
                    }
                }
                Ok(OpOutcome::Continue)
            }
            Operation::GotoLabel { label, .. } => Ok(OpOutcome::SwitchTo(label.clone())),
            Operation::Field(f) => f.execute(cursor, msg, script, settings),
            Operation::Function(f) => {
                // fresh clone per execution, the prototype stays clean
                let mut func = f.prototype.make_copy();
                func.execute(cursor, msg)?;
                Ok(OpOutcome::Continue)
            }
        }
    }
}

/// Floors the register to the boundary. The first truncation in a
/// message also truncates the message time itself, keeping the original
/// for offset fields that need the true message time.
fn execute_truncate(boundary: TruncateBoundary, msg: &mut DecodedMessage) {
    if !msg.time_was_truncated() {
        let local = msg.timer_ref().to_local(msg.message_time());
        let truncated = match boundary {
            TruncateBoundary::Minute => local.with_second(0).unwrap_or(local),
            TruncateBoundary::Hour => local
                .with_second(0)
                .and_then(|c| c.with_minute(0))
                .unwrap_or(local),
            TruncateBoundary::Minutes(n) if n > 0 => {
                let c = local.with_second(0).unwrap_or(local);
                let m = c.minute() - c.minute() % n;
                c.with_minute(m).unwrap_or(c)
            }
            TruncateBoundary::Minutes(_) => local,
        };
        let t = msg.timer_ref().from_local(truncated);
        msg.truncate_time(t);
    }
    match boundary {
        TruncateBoundary::Minute => msg.timer().truncate_to_minute(),
        TruncateBoundary::Hour => msg.timer().truncate_to_hour(),
        TruncateBoundary::Minutes(n) => msg.timer().truncate_to_minute_boundary(n),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::RawMessage;
    use crate::platform::{DataOrder, PlatformConfig, SensorConfig};
    use crate::script::Script;
    use chrono::{TimeZone, Utc};

    fn setup() -> (Script, DecodedMessage, DecoderSettings) {
        let settings = DecoderSettings::default();
        let script = Script::compile(
            "t",
            &[("start", "1x"), ("alt", "2x")],
            DataOrder::Undefined,
            &crate::function::FunctionRegistry::default(),
            &settings,
        )
        .unwrap();
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")]);
        let raw = RawMessage::new(b"".to_vec())
            .with_time_stamp(Utc.with_ymd_and_hms(2024, 6, 10, 12, 34, 56).unwrap());
        let msg = DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &settings);
        (script, msg, settings)
    }

    #[test]
    fn check_miss_switches() {
        let (script, mut msg, settings) = setup();
        let mut cursor = DataCursor::new(b"XYZ", 0);
        let op = Operation::Check {
            target: CheckTarget::Literal("AB".to_string()),
            label: "alt".to_string(),
            span: Span::default(),
        };
        let out = op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(out, OpOutcome::SwitchTo("alt".to_string()));
        // cursor stays put on a miss
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn check_hit_continues() {
        let (script, mut msg, settings) = setup();
        let mut cursor = DataCursor::new(b"XYZ", 0);
        let op = Operation::Check {
            target: CheckTarget::Literal("xy".to_string()),
            label: "alt".to_string(),
            span: Span::default(),
        };
        let out = op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(out, OpOutcome::Continue);
    }

    #[test]
    fn check_past_end_switches_instead_of_failing() {
        let (script, mut msg, settings) = setup();
        let mut cursor = DataCursor::new(b"", 0);
        let op = Operation::Check {
            target: CheckTarget::Sign,
            label: "alt".to_string(),
            span: Span::default(),
        };
        let out = op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(out, OpOutcome::SwitchTo("alt".to_string()));
    }

    #[test]
    fn group_repeats_and_propagates_switch() {
        let (script, mut msg, settings) = setup();
        let mut cursor = DataCursor::new(b"aaaa1", 0);
        let op = Operation::Group {
            reps: 3,
            ops: vec![Operation::SkipCharacters {
                reps: 1,
                span: Span::default(),
            }],
            span: Span::default(),
        };
        op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(cursor.position(), 3);

        let op = Operation::Group {
            reps: 5,
            ops: vec![Operation::Check {
                target: CheckTarget::Digits(1),
                label: "alt".to_string(),
                span: Span::default(),
            }],
            span: Span::default(),
        };
        // first iteration misses on 'a' and the switch escapes the group
        let out = op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(cursor.position(), 3);
        assert_eq!(out, OpOutcome::SwitchTo("alt".to_string()));
    }

    #[test]
    fn truncation_preserves_original_message_time() {
        let (script, mut msg, settings) = setup();
        let mut cursor = DataCursor::new(b"", 0);
        let before = msg.message_time();
        let op = Operation::TimeTruncate {
            boundary: TruncateBoundary::Hour,
            span: Span::default(),
        };
        op.execute(&mut cursor, &mut msg, &script, &settings).unwrap();
        assert_eq!(
            msg.message_time(),
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
        );
        assert_eq!(msg.untruncated_message_time(), before);
    }
}
