//! The field operation family.
//!
//! `f(field_type, data_type, length[, sensor])` extracts a field from the
//! message and routes it: sensor fields become samples, date and time
//! fields update the current-time register, label fields dispatch to
//! another statement. A single-argument form `f(N)` reads an ASCII field
//! of width N for the next configured sensor.

use chrono::Duration;
use log::{debug, trace, warn};

use crate::cursor::DataCursor;
use crate::errors::{DecoderError, FieldParseError, ScriptFormatError};
use crate::field::FieldType;
use crate::message::DecodedMessage;
use crate::script::op::{OpOutcome, Span};
use crate::script::Script;
use crate::settings::DecoderSettings;
use crate::time::TimeStatus;
use crate::value::{Sample, SampleFlags, Value};

/// What the extracted field means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Sensor value, appended as a sample
    Sensor,
    /// Format label, dispatches to the named statement
    FormatLabel,
    Year,
    Month,
    DayOfMonth,
    /// Day of year. The plain form dates the day just starting, the `+`
    /// form the day just ending.
    JulianDay { increment: bool },
    /// Composite date, layout selected by the format id argument
    Date { increment: bool },
    Hour,
    Minute,
    Second,
    /// Time of day, delimited or undelimited
    Time,
    /// AM/PM designator field
    AmPm,
    /// Sampling interval in minutes for a sensor
    MinuteInterval { negate: bool },
    /// Sampling interval as hh[:mm[:ss]] for a sensor
    TimeInterval,
    /// Minute offset backwards from the (untruncated) message time
    MinuteOffset,
}

impl FieldKind {
    fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "s" => Some(Self::Sensor),
            "f" => Some(Self::FormatLabel),
            "yr" => Some(Self::Year),
            "mn" => Some(Self::Month),
            "dy" => Some(Self::DayOfMonth),
            "jdy" => Some(Self::JulianDay { increment: false }),
            "jdy+" => Some(Self::JulianDay { increment: true }),
            "d" => Some(Self::Date { increment: false }),
            "d+" => Some(Self::Date { increment: true }),
            "hr" => Some(Self::Hour),
            "min" => Some(Self::Minute),
            "sec" => Some(Self::Second),
            "t" => Some(Self::Time),
            "a" => Some(Self::AmPm),
            "mint" => Some(Self::MinuteInterval { negate: false }),
            "mint-" => Some(Self::MinuteInterval { negate: true }),
            "ti" => Some(Self::TimeInterval),
            "moff" => Some(Self::MinuteOffset),
            _ => None,
        }
    }
}

/// A parsed field operation.
#[derive(Debug, Clone)]
pub struct FieldOp {
    pub reps: i32,
    pub kind: FieldKind,
    pub data_type: FieldType,
    pub width: usize,
    /// Any byte of this string delimits the field
    pub delimiter: Option<String>,
    /// Sensor number, or the format id for Date fields. -1 when absent.
    pub sensor: i32,
    /// Decode but do not store (x suffix on the sensor number)
    pub suppress: bool,
    /// Double-quoted literal standing in for message data
    pub literal: Option<String>,
    /// Shorthand form, samples go to successive configured sensors
    pub auto_sensor: bool,
    /// Time field doubling as an event marker for its sensor
    pub event: bool,
    pub span: Span,
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

impl FieldOp {
    /// Parses the parenthesized argument list of a field operation.
    pub fn from_args(reps: i32, args: &str, span: Span) -> Result<Self, ScriptFormatError> {
        let mut toks = ArgsTokenizer::new(args);

        // shorthand: a single numeric argument is a plain ASCII sensor
        // field of that width, bound to the next configured sensor
        let first = toks
            .next_token()
            .ok_or_else(|| ScriptFormatError::new("field operation with no field type"))?;
        if !first.text.is_empty()
            && first.text.chars().all(|c| c.is_ascii_digit())
            && !first.quoted
        {
            if toks.next_token().is_some() {
                return Err(ScriptFormatError::new(
                    "short field form takes a single width argument",
                ));
            }
            let width: usize = first
                .text
                .parse()
                .map_err(|_| ScriptFormatError::new("field width must be a number"))?;
            return Ok(Self {
                reps,
                kind: FieldKind::Sensor,
                data_type: FieldType::Ascii,
                width,
                delimiter: None,
                sensor: -1,
                suppress: false,
                literal: None,
                auto_sensor: true,
                event: false,
                span,
            });
        }

        let kind = FieldKind::from_token(&first.text.to_ascii_lowercase())
            .ok_or_else(|| {
                ScriptFormatError::new(format!("unknown field type '{}'", first.text))
            })?;

        let dt_tok = toks
            .next_token()
            .ok_or_else(|| ScriptFormatError::new("field operation with no data type"))?;
        let mut literal = None;
        let data_type = if dt_tok.double_quoted {
            literal = Some(dt_tok.text.clone());
            FieldType::Ascii
        } else {
            FieldType::from_name(&dt_tok.text).ok_or_else(|| {
                ScriptFormatError::new(format!("unknown field data type '{}'", dt_tok.text))
            })?
        };

        // length, optionally fused with a d-prefixed delimiter set
        let mut delimiter: Option<String> = None;
        let width = if let Some(lit) = &literal {
            lit.len()
        } else {
            let len_tok = toks
                .next_token()
                .ok_or_else(|| ScriptFormatError::new("field operation with no length"))?;
            let s = &len_tok.text;
            let dpos = s.find(|c| c == 'd' || c == 'D').unwrap_or(s.len());
            let width: usize = s[..dpos]
                .parse()
                .map_err(|_| ScriptFormatError::new("field length must be a number"))?;
            if dpos < s.len() {
                let rest = &s[dpos + 1..];
                if rest.is_empty() {
                    delimiter = Some(",".to_string());
                } else {
                    delimiter = Some(rest.to_string());
                }
            }
            width
        };

        let mut sensor = -1;
        let mut suppress = false;
        let mut event = false;
        if let Some(tok) = toks.next_token() {
            let mut s = tok.text.clone();
            if let Some(ix) = s.find(|c| c == 'x' || c == 'X') {
                s.truncate(ix);
                suppress = true;
            }
            match s.parse::<i32>() {
                Ok(n) if n < 0 => {
                    // negative doubles as the suppress flag
                    suppress = true;
                    sensor = -n;
                }
                Ok(n) => sensor = n,
                Err(_) => sensor = -1,
            }
            if kind == FieldKind::Time {
                event = true;
            }
        }

        Ok(Self {
            reps,
            kind,
            data_type,
            width,
            delimiter: delimiter.map(normalize_delimiter),
            sensor,
            suppress,
            literal,
            auto_sensor: false,
            event,
            span,
        })
    }

    /// Runs the operation: extracts `reps` fields and routes each one.
    pub fn execute(
        &self,
        cursor: &mut DataCursor,
        msg: &mut DecodedMessage,
        script: &Script,
        settings: &DecoderSettings,
    ) -> Result<OpOutcome, DecoderError> {
        if self.kind == FieldKind::Sensor
            && !self.auto_sensor
            && self.sensor == -1
            && !self.suppress
        {
            return Err(DecoderError::Script(format!(
                "invalid sensor number in field operation at {}..{}",
                self.span.start, self.span.end
            )));
        }

        let is_string = self.data_type == FieldType::Str;
        let is_z = self.data_type == FieldType::AsciiZero;

        for _ in 0..self.reps.unsigned_abs().max(1) {
            let line = cursor.current_line();
            let field: Vec<u8> = match &self.literal {
                Some(lit) => lit.as_bytes().to_vec(),
                None => cursor.get_field(
                    self.width,
                    self.delimiter.as_deref(),
                    self.data_type.is_pure_binary(),
                    is_string || is_z,
                )?,
            };

            trace!(
                "field parse: data='{}', kind={:?}, type={:?}",
                String::from_utf8_lossy(&field),
                self.kind,
                self.data_type
            );

            // blank fields are silently skipped, except for string fields
            // and the zero-tolerant ASCII form which must produce a sample
            if field.iter().all(|&b| b == b' ') && !is_string && !is_z {
                continue;
            }

            match self.kind {
                FieldKind::Sensor => self.execute_sensor(&field, msg, script, line)?,
                FieldKind::FormatLabel => {
                    let label = String::from_utf8_lossy(&field).trim().to_string();
                    debug!("searching for format label '{}'", label);
                    if script.statement_index(&label, settings).is_some() {
                        return Ok(OpOutcome::SwitchTo(label));
                    }
                    // unknown label falls back to the error handler
                    if script.statement_index("ERROR", settings).is_some() {
                        return Ok(OpOutcome::SwitchTo("ERROR".to_string()));
                    }
                    return Err(FieldParseError::new(format!(
                        "no such format label '{}', and no ERROR statement",
                        label
                    ))
                    .into());
                }
                FieldKind::JulianDay { increment } => {
                    let t = self.data_type.parse_int(&field)?;
                    if !(1..=366).contains(&t) {
                        return Err(
                            FieldParseError::new(format!("invalid julian date {}", t)).into()
                        );
                    }
                    check_day_366(t, msg.timer_ref().year())?;
                    let stat = msg.timer_ref().status();
                    msg.timer().set_day_of_year(t as u32);
                    if !increment {
                        msg.timer().decrement_day();
                    }
                    if stat != msg.timer_ref().status() {
                        msg.upgrade_stored_times();
                    }
                    msg.timer().increment_day();
                    msg.timer().set_hour(0);
                    msg.timer().set_minute(0);
                    msg.timer().set_second(0);
                    msg.timer().day_just_set = true;
                    msg.just_got_non_year_field();
                }
                FieldKind::DayOfMonth => {
                    let t = self.data_type.parse_int(&field)?;
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_day_of_month(t as u32) {
                        // a new day is starting, already stored times were
                        // for yesterday
                        msg.timer().decrement_day();
                        msg.upgrade_stored_times();
                        msg.timer().increment_day();
                    }
                    msg.timer().day_just_set = true;
                    msg.just_got_non_year_field();
                }
                FieldKind::Year => {
                    if !field.iter().all(u8::is_ascii_digit) {
                        return Err(FieldParseError::new("bad year value").into());
                    }
                    let t = self.data_type.parse_int(&field)?;
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_year(t as i32) {
                        msg.upgrade_stored_times();
                    }
                    msg.set_just_got_full_date_time(true);
                }
                FieldKind::Date { increment } => {
                    self.execute_date(&field, msg, increment)?;
                    msg.timer().set_hour(0);
                    msg.timer().set_minute(0);
                    msg.timer().set_second(0);
                    msg.timer().day_just_set = true;
                    msg.just_got_non_year_field();
                }
                FieldKind::Month => {
                    let t = if field.len() <= 2 {
                        self.data_type.parse_int(&field)?
                    } else {
                        month_index(&field)? as i64
                    };
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_month(t as u32) {
                        msg.timer().decrement_day();
                        msg.upgrade_stored_times();
                        msg.timer().increment_day();
                    }
                    msg.just_got_non_year_field();
                }
                FieldKind::Hour => {
                    let t = self.data_type.parse_int(&field)?;
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_hour(t as u32) {
                        msg.upgrade_stored_times();
                    }
                    msg.just_got_non_year_field();
                }
                FieldKind::Minute => {
                    let t = self.data_type.parse_int(&field)?;
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_minute(t as u32) {
                        msg.upgrade_stored_times();
                    }
                    msg.just_got_non_year_field();
                }
                FieldKind::Second => {
                    let t = self.data_type.parse_int(&field)?;
                    let stat = msg.timer_ref().status();
                    if stat != msg.timer().set_second(t as u32) {
                        msg.upgrade_stored_times();
                    }
                    msg.just_got_non_year_field();
                }
                FieldKind::Time => {
                    let stat = msg.timer_ref().status();
                    let secs_before = msg.timer_ref().unix_secs();
                    let (h, m, s, pm) = self.parse_time(&field)?;
                    msg.timer().set_hour(h);
                    msg.timer().set_minute(m);
                    msg.timer().set_second(s);
                    msg.just_got_non_year_field();
                    if let Some(pm) = pm {
                        msg.timer().set_pm(pm);
                    }
                    // time-only records in an ascending file jumping
                    // backwards mean a new day started
                    if stat == TimeStatus::Complete
                        && secs_before > msg.timer_ref().unix_secs()
                        && script.data_order == crate::platform::DataOrder::Ascending
                        && !msg.timer_ref().day_just_set
                    {
                        msg.timer().increment_day();
                    }
                    msg.timer().day_just_set = false;
                    if stat != msg.timer_ref().status() {
                        msg.upgrade_stored_times();
                    }
                    if self.sensor != -1 && self.event {
                        msg.add_sample(self.sensor, Value::Double(1.0), line);
                    }
                    msg.just_got_non_year_field();
                }
                FieldKind::AmPm => match field[0].to_ascii_uppercase() {
                    b'A' => msg.timer().set_pm(false),
                    b'P' => msg.timer().set_pm(true),
                    _ => {}
                },
                FieldKind::MinuteInterval { negate } => {
                    if self.sensor == -1 {
                        return Err(DecoderError::Script(
                            "minute-interval field must have a sensor number".to_string(),
                        ));
                    }
                    let mut m = self.data_type.parse_int(&field)?;
                    if negate && script.data_order == crate::platform::DataOrder::Ascending {
                        m = -m;
                    }
                    trace!("setting interval for sensor {} to {}s", self.sensor, m * 60);
                    msg.set_time_interval(self.sensor, m * 60);
                }
                FieldKind::TimeInterval => {
                    if self.sensor == -1 {
                        return Err(DecoderError::Script(
                            "time-interval field must have a sensor number".to_string(),
                        ));
                    }
                    let sod = second_of_day(&field)?;
                    msg.set_time_interval(self.sensor, sod);
                }
                FieldKind::MinuteOffset => {
                    let m = self.data_type.parse_int(&field)?;
                    // offset back from the true (untruncated) message
                    // time, floored to the minute
                    let base = msg.untruncated_message_time();
                    let secs = base.timestamp().div_euclid(60) * 60;
                    let t = chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
                        .unwrap_or(base)
                        - Duration::minutes(m);
                    msg.timer().set_complete(t);
                    trace!("minute offset {} sets register to {}", m, t);
                }
            }
        }
        Ok(OpOutcome::Continue)
    }

    /// Sensor value: decode, flag missing/error, append.
    fn execute_sensor(
        &self,
        field: &[u8],
        msg: &mut DecodedMessage,
        script: &Script,
        line: u32,
    ) -> Result<(), DecoderError> {
        let text = String::from_utf8_lossy(field).trim().to_string();
        let mut sample = Sample::new(Value::Str("m".to_string()), msg.message_time(), line);

        if is_missing_symbol(&text, self.data_type, script) {
            sample.flags |= SampleFlags::MISSING;
            debug!("found missing symbol '{}'", text);
        } else {
            match self.data_type.parse(field) {
                Ok(v) => sample.value = v,
                Err(e) => {
                    // one bad field must not abort the message
                    debug!("field parse failure: {}", e);
                    sample.value = Value::Str("e".to_string());
                    sample.flags |= SampleFlags::ERROR;
                }
            }
        }

        if !self.suppress {
            let sensor = if self.auto_sensor {
                match msg.next_auto_sensor() {
                    Some(n) => n,
                    None => {
                        warn!("no sensor left for unnumbered field, value discarded");
                        return Ok(());
                    }
                }
            } else {
                self.sensor
            };
            msg.add_sample_with_flags(sensor, sample);
        }
        msg.timer().day_just_set = false;
        Ok(())
    }

    /// Composite date field. The sensor argument selects the layout.
    fn execute_date(
        &self,
        field: &[u8],
        msg: &mut DecodedMessage,
        increment: bool,
    ) -> Result<(), DecoderError> {
        let stat = msg.timer_ref().status();
        let sub = |from: usize, len: usize| -> Result<i64, DecoderError> {
            if from + len > field.len() {
                return Err(FieldParseError::new("date field too short").into());
            }
            Ok(self.data_type.parse_int(&field[from..from + len])?)
        };

        match self.sensor {
            1 => {
                // YYMMDD, YY/MM/DD or YYYY/MM/DD
                let (y, m, d) = match self.width {
                    6 => (sub(0, 2)?, sub(2, 2)?, sub(4, 2)?),
                    8 => (sub(0, 2)?, sub(3, 2)?, sub(6, 2)?),
                    10 => (sub(0, 4)?, sub(5, 2)?, sub(8, 2)?),
                    _ => return Err(FieldParseError::new("bad date format 1 field").into()),
                };
                msg.timer().set_year(y as i32);
                msg.set_just_got_full_date_time(true);
                msg.timer().set_month(m as u32);
                msg.timer().set_day_of_month(d as u32);
                if !increment {
                    msg.timer().decrement_day();
                }
                if stat != msg.timer_ref().status() {
                    msg.upgrade_stored_times();
                }
                msg.timer().increment_day();
            }
            2 => {
                // DDD, YYDDD, YY/DDD or YYYYDDD
                let (y, d) = match self.width {
                    w if w <= 4 => (None, self.data_type.parse_int(field)?),
                    5 => (Some(sub(0, 2)?), sub(2, 3)?),
                    6 => (Some(sub(0, 2)?), sub(3, 3)?),
                    7 => (Some(sub(0, 4)?), sub(4, 3)?),
                    _ => return Err(FieldParseError::new("bad date format 2 field").into()),
                };
                match y {
                    Some(y) => {
                        msg.timer().set_year(y as i32);
                        msg.set_just_got_full_date_time(true);
                    }
                    None => msg.just_got_non_year_field(),
                }
                check_day_366(d, msg.timer_ref().year())?;
                msg.timer().set_day_of_year(d as u32);
                if !increment {
                    msg.timer().decrement_day();
                }
                if stat != msg.timer_ref().status() {
                    msg.upgrade_stored_times();
                }
                msg.timer().increment_day();
            }
            3 => {
                // MMDD or MM/DD
                let (m, d) = match self.width {
                    4 => (sub(0, 2)?, sub(2, 2)?),
                    5 => (sub(0, 2)?, sub(3, 2)?),
                    _ => return Err(FieldParseError::new("bad date format 3 field").into()),
                };
                msg.timer().set_month(m as u32);
                msg.timer().set_day_of_month(d as u32);
                if !increment {
                    msg.timer().decrement_day();
                }
                if stat != msg.timer_ref().status() {
                    msg.upgrade_stored_times();
                }
                msg.timer().increment_day();
                msg.just_got_non_year_field();
            }
            4 => {
                // MMDDYY, MM/DD/YY or MM/DD/YYYY
                let m = sub(0, 2)?;
                let (d, y) = match self.width {
                    6 => (sub(2, 2)?, sub(4, 2)?),
                    8 => (sub(3, 2)?, sub(6, 2)?),
                    10 => (sub(3, 2)?, sub(6, 4)?),
                    _ => return Err(FieldParseError::new("bad date format 4 field").into()),
                };
                msg.timer().set_year(y as i32);
                msg.timer().set_month(m as u32);
                msg.timer().set_day_of_month(d as u32);
                if !increment {
                    msg.timer().decrement_day();
                }
                if stat != msg.timer_ref().status() {
                    msg.upgrade_stored_times();
                }
                msg.timer().increment_day();
                msg.set_just_got_full_date_time(true);
            }
            other => {
                return Err(DecoderError::Script(format!("unknown date format {}", other)));
            }
        }
        Ok(())
    }

    /// Time-of-day parsing: delimited h:m[:s], or length-dispatched
    /// undelimited layouts, with an optional am/pm suffix.
    fn parse_time(&self, field: &[u8]) -> Result<(u32, u32, u32, Option<bool>), DecoderError> {
        let mut text = String::from_utf8_lossy(field).to_string();
        let mut pm = None;

        let lower = text.to_ascii_lowercase();
        if let Some(ix) = lower.find("am") {
            if ix > 0 {
                pm = Some(false);
                text.truncate(ix);
            }
        }
        if pm.is_none() {
            if let Some(ix) = lower.find("pm") {
                if ix > 0 {
                    pm = Some(true);
                    text.truncate(ix);
                }
            }
        }
        let text = text.trim_end();

        let mut h: i64 = 0;
        let mut m: i64 = 0;
        let mut s: i64 = 0;

        let parts: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | '-'))
            .collect();
        if parts.len() > 1 {
            if parts.len() > 2 {
                s = self.data_type.parse_int(parts[2].as_bytes())?;
            }
            m = self.data_type.parse_int(parts[1].as_bytes())?;
            h = self.data_type.parse_int(parts[0].as_bytes())?;
        } else {
            let b = text.as_bytes();
            match b.len() {
                0 => return Err(FieldParseError::new("empty time field").into()),
                1 | 2 => m = self.data_type.parse_int(b)?,
                3 => {
                    h = self.data_type.parse_int(&b[0..1])?;
                    m = self.data_type.parse_int(&b[1..3])?;
                }
                4 => {
                    h = self.data_type.parse_int(&b[0..2])?;
                    m = self.data_type.parse_int(&b[2..4])?;
                }
                5 => {
                    h = self.data_type.parse_int(&b[0..2])?;
                    m = self.data_type.parse_int(&b[3..5])?;
                }
                6 => {
                    h = self.data_type.parse_int(&b[0..2])?;
                    m = self.data_type.parse_int(&b[2..4])?;
                    s = self.data_type.parse_int(&b[4..6])?;
                }
                8 => {
                    h = self.data_type.parse_int(&b[0..2])?;
                    m = self.data_type.parse_int(&b[3..5])?;
                    s = self.data_type.parse_int(&b[6..8])?;
                }
                _ => {
                    h = self.data_type.parse_int(&b[0..2])?;
                }
            }
        }

        if !(0..=24).contains(&h) || !(0..60).contains(&m) || !(0..60).contains(&s) {
            return Err(FieldParseError::new(format!(
                "bad time format '{}'",
                String::from_utf8_lossy(field)
            ))
            .into());
        }
        Ok((h as u32, m as u32, s as u32, pm))
    }
}

/// Day 366 only exists in leap years. 1970 stands for "year not known
/// yet" and is exempt.
fn check_day_366(day: i64, year: i32) -> Result<(), FieldParseError> {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    if day == 366 && year != 1970 && !leap {
        return Err(FieldParseError::new(format!(
            "found day 366 for non-leap year {}",
            year
        )));
    }
    Ok(())
}

fn month_index(field: &[u8]) -> Result<u32, FieldParseError> {
    let name = String::from_utf8_lossy(field).to_ascii_lowercase();
    let name = &name[..name.len().min(3)];
    MONTH_NAMES
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
        .ok_or_else(|| {
            FieldParseError::new(format!("no such month '{}'", String::from_utf8_lossy(field)))
        })
}

/// Second-of-day in hh[:mm[:ss]] form.
fn second_of_day(field: &[u8]) -> Result<i64, DecoderError> {
    let text = String::from_utf8_lossy(field);
    let mut total: i64 = 0;
    let mut parts = 0;
    for (i, p) in text.trim().split(':').enumerate().take(3) {
        let v: i64 = p
            .trim()
            .parse()
            .map_err(|_| FieldParseError::new("bad time interval value"))?;
        total += match i {
            0 => v * 3600,
            1 => v * 60,
            _ => v,
        };
        parts += 1;
    }
    if parts == 0 {
        return Err(FieldParseError::new("bad time interval value").into());
    }
    Ok(total)
}

/// Missing-value placeholders: the universal markers, a lone M on ASCII
/// fields, and the script-configured symbol.
fn is_missing_symbol(s: &str, data_type: FieldType, script: &Script) -> bool {
    s.starts_with("//")
        || s.starts_with("??")
        || s.starts_with("---")
        || (s.eq_ignore_ascii_case("M") && data_type == FieldType::Ascii)
        || script.is_missing_symbol(s)
}

/// Delimiter cleanup: backslash escapes, either-sign completion, the S
/// shorthand and hex byte notation.
fn normalize_delimiter(d: String) -> String {
    let mut d = d;
    if d.len() == 2 && d.starts_with('\\') {
        d = d[1..]
            .replace('t', "\t")
            .replace('n', "\n")
            .replace('r', "\r");
    }
    if d.eq_ignore_ascii_case("S") {
        return "+-".to_string();
    }
    // xNN hex byte
    if d.len() == 3
        && (d.starts_with('x') || d.starts_with('X'))
        && d[1..].chars().all(|c| c.is_ascii_hexdigit())
    {
        if let Ok(b) = u8::from_str_radix(&d[1..], 16) {
            return (b as char).to_string();
        }
    }
    // a delimiter naming one sign implies the other
    let has_minus = d.contains('-');
    let has_plus = d.contains('+');
    if has_minus && !has_plus {
        d.push('+');
    } else if has_plus && !has_minus {
        d.push('-');
    }
    d
}

/// Comma-separated argument splitter honoring single and double quotes.
/// Unquoted spaces are dropped.
struct ArgsTokenizer<'a> {
    chars: std::str::Chars<'a>,
}

pub(crate) struct ArgToken {
    pub text: String,
    pub quoted: bool,
    pub double_quoted: bool,
}

impl<'a> ArgsTokenizer<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.trim().chars(),
        }
    }

    fn next_token(&mut self) -> Option<ArgToken> {
        let mut text = String::new();
        let mut any = false;
        let mut quoted = false;
        let mut in_single = false;
        let mut in_double = false;
        let mut double_quoted = false;
        for c in self.chars.by_ref() {
            any = true;
            if in_single {
                if c == '\'' {
                    in_single = false;
                    continue;
                }
            } else if in_double {
                if c == '"' {
                    in_double = false;
                    continue;
                }
            } else if c == ',' {
                break;
            } else if c == '\'' {
                in_single = true;
                quoted = true;
                continue;
            } else if c == '"' {
                in_double = true;
                quoted = true;
                double_quoted = true;
                continue;
            } else if c == ' ' {
                continue;
            }
            text.push(c);
        }
        if any {
            Some(ArgToken {
                text,
                quoted,
                double_quoted,
            })
        } else {
            None
        }
    }
}
