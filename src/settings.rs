//! Decoder configuration, threaded explicitly instead of read from
//! ambient global state.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Case handling for format labels and check-literal matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LabelMode {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

/// Daylight-saving handling for the platform time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DstMode {
    /// Times are standard time year round.
    #[default]
    None,
    /// "Manual" daylight handling. Samples are decoded assuming standard
    /// time, then the whole message is shifted back one hour when the first
    /// sample falls inside the US daylight window (second Sunday of March
    /// 02:00 through first Sunday of November 02:00, local standard time).
    ManualUs,
}

/// Platform time zone. The decoder works in civil time at this fixed
/// offset; daylight correction, when configured, is applied once per
/// message in the finish pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeZoneSpec {
    /// Seconds east of UTC of the standard-time offset
    pub utc_offset_secs: i32,
    pub dst: DstMode,
}

impl Default for TimeZoneSpec {
    fn default() -> Self {
        Self {
            utc_offset_secs: 0,
            dst: DstMode::None,
        }
    }
}

impl TimeZoneSpec {
    /// True when `t` falls inside the daylight window for this zone.
    /// Always false when `dst` is [`DstMode::None`].
    pub fn in_daylight_time(&self, t: DateTime<Utc>) -> bool {
        match self.dst {
            DstMode::None => false,
            DstMode::ManualUs => {
                let local = (t + Duration::seconds(self.utc_offset_secs as i64)).naive_utc();
                let year = local.year();
                let start = nth_weekday(year, 3, Weekday::Sun, 2)
                    .and_hms_opt(2, 0, 0)
                    .unwrap_or(local);
                let end = nth_weekday(year, 11, Weekday::Sun, 1)
                    .and_hms_opt(2, 0, 0)
                    .unwrap_or(local);
                local >= start && local < end
            }
        }
    }
}

/// Returns the n'th given weekday of a month.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let mut count = 0;
    for day in 1..=31 {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            if d.weekday() == weekday {
                count += 1;
                if count == n {
                    return d;
                }
            }
        }
    }
    // n'th weekday always exists for n <= 4
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

/// All the knobs the tokenizer, interpreter and time reconstruction
/// consult.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecoderSettings {
    pub label_mode: LabelMode,
    /// Allow scan operators to run past an end-of-line
    pub scan_past_eol: bool,
    /// Upper bound on statement switches per message
    pub max_statement_switches: usize,
    pub timezone: TimeZoneSpec,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            label_mode: LabelMode::default(),
            scan_past_eol: false,
            max_statement_switches: 100,
            timezone: TimeZoneSpec::default(),
        }
    }
}

impl DecoderSettings {
    /// Label comparison under the configured case mode.
    pub fn labels_match(&self, a: &str, b: &str) -> bool {
        match self.label_mode {
            LabelMode::CaseSensitive => a == b,
            LabelMode::CaseInsensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn us_daylight_window() {
        let tz = TimeZoneSpec {
            utc_offset_secs: -5 * 3600,
            dst: DstMode::ManualUs,
        };
        // 2024: DST begins Mar 10, ends Nov 3
        let july = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let january = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let march_9 = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let march_11 = Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        assert!(tz.in_daylight_time(july));
        assert!(!tz.in_daylight_time(january));
        assert!(!tz.in_daylight_time(march_9));
        assert!(tz.in_daylight_time(march_11));
    }

    #[test]
    fn dst_none_never_daylight() {
        let tz = TimeZoneSpec::default();
        let july = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert!(!tz.in_daylight_time(july));
    }
}
