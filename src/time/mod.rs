//! The "current time" register maintained while scanning one message.
//!
//! Date and time fields arrive piecemeal (a year here, a day-of-year
//! there), so the register tracks how much of the calendar is actually
//! known through the [`TimeStatus`] lattice. Setters can only raise the
//! status. Until a year is known the calendar lives in 1970 and the
//! post-message pass rewrites stored sample times once better information
//! shows up.

mod series;

pub use series::TimeSeries;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::settings::TimeZoneSpec;

/// How completely the message time is known at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeStatus {
    /// No time fields seen yet
    #[default]
    Nothing,
    /// Hour/minute/second known, date unknown
    TimeOfDay,
    /// Day within the year known, year unknown
    TimeOfYear,
    /// Full date and time known
    Complete,
}

/// Calendar cursor for one message, kept in civil time at the platform's
/// standard offset.
#[derive(Debug, Clone)]
pub struct RecordedTimeStamp {
    cal: NaiveDateTime,
    tz: TimeZoneSpec,
    have_tod: bool,
    have_day: bool,
    have_year: bool,
    /// Day was entered as a day-of-year rather than month/day. Decides
    /// which comparison the year-rollover correction uses.
    have_yday: bool,
    /// Raised by day-setting fields, consulted by the time field to
    /// suppress its own day auto-increment.
    pub day_just_set: bool,
}

impl RecordedTimeStamp {
    pub fn new(tz: TimeZoneSpec) -> Self {
        Self {
            cal: NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            tz,
            have_tod: false,
            have_day: false,
            have_year: false,
            have_yday: false,
            day_just_set: false,
        }
    }

    pub fn status(&self) -> TimeStatus {
        if self.have_day && self.have_year {
            TimeStatus::Complete
        } else if self.have_day {
            TimeStatus::TimeOfYear
        } else if self.have_tod {
            TimeStatus::TimeOfDay
        } else {
            TimeStatus::Nothing
        }
    }

    /// Civil calendar value, platform local time.
    pub fn calendar(&self) -> NaiveDateTime {
        self.cal
    }

    pub fn set_calendar(&mut self, cal: NaiveDateTime) {
        self.cal = cal;
    }

    pub fn timezone(&self) -> TimeZoneSpec {
        self.tz
    }

    /// Absolute instant of the register.
    pub fn instant(&self) -> DateTime<Utc> {
        (self.cal - Duration::seconds(self.tz.utc_offset_secs as i64)).and_utc()
    }

    pub fn unix_secs(&self) -> i64 {
        self.instant().timestamp()
    }

    /// Civil calendar view of an absolute instant, in this register's zone.
    pub fn to_local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        (t + Duration::seconds(self.tz.utc_offset_secs as i64)).naive_utc()
    }

    /// Absolute instant of a civil calendar value in this register's zone.
    pub fn from_local(&self, cal: NaiveDateTime) -> DateTime<Utc> {
        (cal - Duration::seconds(self.tz.utc_offset_secs as i64)).and_utc()
    }

    pub fn have_yday(&self) -> bool {
        self.have_yday
    }

    pub fn year(&self) -> i32 {
        self.cal.year()
    }

    pub fn day_of_year(&self) -> u32 {
        self.cal.ordinal()
    }

    /// Sets the year. Two-digit years are windowed (< 70 lands in the
    /// 2000s, < 100 in the 1900s).
    pub fn set_year(&mut self, y: i32) -> TimeStatus {
        let y = if y < 70 {
            y + 2000
        } else if y < 100 {
            y + 1900
        } else {
            y
        };
        self.cal = with_year_clamped(self.cal, y);
        self.have_year = true;
        self.status()
    }

    /// Sets the month, 1..=12. Month alone does not establish the day.
    pub fn set_month(&mut self, m: u32) -> TimeStatus {
        if (1..=12).contains(&m) {
            let day = self.cal.day().min(days_in_month(self.cal.year(), m));
            if let Some(d) = NaiveDate::from_ymd_opt(self.cal.year(), m, day) {
                self.cal = d.and_time(self.cal.time());
            }
        }
        self.status()
    }

    pub fn set_day_of_month(&mut self, d: u32) -> TimeStatus {
        let day = d.min(days_in_month(self.cal.year(), self.cal.month())).max(1);
        if let Some(nd) = NaiveDate::from_ymd_opt(self.cal.year(), self.cal.month(), day) {
            self.cal = nd.and_time(self.cal.time());
        }
        self.have_day = true;
        self.have_yday = false;
        self.status()
    }

    /// Sets the day of year, 1..=366. Day 366 in a non-leap year rolls
    /// into the next year the way a lenient calendar would.
    pub fn set_day_of_year(&mut self, doy: u32) -> TimeStatus {
        self.cal = set_ordinal_lenient(self.cal, doy);
        self.have_day = true;
        self.have_yday = true;
        self.status()
    }

    /// Sets the hour, 0..=24 (24 rolls to 00 of the next day).
    pub fn set_hour(&mut self, h: u32) -> TimeStatus {
        if h == 24 {
            self.cal = (self.cal + Duration::days(1)).with_hour(0).unwrap_or(self.cal);
        } else if let Some(c) = self.cal.with_hour(h) {
            self.cal = c;
        }
        self.have_tod = true;
        self.status()
    }

    pub fn set_minute(&mut self, m: u32) -> TimeStatus {
        if let Some(c) = self.cal.with_minute(m) {
            self.cal = c;
        }
        self.have_tod = true;
        self.status()
    }

    pub fn set_second(&mut self, s: u32) -> TimeStatus {
        if let Some(c) = self.cal.with_second(s) {
            self.cal = c;
        }
        self.have_tod = true;
        self.status()
    }

    /// Applies an AM/PM designator to the hour already stored.
    pub fn set_pm(&mut self, pm: bool) {
        let h = self.cal.hour();
        if pm && h < 12 {
            self.cal = self.cal.with_hour(h + 12).unwrap_or(self.cal);
        } else if !pm && h == 12 {
            self.cal = self.cal.with_hour(0).unwrap_or(self.cal);
        }
    }

    /// Sets the full date and time from an absolute instant.
    pub fn set_complete(&mut self, t: DateTime<Utc>) -> TimeStatus {
        self.cal = self.to_local(t);
        self.have_tod = true;
        self.have_day = true;
        self.have_year = true;
        self.have_yday = true;
        self.status()
    }

    /// Marks whatever the calendar currently holds as complete, without
    /// moving it.
    pub fn mark_complete(&mut self) -> TimeStatus {
        self.have_tod = true;
        self.have_day = true;
        self.have_year = true;
        self.status()
    }

    pub fn add_days(&mut self, n: i64) {
        self.cal += Duration::days(n);
    }

    pub fn increment_day(&mut self) {
        self.add_days(1);
    }

    pub fn decrement_day(&mut self) {
        self.add_days(-1);
    }

    pub fn increment_year(&mut self) {
        self.cal = with_year_clamped(self.cal, self.cal.year() + 1);
    }

    pub fn decrement_year(&mut self) {
        self.cal = with_year_clamped(self.cal, self.cal.year() - 1);
    }

    /// Zeroes the seconds.
    pub fn truncate_to_minute(&mut self) {
        self.cal = self.cal.with_second(0).unwrap_or(self.cal);
    }

    /// Zeroes minutes and seconds.
    pub fn truncate_to_hour(&mut self) {
        self.truncate_to_minute();
        self.cal = self.cal.with_minute(0).unwrap_or(self.cal);
    }

    /// Floors the minutes to an n-minute boundary and zeroes the seconds.
    pub fn truncate_to_minute_boundary(&mut self, n: u32) {
        self.truncate_to_minute();
        if n > 0 {
            let m = self.cal.minute() - self.cal.minute() % n;
            self.cal = self.cal.with_minute(m).unwrap_or(self.cal);
        }
    }
}

/// Year substitution that survives Feb 29 (clamps to Feb 28).
pub(crate) fn with_year_clamped(cal: NaiveDateTime, year: i32) -> NaiveDateTime {
    match cal.date().with_year(year) {
        Some(d) => d.and_time(cal.time()),
        None => {
            let day = cal.day().min(days_in_month(year, cal.month()));
            NaiveDate::from_ymd_opt(year, cal.month(), day)
                .map(|d| d.and_time(cal.time()))
                .unwrap_or(cal)
        }
    }
}

/// Day-of-year substitution; an out-of-range ordinal rolls forward the
/// way a lenient calendar would.
pub(crate) fn set_ordinal_lenient(cal: NaiveDateTime, doy: u32) -> NaiveDateTime {
    if doy == 0 {
        return cal;
    }
    match NaiveDate::from_yo_opt(cal.year(), doy) {
        Some(d) => d.and_time(cal.time()),
        None => {
            // 366 in a non-leap year
            let last = NaiveDate::from_yo_opt(cal.year(), 365).unwrap_or(cal.date());
            (last + Duration::days((doy - 365) as i64)).and_time(cal.time())
        }
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(n), Some(f)) => (n - f).num_days() as u32,
        _ => 31,
    }
}
