//! The decoded message: one [`TimeSeries`] per configured sensor plus the
//! time reconstruction state.
//!
//! Sample placement is where most of the calendar subtlety lives. A
//! message may carry no time at all (typical GOES DCP), partial times
//! (time-of-day without a date), or full stamps, and fixed-interval
//! sensors must have their sample times reconstructed from whatever is
//! known at the moment each value is decoded, then repaired afterwards
//! when better information arrives.

use chrono::{DateTime, Datelike, Duration, Utc};
use log::{debug, warn};

use crate::platform::{DataOrder, PlatformConfig};
use crate::settings::{DecoderSettings, DstMode, TimeZoneSpec};
use crate::time::{set_ordinal_lenient, with_year_clamped, RecordedTimeStamp, TimeSeries, TimeStatus};
use crate::value::{Sample, Value};

/// One raw message plus the header metadata the decoder consults.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub data: Vec<u8>,
    /// Message time from the transport header
    pub time_stamp: Option<DateTime<Utc>>,
    /// Header end-of-data time, fallback for incomplete message times
    pub end_time: Option<DateTime<Utc>>,
    /// Line number the data starts on (0-based)
    pub start_line: u32,
    /// Transport-medium time adjustment, seconds
    pub time_adjustment: i64,
    /// Seconds between transmissions, for redundant-data removal
    pub transmit_interval: i64,
}

impl RawMessage {
    pub fn new<D: Into<Vec<u8>>>(data: D) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_time_stamp(mut self, t: DateTime<Utc>) -> Self {
        self.time_stamp = Some(t);
        self
    }

    pub fn with_time_adjustment(mut self, secs: i64) -> Self {
        self.time_adjustment = secs;
        self
    }
}

/// Everything decoded from one message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    series: Vec<TimeSeries>,
    message_time: DateTime<Utc>,
    /// Original message time, preserved across a truncation operator so
    /// minute offsets stay relative to the true message time
    untruncated_message_time: Option<DateTime<Utc>>,
    time_was_truncated: bool,
    current_time: RecordedTimeStamp,
    first_sample_time: Option<DateTime<Utc>>,
    /// Raised by year-bearing date fields, suppresses the wraparound
    /// auto-increment until data plus a non-year field arrive
    just_got_full_date_time: bool,
    just_added_sample: bool,
    time_adjustment_made_to_begin_time: bool,
    tz: TimeZoneSpec,
    raw_time_stamp: Option<DateTime<Utc>>,
    raw_end_time: Option<DateTime<Utc>>,
    time_adjustment: i64,
    transmit_interval: i64,
    next_auto_sensor: usize,
}

impl DecodedMessage {
    /// Builds the per-message model from a configuration snapshot. Data
    /// order is resolved per sensor: platform default, overridden by the
    /// script's order, overridden by a per-sensor setting.
    pub fn new(
        raw: &RawMessage,
        cfg: &PlatformConfig,
        script_data_order: DataOrder,
        settings: &DecoderSettings,
    ) -> Self {
        let mut message_time = raw.time_stamp.unwrap_or_else(Utc::now);
        if raw.time_adjustment != 0 {
            message_time += Duration::seconds(raw.time_adjustment);
        }

        let mut series = Vec::with_capacity(cfg.sensors.len());
        for sensor in &cfg.sensors {
            let mut ts = TimeSeries::new(sensor.clone());
            let mut order = cfg.data_order;
            if script_data_order != DataOrder::Undefined {
                order = script_data_order;
            }
            if let Some(o) = sensor.data_order {
                order = o;
            }
            ts.set_data_order(order);
            series.push(ts);
        }

        Self {
            series,
            message_time,
            untruncated_message_time: None,
            time_was_truncated: false,
            current_time: RecordedTimeStamp::new(settings.timezone),
            first_sample_time: None,
            just_got_full_date_time: false,
            just_added_sample: false,
            time_adjustment_made_to_begin_time: false,
            tz: settings.timezone,
            raw_time_stamp: raw.time_stamp,
            raw_end_time: raw.end_time,
            time_adjustment: raw.time_adjustment,
            transmit_interval: raw.transmit_interval,
            next_auto_sensor: 0,
        }
    }

    pub fn message_time(&self) -> DateTime<Utc> {
        self.message_time
    }

    /// Explicitly sets the message time. Any prior truncation no longer
    /// applies.
    pub fn set_message_time(&mut self, t: DateTime<Utc>) {
        self.message_time = t;
        if self.time_was_truncated {
            self.untruncated_message_time = None;
            self.time_was_truncated = false;
        }
    }

    /// Records a truncated message time, keeping the original.
    pub fn truncate_time(&mut self, t: DateTime<Utc>) {
        if !self.time_was_truncated {
            self.untruncated_message_time = Some(self.message_time);
            self.time_was_truncated = true;
        }
        self.message_time = t;
    }

    pub fn time_was_truncated(&self) -> bool {
        self.time_was_truncated
    }

    /// Message time before any truncation operator ran.
    pub fn untruncated_message_time(&self) -> DateTime<Utc> {
        if self.time_was_truncated {
            self.untruncated_message_time.unwrap_or(self.message_time)
        } else {
            self.message_time
        }
    }

    pub fn timer(&mut self) -> &mut RecordedTimeStamp {
        &mut self.current_time
    }

    pub fn timer_ref(&self) -> &RecordedTimeStamp {
        &self.current_time
    }

    pub fn time_series(&self, sensor_number: i32) -> Option<&TimeSeries> {
        self.series.iter().find(|t| t.sensor_number() == sensor_number)
    }

    pub fn time_series_mut(&mut self, sensor_number: i32) -> Option<&mut TimeSeries> {
        self.series
            .iter_mut()
            .find(|t| t.sensor_number() == sensor_number)
    }

    /// First series carrying the given data-type code.
    pub fn time_series_by_data_type(&self, code: &str) -> Option<&TimeSeries> {
        self.series.iter().find(|t| t.has_data_type(code))
    }

    pub fn all_time_series(&self) -> &[TimeSeries] {
        &self.series
    }

    pub fn set_time_interval(&mut self, sensor_number: i32, secs: i64) {
        if let Some(ts) = self.time_series_mut(sensor_number) {
            ts.set_time_interval(secs);
        }
    }

    /// Next sensor for the shorthand field form that names no sensor.
    /// Walks the configured sensors in declaration order.
    pub fn next_auto_sensor(&mut self) -> Option<i32> {
        let n = self.series.get(self.next_auto_sensor)?.sensor_number();
        self.next_auto_sensor += 1;
        Some(n)
    }

    /// Raised by year-bearing date fields.
    pub fn set_just_got_full_date_time(&mut self, yes: bool) {
        self.just_got_full_date_time = yes;
        self.just_added_sample = false;
        for ts in &mut self.series {
            ts.set_time_just_set();
        }
    }

    /// Called for every non-year date/time field.
    pub fn just_got_non_year_field(&mut self) {
        if self.just_added_sample {
            self.just_got_full_date_time = false;
        }
        for ts in &mut self.series {
            ts.set_time_just_set();
        }
    }

    /// Adds a sample to the series for `sensor_number`, computing its
    /// timestamp from the current-time register and the series history.
    /// Returns the assigned time, or `None` when the sensor does not
    /// resolve (callers must treat that as "discard with a warning", not
    /// a decode failure).
    pub fn add_sample(
        &mut self,
        sensor_number: i32,
        value: Value,
        line: u32,
    ) -> Option<DateTime<Utc>> {
        self.add_sample_with_flags(sensor_number, Sample::new(value, self.message_time, line))
    }

    pub(crate) fn add_sample_with_flags(
        &mut self,
        sensor_number: i32,
        mut sample: Sample,
    ) -> Option<DateTime<Utc>> {
        if sensor_number < 1 {
            warn!("add_sample: invalid sensor number {}", sensor_number);
            return None;
        }
        let idx = match self
            .series
            .iter()
            .position(|t| t.sensor_number() == sensor_number)
        {
            Some(i) => i,
            None => {
                warn!(
                    "cannot add sample, no time series for sensor {}",
                    sensor_number
                );
                return None;
            }
        };

        let reg_secs = self.current_time.unix_secs();
        let reg_status = self.current_time.status();
        let mut samp_time = self.current_time.instant();

        let tint = self.series[idx].time_interval();
        let fixed_interval = tint != 0 && tint != -1;

        if reg_status == TimeStatus::Nothing {
            // the usual DCP case, no embedded time in the message
            self.time_adjustment_made_to_begin_time = true;
            let ts = &mut self.series[idx];
            if fixed_interval {
                if ts.is_empty() {
                    samp_time = ts.time_of_last_sample_before(self.message_time);
                } else if !ts.is_ascending() {
                    // descending, one interval before the previous sample
                    samp_time = ts.time_of_last_sample_in_series().unwrap_or(samp_time)
                        - Duration::seconds(tint);
                } else {
                    ts.adjust_all_times_back_by_interval();
                    samp_time = ts.time_of_last_sample_before(self.message_time);
                }
            } else {
                samp_time = self.message_time;
            }
        } else {
            // TimeOfDay, TimeOfYear or Complete
            let ts = &self.series[idx];
            if ts.is_empty() || !fixed_interval {
                // first sample for this sensor takes the register time
            } else if ts.sec_at_last_add == Some(reg_secs) && !ts.time_just_set() {
                // register unchanged since the last add: running series,
                // step by the interval
                let last = ts.time_of_last_sample_in_series().unwrap_or(samp_time);
                samp_time = if ts.is_ascending() {
                    last + Duration::seconds(tint)
                } else {
                    last - Duration::seconds(tint)
                };
                debug!(
                    "running series for sensor {}: interval {}s, sample at {}",
                    sensor_number, tint, samp_time
                );
            } else if !self.just_got_full_date_time {
                // a genuinely new time value arrived, watch for wraparound
                let last_add = ts.sec_at_last_add;
                let last_sample = ts.time_of_last_sample_in_series();
                if ts.is_ascending() && last_add.map(|l| reg_secs < l).unwrap_or(false) {
                    let last_day = last_sample
                        .map(|t| self.current_time.to_local(t).ordinal())
                        .unwrap_or(0);
                    let mut cal = self.current_time.to_local(samp_time);
                    if last_day == cal.ordinal() {
                        debug!("time of day wrapped, incrementing day");
                        cal += Duration::days(1);
                        self.current_time.increment_day();
                    } else {
                        debug!("day wrapped, incrementing year");
                        cal = with_year_clamped(cal, cal.year() + 1);
                        self.current_time.increment_year();
                    }
                    samp_time = self.current_time.from_local(cal);
                } else if !ts.is_ascending()
                    && last_add.map(|l| reg_secs > l).unwrap_or(false)
                {
                    // descending but time moved forward, wrap downward
                    let last_day = last_sample
                        .map(|t| self.current_time.to_local(t).ordinal())
                        .unwrap_or(0);
                    let mut cal = self.current_time.to_local(samp_time);
                    if last_day == cal.ordinal() {
                        cal -= Duration::days(1);
                        self.current_time.decrement_day();
                    } else {
                        cal = with_year_clamped(cal, cal.year() - 1);
                        self.current_time.decrement_year();
                    }
                    samp_time = self.current_time.from_local(cal);
                }
                // otherwise the register time stands
            }
        }

        sample.time = samp_time;
        let ts = &mut self.series[idx];
        ts.push_sample(sample);
        ts.sec_at_last_add = Some(reg_secs);
        ts.time_status = self.current_time.status();
        if self.first_sample_time.is_none() {
            self.first_sample_time = Some(samp_time);
        }
        self.just_added_sample = true;
        Some(samp_time)
    }

    /// Upgrades partially dated samples once the register knows more than
    /// it did when they were added. TimeOfDay series get the reference
    /// day (tracking any day increments observed between samples),
    /// TimeOfYear series get the reference year with the end-of-year
    /// rollover correction.
    pub fn upgrade_stored_times(&mut self) {
        let newstat = self.current_time.status();
        let reg = self.current_time.calendar();
        let cur_doy = reg.ordinal();
        let cur_year = reg.year();
        let cur_month = reg.month();
        let cur_dom = reg.day();
        let have_yday = self.current_time.have_yday();
        let tz = self.current_time.clone();

        for ts in &mut self.series {
            if ts.is_empty() {
                continue;
            }
            if ts.time_status != TimeStatus::TimeOfDay && ts.time_status != TimeStatus::TimeOfYear
            {
                continue;
            }
            let ascending = ts.is_ascending();
            let old_status = ts.time_status;
            let mut last_doy: i64 = -1;
            let mut day_increment: i64 = 0;

            for sample in ts.samples_mut() {
                let mut cal = tz.to_local(sample.time);
                let samp_doy = cal.ordinal();
                let samp_month = cal.month();
                let samp_dom = cal.day();

                if old_status == TimeStatus::TimeOfDay {
                    if samp_doy as i64 != last_doy {
                        if last_doy != -1 {
                            day_increment = samp_doy as i64 - last_doy;
                        }
                        last_doy = samp_doy as i64;
                    }
                    if newstat == TimeStatus::TimeOfYear {
                        cal = set_ordinal_lenient(cal, cur_doy);
                        if day_increment != 0
                            && ((ascending && day_increment > 0)
                                || (!ascending && day_increment < 0))
                        {
                            cal += Duration::days(day_increment);
                        }
                    } else if newstat == TimeStatus::Complete {
                        // year first, so the day-of-year substitution
                        // resolves in the right (possibly leap) year
                        cal = with_year_clamped(cal, cur_year);
                        cal = set_ordinal_lenient(cal, cur_doy);
                        cal += Duration::days(day_increment);
                    }
                } else if old_status == TimeStatus::TimeOfYear && newstat == TimeStatus::Complete
                {
                    // end-of-year rollover: a sample dated after the
                    // reference day belongs to the previous year
                    let previous_year = if have_yday {
                        samp_doy > cur_doy
                    } else {
                        samp_month > cur_month
                            || (samp_month == cur_month && samp_dom > cur_dom)
                    };
                    let year = if previous_year { cur_year - 1 } else { cur_year };
                    cal = with_year_clamped(cal, year);
                    // re-apply the day after the year change, the sample
                    // year may be a leap year where 1970 was not
                    if have_yday {
                        cal = set_ordinal_lenient(cal, samp_doy);
                    } else if let Some(d) =
                        chrono::NaiveDate::from_ymd_opt(cal.year(), samp_month, samp_dom)
                    {
                        cal = d.and_time(cal.time());
                    }
                }
                sample.time = tz.from_local(cal);
            }
            ts.time_status = newstat;
        }
    }

    /// Post-message pass: completes partial times from header metadata,
    /// resolves manual daylight saving, and applies transport and
    /// per-sensor time offsets.
    pub fn finish_message(&mut self) {
        let cur_stat = self.current_time.status();
        debug!(
            "finishing message, final time {}, status {:?}",
            self.current_time.calendar(),
            cur_stat
        );

        if cur_stat != TimeStatus::Complete && self.first_sample_time.is_some() {
            if cur_stat == TimeStatus::Nothing {
                self.current_time.set_complete(Utc::now());
            } else {
                let end = self
                    .raw_end_time
                    .or(self.raw_time_stamp)
                    .unwrap_or_else(Utc::now);
                let end_cal = self.current_time.to_local(end);
                let mut cal = self.current_time.calendar();
                cal = with_year_clamped(cal, end_cal.year());
                if cur_stat == TimeStatus::TimeOfDay {
                    cal = set_ordinal_lenient(cal, end_cal.ordinal());
                }
                self.current_time.set_calendar(cal);
                self.current_time.mark_complete();
            }
            self.upgrade_stored_times();
        }

        // manual daylight handling: everything was decoded as standard
        // time, shift the whole message back an hour if the first sample
        // falls in the daylight window
        if self.tz.dst == DstMode::ManualUs {
            if let Some(first) = self.first_sample_time {
                if self.tz.in_daylight_time(first) {
                    for ts in &mut self.series {
                        ts.add_time_offset(-3600);
                    }
                }
            }
        }

        // transport-medium adjustment, unless it was already folded into
        // the begin time while placing samples
        if !self.time_adjustment_made_to_begin_time && self.time_adjustment != 0 {
            for ts in &mut self.series {
                if !ts.is_empty() {
                    ts.add_time_offset(self.time_adjustment);
                }
            }
        }

        // per-sensor TimeOffsetSec property
        for ts in &mut self.series {
            if ts.is_empty() {
                continue;
            }
            if let Some(tos) = ts.property("TimeOffsetSec").map(str::to_string) {
                match tos.trim().parse::<i64>() {
                    Ok(secs) => ts.add_time_offset(secs),
                    Err(_) => warn!(
                        "sensor {} has bad TimeOffsetSec property '{}', ignored",
                        ts.sensor_number(),
                        tos
                    ),
                }
            }
        }
    }

    /// Applies per-sensor preoffset, scale and offset properties, in that
    /// order.
    pub fn apply_scale_and_offset(&mut self) {
        for ts in &mut self.series {
            for (prop, multiply) in [("preoffset", false), ("scale", true), ("offset", false)] {
                let raw = match ts.property(prop).map(str::to_string) {
                    Some(r) => r,
                    None => continue,
                };
                match raw.trim().parse::<f64>() {
                    Ok(v) if multiply => ts.multiply_samples_by(v),
                    Ok(v) => ts.add_to_samples(v),
                    Err(_) => warn!(
                        "invalid {} property in sensor {} '{}', ignored",
                        prop,
                        ts.sensor_number(),
                        raw
                    ),
                }
            }
        }
    }

    pub fn apply_sensor_limits(&mut self) {
        for ts in &mut self.series {
            ts.apply_sensor_limits();
        }
    }

    /// Discards samples older than one transmit interval before the
    /// message time, which a platform retransmits for redundancy.
    pub fn remove_redundant_data(&mut self) {
        if self.transmit_interval <= 0 {
            return;
        }
        let prev = self.message_time - Duration::seconds(self.transmit_interval);
        for ts in &mut self.series {
            ts.discard_samples_before(prev);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::SensorConfig;
    use chrono::TimeZone;

    fn cfg_fixed(order: DataOrder) -> PlatformConfig {
        PlatformConfig::new(vec![SensorConfig::fixed(1, "HG", 6 * 60)]).with_data_order(order)
    }

    fn msg_at(cfg: &PlatformConfig, t: DateTime<Utc>) -> DecodedMessage {
        let raw = RawMessage::new(b"".to_vec()).with_time_stamp(t);
        DecodedMessage::new(&raw, cfg, DataOrder::Undefined, &DecoderSettings::default())
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn no_time_fixed_interval_counts_back_from_message_time() {
        let cfg = cfg_fixed(DataOrder::Ascending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 10, 12, 2, 30));
        msg.add_sample(1, Value::Int(10), 1);
        msg.add_sample(1, Value::Int(11), 1);
        msg.add_sample(1, Value::Int(12), 1);
        let ts = msg.time_series(1).unwrap();
        // ascending: earlier samples pushed back to make room, last one
        // lands on the boundary before the message time
        assert_eq!(ts.sample_at(0).unwrap().time, utc(2024, 6, 10, 11, 48, 0));
        assert_eq!(ts.sample_at(1).unwrap().time, utc(2024, 6, 10, 11, 54, 0));
        assert_eq!(ts.sample_at(2).unwrap().time, utc(2024, 6, 10, 12, 0, 0));
    }

    #[test]
    fn no_time_descending_steps_backward() {
        let cfg = cfg_fixed(DataOrder::Descending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 10, 12, 2, 30));
        msg.add_sample(1, Value::Int(10), 1);
        msg.add_sample(1, Value::Int(11), 1);
        let ts = msg.time_series(1).unwrap();
        assert_eq!(ts.sample_at(0).unwrap().time, utc(2024, 6, 10, 12, 0, 0));
        assert_eq!(ts.sample_at(1).unwrap().time, utc(2024, 6, 10, 11, 54, 0));
    }

    #[test]
    fn unchanged_register_steps_by_interval() {
        let cfg = cfg_fixed(DataOrder::Ascending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 10, 12, 30, 0));
        msg.timer().set_complete(utc(2024, 6, 10, 12, 0, 0));
        msg.add_sample(1, Value::Int(1), 1);
        // register rereads the same time, no date/time field in between
        msg.timer().set_complete(utc(2024, 6, 10, 12, 0, 0));
        msg.add_sample(1, Value::Int(2), 1);
        msg.add_sample(1, Value::Int(3), 1);
        let ts = msg.time_series(1).unwrap();
        assert_eq!(ts.sample_at(0).unwrap().time, utc(2024, 6, 10, 12, 0, 0));
        assert_eq!(ts.sample_at(1).unwrap().time, utc(2024, 6, 10, 12, 6, 0));
        assert_eq!(ts.sample_at(2).unwrap().time, utc(2024, 6, 10, 12, 12, 0));
    }

    #[test]
    fn ascending_wraparound_increments_day() {
        let cfg = cfg_fixed(DataOrder::Ascending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 11, 0, 10, 0));
        msg.timer().set_day_of_year(162); // Jun 10 2024 as a partial date
        msg.timer().set_hour(23);
        msg.timer().set_minute(58);
        msg.add_sample(1, Value::Int(1), 1);
        // time of day wraps past midnight, same nominal day
        msg.timer().set_hour(0);
        msg.timer().set_minute(2);
        msg.just_got_non_year_field();
        // the non-year field latch only matters right after a year field
        msg.add_sample(1, Value::Int(2), 1);
        let ts = msg.time_series(1).unwrap();
        let t0 = ts.sample_at(0).unwrap().time;
        let t1 = ts.sample_at(1).unwrap().time;
        assert!(t1 > t0, "wraparound must not travel backwards");
        assert_eq!(t1 - t0, Duration::minutes(4));
    }

    #[test]
    fn descending_wraparound_decrements_day() {
        let cfg = cfg_fixed(DataOrder::Descending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 11, 0, 10, 0));
        msg.timer().set_day_of_year(163);
        msg.timer().set_hour(0);
        msg.timer().set_minute(2);
        msg.add_sample(1, Value::Int(1), 1);
        msg.timer().set_hour(23);
        msg.timer().set_minute(58);
        msg.add_sample(1, Value::Int(2), 1);
        let ts = msg.time_series(1).unwrap();
        let t0 = ts.sample_at(0).unwrap().time;
        let t1 = ts.sample_at(1).unwrap().time;
        assert!(t1 < t0, "descending wraparound must move backwards");
        assert_eq!(t0 - t1, Duration::minutes(4));
    }

    #[test]
    fn upgrade_assigns_previous_year_across_rollover() {
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")]);
        let mut msg = msg_at(&cfg, utc(2024, 1, 3, 12, 0, 0));
        // sample added with only a day-of-year known
        msg.timer().set_day_of_year(362);
        msg.timer().set_hour(6);
        msg.add_sample(1, Value::Int(1), 1);
        assert_eq!(
            msg.time_series(1).unwrap().time_status,
            TimeStatus::TimeOfYear
        );
        // now the year becomes known: Jan 3, 2024
        msg.timer().set_day_of_year(3);
        msg.timer().set_year(2024);
        msg.upgrade_stored_times();
        let t = msg.time_series(1).unwrap().sample_at(0).unwrap().time;
        assert_eq!(t.year(), 2023);
        assert_eq!(t.ordinal(), 362);
    }

    #[test]
    fn upgrade_leaves_complete_series_alone() {
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")]);
        let mut msg = msg_at(&cfg, utc(2024, 1, 3, 12, 0, 0));
        msg.timer().set_complete(utc(2024, 1, 2, 6, 0, 0));
        msg.add_sample(1, Value::Int(1), 1);
        msg.upgrade_stored_times();
        let t = msg.time_series(1).unwrap().sample_at(0).unwrap().time;
        assert_eq!(t, utc(2024, 1, 2, 6, 0, 0));
    }

    #[test]
    fn finish_completes_time_of_day_from_header_end_time() {
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")]);
        let mut raw = RawMessage::new(b"".to_vec()).with_time_stamp(utc(2024, 6, 10, 23, 0, 0));
        raw.end_time = Some(utc(2024, 6, 10, 23, 0, 0));
        let mut msg =
            DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &DecoderSettings::default());
        msg.timer().set_hour(8);
        msg.timer().set_minute(15);
        msg.add_sample(1, Value::Int(1), 1);
        msg.finish_message();
        let t = msg.time_series(1).unwrap().sample_at(0).unwrap().time;
        assert_eq!(t, utc(2024, 6, 10, 8, 15, 0));
    }

    #[test]
    fn finish_applies_sensor_time_offset() {
        let cfg = PlatformConfig::new(vec![
            SensorConfig::variable(1, "VB").with_property("TimeOffsetSec", "-60")
        ]);
        let mut msg = msg_at(&cfg, utc(2024, 6, 10, 12, 0, 0));
        msg.timer().set_complete(utc(2024, 6, 10, 12, 0, 0));
        msg.add_sample(1, Value::Int(1), 1);
        msg.finish_message();
        let t = msg.time_series(1).unwrap().sample_at(0).unwrap().time;
        assert_eq!(t, utc(2024, 6, 10, 11, 59, 0));
    }

    #[test]
    fn manual_dst_shifts_message_back_an_hour() {
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")]);
        let raw = RawMessage::new(b"".to_vec()).with_time_stamp(utc(2024, 7, 1, 12, 0, 0));
        let mut settings = DecoderSettings::default();
        settings.timezone = TimeZoneSpec {
            utc_offset_secs: -5 * 3600,
            dst: DstMode::ManualUs,
        };
        let mut msg = DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &settings);
        msg.timer().set_complete(utc(2024, 7, 1, 12, 0, 0));
        msg.add_sample(1, Value::Int(1), 1);
        msg.finish_message();
        let t = msg.time_series(1).unwrap().sample_at(0).unwrap().time;
        assert_eq!(t, utc(2024, 7, 1, 11, 0, 0));
    }

    #[test]
    fn scale_offset_and_redundant_removal() {
        let cfg = PlatformConfig::new(vec![SensorConfig::variable(1, "VB")
            .with_property("scale", "2")
            .with_property("offset", "1")]);
        let mut raw = RawMessage::new(b"".to_vec()).with_time_stamp(utc(2024, 6, 10, 12, 0, 0));
        raw.transmit_interval = 3600;
        let mut msg =
            DecodedMessage::new(&raw, &cfg, DataOrder::Undefined, &DecoderSettings::default());
        msg.timer().set_complete(utc(2024, 6, 10, 10, 0, 0));
        msg.add_sample(1, Value::Int(5), 1);
        msg.timer().set_complete(utc(2024, 6, 10, 11, 30, 0));
        msg.add_sample(1, Value::Int(7), 1);
        msg.apply_scale_and_offset();
        msg.remove_redundant_data();
        let ts = msg.time_series(1).unwrap();
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.sample_at(0).unwrap().value, Value::Int(15));
    }

    #[test]
    fn rejects_bad_sensor_numbers() {
        let cfg = cfg_fixed(DataOrder::Ascending);
        let mut msg = msg_at(&cfg, utc(2024, 6, 10, 12, 0, 0));
        assert!(msg.add_sample(0, Value::Int(1), 1).is_none());
        assert!(msg.add_sample(-3, Value::Int(1), 1).is_none());
        assert!(msg.add_sample(99, Value::Int(1), 1).is_none());
    }
}
