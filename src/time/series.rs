//! Per-sensor sample storage.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::platform::{DataOrder, RecordingMode, SensorConfig};
use crate::time::TimeStatus;
use crate::value::{Sample, SampleFlags};

/// Samples decoded for one sensor, in the order they were added. Sorting
/// is a separate, explicit step because the reconstruction logic depends
/// on addition order.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    sensor: SensorConfig,
    samples: Vec<Sample>,
    /// Seconds between samples. 0 variable, -1 unset, > 0 fixed.
    time_interval: i64,
    data_order: DataOrder,
    /// Register status at the moment samples were added, drives the
    /// partial-date upgrade pass
    pub time_status: TimeStatus,
    /// Register unix seconds at the most recent add, for
    /// interval-continuation detection
    pub sec_at_last_add: Option<i64>,
    time_just_set: bool,
}

impl TimeSeries {
    pub fn new(sensor: SensorConfig) -> Self {
        let time_interval = match sensor.recording_mode {
            RecordingMode::Fixed => sensor.recording_interval,
            RecordingMode::Variable => 0,
        };
        Self {
            sensor,
            samples: Vec::new(),
            time_interval,
            data_order: DataOrder::Undefined,
            time_status: TimeStatus::Nothing,
            sec_at_last_add: None,
            time_just_set: false,
        }
    }

    pub fn sensor(&self) -> &SensorConfig {
        &self.sensor
    }

    pub fn sensor_number(&self) -> i32 {
        self.sensor.number
    }

    /// Effective sampling interval. Variable-mode sensors always report 0
    /// regardless of any interval stored on the series.
    pub fn time_interval(&self) -> i64 {
        if self.sensor.recording_mode == RecordingMode::Variable {
            return 0;
        }
        self.time_interval
    }

    pub fn set_time_interval(&mut self, secs: i64) {
        self.time_interval = secs;
    }

    pub fn set_data_order(&mut self, order: DataOrder) {
        self.data_order = order;
    }

    pub fn data_order(&self) -> DataOrder {
        self.data_order
    }

    pub fn is_ascending(&self) -> bool {
        self.data_order == DataOrder::Ascending
    }

    pub fn is_descending(&self) -> bool {
        self.data_order == DataOrder::Descending
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn sample_at(&self, idx: usize) -> Option<&Sample> {
        self.samples.get(idx)
    }

    /// Appends a sample. Clears the time-just-set latch, so only the first
    /// sample after a date/time field sees it raised.
    pub fn push_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
        self.time_just_set = false;
    }

    pub fn delete_sample_at(&mut self, idx: usize) -> bool {
        if idx < self.samples.len() {
            self.samples.remove(idx);
            true
        } else {
            false
        }
    }

    /// Interval boundary at/before the given message time, for seeding the
    /// first sample of a fixed-interval sensor. The boundary grid is
    /// anchored at the sensor's time-of-first-sample second-of-day.
    pub fn time_of_last_sample_before(&self, msg_time: DateTime<Utc>) -> DateTime<Utc> {
        let interval = self.time_interval();
        if interval == 0 {
            return msg_time; // not a fixed interval sensor
        }
        let secs = msg_time.timestamp();
        let msg_sec_of_day = secs.rem_euclid(24 * 60 * 60);
        let day_start = secs - msg_sec_of_day;
        let mut sod = self.sensor.time_of_first_sample;
        if sod > msg_sec_of_day {
            // most recent boundary was at the end of yesterday
            sod -= interval;
        } else {
            while sod + interval < msg_sec_of_day {
                sod += interval;
            }
        }
        DateTime::<Utc>::from_timestamp(day_start + sod, 0).unwrap_or(msg_time)
    }

    pub fn time_of_last_sample_in_series(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.time)
    }

    /// Earliest sample time, addition order notwithstanding.
    pub fn begin_time(&self) -> Option<DateTime<Utc>> {
        self.samples.iter().map(|s| s.time).min()
    }

    /// Shifts every sample by the given number of seconds.
    pub fn add_time_offset(&mut self, secs: i64) {
        for s in &mut self.samples {
            s.time += Duration::seconds(secs);
        }
    }

    /// Pulls every sample back one interval, making room for a newly
    /// discovered earlier sample on an ascending series.
    pub fn adjust_all_times_back_by_interval(&mut self) {
        let iv = self.time_interval();
        for s in &mut self.samples {
            s.time -= Duration::seconds(iv);
        }
    }

    /// Sorts samples by time and drops duplicates carrying the same stamp.
    pub fn sort(&mut self, descending: bool) {
        if self.samples.is_empty() {
            return;
        }
        self.samples.sort_by_key(|s| s.time);
        if descending {
            self.samples.reverse();
        }
        self.samples.dedup_by_key(|s| s.time);
    }

    /// Drops samples stamped before the given time. Used to discard data
    /// redundantly retransmitted from the previous message.
    pub fn discard_samples_before(&mut self, t: DateTime<Utc>) {
        self.samples.retain(|s| s.time >= t);
    }

    /// Adds a constant to every numeric sample.
    pub fn add_to_samples(&mut self, v: f64) {
        for s in &mut self.samples {
            if let Some(d) = s.value.as_double() {
                s.value.set_numeric(d + v);
            }
        }
    }

    /// Multiplies every numeric sample by a constant.
    pub fn multiply_samples_by(&mut self, v: f64) {
        for s in &mut self.samples {
            if let Some(d) = s.value.as_double() {
                s.value.set_numeric(d * v);
            }
        }
    }

    /// Applies the configured sensor min/max limits. Out-of-limit values
    /// are either replaced (minReplaceValue / maxReplaceValue properties)
    /// or flagged missing.
    pub fn apply_sensor_limits(&mut self) {
        let min = self.sensor.minimum;
        let max = self.sensor.maximum;
        if min.is_none() && max.is_none() {
            return;
        }
        let min_replace = self.replace_property("minReplaceValue");
        let max_replace = self.replace_property("maxReplaceValue");

        for s in &mut self.samples {
            let d = match s.value.as_double() {
                Some(d) => d,
                None => continue,
            };
            if let Some(min) = min {
                if d < min {
                    s.flags |= SampleFlags::LIMIT_VIOLATION;
                    match min_replace {
                        Some(r) => s.value.set_numeric(r),
                        None => s.flags |= SampleFlags::MISSING,
                    }
                    debug!(
                        "{}: value {} below minimum of {}",
                        self.sensor.name, d, min
                    );
                }
            }
            if let Some(max) = max {
                if d > max {
                    s.flags |= SampleFlags::LIMIT_VIOLATION;
                    match max_replace {
                        Some(r) => s.value.set_numeric(r),
                        None => s.flags |= SampleFlags::MISSING,
                    }
                    debug!(
                        "{}: value {} above maximum of {}",
                        self.sensor.name, d, max
                    );
                }
            }
        }
    }

    fn replace_property(&self, name: &str) -> Option<f64> {
        let raw = self.sensor.property(name)?;
        match raw.trim().parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(
                    "{}: invalid {} '{}', ignored",
                    self.sensor.name, name, raw
                );
                None
            }
        }
    }

    /// True if the register was set by a date/time field since the last
    /// sample was added to this series.
    pub fn time_just_set(&self) -> bool {
        self.time_just_set
    }

    pub fn set_time_just_set(&mut self) {
        self.time_just_set = true;
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.sensor.property(name)
    }

    pub fn has_data_type(&self, code: &str) -> bool {
        self.sensor.has_data_type(code)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;
    use chrono::TimeZone;

    fn ts_fixed(interval: i64) -> TimeSeries {
        TimeSeries::new(SensorConfig::fixed(1, "HG", interval))
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    fn sample(v: i64, t: DateTime<Utc>) -> Sample {
        Sample::new(Value::Int(v), t, 1)
    }

    #[test]
    fn boundary_before_message_time() {
        let ts = ts_fixed(3600);
        // message at 10:47, hourly boundaries anchored at midnight
        let t = ts.time_of_last_sample_before(at(10, 47));
        assert_eq!(t, at(10, 0));
    }

    #[test]
    fn boundary_anchored_to_first_sample_time() {
        let mut cfg = SensorConfig::fixed(1, "HG", 3600);
        cfg.time_of_first_sample = 15 * 60; // :15 past each hour
        let ts = TimeSeries::new(cfg);
        let t = ts.time_of_last_sample_before(at(10, 47));
        assert_eq!(t, at(10, 15));
    }

    #[test]
    fn boundary_wraps_to_yesterday() {
        let mut cfg = SensorConfig::fixed(1, "HG", 6 * 3600);
        cfg.time_of_first_sample = 5 * 3600; // 05:00, 11:00, 17:00, 23:00
        let ts = TimeSeries::new(cfg);
        let t = ts.time_of_last_sample_before(at(3, 0));
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 6, 9, 23, 0, 0).unwrap());
    }

    #[test]
    fn variable_sensor_uses_message_time() {
        let ts = TimeSeries::new(SensorConfig::variable(2, "VB"));
        assert_eq!(ts.time_of_last_sample_before(at(10, 47)), at(10, 47));
        assert_eq!(ts.time_interval(), 0);
    }

    #[test]
    fn sort_removes_duplicate_times() {
        let mut ts = ts_fixed(900);
        ts.push_sample(sample(2, at(10, 15)));
        ts.push_sample(sample(1, at(10, 0)));
        ts.push_sample(sample(3, at(10, 15)));
        ts.sort(false);
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.sample_at(0).unwrap().value, Value::Int(1));
        assert_eq!(ts.sample_at(1).unwrap().value, Value::Int(2));
    }

    #[test]
    fn scale_and_offset_skip_strings() {
        let mut ts = ts_fixed(900);
        ts.push_sample(sample(10, at(10, 0)));
        ts.push_sample(Sample::new(Value::Str("tag".to_string()), at(10, 15), 1));
        ts.multiply_samples_by(0.5);
        ts.add_to_samples(1.0);
        assert_eq!(ts.sample_at(0).unwrap().value, Value::Int(6));
        assert_eq!(
            ts.sample_at(1).unwrap().value,
            Value::Str("tag".to_string())
        );
    }

    #[test]
    fn limits_flag_or_replace() {
        let mut cfg = SensorConfig::fixed(1, "HG", 900);
        cfg.minimum = Some(0.0);
        cfg.maximum = Some(100.0);
        let mut ts = TimeSeries::new(cfg);
        ts.push_sample(sample(-5, at(10, 0)));
        ts.push_sample(sample(50, at(10, 15)));
        ts.apply_sensor_limits();
        assert!(ts.sample_at(0).unwrap().is_missing());
        assert!(ts
            .sample_at(0)
            .unwrap()
            .flags
            .contains(SampleFlags::LIMIT_VIOLATION));
        assert!(!ts.sample_at(1).unwrap().is_missing());

        let mut cfg = SensorConfig::fixed(1, "HG", 900).with_property("maxReplaceValue", "99");
        cfg.maximum = Some(100.0);
        let mut ts = TimeSeries::new(cfg);
        ts.push_sample(sample(200, at(10, 0)));
        ts.apply_sensor_limits();
        assert_eq!(ts.sample_at(0).unwrap().value, Value::Int(99));
        assert!(!ts.sample_at(0).unwrap().is_missing());
    }

    #[test]
    fn time_just_set_clears_on_add() {
        let mut ts = ts_fixed(900);
        ts.set_time_just_set();
        assert!(ts.time_just_set());
        ts.push_sample(sample(1, at(10, 0)));
        assert!(!ts.time_just_set());
    }
}
