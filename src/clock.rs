//! Study-day arithmetic.
//!
//! A study day starts at a fixed local refresh hour (04:00 by default) instead
//! of midnight, so a review at 01:00 still belongs to the previous day and
//! "tomorrow" begins at the next refresh boundary.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BaselineConfig;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "days")]
pub enum DueLabel {
    Overdue,
    Today,
    Tomorrow,
    InDays(i64),
}

#[derive(Debug, Clone, Copy)]
pub struct StudyClock {
    boundary_hour: u32,
    offset: FixedOffset,
}

impl StudyClock {
    pub fn new(boundary_hour: u32, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self {
            boundary_hour: boundary_hour.min(23),
            offset,
        }
    }

    pub fn from_config(config: &BaselineConfig) -> Self {
        Self::new(config.day_boundary_hour, config.utc_offset_minutes)
    }

    pub fn to_local(&self, ts_ms: i64) -> DateTime<FixedOffset> {
        DateTime::from_timestamp_millis(ts_ms)
            .unwrap_or_default()
            .with_timezone(&self.offset)
    }

    /// Start of the study day containing `ts_ms`, as epoch millis.
    pub fn study_day_start(&self, ts_ms: i64) -> i64 {
        let shifted = self.to_local(ts_ms) - Duration::hours(self.boundary_hour as i64);
        let boundary = shifted
            .date_naive()
            .and_hms_opt(self.boundary_hour, 0, 0)
            .and_then(|naive| self.offset.from_local_datetime(&naive).single());
        match boundary {
            Some(dt) => dt.timestamp_millis(),
            None => ts_ms - ts_ms.rem_euclid(DAY_MS),
        }
    }

    pub fn end_of_study_day(&self, ts_ms: i64) -> i64 {
        self.study_day_start(ts_ms) + DAY_MS
    }

    /// Ordinal of the study day containing `ts_ms`.
    pub fn study_day(&self, ts_ms: i64) -> i64 {
        self.study_day_start(ts_ms).div_euclid(DAY_MS)
    }

    pub fn same_study_day(&self, a_ms: i64, b_ms: i64) -> bool {
        self.study_day(a_ms) == self.study_day(b_ms)
    }

    /// Next review time for an interval: the boundary `interval_days` study days
    /// ahead, or a short same-day delay for a zero interval.
    pub fn next_review_time(&self, now_ms: i64, interval_days: i32, learning_step_minutes: i64) -> i64 {
        if interval_days <= 0 {
            return now_ms + learning_step_minutes * MINUTE_MS;
        }
        self.study_day_start(now_ms) + interval_days as i64 * DAY_MS
    }

    pub fn is_due(&self, next_review_ms: i64, now_ms: i64) -> bool {
        next_review_ms < self.end_of_study_day(now_ms)
    }

    pub fn due_label(&self, next_review_ms: i64, now_ms: i64) -> DueLabel {
        let diff = self.study_day(next_review_ms) - self.study_day(now_ms);
        match diff {
            d if d < 0 => DueLabel::Overdue,
            0 => DueLabel::Today,
            1 => DueLabel::Tomorrow,
            d => DueLabel::InDays(d),
        }
    }

    pub fn hour_of_day(&self, ts_ms: i64) -> u32 {
        self.to_local(ts_ms).hour()
    }

    /// 0 = Monday.
    pub fn weekday(&self, ts_ms: i64) -> u32 {
        self.to_local(ts_ms).weekday().num_days_from_monday()
    }
}

impl Default for StudyClock {
    fn default() -> Self {
        Self::from_config(&BaselineConfig::default())
    }
}

pub fn elapsed_days(from_ms: i64, to_ms: i64) -> f64 {
    ((to_ms - from_ms) as f64 / DAY_MS as f64).max(0.0)
}
