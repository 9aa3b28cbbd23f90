//! Named calendar predicates for special-date overrides
//!
//! Every predicate evaluates an instant on a configured wall clock
//! (`utc_offset_minutes`), so "the morning of October 1st" means the same
//! thing no matter where the gateway runs.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use super::OverrideKey;
use crate::config::CalendarConfig;

pub trait CalendarPredicate: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, at: DateTime<Utc>) -> bool;
}

/// A fixed month/day, restricted to an hour window `[start_hour, end_hour)`.
#[derive(Debug, Clone)]
pub struct FixedDateWindow {
    name: String,
    month: u32,
    day: u32,
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
}

impl FixedDateWindow {
    pub fn new(
        name: impl Into<String>,
        month: u32,
        day: u32,
        start_hour: u32,
        end_hour: u32,
        offset: FixedOffset,
    ) -> Self {
        Self {
            name: name.into(),
            month,
            day,
            start_hour,
            end_hour,
            offset,
        }
    }
}

impl CalendarPredicate for FixedDateWindow {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        local.month() == self.month
            && local.day() == self.day
            && (self.start_hour..self.end_hour).contains(&local.hour())
    }
}

/// Whole local days taken from an explicit date list.
#[derive(Debug, Clone)]
pub struct DateList {
    name: String,
    dates: Vec<NaiveDate>,
    offset: FixedOffset,
}

impl DateList {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, offset: FixedOffset) -> Self {
        Self {
            name: name.into(),
            dates,
            offset,
        }
    }
}

impl CalendarPredicate for DateList {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        let today = at.with_timezone(&self.offset).date_naive();
        self.dates.contains(&today)
    }
}

/// Wall-clock offset of the calendar; out-of-range values fall back to UTC.
pub fn calendar_offset(config: &CalendarConfig) -> FixedOffset {
    config
        .utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or(Utc.fix())
}

/// Predicate for a calendar-keyed override; `None` for `MediaMissing`.
pub fn predicate_for(key: OverrideKey, config: &CalendarConfig) -> Option<Box<dyn CalendarPredicate>> {
    let offset = calendar_offset(config);
    let morning = |name: &str, month, day| -> Box<dyn CalendarPredicate> {
        Box::new(FixedDateWindow::new(
            name,
            month,
            day,
            config.morning_start_hour,
            config.morning_end_hour,
            offset,
        ))
    };

    match key {
        OverrideKey::ChineseNewYearEve => Some(Box::new(DateList::new(
            "chinese-new-year-eve",
            config.lunar_new_year_eves.clone(),
            offset,
        ))),
        OverrideKey::October1 => Some(morning("october-1-morning", 10, 1)),
        OverrideKey::December13 => Some(morning("december-13-morning", 12, 13)),
        OverrideKey::September18 => Some(morning("september-18-morning", 9, 18)),
        OverrideKey::MediaMissing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_morning_window_in_local_time() {
        let config = CalendarConfig::default();
        let october1 = predicate_for(OverrideKey::October1, &config).unwrap();

        // 2026-10-01 08:00 at +08:00
        assert!(october1.matches(utc(2026, 10, 1, 0, 0)));
        // 2026-10-01 00:00 at +08:00
        assert!(october1.matches(utc(2026, 9, 30, 16, 0)));
        // 2026-09-30 23:59 at +08:00
        assert!(!october1.matches(utc(2026, 9, 30, 15, 59)));
        // 2026-10-01 12:00 at +08:00, window end is exclusive
        assert!(!october1.matches(utc(2026, 10, 1, 4, 0)));
        assert!(october1.matches(utc(2026, 10, 1, 3, 59)));
    }

    #[test]
    fn test_each_fixed_date() {
        let config = CalendarConfig {
            utc_offset_minutes: 0,
            ..CalendarConfig::default()
        };

        for (key, month, day) in [
            (OverrideKey::October1, 10, 1),
            (OverrideKey::December13, 12, 13),
            (OverrideKey::September18, 9, 18),
        ] {
            let predicate = predicate_for(key, &config).unwrap();
            assert!(predicate.matches(utc(2027, month, day, 9, 30)), "{}", predicate.name());
            assert!(!predicate.matches(utc(2027, month, day, 13, 0)), "{}", predicate.name());
            assert!(!predicate.matches(utc(2027, 1, 2, 9, 30)), "{}", predicate.name());
        }
    }

    #[test]
    fn test_configured_morning_window() {
        let config = CalendarConfig {
            utc_offset_minutes: 0,
            morning_start_hour: 6,
            morning_end_hour: 9,
            ..CalendarConfig::default()
        };
        let predicate = predicate_for(OverrideKey::September18, &config).unwrap();

        assert!(!predicate.matches(utc(2026, 9, 18, 5, 59)));
        assert!(predicate.matches(utc(2026, 9, 18, 6, 0)));
        assert!(!predicate.matches(utc(2026, 9, 18, 9, 0)));
    }

    #[test]
    fn test_lunar_new_year_eve_whole_day() {
        let config = CalendarConfig::default();
        let eve = predicate_for(OverrideKey::ChineseNewYearEve, &config).unwrap();

        // 2026-02-16 00:00 and 23:59 at +08:00
        assert!(eve.matches(utc(2026, 2, 15, 16, 0)));
        assert!(eve.matches(utc(2026, 2, 16, 15, 59)));
        // 2026-02-17 00:00 at +08:00
        assert!(!eve.matches(utc(2026, 2, 16, 16, 0)));
        assert!(!eve.matches(utc(2026, 2, 15, 15, 59)));
    }

    #[test]
    fn test_media_missing_has_no_predicate() {
        assert!(predicate_for(OverrideKey::MediaMissing, &CalendarConfig::default()).is_none());
    }

    #[test]
    fn test_negative_offset() {
        let config = CalendarConfig {
            utc_offset_minutes: -5 * 60,
            ..CalendarConfig::default()
        };
        let december13 = predicate_for(OverrideKey::December13, &config).unwrap();

        // 2026-12-13 02:00 at -05:00
        assert!(december13.matches(utc(2026, 12, 13, 7, 0)));
        // 2026-12-12 23:00 at -05:00
        assert!(!december13.matches(utc(2026, 12, 13, 4, 0)));
    }
}
