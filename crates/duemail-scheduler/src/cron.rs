//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Per field: *, */N, N, A-B, A-B/N, N/S and comma lists of those.
//! Example: "0 10 3 * *" = 10:00 on the 3rd of every month
//!
//! Times are naive (wall-clock); the caller picks the time zone.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

/// How many days ahead to search. Covers Feb 29 schedules.
const SEARCH_DAYS: i64 = 366 * 5;

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(format!(
                "Invalid cron expression: '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            ));
        }

        let field = |i: usize, name: &str, min: u32, max: u32| {
            parse_field(parts[i], min, max)
                .ok_or_else(|| format!("Invalid {name} field '{}' in '{expression}'", parts[i]))
        };

        // 7 is an alias for Sunday.
        let mut days_of_week: Vec<u32> = field(4, "day-of-week", 0, 7)?
            .into_iter()
            .map(|d| d % 7)
            .collect();
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            expression: expression.trim().to_string(),
            minutes: field(0, "minute", 0, 59)?,
            hours: field(1, "hour", 0, 23)?,
            days_of_month: field(2, "day-of-month", 1, 31)?,
            months: field(3, "month", 1, 12)?,
            days_of_week,
            dom_restricted: !parts[2].starts_with('*'),
            dow_restricted: !parts[4].starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `date` is a firing day. When both day fields are
    /// restricted, either may match.
    pub fn matches_day(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        }
    }

    /// First firing time strictly after `after`, at whole-minute precision.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let first_day = start.date();

        for offset in 0..SEARCH_DAYS {
            let date = first_day + Duration::days(offset);
            if !self.matches_day(date) {
                continue;
            }
            for &h in &self.hours {
                for &m in &self.minutes {
                    let candidate = date.and_hms_opt(h, m, 0)?;
                    if candidate >= start {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for item in field.split(',') {
        values.extend(parse_item(item.trim(), min, max)?);
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

fn parse_item(item: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let (range, step) = match item.split_once('/') {
        Some((r, s)) => {
            let n: u32 = s.parse().ok()?;
            if n == 0 {
                return None;
            }
            (r, n)
        }
        None => (item, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: u32 = range.parse().ok()?;
        // "N/S" means N through max in steps of S.
        if item.contains('/') { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(expression: &str, after: NaiveDateTime) -> Option<NaiveDateTime> {
        CronSchedule::parse(expression).unwrap().next_after(after)
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_every_hour() {
        let next = next("0 * * * *", at(2026, 2, 22, 10, 30)).unwrap();
        assert_eq!(next, at(2026, 2, 22, 11, 0));
    }

    #[test]
    fn test_specific_time() {
        let next = next("0 8 * * *", at(2026, 2, 22, 7, 0)).unwrap();
        assert_eq!(next, at(2026, 2, 22, 8, 0));
    }

    #[test]
    fn test_every_15_minutes() {
        let next = next("*/15 * * * *", at(2026, 2, 22, 10, 2)).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_monthly_default() {
        let s = CronSchedule::parse("0 10 3 * *").unwrap();
        assert_eq!(s.next_after(at(2026, 10, 18, 9, 0)), Some(at(2026, 11, 3, 10, 0)));
        assert_eq!(s.next_after(at(2026, 11, 3, 9, 59)), Some(at(2026, 11, 3, 10, 0)));
        // Exactly at fire time → next month.
        assert_eq!(s.next_after(at(2026, 11, 3, 10, 0)), Some(at(2026, 12, 3, 10, 0)));
        assert_eq!(s.next_after(at(2026, 12, 5, 0, 0)), Some(at(2027, 1, 3, 10, 0)));
    }

    #[test]
    fn test_seconds_are_ignored() {
        let s = CronSchedule::parse("0 10 3 * *").unwrap();
        let after = at(2026, 11, 3, 9, 59) + Duration::seconds(30);
        assert_eq!(s.next_after(after), Some(at(2026, 11, 3, 10, 0)));
    }

    #[test]
    fn test_skips_short_months() {
        let s = CronSchedule::parse("0 0 31 * *").unwrap();
        assert_eq!(s.next_after(at(2026, 4, 1, 0, 0)), Some(at(2026, 5, 31, 0, 0)));
    }

    #[test]
    fn test_leap_day() {
        let s = CronSchedule::parse("0 12 29 2 *").unwrap();
        assert_eq!(s.next_after(at(2025, 3, 1, 0, 0)), Some(at(2028, 2, 29, 12, 0)));
    }

    #[test]
    fn test_day_of_week_and_ranges() {
        // Weekdays at 09:30. 2026-10-17 is a Saturday.
        let s = CronSchedule::parse("30 9 * * 1-5").unwrap();
        assert_eq!(s.next_after(at(2026, 10, 17, 12, 0)), Some(at(2026, 10, 19, 9, 30)));

        let sunday = CronSchedule::parse("0 6 * * 7").unwrap();
        assert_eq!(sunday.next_after(at(2026, 10, 17, 12, 0)), Some(at(2026, 10, 18, 6, 0)));
    }

    #[test]
    fn test_dom_or_dow_when_both_restricted() {
        // 1st of month OR any Monday. 2026-10-18 is a Sunday.
        let s = CronSchedule::parse("0 0 1 * 1").unwrap();
        assert_eq!(s.next_after(at(2026, 10, 18, 1, 0)), Some(at(2026, 10, 19, 0, 0)));
        assert_eq!(s.next_after(at(2026, 10, 31, 1, 0)), Some(at(2026, 11, 1, 0, 0)));
    }

    #[test]
    fn test_starred_step_day_field_is_unrestricted() {
        // Odd days of month AND Mondays. 2026-10-19 is a Monday (odd);
        // 2026-10-26 is a Monday (even) and must not fire.
        let s = CronSchedule::parse("0 0 */2 * 1").unwrap();
        assert_eq!(s.next_after(at(2026, 10, 18, 1, 0)), Some(at(2026, 10, 19, 0, 0)));
        assert_eq!(s.next_after(at(2026, 10, 19, 1, 0)), Some(at(2026, 11, 9, 0, 0)));
    }

    #[test]
    fn test_lists_and_steps() {
        assert_eq!(parse_field("0,15,30,45", 0, 59), Some(vec![0, 15, 30, 45]));
        assert_eq!(parse_field("10-20/5", 0, 59), Some(vec![10, 15, 20]));
        assert_eq!(parse_field("5/20", 0, 59), Some(vec![5, 25, 45]));
        assert_eq!(parse_field("3,1,3", 1, 31), Some(vec![1, 3]));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronSchedule::parse("bad").is_err());
        assert!(CronSchedule::parse("60 * * * *").is_err());
        assert!(CronSchedule::parse("0 24 * * *").is_err());
        assert!(CronSchedule::parse("0 0 0 * *").is_err());
        assert!(CronSchedule::parse("0 0 * 13 *").is_err());
        assert!(CronSchedule::parse("*/0 * * * *").is_err());
        assert!(CronSchedule::parse("5-1 * * * *").is_err());
        assert!(CronSchedule::parse("0 0 * * * *").is_err());
    }

    #[test]
    fn test_impossible_date_never_fires() {
        let s = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert_eq!(s.next_after(at(2026, 1, 1, 0, 0)), None);
    }
}
