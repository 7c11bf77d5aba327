//! Cron subsystem — wall-clock timers for the weekly plan and the daily
//! reminder.
//!
//! A [`WeeklySchedule`] is a set of weekdays plus a local time of day. The
//! [`CronService`] component sleeps until the earliest upcoming fire time
//! and emits the matching [`Job`] on an `mpsc` channel; whoever owns the
//! receiver (the Telegram channel) does the actual work.

mod service;

pub use service::CronService;

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Weekday};

/// Work the scheduler can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    WeeklyPlan,
    DailyReminder,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::WeeklyPlan => f.write_str("weekly_plan"),
            Job::DailyReminder => f.write_str("daily_reminder"),
        }
    }
}

/// Fires on each listed weekday at `at` (local time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: Vec<Weekday>,
    at: NaiveTime,
}

impl WeeklySchedule {
    pub fn new(days: Vec<Weekday>, at: NaiveTime) -> Self {
        Self { days, at }
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// First fire time strictly after `now`, in naive local time.
    /// `None` only when no weekday is configured.
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        (0..=7)
            .map(|offset| (now.date() + Duration::days(offset)).and_time(self.at))
            .find(|candidate| candidate > &now && self.days.contains(&candidate.weekday()))
    }

    /// Next fire time after `now` in `now`'s timezone. Candidates that fall
    /// into a DST gap are skipped; an ambiguous (repeated) wall time fires
    /// once, at its earlier instant.
    pub fn next_fire<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let mut cursor = now.naive_local();
        for _ in 0..self.days.len().max(1) * 2 + 1 {
            let candidate = self.next_after(cursor)?;
            if let Some(local) = tz.from_local_datetime(&candidate).earliest() {
                if local > now {
                    return Some(local);
                }
            }
            cursor = candidate;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local, LocalResult, NaiveDate, Offset, Timelike};

    /// Central European rules for 2026: +02:00 between 2026-03-29 01:00 UTC
    /// and 2026-10-25 01:00 UTC, +01:00 otherwise.
    #[derive(Debug, Clone, Copy)]
    struct Cet2026;

    impl Cet2026 {
        fn offset_at_utc(utc: &NaiveDateTime) -> FixedOffset {
            let summer_start = at(2026, 3, 29, 1, 0);
            let summer_end = at(2026, 10, 25, 1, 0);
            let hours = if *utc >= summer_start && *utc < summer_end { 2 } else { 1 };
            FixedOffset::east_opt(hours * 3600).unwrap()
        }
    }

    impl TimeZone for Cet2026 {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            Cet2026
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            // Earlier instant (larger offset) first.
            let valid: Vec<FixedOffset> = [2, 1]
                .into_iter()
                .map(|h| FixedOffset::east_opt(h * 3600).unwrap())
                .filter(|off| {
                    let utc = *local - Duration::seconds(i64::from(off.local_minus_utc()));
                    Self::offset_at_utc(&utc) == *off
                })
                .collect();
            match valid.as_slice() {
                [] => LocalResult::None,
                [one] => LocalResult::Single(*one),
                [first, second, ..] => LocalResult::Ambiguous(*first, *second),
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            Self::offset_at_utc(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            Self::offset_at_utc(utc)
        }
    }

    fn sundays_at(h: u32, m: u32) -> WeeklySchedule {
        WeeklySchedule::new(vec![Weekday::Sun], NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn weekdays_at_seven() -> WeeklySchedule {
        WeeklySchedule::new(
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        )
    }

    #[test]
    fn same_day_when_time_not_reached() {
        // 2026-10-19 is a Monday.
        let next = weekdays_at_seven().next_after(at(2026, 10, 19, 6, 59)).unwrap();
        assert_eq!(next, at(2026, 10, 19, 7, 0));
    }

    #[test]
    fn exactly_at_fire_time_moves_on() {
        let next = weekdays_at_seven().next_after(at(2026, 10, 19, 7, 0)).unwrap();
        assert_eq!(next, at(2026, 10, 20, 7, 0));
    }

    #[test]
    fn friday_evening_skips_weekend() {
        let next = weekdays_at_seven().next_after(at(2026, 10, 23, 20, 0)).unwrap();
        assert_eq!(next, at(2026, 10, 26, 7, 0));
    }

    #[test]
    fn single_day_wraps_a_full_week() {
        let sunday = WeeklySchedule::new(vec![Weekday::Sun], NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        // Sunday 2026-10-18 11:00 → next Sunday.
        assert_eq!(sunday.next_after(at(2026, 10, 18, 11, 0)).unwrap(), at(2026, 10, 25, 10, 0));
        assert_eq!(sunday.next_after(at(2026, 10, 18, 9, 0)).unwrap(), at(2026, 10, 18, 10, 0));
    }

    #[test]
    fn empty_schedule_never_fires() {
        let never = WeeklySchedule::new(Vec::new(), NaiveTime::MIN);
        assert!(never.next_after(at(2026, 10, 18, 0, 0)).is_none());
        assert!(never.next_fire(Local::now()).is_none());
    }

    #[test]
    fn next_fire_is_in_the_future() {
        let now = Local::now();
        let next = weekdays_at_seven().next_fire(now).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::days(4));
    }

    #[test]
    fn next_fire_keeps_the_callers_offset() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        // Friday 2026-10-23 20:00 +03:00.
        let now = tz.from_local_datetime(&at(2026, 10, 23, 20, 0)).single().unwrap();
        let next = weekdays_at_seven().next_fire(now).unwrap();
        assert_eq!(next.naive_local(), at(2026, 10, 26, 7, 0));
        assert_eq!(next.offset().fix(), tz);
    }

    #[test]
    fn fire_time_in_spring_gap_is_skipped() {
        // 02:30 does not exist on 2026-03-29 in this zone.
        assert!(matches!(Cet2026.from_local_datetime(&at(2026, 3, 29, 2, 30)), LocalResult::None));
        let now = Cet2026.from_local_datetime(&at(2026, 3, 29, 0, 0)).single().unwrap();
        let next = sundays_at(2, 30).next_fire(now).unwrap();
        assert_eq!(next.naive_local(), at(2026, 4, 5, 2, 30));
    }

    #[test]
    fn repeated_autumn_hour_fires_once_at_earlier_instant() {
        let now = Cet2026.from_local_datetime(&at(2026, 10, 25, 0, 0)).single().unwrap();
        let schedule = sundays_at(2, 30);

        let first = schedule.next_fire(now).unwrap();
        assert_eq!(first.naive_local(), at(2026, 10, 25, 2, 30));
        assert_eq!(first.offset().fix().local_minus_utc(), 2 * 3600);
        assert_eq!(first.naive_utc().hour(), 0);

        // The second 02:30 (+01:00) is not a new fire time.
        let second = schedule.next_fire(first).unwrap();
        assert_eq!(second.naive_local(), at(2026, 11, 1, 2, 30));
    }

    #[test]
    fn job_names() {
        assert_eq!(Job::WeeklyPlan.to_string(), "weekly_plan");
        assert_eq!(Job::DailyReminder.to_string(), "daily_reminder");
    }
}
