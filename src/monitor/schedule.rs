//! Pure scheduling math for sweeps and follow-up checks.
//!
//! All civil-time arithmetic anchors to the configured IANA timezone; the
//! host timezone never enters into it.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::monitor::types::Urgency;

/// Day-of-week number with 0 = Sunday through 6 = Saturday.
pub fn weekday_number(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parse a "HH:MM" departure time.
pub fn parse_departure_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Convert a civil date + time in the given timezone to a UTC instant.
/// Ambiguous times (DST fall-back) resolve to the earlier occurrence;
/// nonexistent times (spring-forward gap) yield None.
pub fn civil_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Next configured sweep instant strictly after `now`, looking at today and
/// tomorrow in the configured zone.
pub fn next_sweep_instant(
    now: DateTime<Utc>,
    sweep_times: &[NaiveTime],
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    let mut best: Option<DateTime<Utc>> = None;

    for date in [Some(today), today.succ_opt()].into_iter().flatten() {
        for &time in sweep_times {
            let Some(instant) = civil_to_utc(date, time, tz) else {
                continue;
            };
            if instant <= now {
                continue;
            }
            if best.map_or(true, |b| instant < b) {
                best = Some(instant);
            }
        }
    }

    best
}

fn floor_to(step: i64, value: i64) -> i64 {
    (value / step) * step
}

/// Minute marks before departure at which follow-up checks run.
///
/// Important routes check every 10 minutes from two hours out down to the
/// hour, then every 5 minutes inside it; the 60-minute mark belongs to
/// neither cadence. Normal routes check every 10 minutes inside the final
/// hour. Marks are clamped to the time actually remaining: a route picked
/// up 55 minutes out starts at the 50-minute mark.
pub fn follow_up_marks(urgency: Urgency, minutes_until_departure: i64) -> Vec<i64> {
    if minutes_until_departure <= 0 {
        return Vec::new();
    }

    let m = minutes_until_departure;
    let mut marks = Vec::new();

    match urgency {
        Urgency::Important => {
            let mut mark = floor_to(10, m.min(120));
            while mark > 60 {
                marks.push(mark);
                mark -= 10;
            }

            let mut mark = floor_to(5, m).min(55);
            while mark > 0 {
                marks.push(mark);
                mark -= 5;
            }
        }
        Urgency::Normal => {
            let mut mark = floor_to(10, m.min(60));
            while mark > 0 {
                marks.push(mark);
                mark -= 10;
            }
        }
    }

    marks
}

/// Sleep durations for a departure's follow-up timers, relative to `now`.
/// Marks at or past `now` are dropped rather than fired late.
pub fn follow_up_delays(
    urgency: Urgency,
    departure: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<std::time::Duration> {
    let until = departure - now;

    follow_up_marks(urgency, until.num_minutes())
        .into_iter()
        .filter_map(|mark| {
            let delay = until - Duration::minutes(mark);
            if delay > Duration::zero() {
                delay.to_std().ok()
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Amsterdam;
    use std::time::Duration as StdDuration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    // --- weekday / parsing ---

    #[test]
    fn test_weekday_number_is_sunday_based() {
        assert_eq!(weekday_number(date(2025, 6, 22)), 0); // Sunday
        assert_eq!(weekday_number(date(2025, 6, 23)), 1); // Monday
        assert_eq!(weekday_number(date(2025, 6, 28)), 6); // Saturday
    }

    #[test]
    fn test_parse_departure_time() {
        assert_eq!(parse_departure_time("08:00"), Some(time(8, 0)));
        assert_eq!(parse_departure_time("23:59"), Some(time(23, 59)));
        assert_eq!(parse_departure_time("08:60"), None);
        assert_eq!(parse_departure_time("08:00:30"), None);
        assert_eq!(parse_departure_time("morning"), None);
    }

    // --- civil_to_utc ---

    #[test]
    fn test_civil_to_utc_summer() {
        // 08:00 Amsterdam (CEST = UTC+2) -> 06:00 UTC
        let dt = civil_to_utc(date(2025, 6, 23), time(8, 0), Amsterdam).unwrap();
        assert_eq!(dt, utc("2025-06-23T06:00:00Z"));
    }

    #[test]
    fn test_civil_to_utc_winter() {
        // 08:00 Amsterdam (CET = UTC+1) -> 07:00 UTC
        let dt = civil_to_utc(date(2025, 1, 20), time(8, 0), Amsterdam).unwrap();
        assert_eq!(dt, utc("2025-01-20T07:00:00Z"));
    }

    #[test]
    fn test_civil_to_utc_dst_spring_forward_gap() {
        // 2025-03-30: clocks jump from 02:00 to 03:00; 02:30 never happens
        assert!(civil_to_utc(date(2025, 3, 30), time(2, 30), Amsterdam).is_none());
        // 03:30 is fine (CEST = UTC+2)
        let dt = civil_to_utc(date(2025, 3, 30), time(3, 30), Amsterdam).unwrap();
        assert_eq!(dt, utc("2025-03-30T01:30:00Z"));
    }

    #[test]
    fn test_civil_to_utc_dst_fall_back_takes_earlier_occurrence() {
        // 2025-10-26: clocks fall back at 03:00; 02:30 happens twice,
        // earliest = still CEST (UTC+2)
        let dt = civil_to_utc(date(2025, 10, 26), time(2, 30), Amsterdam).unwrap();
        assert_eq!(dt, utc("2025-10-26T00:30:00Z"));
    }

    // --- follow_up_marks ---

    #[test]
    fn test_follow_up_marks_normal_clamps_to_remaining_time() {
        assert_eq!(
            follow_up_marks(Urgency::Normal, 55),
            vec![50, 40, 30, 20, 10]
        );
    }

    #[test]
    fn test_follow_up_marks_normal_full_window() {
        assert_eq!(
            follow_up_marks(Urgency::Normal, 130),
            vec![60, 50, 40, 30, 20, 10]
        );
    }

    #[test]
    fn test_follow_up_marks_important_full_window() {
        let marks = follow_up_marks(Urgency::Important, 130);
        assert_eq!(
            marks,
            vec![120, 110, 100, 90, 80, 70, 55, 50, 45, 40, 35, 30, 25, 20, 15, 10, 5]
        );
        // The hour boundary belongs to neither cadence.
        assert!(!marks.contains(&60));
        assert!(!marks.contains(&65));
    }

    #[test]
    fn test_follow_up_marks_important_exactly_two_hours_out() {
        let marks = follow_up_marks(Urgency::Important, 120);
        assert_eq!(marks[0], 120);
        assert!(!marks.contains(&60));
    }

    #[test]
    fn test_follow_up_marks_important_inside_the_hour() {
        assert_eq!(
            follow_up_marks(Urgency::Important, 42),
            vec![40, 35, 30, 25, 20, 15, 10, 5]
        );
    }

    #[test]
    fn test_follow_up_marks_empty_at_or_after_departure() {
        assert!(follow_up_marks(Urgency::Normal, 0).is_empty());
        assert!(follow_up_marks(Urgency::Important, 0).is_empty());
        assert!(follow_up_marks(Urgency::Important, -15).is_empty());
    }

    #[test]
    fn test_follow_up_marks_just_before_departure() {
        assert_eq!(follow_up_marks(Urgency::Important, 7), vec![5]);
        assert!(follow_up_marks(Urgency::Normal, 7).is_empty());
    }

    // --- follow_up_delays ---

    #[test]
    fn test_follow_up_delays_normal_55_minutes_out() {
        let now = utc("2025-06-23T05:05:00Z");
        let departure = utc("2025-06-23T06:00:00Z");

        let delays = follow_up_delays(Urgency::Normal, departure, now);
        let secs: Vec<u64> = delays.iter().map(|d| d.as_secs()).collect();
        // Marks 50/40/30/20/10 minutes before departure.
        assert_eq!(secs, vec![300, 900, 1500, 2100, 2700]);
    }

    #[test]
    fn test_follow_up_delays_drop_marks_that_are_due_now() {
        let now = utc("2025-06-23T05:50:00Z");
        let departure = utc("2025-06-23T06:00:00Z");

        // The only mark (10 min) coincides with now; nothing to schedule.
        assert!(follow_up_delays(Urgency::Normal, departure, now).is_empty());
    }

    #[test]
    fn test_follow_up_delays_empty_after_departure() {
        let now = utc("2025-06-23T06:05:00Z");
        let departure = utc("2025-06-23T06:00:00Z");

        assert!(follow_up_delays(Urgency::Important, departure, now).is_empty());
    }

    #[test]
    fn test_follow_up_delays_all_before_departure() {
        let now = utc("2025-06-23T04:00:00Z");
        let departure = utc("2025-06-23T06:10:00Z");

        let delays = follow_up_delays(Urgency::Important, departure, now);
        assert!(!delays.is_empty());
        let until_departure = StdDuration::from_secs(130 * 60);
        assert!(delays.iter().all(|d| *d < until_departure));
    }

    #[test]
    fn test_follow_up_delays_from_civil_departure() {
        // Departure at 08:00 Amsterdam civil time on a summer Monday.
        let departure = civil_to_utc(date(2025, 6, 23), time(8, 0), Amsterdam).unwrap();
        let now = utc("2025-06-23T05:05:00Z"); // 55 minutes before 06:00 UTC

        let delays = follow_up_delays(Urgency::Normal, departure, now);
        let secs: Vec<u64> = delays.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![300, 900, 1500, 2100, 2700]);
    }

    // --- next_sweep_instant ---

    #[test]
    fn test_next_sweep_instant_picks_earliest_future_time() {
        let times = vec![time(5, 0), time(6, 0)];

        // 04:00 local -> next is 05:00 local = 03:00 UTC (CEST)
        let next = next_sweep_instant(utc("2025-06-23T02:00:00Z"), &times, Amsterdam).unwrap();
        assert_eq!(next, utc("2025-06-23T03:00:00Z"));

        // 05:30 local -> next is 06:00 local
        let next = next_sweep_instant(utc("2025-06-23T03:30:00Z"), &times, Amsterdam).unwrap();
        assert_eq!(next, utc("2025-06-23T04:00:00Z"));

        // 07:00 local -> both times passed, roll over to tomorrow 05:00
        let next = next_sweep_instant(utc("2025-06-23T05:00:00Z"), &times, Amsterdam).unwrap();
        assert_eq!(next, utc("2025-06-24T03:00:00Z"));
    }

    #[test]
    fn test_next_sweep_instant_exact_tick_rolls_forward() {
        let times = vec![time(5, 0)];

        // Exactly at the sweep instant: the next one is tomorrow's.
        let next = next_sweep_instant(utc("2025-06-23T03:00:00Z"), &times, Amsterdam).unwrap();
        assert_eq!(next, utc("2025-06-24T03:00:00Z"));
    }

    #[test]
    fn test_next_sweep_instant_without_times() {
        assert!(next_sweep_instant(utc("2025-06-23T02:00:00Z"), &[], Amsterdam).is_none());
    }
}
