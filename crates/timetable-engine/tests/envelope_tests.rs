//! Tests for spans, local-day bucketing and DST resolution.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use timetable_engine::dst::{parse_timezone, resolve_local, DstPolicy};
use timetable_engine::envelope::{day_end, day_start, local_date};
use timetable_engine::{Span, TimetableError};

fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

fn zurich() -> Tz {
    parse_timezone("Europe/Zurich").unwrap()
}

// ── Spans ───────────────────────────────────────────────────────────────────

#[test]
fn touching_spans_do_not_overlap() {
    let morning = Span::new(utc(16, 9, 0), Duration::minutes(60));
    let next = Span::new(utc(16, 10, 0), Duration::minutes(30));

    assert!(!morning.overlaps(&next));
    assert!(!next.overlaps(&morning));
    assert!(morning.overlaps(&Span::new(utc(16, 9, 59), Duration::minutes(1))));
}

#[test]
fn span_ending_at_midnight_stays_on_its_day() {
    let evening = Span::new(utc(16, 23, 0), Duration::minutes(60));

    assert_eq!(evening.last_day(Tz::UTC), NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
    assert!(!evening.crosses_day(Tz::UTC));
    assert!(Span::new(utc(16, 23, 0), Duration::minutes(61)).crosses_day(Tz::UTC));
}

#[test]
fn day_bucketing_uses_the_timezone() {
    // 23:30 UTC on 16 March is already 00:30 on 17 March in Zurich.
    let instant = utc(16, 23, 30);

    assert_eq!(local_date(instant, Tz::UTC), NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
    assert_eq!(local_date(instant, zurich()), NaiveDate::from_ymd_opt(2026, 3, 17).unwrap());
    assert!(Span::new(utc(16, 22, 30), Duration::minutes(60)).crosses_day(zurich()));
}

#[test]
fn day_bounds_in_local_time() {
    let day = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();

    assert_eq!(day_start(day, zurich()), utc(15, 23, 0));
    assert_eq!(day_end(day, zurich()), utc(16, 23, 0));
}

#[test]
fn day_across_spring_forward_is_23_hours() {
    // Zurich moves from +01:00 to +02:00 on 29 March 2026.
    let day = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();

    assert_eq!(day_end(day, zurich()) - day_start(day, zurich()), Duration::hours(23));
}

// ── DST resolution ──────────────────────────────────────────────────────────

#[test]
fn nonexistent_time_shifts_forward() {
    // 02:30 does not exist on 29 March; forward lands at 03:30 CEST (01:30 UTC).
    let local = NaiveDate::from_ymd_opt(2026, 3, 29)
        .unwrap()
        .and_hms_opt(2, 30, 0)
        .unwrap();

    assert_eq!(resolve_local(zurich(), local, DstPolicy::ShiftForward), utc(29, 1, 30));
}

#[test]
fn nonexistent_time_shifts_backward() {
    // Backward lands at 01:30 CET (00:30 UTC).
    let local = NaiveDate::from_ymd_opt(2026, 3, 29)
        .unwrap()
        .and_hms_opt(2, 30, 0)
        .unwrap();

    assert_eq!(resolve_local(zurich(), local, DstPolicy::ShiftBackward), utc(29, 0, 30));
}

#[test]
fn ambiguous_time_takes_earliest_instant() {
    // 02:30 happens twice on 25 October; the first one is still CEST (+02:00).
    let local = NaiveDate::from_ymd_opt(2026, 10, 25)
        .unwrap()
        .and_hms_opt(2, 30, 0)
        .unwrap();

    assert_eq!(
        resolve_local(zurich(), local, DstPolicy::default()),
        Utc.with_ymd_and_hms(2026, 10, 25, 0, 30, 0).unwrap()
    );
}

#[test]
fn unknown_timezone_is_rejected() {
    let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
    assert!(matches!(err, TimetableError::InvalidTimezone(name) if name == "Mars/Olympus_Mons"));
}
