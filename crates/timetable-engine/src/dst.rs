//! DST handling when turning wall-clock times into instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Result, TimetableError};

/// Policy for wall-clock times that fall into a DST gap (e.g. 02:30 during spring forward).
///
/// Ambiguous times (fall back) always resolve to the earliest instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DstPolicy {
    /// Keep the offset from before the gap, landing after it (02:30 -> 03:30).
    #[default]
    ShiftForward,
    /// Use the offset from after the gap, landing before it (02:30 -> 01:30).
    ShiftBackward,
}

/// Resolve a local wall-clock time in `tz` to a UTC instant.
pub fn resolve_local(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // No gap lasts more than a few hours, so probing 3h away finds a valid offset.
            let probe = match policy {
                DstPolicy::ShiftForward => local - Duration::hours(3),
                DstPolicy::ShiftBackward => local + Duration::hours(3),
            };
            let offset_secs = tz
                .offset_from_local_datetime(&probe)
                .earliest()
                .map(|offset| offset.fix().local_minus_utc())
                .unwrap_or(0);
            Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset_secs))))
        }
    }
}

/// Parse an IANA timezone name such as `Europe/Zurich`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| TimetableError::InvalidTimezone(name.to_string()))
}
