//! The start/duration/end abstraction shared by everything placed on the time axis.
//!
//! Nothing here stores an end: [`TimeEnvelope::end`] is always `start + duration`,
//! and day bucketing is done in a caller-supplied timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::{resolve_local, DstPolicy};

/// Anything with a start and a duration.
pub trait TimeEnvelope {
    fn start(&self) -> DateTime<Utc>;

    fn duration(&self) -> Duration;

    fn end(&self) -> DateTime<Utc> {
        self.start() + self.duration()
    }

    fn span(&self) -> Span {
        Span {
            start: self.start(),
            end: self.end(),
        }
    }
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Two spans overlap iff `a.start < b.end && b.start < a.end`.
    ///
    /// Touching spans (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Local calendar day of the start.
    pub fn first_day(&self, tz: Tz) -> NaiveDate {
        local_date(self.start, tz)
    }

    /// Local calendar day of the last instant inside the span.
    ///
    /// An empty span ends on the day it starts.
    pub fn last_day(&self, tz: Tz) -> NaiveDate {
        let last = (self.end - Duration::nanoseconds(1)).max(self.start);
        local_date(last, tz)
    }

    pub fn crosses_day(&self, tz: Tz) -> bool {
        self.first_day(tz) != self.last_day(tz)
    }
}

impl TimeEnvelope for Span {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn duration(&self) -> Duration {
        self.end - self.start
    }

    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// The calendar date of `instant` in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The first instant of `day` in `tz`.
pub fn day_start(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    resolve_local(tz, day.and_time(NaiveTime::MIN), DstPolicy::ShiftForward)
}

/// The first instant after `day` in `tz`.
pub fn day_end(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    match day.succ_opt() {
        Some(next) => day_start(next, tz),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Serde adapter storing a [`Duration`] as whole minutes.
pub mod minutes {
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let minutes = i64::deserialize(deserializer)?;
        Duration::try_minutes(minutes)
            .ok_or_else(|| D::Error::custom(format!("duration out of range: {minutes} minutes")))
    }
}
