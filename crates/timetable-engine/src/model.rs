//! The event and the schedulable objects placed inside it.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::envelope::{local_date, minutes, Span, TimeEnvelope};
use crate::error::{Result, ValidationError};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a timetable entry.
    EntryId,
    "entry"
);
id_type!(
    /// Identifies a session block.
    BlockId,
    "block"
);
id_type!(
    /// Identifies a contribution (talk).
    ContributionId,
    "contribution"
);
id_type!(
    /// Identifies a session; blocks belong to one, contributions may.
    SessionId,
    "session"
);

/// Anything whose times can change: the event itself or a schedulable object.
///
/// Breaks are owned by their entry, so they are identified through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum ObjectRef {
    Event,
    SessionBlock(BlockId),
    Contribution(ContributionId),
    Break(EntryId),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Event => f.write_str("event"),
            ObjectRef::SessionBlock(id) => write!(f, "{id}"),
            ObjectRef::Contribution(id) => write!(f, "{id}"),
            ObjectRef::Break(entry) => write!(f, "break at {entry}"),
        }
    }
}

/// The conference. Its range is the implicit parent of every top-level entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: Tz,
}

impl Event {
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Self> {
        if end < start {
            return Err(ValidationError::InvalidEventRange.into());
        }
        Ok(Self {
            title: title.into(),
            start,
            end,
            timezone,
        })
    }

    pub fn first_day(&self) -> NaiveDate {
        local_date(self.start, self.timezone)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.span().last_day(self.timezone)
    }

    /// Every local calendar day the event covers, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.first_day()
            .iter_days()
            .take_while(|day| *day <= self.last_day())
            .collect()
    }
}

impl TimeEnvelope for Event {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn duration(&self) -> Duration {
        self.end - self.start
    }

    fn end(&self) -> DateTime<Utc> {
        self.end
    }

    fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
        }
    }
}

/// One sitting of a session. Its children are the entries that name its entry as parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBlock {
    pub id: BlockId,
    pub session: SessionId,
    pub title: String,
    #[serde(with = "minutes")]
    pub duration: Duration,
}

/// A talk. `session_block` is set only while it is scheduled inside that block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub title: String,
    #[serde(with = "minutes")]
    pub duration: Duration,
    #[serde(default)]
    pub session: Option<SessionId>,
    #[serde(default)]
    pub session_block: Option<BlockId>,
}
