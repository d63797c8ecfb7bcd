//! Error types for timetable operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::entry::EntryKind;
use crate::model::{EntryId, ObjectRef};
use crate::validate::Violation;

#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not authorized to manage {0}")]
    Unauthorized(ObjectRef),

    #[error("Timetable integrity violated ({} violations): {}", .0.len(), first_violation(.0))]
    Integrity(Vec<Violation>),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectRef),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// User-correctable problems, reported before anything is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entry would cross a day boundary")]
    CrossesDayBoundary,

    #[error("{0} is already scheduled")]
    AlreadyScheduled(ObjectRef),

    #[error("session blocks cannot be nested inside other entries")]
    NestedBlock,

    #[error("entry {0} is not a session block")]
    NotASessionBlock(EntryId),

    #[error("no free slot of {minutes} minutes on {day}")]
    NoSpace { day: NaiveDate, minutes: i64 },

    #[error("cannot change entry kind from {from:?} to {to:?}")]
    KindChange { from: EntryKind, to: EntryKind },

    #[error("event must not end before it starts")]
    InvalidEventRange,

    #[error("duration must not be negative")]
    NegativeDuration,
}

fn first_violation(violations: &[Violation]) -> String {
    violations
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, TimetableError>;
