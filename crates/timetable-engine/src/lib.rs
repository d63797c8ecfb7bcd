//! # timetable-engine
//!
//! Placement engine for conference timetables.
//!
//! Session blocks, contributions (talks) and breaks are placed on a time axis
//! inside an event. The engine keeps every entry inside its parent block (and
//! every top-level entry inside the event), never nests blocks, keeps blocks on a
//! single local day, and provides the algorithms that move, swap, shift, fit and
//! reschedule entries while those rules keep holding.
//!
//! Every mutating operation runs inside a [`ChangeScope`], which records the
//! original times of everything it touches, optionally grows parents to contain
//! their children, checks cascades against an [`Authorizer`], validates the whole
//! timetable and either commits with a [`ChangeReport`] or rolls back.
//!
//! ## Modules
//!
//! - [`envelope`]: start/duration/end, spans and local-day bucketing
//! - [`dst`]: resolving wall-clock times across DST transitions
//! - [`model`]: event, session blocks, contributions and their ids
//! - [`entry`]: timetable entries and the objects they place
//! - [`timetable`]: the aggregate holding all of the above
//! - [`tracking`]: change-tracking scope, change reports, authorization hook
//! - [`containment`]: extending parents to contain their children
//! - [`gap`]: earliest free slot in the event or a block
//! - [`placement`]: schedule, move, reparent, resize, delete
//! - [`reorder`]: swap, shift following entries, fit a block
//! - [`reschedule`]: lay out a day or block back to back
//! - [`validate`]: commit-time invariant check
//! - [`error`]: Error types

pub mod containment;
pub mod dst;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod gap;
pub mod model;
pub mod placement;
pub mod reorder;
pub mod reschedule;
pub mod timetable;
pub mod tracking;
pub mod validate;

pub use entry::{Break, EntryKind, EntryObject, TimetableEntry};
pub use envelope::{Span, TimeEnvelope};
pub use error::{TimetableError, ValidationError};
pub use gap::{find_earliest_gap, Container};
pub use model::{BlockId, ContributionId, EntryId, Event, ObjectRef, SessionId};
pub use reorder::Direction;
pub use reschedule::{RescheduleMode, RescheduleOptions, RescheduleTarget};
pub use timetable::{SessionFilter, Timetable};
pub use tracking::{AllowAll, Authorizer, ChangeRecord, ChangeReport, ChangeScope, TimeSnapshot};
pub use validate::Violation;
