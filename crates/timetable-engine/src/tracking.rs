//! Change-tracking scope: the unit of work every timetable operation runs in.
//!
//! A [`ChangeScope`] borrows the [`Timetable`] mutably for its whole life, so a
//! second scope cannot be opened while one is alive. The first time an object is
//! touched its times are recorded; later touches keep that original. On
//! [`ChangeScope::commit`]:
//!
//! 1. with auto-extension enabled, every touched entry's parents are extended to contain it,
//! 2. every object that was only touched as a side effect of extension is checked
//!    against the [`Authorizer`],
//! 3. the timetable is validated,
//! 4. a [`ChangeRecord`] is produced (and listeners notified) once per object whose
//!    times actually changed.
//!
//! Any failure, or dropping the scope without committing, restores the timetable as
//! it was when the scope was opened.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::containment;
use crate::envelope::{local_date, minutes, Span, TimeEnvelope};
use crate::error::{Result, TimetableError};
use crate::model::{EntryId, ObjectRef};
use crate::timetable::Timetable;

/// The predicate consulted before a cascade grows an object the caller did not target.
pub trait Authorizer {
    fn can_manage(&self, principal: &str, object: ObjectRef) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&str, ObjectRef) -> bool,
{
    fn can_manage(&self, principal: &str, object: ObjectRef) -> bool {
        self(principal, object)
    }
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_manage(&self, _principal: &str, _object: ObjectRef) -> bool {
        true
    }
}

/// Start, duration and end of an object at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSnapshot {
    pub start: DateTime<Utc>,
    #[serde(with = "minutes")]
    pub duration: Duration,
    pub end: DateTime<Utc>,
}

impl TimeSnapshot {
    pub fn of(envelope: &impl TimeEnvelope) -> Self {
        Self {
            start: envelope.start(),
            duration: envelope.duration(),
            end: envelope.end(),
        }
    }
}

/// Old and new times of one object. `None` means unscheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub object: ObjectRef,
    pub old: Option<TimeSnapshot>,
    pub new: Option<TimeSnapshot>,
}

impl ChangeRecord {
    /// How far the start moved, when the object was scheduled before and after.
    pub fn shift(&self) -> Option<Duration> {
        match (self.old, self.new) {
            (Some(old), Some(new)) => Some(new.start - old.start),
            _ => None,
        }
    }
}

/// Every object whose times changed within one committed scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeReport {
    records: Vec<ChangeRecord>,
}

impl ChangeReport {
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, object: ObjectRef) -> Option<&ChangeRecord> {
        self.records.iter().find(|record| record.object == object)
    }

    /// Number of changed objects besides `target` ("N other entries were moved").
    pub fn others(&self, target: ObjectRef) -> usize {
        self.records
            .iter()
            .filter(|record| record.object != target)
            .count()
    }
}

/// Why an object entered the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Changed by the operation itself.
    Direct,
    /// Grown only to keep a child contained.
    Extension,
}

#[derive(Debug, Clone, Copy)]
struct Original {
    before: Option<TimeSnapshot>,
    origin: Origin,
}

type Listener<'a> = Box<dyn FnMut(&ChangeRecord) + 'a>;

pub struct ChangeScope<'a> {
    timetable: &'a mut Timetable,
    principal: String,
    authorizer: &'a dyn Authorizer,
    auto_extend: bool,
    originals: BTreeMap<ObjectRef, Original>,
    listener: Option<Listener<'a>>,
    rollback: Option<Timetable>,
}

impl Timetable {
    /// Open a change-tracking scope acting as `principal`.
    pub fn track_changes<'a>(
        &'a mut self,
        principal: impl Into<String>,
        authorizer: &'a dyn Authorizer,
    ) -> ChangeScope<'a> {
        ChangeScope::open(self, principal, authorizer)
    }
}

impl<'a> ChangeScope<'a> {
    pub fn open(
        timetable: &'a mut Timetable,
        principal: impl Into<String>,
        authorizer: &'a dyn Authorizer,
    ) -> Self {
        let rollback = Some(timetable.clone());
        Self {
            timetable,
            principal: principal.into(),
            authorizer,
            auto_extend: false,
            originals: BTreeMap::new(),
            listener: None,
            rollback,
        }
    }

    /// Extend parents of every touched entry on commit.
    pub fn with_auto_extend(mut self, enabled: bool) -> Self {
        self.auto_extend = enabled;
        self
    }

    /// Called once per changed object when the scope commits.
    pub fn on_change(mut self, listener: impl FnMut(&ChangeRecord) + 'a) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn timetable(&self) -> &Timetable {
        self.timetable
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn auto_extend(&self) -> bool {
        self.auto_extend
    }

    /// Objects touched so far, in key order.
    pub fn touched(&self) -> Vec<ObjectRef> {
        self.originals.keys().copied().collect()
    }

    /// Times of `object` when it was first touched in this scope.
    pub fn original(&self, object: ObjectRef) -> Option<TimeSnapshot> {
        self.originals.get(&object).and_then(|original| original.before)
    }

    pub(crate) fn timetable_mut(&mut self) -> &mut Timetable {
        self.timetable
    }

    pub(crate) fn touch(&mut self, object: ObjectRef, origin: Origin) {
        if self.originals.contains_key(&object) {
            return;
        }
        let before = self.timetable.snapshot(object);
        debug!(%object, ?origin, "tracking object");
        self.originals.insert(object, Original { before, origin });
    }

    pub(crate) fn touch_entry(&mut self, id: EntryId, origin: Origin) -> Result<ObjectRef> {
        let object = self
            .timetable
            .entry(id)?
            .object_ref()
            .ok_or(TimetableError::EntryNotFound(id))?;
        self.touch(object, origin);
        Ok(object)
    }

    /// Move an entry; a block's children move along and are tracked too.
    pub(crate) fn move_entry(
        &mut self,
        id: EntryId,
        start: DateTime<Utc>,
        origin: Origin,
    ) -> Result<()> {
        self.touch_entry(id, origin)?;
        for child in self.timetable.children(id) {
            self.touch_entry(child, origin)?;
        }
        debug!(entry = %id, %start, "moving entry");
        self.timetable.move_entry(id, start)
    }

    /// Change the start only; children stay where they are.
    pub(crate) fn set_start(
        &mut self,
        id: EntryId,
        start: DateTime<Utc>,
        origin: Origin,
    ) -> Result<()> {
        self.touch_entry(id, origin)?;
        self.timetable.set_start(id, start)
    }

    pub(crate) fn set_duration(
        &mut self,
        id: EntryId,
        duration: Duration,
        origin: Origin,
    ) -> Result<()> {
        self.touch_entry(id, origin)?;
        debug!(entry = %id, minutes = duration.num_minutes(), "resizing entry");
        self.timetable.set_duration(id, duration)
    }

    /// Grow the event to `span`; the event is only ever changed by extension.
    pub(crate) fn set_event_span(&mut self, span: Span) {
        self.touch(ObjectRef::Event, Origin::Extension);
        debug!(start = %span.start, end = %span.end, "extending event");
        let event = self.timetable.event_mut();
        event.start = span.start;
        event.end = span.end;
    }

    /// Finish the unit of work; see the module docs for the steps.
    pub fn commit(mut self) -> Result<ChangeReport> {
        if self.auto_extend {
            self.extend_touched()?;
        }
        self.authorize()?;

        let violations = self.timetable.validate();
        if !violations.is_empty() {
            warn!(count = violations.len(), "timetable inconsistent at commit, rolling back");
            return Err(TimetableError::Integrity(violations));
        }

        let report = self.report();
        for record in report.iter() {
            info!(object = %record.object, shift_minutes = ?record.shift().map(|d| d.num_minutes()), "times changed");
            if let Some(listener) = self.listener.as_mut() {
                listener(record);
            }
        }
        self.rollback = None;
        Ok(report)
    }

    /// Discard every change made in this scope.
    pub fn rollback(self) {}

    fn extend_touched(&mut self) -> Result<()> {
        let tz = self.timetable.timezone();
        let touched: Vec<(ObjectRef, Option<TimeSnapshot>)> = self
            .originals
            .iter()
            .filter(|(object, _)| **object != ObjectRef::Event)
            .map(|(object, original)| (*object, original.before))
            .collect();
        for (object, before) in touched {
            let Some(entry) = self.timetable.entry_for(object) else {
                continue;
            };
            if let Some(before) = before {
                let now = self.timetable.span(entry)?;
                if local_date(before.start, tz) != now.first_day(tz) {
                    debug!(%object, "moved to another day, not extending parents");
                    continue;
                }
            }
            containment::extend_parent(self, entry, true, true)?;
        }
        Ok(())
    }

    fn authorize(&self) -> Result<()> {
        for (object, original) in &self.originals {
            if original.origin != Origin::Extension {
                continue;
            }
            if self.timetable.snapshot(*object) == original.before {
                continue;
            }
            if !self.authorizer.can_manage(&self.principal, *object) {
                warn!(%object, principal = %self.principal, "cascade would change an object the principal cannot manage");
                return Err(TimetableError::Unauthorized(*object));
            }
        }
        Ok(())
    }

    fn report(&self) -> ChangeReport {
        let records = self
            .originals
            .iter()
            .filter_map(|(object, original)| {
                let new = self.timetable.snapshot(*object);
                (new != original.before).then_some(ChangeRecord {
                    object: *object,
                    old: original.before,
                    new,
                })
            })
            .collect();
        ChangeReport { records }
    }
}

impl Drop for ChangeScope<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.rollback.take() {
            debug!("change scope closed without commit, restoring timetable");
            *self.timetable = original;
        }
    }
}
