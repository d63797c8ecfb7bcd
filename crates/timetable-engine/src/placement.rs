//! Creating, moving, reparenting, resizing and deleting entries.
//!
//! Every operation runs inside a [`ChangeScope`]. Validation errors are raised
//! before anything is mutated; containment that is not restored here is either
//! restored by the scope's auto-extension or rejected when the scope commits.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::containment;
use crate::dst::{resolve_local, DstPolicy};
use crate::entry::{EntryObject, TimetableEntry};
use crate::envelope::Span;
use crate::error::{Result, TimetableError, ValidationError};
use crate::gap::{find_earliest_gap, Container};
use crate::model::EntryId;
use crate::tracking::{ChangeScope, Origin};

/// Place `object` at `start`, optionally inside the session-block entry `parent`.
///
/// Session blocks and contributions can be attached to at most one entry. With
/// `extend`, the parent (or the event) is grown right away to contain the new entry.
pub fn schedule(
    scope: &mut ChangeScope<'_>,
    object: EntryObject,
    start: DateTime<Utc>,
    parent: Option<EntryId>,
    extend: bool,
) -> Result<EntryId> {
    let timetable = scope.timetable();
    let tz = timetable.timezone();
    let duration = timetable.object_duration(&object)?;
    let id = timetable.next_entry_id();
    let object_ref = object.object_ref(id);

    if let Some(existing) = timetable.entry_for(object_ref) {
        debug!(%object_ref, %existing, "object already scheduled");
        return Err(ValidationError::AlreadyScheduled(object_ref).into());
    }

    let is_block = matches!(object, EntryObject::SessionBlock(_));
    let parent_block = match parent {
        Some(_) if is_block => return Err(ValidationError::NestedBlock.into()),
        Some(parent) => {
            let parent_entry = timetable.entry(parent)?;
            let block = parent_entry
                .block_id()
                .ok_or(ValidationError::NotASessionBlock(parent))?;
            let session = timetable.session_of(parent);
            Some((block, session))
        }
        None => None,
    };
    if is_block && Span::new(start, duration).crosses_day(tz) {
        return Err(ValidationError::CrossesDayBoundary.into());
    }

    scope.touch(object_ref, Origin::Direct);
    let timetable = scope.timetable_mut();
    if let EntryObject::Contribution(contribution) = &object {
        let contribution = timetable.contribution_mut(*contribution)?;
        match parent_block {
            Some((block, session)) => {
                contribution.session_block = Some(block);
                contribution.session = session;
            }
            None => contribution.session_block = None,
        }
    }
    let mut entry = TimetableEntry::new(id, start, object);
    entry.parent = parent;
    timetable.insert_entry(entry);
    debug!(entry = %id, %object_ref, %start, ?parent, "scheduled");

    if extend {
        containment::extend_parent(scope, id, true, true)?;
    }
    Ok(id)
}

/// Schedule `object` at the earliest gap of `container` on `day`.
pub fn schedule_in_gap(
    scope: &mut ChangeScope<'_>,
    object: EntryObject,
    container: Container,
    day: NaiveDate,
) -> Result<EntryId> {
    let duration = scope.timetable().object_duration(&object)?;
    let slot = find_earliest_gap(scope.timetable(), container, day, duration)?.ok_or(
        ValidationError::NoSpace {
            day,
            minutes: duration.num_minutes(),
        },
    )?;
    let parent = match container {
        Container::Event => None,
        Container::Block(block) => Some(block),
    };
    schedule(scope, object, slot.start, parent, false)
}

/// Schedule several objects, each into the earliest gap left by the ones before it.
///
/// Fails on the first object that does not fit; the scope then rolls everything back.
pub fn schedule_many(
    scope: &mut ChangeScope<'_>,
    objects: impl IntoIterator<Item = EntryObject>,
    container: Container,
    day: NaiveDate,
) -> Result<Vec<EntryId>> {
    let mut scheduled = Vec::new();
    for object in objects {
        scheduled.push(schedule_in_gap(scope, object, container, day)?);
    }
    Ok(scheduled)
}

/// Relocate an entry; a session block carries its children along.
///
/// The parent and the event are not grown.
pub fn move_entry(scope: &mut ChangeScope<'_>, entry: EntryId, start: DateTime<Utc>) -> Result<()> {
    let timetable = scope.timetable();
    let tz = timetable.timezone();
    if timetable.entry(entry)?.is_session_block()
        && Span::new(start, timetable.duration(entry)?).crosses_day(tz)
    {
        return Err(ValidationError::CrossesDayBoundary.into());
    }
    scope.move_entry(entry, start, Origin::Direct)
}

/// Move an entry to the same local time of day on `day`, as a top-level entry.
///
/// A contribution loses its session and session-block association.
pub fn move_to_day(scope: &mut ChangeScope<'_>, entry: EntryId, day: NaiveDate) -> Result<()> {
    let timetable = scope.timetable();
    let tz = timetable.timezone();
    let current = timetable.entry(entry)?;
    let time_of_day = current.start.with_timezone(&tz).time();
    let contribution = current.contribution_id();
    let start = resolve_local(tz, day.and_time(time_of_day), DstPolicy::default());
    if current.is_session_block() && Span::new(start, timetable.duration(entry)?).crosses_day(tz) {
        return Err(ValidationError::CrossesDayBoundary.into());
    }

    scope.move_entry(entry, start, Origin::Direct)?;
    let timetable = scope.timetable_mut();
    timetable.entry_mut(entry)?.parent = None;
    if let Some(contribution) = contribution {
        let contribution = timetable.contribution_mut(contribution)?;
        contribution.session = None;
        contribution.session_block = None;
    }
    debug!(%entry, %day, "moved to day");
    Ok(())
}

/// Append an entry to the session-block entry `new_parent`, after its latest child.
///
/// The block is lengthened if the entry runs past its end; nothing above the block
/// is touched.
pub fn move_to_parent(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    new_parent: EntryId,
) -> Result<()> {
    let timetable = scope.timetable();
    let tz = timetable.timezone();
    if timetable.entry(entry)?.is_session_block() {
        return Err(ValidationError::NestedBlock.into());
    }
    let block = timetable
        .entry(new_parent)?
        .block_id()
        .ok_or(ValidationError::NotASessionBlock(new_parent))?;
    let parent_span = timetable.span(new_parent)?;
    let session = timetable.session_of(new_parent);

    let latest_end = timetable
        .children(new_parent)
        .into_iter()
        .filter(|child| *child != entry)
        .map(|child| timetable.end(child))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .max();
    let start = latest_end.unwrap_or(parent_span.start);
    let span = Span::new(start, timetable.duration(entry)?);
    if span.crosses_day(tz) || span.first_day(tz) != parent_span.first_day(tz) {
        return Err(ValidationError::CrossesDayBoundary.into());
    }
    let contribution = timetable.entry(entry)?.contribution_id();

    scope.move_entry(entry, start, Origin::Direct)?;
    let timetable = scope.timetable_mut();
    timetable.entry_mut(entry)?.parent = Some(new_parent);
    if let Some(contribution) = contribution {
        let contribution = timetable.contribution_mut(contribution)?;
        contribution.session = session;
        contribution.session_block = Some(block);
    }
    containment::grow_parent_end(scope, entry)?;
    debug!(%entry, parent = %new_parent, "moved into block");
    Ok(())
}

/// Unschedule an entry.
///
/// A break is destroyed with its entry; a contribution or session block becomes
/// unscheduled. Deleting a session block's entry unschedules its children first.
pub fn delete(scope: &mut ChangeScope<'_>, entry: EntryId) -> Result<()> {
    for child in scope.timetable().children(entry) {
        delete_one(scope, child)?;
    }
    delete_one(scope, entry)
}

fn delete_one(scope: &mut ChangeScope<'_>, entry: EntryId) -> Result<()> {
    scope.touch_entry(entry, Origin::Direct)?;
    let timetable = scope.timetable_mut();
    let mut removed = timetable
        .remove_entry(entry)
        .ok_or(TimetableError::EntryNotFound(entry))?;
    if let Some(EntryObject::Contribution(contribution)) = removed.clear_object() {
        timetable.contribution_mut(contribution)?.session_block = None;
    }
    debug!(%entry, "deleted");
    Ok(())
}

/// Give an entry a new start and duration.
///
/// - A session block is widened as needed to keep containing all its children.
/// - A child entry pushes colliding siblings outward: those that ended before its
///   old start move earlier, those that started after its old end move later. The
///   block is then extended to contain everything that moved.
/// - A top-level contribution or break takes the new times as given.
pub fn resize(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    start: DateTime<Utc>,
    duration: Duration,
) -> Result<()> {
    if duration < Duration::zero() {
        return Err(ValidationError::NegativeDuration.into());
    }
    let timetable = scope.timetable();
    let tz = timetable.timezone();
    let current = timetable.entry(entry)?;
    let requested = Span::new(start, duration);

    if current.is_session_block() {
        let mut span = requested;
        for child in timetable.children(entry) {
            let child_span = timetable.span(child)?;
            span.start = span.start.min(child_span.start);
            span.end = span.end.max(child_span.end);
        }
        if span.crosses_day(tz) {
            return Err(ValidationError::CrossesDayBoundary.into());
        }
        scope.set_start(entry, span.start, Origin::Direct)?;
        return scope.set_duration(entry, span.duration(), Origin::Direct);
    }

    let Some(parent) = current.parent else {
        scope.set_start(entry, start, Origin::Direct)?;
        return scope.set_duration(entry, duration, Origin::Direct);
    };

    let old = timetable.span(entry)?;
    let siblings = timetable
        .children(parent)
        .into_iter()
        .filter(|child| *child != entry)
        .map(|child| timetable.span(child).map(|span| (child, span)))
        .collect::<Result<Vec<_>>>()?;
    let collides = siblings.iter().any(|(_, span)| span.overlaps(&requested));

    scope.set_start(entry, start, Origin::Direct)?;
    scope.set_duration(entry, duration, Origin::Direct)?;
    let mut changed = vec![entry];

    if collides {
        // Earlier siblings, walked backwards from the resized entry.
        let mut boundary = requested.start;
        for (sibling, span) in siblings.iter().rev().filter(|(_, s)| s.end <= old.start) {
            if boundary < span.end {
                let shifted = span.start - (span.end - boundary);
                scope.move_entry(*sibling, shifted, Origin::Direct)?;
                changed.push(*sibling);
                boundary = shifted;
            } else {
                boundary = span.start;
            }
        }
        // Later siblings, walked forwards.
        let mut boundary = requested.end;
        for (sibling, span) in siblings.iter().filter(|(_, s)| s.start >= old.end) {
            if boundary > span.start {
                scope.move_entry(*sibling, boundary, Origin::Direct)?;
                changed.push(*sibling);
                boundary += span.duration();
            } else {
                boundary = span.end;
            }
        }
    }

    for id in changed {
        containment::extend_parent(scope, id, true, true)?;
    }
    Ok(())
}
