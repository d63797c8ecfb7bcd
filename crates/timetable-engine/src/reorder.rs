//! Reordering entries relative to their siblings.
//!
//! None of these grow a parent; the owning scope's auto-extension or commit-time
//! validation deals with containment. Having nothing eligible to act on is not an
//! error: the operation just reports that nothing happened.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelope::Span;
use crate::error::{Result, ValidationError};
use crate::model::EntryId;
use crate::placement;
use crate::timetable::SessionFilter;
use crate::tracking::{ChangeScope, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Swap an entry with its nearest sibling in `direction`.
///
/// `Up` picks the latest sibling ending at or before the entry's start, `Down`
/// the earliest sibling starting at or after its end. The later of the two
/// moves to where the earlier one started and the earlier one follows it
/// directly, so any gap between them ends up after the pair. Nothing happens
/// when there is no such sibling, the entry overlaps anything, or the neighbor
/// overlaps another sibling. Returns the sibling swapped with.
pub fn swap(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    direction: Direction,
    filter: SessionFilter,
) -> Result<Option<EntryId>> {
    let timetable = scope.timetable();
    if timetable.is_parallel(entry, SessionFilter::Any)? {
        debug!(%entry, "entry runs in parallel, not swapping");
        return Ok(None);
    }
    let span = timetable.span(entry)?;
    let siblings = timetable
        .siblings(entry, filter)?
        .into_iter()
        .map(|id| timetable.span(id).map(|span| (id, span)))
        .collect::<Result<Vec<_>>>()?;

    let neighbor = match direction {
        Direction::Up => siblings
            .into_iter()
            .filter(|(_, s)| s.end <= span.start)
            .max_by_key(|(id, s)| (s.end, s.start, *id)),
        Direction::Down => siblings
            .into_iter()
            .filter(|(_, s)| s.start >= span.end)
            .min_by_key(|(id, s)| (s.start, *id)),
    };
    let Some((neighbor, neighbor_span)) = neighbor else {
        return Ok(None);
    };
    if timetable.is_parallel(neighbor, filter)? {
        debug!(%entry, %neighbor, "neighbor runs in parallel, not swapping");
        return Ok(None);
    }

    let ((first, first_span), (second, second_span)) = match direction {
        Direction::Down => ((entry, span), (neighbor, neighbor_span)),
        Direction::Up => ((neighbor, neighbor_span), (entry, span)),
    };
    scope.move_entry(second, first_span.start, Origin::Direct)?;
    scope.move_entry(first, first_span.start + second_span.duration(), Origin::Direct)?;
    debug!(%entry, %neighbor, ?direction, "swapped");
    Ok(Some(neighbor))
}

/// Shift every sibling that starts at or after the entry's current end by `delta`.
///
/// Call before moving the entry itself so the entries after it keep their
/// distance instead of being overlapped. Returns the shifted siblings.
pub fn shift_following(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    delta: Duration,
    filter: SessionFilter,
) -> Result<Vec<EntryId>> {
    let timetable = scope.timetable();
    let threshold = timetable.end(entry)?;
    let following = timetable
        .siblings(entry, filter)?
        .into_iter()
        .map(|id| timetable.entry(id).map(|e| (id, e.start)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|(_, start)| *start >= threshold)
        .collect::<Vec<_>>();

    for (id, start) in &following {
        scope.move_entry(*id, *start + delta, Origin::Direct)?;
    }
    debug!(%entry, count = following.len(), minutes = delta.num_minutes(), "shifted following entries");
    Ok(following.into_iter().map(|(id, _)| id).collect())
}

/// Move an entry to `start` and shift the siblings after it by the same amount.
pub fn move_with_shift(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    start: DateTime<Utc>,
    filter: SessionFilter,
) -> Result<Vec<EntryId>> {
    let delta = start - scope.timetable().entry(entry)?.start;
    let shifted = shift_following(scope, entry, delta, filter)?;
    placement::move_entry(scope, entry, start)?;
    Ok(shifted)
}

/// Shrink-wrap a session block around its children.
///
/// Returns whether the block changed; a block without children is left alone.
pub fn fit(scope: &mut ChangeScope<'_>, block: EntryId) -> Result<bool> {
    let timetable = scope.timetable();
    if !timetable.entry(block)?.is_session_block() {
        return Err(ValidationError::NotASessionBlock(block).into());
    }
    let spans = timetable
        .children(block)
        .into_iter()
        .map(|child| timetable.span(child))
        .collect::<Result<Vec<_>>>()?;
    let (Some(start), Some(end)) = (
        spans.iter().map(|s| s.start).min(),
        spans.iter().map(|s| s.end).max(),
    ) else {
        return Ok(false);
    };
    let fitted = Span { start, end };
    if timetable.span(block)? == fitted {
        return Ok(false);
    }

    scope.set_start(block, fitted.start, Origin::Direct)?;
    scope.set_duration(block, fitted.duration(), Origin::Direct)?;
    debug!(%block, start = %fitted.start, end = %fitted.end, "fitted block");
    Ok(true)
}
