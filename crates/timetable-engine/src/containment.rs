//! Keeping every entry inside its parent.
//!
//! [`extend_parent`] is the one routine that restores containment by growing
//! envelopes: a session block for its children, the event for top-level entries.
//! Growing a block can push it outside the event, so extension recurses upward.

use tracing::debug;

use crate::envelope::{Span, TimeEnvelope};
use crate::error::Result;
use crate::model::EntryId;
use crate::tracking::{ChangeScope, Origin};

/// Grow the parent of `entry` (block or event) so it contains the entry.
///
/// With `by_start`, a parent starting after the entry has its start pulled back
/// and its duration grown so its end stays put. With `by_end`, a parent ending
/// before the entry is lengthened. An entry spanning two local days never
/// triggers extension.
pub fn extend_parent(
    scope: &mut ChangeScope<'_>,
    entry: EntryId,
    by_start: bool,
    by_end: bool,
) -> Result<()> {
    let tz = scope.timetable().timezone();
    let span = scope.timetable().span(entry)?;
    if span.crosses_day(tz) {
        debug!(%entry, "entry crosses a day boundary, not extending");
        return Ok(());
    }

    let Some(parent) = scope.timetable().entry(entry)?.parent else {
        extend_event(scope, span, by_start, by_end);
        return Ok(());
    };

    let mut parent_span = scope.timetable().span(parent)?;
    let mut extended = false;
    if by_start && span.start < parent_span.start {
        scope.set_start(parent, span.start, Origin::Extension)?;
        scope.set_duration(parent, parent_span.end - span.start, Origin::Extension)?;
        parent_span.start = span.start;
        extended = true;
    }
    if by_end && span.end > parent_span.end {
        scope.set_duration(parent, span.end - parent_span.start, Origin::Extension)?;
        extended = true;
    }
    if extended {
        debug!(%entry, %parent, "extended parent block");
        extend_parent(scope, parent, by_start, by_end)?;
    }
    Ok(())
}

/// Grow the event to contain `span`. Returns whether anything changed.
pub fn extend_event(scope: &mut ChangeScope<'_>, span: Span, by_start: bool, by_end: bool) -> bool {
    let mut event_span = scope.timetable().event.span();
    let before = event_span;
    if by_start && span.start < event_span.start {
        event_span.start = span.start;
    }
    if by_end && span.end > event_span.end {
        event_span.end = span.end;
    }
    if event_span == before {
        return false;
    }
    scope.set_event_span(event_span);
    true
}

/// Lengthen `parent` so it ends no earlier than `entry`, one level only.
///
/// Used when reparenting appends an entry at the end of a block; the block's
/// start is never moved and nothing above the block is touched.
pub fn grow_parent_end(scope: &mut ChangeScope<'_>, entry: EntryId) -> Result<bool> {
    let Some(parent) = scope.timetable().entry(entry)?.parent else {
        return Ok(false);
    };
    let end = scope.timetable().end(entry)?;
    let parent_span = scope.timetable().span(parent)?;
    if end <= parent_span.end {
        return Ok(false);
    }
    scope.set_duration(parent, end - parent_span.start, Origin::Extension)?;
    Ok(true)
}
