//! Finding the earliest free interval inside a container on a given day.
//!
//! Walks the container's entries in start order with a candidate window. Every
//! entry overlapping the candidate pushes it to that entry's end. The first
//! candidate that fits inside the container without running into the next
//! local day wins.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::envelope::{day_end, day_start, Span, TimeEnvelope};
use crate::error::{Result, ValidationError};
use crate::model::EntryId;
use crate::timetable::Timetable;

/// Where to look for room: the event's top level or inside a session block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Event,
    Block(EntryId),
}

/// The container's bounds on `day`, or `None` when the container does not cover that day.
///
/// On the container's first day the window opens at its actual start, on later
/// days at local midnight. It closes at the container's end or the next local
/// midnight, whichever comes first.
pub fn day_window(timetable: &Timetable, container: Container, day: NaiveDate) -> Result<Option<Span>> {
    let tz = timetable.timezone();
    let bounds = container_span(timetable, container)?;
    let first_day = bounds.first_day(tz);
    if day < first_day || day > bounds.last_day(tz) {
        return Ok(None);
    }
    let opening = if day == first_day {
        bounds.start
    } else {
        day_start(day, tz)
    };
    let closing = bounds.end.min(day_end(day, tz));
    Ok(Some(Span {
        start: opening,
        end: closing,
    }))
}

/// Earliest free `[start, start + duration)` in `container` on `day`.
///
/// The result never overlaps an existing entry of the container, lies within the
/// container, and stays on `day`. `None` when nothing fits.
pub fn find_earliest_gap(
    timetable: &Timetable,
    container: Container,
    day: NaiveDate,
    duration: Duration,
) -> Result<Option<Span>> {
    let Some(window) = day_window(timetable, container, day)? else {
        return Ok(None);
    };

    let mut busy = occupied(timetable, container)?
        .into_iter()
        .filter(|span| span.overlaps(&window))
        .collect::<Vec<_>>();
    busy.sort_by_key(|span| (span.start, span.end));

    let mut candidate = window.start;
    for span in &busy {
        if candidate + duration <= span.start {
            // Sorted by start: nothing later can reach back into the candidate.
            break;
        }
        if span.end > candidate {
            candidate = span.end;
        }
    }

    let slot = Span::new(candidate, duration);
    Ok(window.contains(&slot).then_some(slot))
}

fn container_span(timetable: &Timetable, container: Container) -> Result<Span> {
    match container {
        Container::Event => Ok(timetable.event.span()),
        Container::Block(id) => {
            if !timetable.entry(id)?.is_session_block() {
                return Err(ValidationError::NotASessionBlock(id).into());
            }
            timetable.span(id)
        }
    }
}

fn occupied(timetable: &Timetable, container: Container) -> Result<Vec<Span>> {
    let ids = match container {
        Container::Event => timetable.top_level(),
        Container::Block(id) => timetable.children(id),
    };
    ids.into_iter().map(|id| timetable.span(id)).collect()
}
