//! Rescheduling a day or a session block in one go.
//!
//! - [`RescheduleMode::Time`] lays the entries out back to back in start order,
//!   separated by the configured gap.
//! - [`RescheduleMode::Duration`] keeps every start and stretches or shrinks each
//!   entry to end `gap` before the next one starts.
//! - [`RescheduleMode::None`] only fits blocks when asked to.
//!
//! For a day, blocks are fitted to their children before the layout; for a single
//! block, the block is fitted afterward.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelope::local_date;
use crate::error::{Result, ValidationError};
use crate::model::{EntryId, SessionId};
use crate::reorder;
use crate::tracking::{ChangeScope, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleMode {
    #[default]
    None,
    Time,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleTarget {
    /// Top-level entries starting on a local day.
    Day(NaiveDate),
    /// Children of a session-block entry.
    Block(EntryId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescheduleOptions {
    pub mode: RescheduleMode,
    /// Space left between consecutive entries.
    pub gap: Duration,
    pub fit_blocks: bool,
    /// For a day, only reschedule entries of this session.
    pub session: Option<SessionId>,
}

impl Default for RescheduleOptions {
    fn default() -> Self {
        Self {
            mode: RescheduleMode::default(),
            gap: Duration::zero(),
            fit_blocks: false,
            session: None,
        }
    }
}

pub fn reschedule(
    scope: &mut ChangeScope<'_>,
    target: RescheduleTarget,
    options: &RescheduleOptions,
) -> Result<()> {
    if options.gap < Duration::zero() {
        return Err(ValidationError::NegativeDuration.into());
    }
    if let (true, RescheduleTarget::Day(_)) = (options.fit_blocks, target) {
        for entry in target_entries(scope, target, options)? {
            if scope.timetable().entry(entry)?.is_session_block() {
                reorder::fit(scope, entry)?;
            }
        }
    }

    // Fitting may have moved block starts, so collect in start order afterward.
    let entries = target_entries(scope, target, options)?;
    debug!(?target, mode = ?options.mode, count = entries.len(), "rescheduling");

    match options.mode {
        RescheduleMode::None => {}
        RescheduleMode::Time => layout_back_to_back(scope, target, &entries, options.gap)?,
        RescheduleMode::Duration => fill_until_next(scope, target, &entries, options.gap)?,
    }

    if let (true, RescheduleTarget::Block(block)) = (options.fit_blocks, target) {
        reorder::fit(scope, block)?;
    }
    Ok(())
}

fn target_entries(
    scope: &ChangeScope<'_>,
    target: RescheduleTarget,
    options: &RescheduleOptions,
) -> Result<Vec<EntryId>> {
    let timetable = scope.timetable();
    match target {
        RescheduleTarget::Day(day) => {
            let tz = timetable.timezone();
            Ok(timetable
                .top_level()
                .into_iter()
                .filter(|id| {
                    timetable
                        .entry(*id)
                        .map(|entry| local_date(entry.start, tz) == day)
                        .unwrap_or(false)
                })
                .filter(|id| {
                    options
                        .session
                        .is_none_or(|session| timetable.session_of(*id) == Some(session))
                })
                .collect())
        }
        RescheduleTarget::Block(block) => {
            if !timetable.entry(block)?.is_session_block() {
                return Err(ValidationError::NotASessionBlock(block).into());
            }
            Ok(timetable.children(block))
        }
    }
}

fn layout_back_to_back(
    scope: &mut ChangeScope<'_>,
    target: RescheduleTarget,
    entries: &[EntryId],
    gap: Duration,
) -> Result<()> {
    let Some(&first) = entries.first() else {
        return Ok(());
    };
    let mut cursor = match target {
        RescheduleTarget::Block(block) => scope.timetable().entry(block)?.start,
        RescheduleTarget::Day(_) => scope.timetable().entry(first)?.start,
    };
    for &entry in entries {
        if scope.timetable().entry(entry)?.start != cursor {
            scope.move_entry(entry, cursor, Origin::Direct)?;
        }
        cursor = scope.timetable().end(entry)? + gap;
    }
    Ok(())
}

fn fill_until_next(
    scope: &mut ChangeScope<'_>,
    target: RescheduleTarget,
    entries: &[EntryId],
    gap: Duration,
) -> Result<()> {
    for (index, &entry) in entries.iter().enumerate() {
        let timetable = scope.timetable();
        let start = timetable.entry(entry)?.start;
        let until = match (entries.get(index + 1), target) {
            (Some(&next), _) => timetable.entry(next)?.start - gap,
            (None, RescheduleTarget::Block(block)) => timetable.end(block)?,
            (None, RescheduleTarget::Day(_)) => continue,
        };
        // A block never shrinks below its contents.
        let floor = timetable
            .children(entry)
            .into_iter()
            .map(|child| timetable.end(child))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .max()
            .unwrap_or(start);
        let duration = until.max(floor) - start;
        if duration <= Duration::zero() || duration == timetable.duration(entry)? {
            continue;
        }
        scope.set_duration(entry, duration, Origin::Direct)?;
    }
    Ok(())
}
