//! The in-memory unit of work: one event with its objects and entries.
//!
//! Read access is public. Mutations that move things on the time axis are
//! crate-private and reached through a [`crate::tracking::ChangeScope`], so every
//! change is recorded.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::entry::{EntryKind, EntryObject, TimetableEntry};
use crate::envelope::{local_date, Span, TimeEnvelope};
use crate::error::{Result, TimetableError, ValidationError};
use crate::model::{
    BlockId, Contribution, ContributionId, EntryId, Event, ObjectRef, SessionBlock, SessionId,
};
use crate::tracking::TimeSnapshot;
use crate::validate::{self, Violation};

/// Restricts sibling lookups to entries of the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFilter {
    #[default]
    Any,
    SameSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub event: Event,
    #[serde(default)]
    blocks: BTreeMap<BlockId, SessionBlock>,
    #[serde(default)]
    contributions: BTreeMap<ContributionId, Contribution>,
    #[serde(default)]
    entries: BTreeMap<EntryId, TimetableEntry>,
    #[serde(default)]
    issued: IssuedIds,
}

/// Highest id ever handed out per kind.
///
/// Ids are never reused after a delete, so a break scheduled in the same scope
/// as another one is deleted gets an identity of its own. Files written without
/// this record fall back to the largest id they contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IssuedIds {
    #[serde(default)]
    block: u64,
    #[serde(default)]
    contribution: u64,
    #[serde(default)]
    entry: u64,
}

fn next_id(issued: u64, largest: Option<u64>) -> u64 {
    largest.map_or(issued, |largest| issued.max(largest)) + 1
}

/// One local day of the timetable, top-level entries in start order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayView {
    pub day: NaiveDate,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    pub id: EntryId,
    pub kind: EntryKind,
    pub title: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntryView>,
}

impl Timetable {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            blocks: BTreeMap::new(),
            contributions: BTreeMap::new(),
            entries: BTreeMap::new(),
            issued: IssuedIds::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn timezone(&self) -> Tz {
        self.event.timezone
    }

    // ── Objects ─────────────────────────────────────────────────────────────

    /// Register an unscheduled session block.
    pub fn add_session_block(
        &mut self,
        session: SessionId,
        title: impl Into<String>,
        duration: Duration,
    ) -> BlockId {
        let id = BlockId(next_id(self.issued.block, self.blocks.keys().next_back().map(|id| id.0)));
        self.issued.block = id.0;
        self.blocks.insert(
            id,
            SessionBlock {
                id,
                session,
                title: title.into(),
                duration,
            },
        );
        id
    }

    /// Register an unscheduled contribution.
    pub fn add_contribution(
        &mut self,
        title: impl Into<String>,
        duration: Duration,
        session: Option<SessionId>,
    ) -> ContributionId {
        let id = ContributionId(next_id(
            self.issued.contribution,
            self.contributions.keys().next_back().map(|id| id.0),
        ));
        self.issued.contribution = id.0;
        self.contributions.insert(
            id,
            Contribution {
                id,
                title: title.into(),
                duration,
                session,
                session_block: None,
            },
        );
        id
    }

    pub fn block(&self, id: BlockId) -> Option<&SessionBlock> {
        self.blocks.get(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &SessionBlock> {
        self.blocks.values()
    }

    pub fn contribution(&self, id: ContributionId) -> Option<&Contribution> {
        self.contributions.get(&id)
    }

    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions.values()
    }

    pub(crate) fn contribution_mut(&mut self, id: ContributionId) -> Result<&mut Contribution> {
        self.contributions
            .get_mut(&id)
            .ok_or(TimetableError::ObjectNotFound(ObjectRef::Contribution(id)))
    }

    pub(crate) fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    // ── Entries ─────────────────────────────────────────────────────────────

    /// All stored entry records, including cleared ones loaded from storage.
    pub fn entries(&self) -> impl Iterator<Item = &TimetableEntry> {
        self.entries.values()
    }

    /// A live entry. Cleared entries count as deleted and are not found.
    pub fn entry(&self, id: EntryId) -> Result<&TimetableEntry> {
        self.entries
            .get(&id)
            .filter(|entry| !entry.is_deleted())
            .ok_or(TimetableError::EntryNotFound(id))
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> Result<&mut TimetableEntry> {
        self.entries
            .get_mut(&id)
            .filter(|entry| !entry.is_deleted())
            .ok_or(TimetableError::EntryNotFound(id))
    }

    /// The id the next inserted entry gets.
    pub(crate) fn next_entry_id(&self) -> EntryId {
        EntryId(next_id(self.issued.entry, self.entries.keys().next_back().map(|id| id.0)))
    }

    pub(crate) fn insert_entry(&mut self, entry: TimetableEntry) {
        self.issued.entry = self.issued.entry.max(entry.id.0);
        self.entries.insert(entry.id, entry);
    }

    pub(crate) fn remove_entry(&mut self, id: EntryId) -> Option<TimetableEntry> {
        self.entries.remove(&id)
    }

    /// The live entry placing `object`, if it is scheduled.
    pub fn entry_for(&self, object: ObjectRef) -> Option<EntryId> {
        match object {
            ObjectRef::Event => None,
            ObjectRef::Break(id) => self
                .entry(id)
                .ok()
                .filter(|entry| entry.break_object().is_some())
                .map(|entry| entry.id),
            ObjectRef::SessionBlock(_) | ObjectRef::Contribution(_) => self
                .live_entries()
                .find(|entry| entry.object_ref() == Some(object))
                .map(|entry| entry.id),
        }
    }

    fn live_entries(&self) -> impl Iterator<Item = &TimetableEntry> {
        self.entries.values().filter(|entry| !entry.is_deleted())
    }

    pub fn object_duration(&self, object: &EntryObject) -> Result<Duration> {
        match object {
            EntryObject::SessionBlock(id) => self
                .blocks
                .get(id)
                .map(|block| block.duration)
                .ok_or(TimetableError::ObjectNotFound(ObjectRef::SessionBlock(*id))),
            EntryObject::Contribution(id) => self
                .contributions
                .get(id)
                .map(|contribution| contribution.duration)
                .ok_or(TimetableError::ObjectNotFound(ObjectRef::Contribution(*id))),
            EntryObject::Break(brk) => Ok(brk.duration),
        }
    }

    pub fn duration(&self, id: EntryId) -> Result<Duration> {
        let entry = self.entry(id)?;
        let object = entry.object().ok_or(TimetableError::EntryNotFound(id))?;
        self.object_duration(object)
    }

    /// The entry's `[start, start + duration)`.
    pub fn span(&self, id: EntryId) -> Result<Span> {
        let start = self.entry(id)?.start;
        Ok(Span::new(start, self.duration(id)?))
    }

    pub fn end(&self, id: EntryId) -> Result<DateTime<Utc>> {
        Ok(self.span(id)?.end)
    }

    /// Current times of `object`; `None` for an unscheduled object.
    pub fn snapshot(&self, object: ObjectRef) -> Option<TimeSnapshot> {
        match object {
            ObjectRef::Event => Some(TimeSnapshot::of(&self.event.span())),
            _ => self
                .entry_for(object)
                .and_then(|id| self.span(id).ok())
                .map(|span| TimeSnapshot::of(&span)),
        }
    }

    pub fn title(&self, id: EntryId) -> Result<String> {
        let entry = self.entry(id)?;
        let title = match entry.object() {
            Some(EntryObject::SessionBlock(block)) => self.blocks.get(block).map(|b| b.title.clone()),
            Some(EntryObject::Contribution(contribution)) => self
                .contributions
                .get(contribution)
                .map(|c| c.title.clone()),
            Some(EntryObject::Break(brk)) => Some(brk.title.clone()),
            None => None,
        };
        title.ok_or(TimetableError::EntryNotFound(id))
    }

    /// Children of a session-block entry ordered by start; empty for other kinds.
    pub fn children(&self, id: EntryId) -> Vec<EntryId> {
        let is_block = self.entry(id).map(|e| e.is_session_block()).unwrap_or(false);
        if !is_block {
            return Vec::new();
        }
        let mut children: Vec<&TimetableEntry> = self
            .live_entries()
            .filter(|entry| entry.parent == Some(id))
            .collect();
        children.sort_by_key(|entry| (entry.start, entry.id));
        children.into_iter().map(|entry| entry.id).collect()
    }

    /// Entries without a parent, ordered by start.
    pub fn top_level(&self) -> Vec<EntryId> {
        let mut top: Vec<&TimetableEntry> = self
            .live_entries()
            .filter(|entry| entry.parent.is_none())
            .collect();
        top.sort_by_key(|entry| (entry.start, entry.id));
        top.into_iter().map(|entry| entry.id).collect()
    }

    /// The session an entry belongs to. Breaks inherit it from their block.
    pub fn session_of(&self, id: EntryId) -> Option<SessionId> {
        let entry = self.entry(id).ok()?;
        match entry.object()? {
            EntryObject::SessionBlock(block) => self.blocks.get(block).map(|b| b.session),
            EntryObject::Contribution(contribution) => self
                .contributions
                .get(contribution)
                .and_then(|c| c.session),
            EntryObject::Break(_) => entry.parent.and_then(|parent| self.session_of(parent)),
        }
    }

    /// Entries with the same parent that start on the same local day, ordered by start.
    pub fn siblings(&self, id: EntryId, filter: SessionFilter) -> Result<Vec<EntryId>> {
        let entry = self.entry(id)?;
        let tz = self.timezone();
        let day = local_date(entry.start, tz);
        let session = self.session_of(id);
        let mut siblings: Vec<&TimetableEntry> = self
            .live_entries()
            .filter(|other| other.id != id && other.parent == entry.parent)
            .filter(|other| local_date(other.start, tz) == day)
            .filter(|other| filter == SessionFilter::Any || self.session_of(other.id) == session)
            .collect();
        siblings.sort_by_key(|other| (other.start, other.id));
        Ok(siblings.into_iter().map(|other| other.id).collect())
    }

    /// Whether the entry overlaps any of its siblings.
    pub fn is_parallel(&self, id: EntryId, filter: SessionFilter) -> Result<bool> {
        let span = self.span(id)?;
        for sibling in self.siblings(id, filter)? {
            if self.span(sibling)?.overlaps(&span) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Relocate an entry. A session block carries its children along by the same delta.
    pub(crate) fn move_entry(&mut self, id: EntryId, start: DateTime<Utc>) -> Result<()> {
        let delta = start - self.entry(id)?.start;
        for child in self.children(id) {
            self.entry_mut(child)?.start += delta;
        }
        self.entry_mut(id)?.start = start;
        Ok(())
    }

    /// Set the start without touching children.
    pub(crate) fn set_start(&mut self, id: EntryId, start: DateTime<Utc>) -> Result<()> {
        self.entry_mut(id)?.start = start;
        Ok(())
    }

    /// Set the duration of the object the entry places.
    pub(crate) fn set_duration(&mut self, id: EntryId, duration: Duration) -> Result<()> {
        if duration < Duration::zero() {
            return Err(ValidationError::NegativeDuration.into());
        }
        let object = self
            .entry_mut(id)?
            .object_mut()
            .ok_or(TimetableError::EntryNotFound(id))?;
        match object {
            EntryObject::Break(brk) => {
                brk.duration = duration;
                Ok(())
            }
            EntryObject::SessionBlock(block) => {
                let block = *block;
                self.blocks
                    .get_mut(&block)
                    .map(|b| b.duration = duration)
                    .ok_or(TimetableError::ObjectNotFound(ObjectRef::SessionBlock(block)))
            }
            EntryObject::Contribution(contribution) => {
                let contribution = *contribution;
                self.contribution_mut(contribution)
                    .map(|c| c.duration = duration)
            }
        }
    }

    // ── Day views ───────────────────────────────────────────────────────────

    /// Top-level entries starting on a local day, ordered by start.
    pub fn entries_on(&self, day: NaiveDate) -> Vec<EntryId> {
        let tz = self.timezone();
        self.top_level()
            .into_iter()
            .filter(|id| {
                self.entry(*id)
                    .map(|entry| local_date(entry.start, tz) == day)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Every event day with its entries and their children.
    pub fn day_view(&self) -> Result<Vec<DayView>> {
        self.event
            .days()
            .into_iter()
            .map(|day| {
                let entries = self
                    .entries_on(day)
                    .into_iter()
                    .map(|id| self.entry_view(id))
                    .collect::<Result<Vec<_>>>()?;
                Ok(DayView { day, entries })
            })
            .collect()
    }

    fn entry_view(&self, id: EntryId) -> Result<EntryView> {
        let children = self
            .children(id)
            .into_iter()
            .map(|child| self.entry_view(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(EntryView {
            id,
            kind: self.entry(id)?.kind(),
            title: self.title(id)?,
            span: self.span(id)?,
            children,
        })
    }

    /// Check every invariant; empty when the timetable is consistent.
    pub fn validate(&self) -> Vec<Violation> {
        validate::validate(self)
    }
}
