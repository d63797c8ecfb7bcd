//! Timetable entries: the placement of exactly one schedulable object.
//!
//! The attached object is a sum type, so "exactly one reference is set and it
//! matches the kind" holds by construction. `kind` is still stored alongside it
//! because the persisted record carries it, and [`crate::validate`] checks the two
//! agree for records that come from storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::minutes;
use crate::error::{Result, ValidationError};
use crate::model::{BlockId, ContributionId, EntryId, ObjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    SessionBlock,
    Contribution,
    Break,
}

/// A break is owned by the entry that places it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Break {
    pub title: String,
    #[serde(with = "minutes")]
    pub duration: Duration,
}

impl Break {
    pub fn new(title: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            duration,
        }
    }
}

/// What an entry places. Session blocks and contributions are borrowed by id,
/// breaks are owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryObject {
    SessionBlock(BlockId),
    Contribution(ContributionId),
    Break(Break),
}

impl EntryObject {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryObject::SessionBlock(_) => EntryKind::SessionBlock,
            EntryObject::Contribution(_) => EntryKind::Contribution,
            EntryObject::Break(_) => EntryKind::Break,
        }
    }

    /// The tracking key of this object when placed by `entry`.
    pub fn object_ref(&self, entry: EntryId) -> ObjectRef {
        match self {
            EntryObject::SessionBlock(id) => ObjectRef::SessionBlock(*id),
            EntryObject::Contribution(id) => ObjectRef::Contribution(*id),
            EntryObject::Break(_) => ObjectRef::Break(entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: EntryId,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub parent: Option<EntryId>,
    kind: EntryKind,
    object: Option<EntryObject>,
}

impl TimetableEntry {
    pub fn new(id: EntryId, start: DateTime<Utc>, object: EntryObject) -> Self {
        Self {
            id,
            start,
            parent: None,
            kind: object.kind(),
            object: Some(object),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The attached object, or `None` once the entry has been cleared.
    pub fn object(&self) -> Option<&EntryObject> {
        self.object.as_ref()
    }

    pub(crate) fn object_mut(&mut self) -> Option<&mut EntryObject> {
        self.object.as_mut()
    }

    /// Attach `object`, replacing whatever was attached before.
    ///
    /// The kind is fixed by the first attachment; attaching an object of a
    /// different kind afterwards is rejected.
    pub fn set_object(&mut self, object: EntryObject) -> Result<()> {
        if self.object.is_some() && object.kind() != self.kind {
            return Err(ValidationError::KindChange {
                from: self.kind,
                to: object.kind(),
            }
            .into());
        }
        self.kind = object.kind();
        self.object = Some(object);
        Ok(())
    }

    /// Detach the object. A cleared entry counts as deleted.
    pub fn clear_object(&mut self) -> Option<EntryObject> {
        self.object.take()
    }

    pub fn is_deleted(&self) -> bool {
        self.object.is_none()
    }

    pub fn is_session_block(&self) -> bool {
        self.kind == EntryKind::SessionBlock
    }

    pub fn block_id(&self) -> Option<BlockId> {
        match self.object {
            Some(EntryObject::SessionBlock(id)) => Some(id),
            _ => None,
        }
    }

    pub fn contribution_id(&self) -> Option<ContributionId> {
        match self.object {
            Some(EntryObject::Contribution(id)) => Some(id),
            _ => None,
        }
    }

    pub fn break_object(&self) -> Option<&Break> {
        match &self.object {
            Some(EntryObject::Break(brk)) => Some(brk),
            _ => None,
        }
    }

    pub fn object_ref(&self) -> Option<ObjectRef> {
        self.object.as_ref().map(|object| object.object_ref(self.id))
    }
}
