//! Whole-timetable consistency check run before a unit of work is accepted.
//!
//! Operations may pass through inconsistent intermediate states; only the final
//! state has to satisfy every rule here.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::entry::EntryKind;
use crate::envelope::{Span, TimeEnvelope};
use crate::model::{EntryId, ObjectRef};
use crate::timetable::Timetable;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "violation")]
pub enum Violation {
    #[error("{entry} has no object attached")]
    MissingObject { entry: EntryId },

    #[error("{entry} is of kind {kind:?} but places a {object:?}")]
    KindMismatch {
        entry: EntryId,
        kind: EntryKind,
        object: EntryKind,
    },

    #[error("{entry} places {object}, which does not exist")]
    UnknownObject { entry: EntryId, object: ObjectRef },

    #[error("{object} is placed by both {first} and {second}")]
    DuplicateAttachment {
        object: ObjectRef,
        first: EntryId,
        second: EntryId,
    },

    #[error("session block {entry} has a parent")]
    NestedBlock { entry: EntryId },

    #[error("{entry} names {parent} as parent, which does not exist")]
    DanglingParent { entry: EntryId, parent: EntryId },

    #[error("{entry} names {parent} as parent, which is not a session block")]
    ParentNotBlock { entry: EntryId, parent: EntryId },

    #[error("session block {entry} spans more than one day")]
    CrossesDay { entry: EntryId },

    #[error("{entry} does not fit inside its parent {parent}")]
    OutsideParent { entry: EntryId, parent: EntryId },

    #[error("{entry} does not fit inside the event")]
    OutsideEvent { entry: EntryId },
}

/// Every rule the timetable currently breaks; empty when it is consistent.
pub fn validate(timetable: &Timetable) -> Vec<Violation> {
    let tz = timetable.timezone();
    let event_span = timetable.event.span();
    let mut violations = Vec::new();
    let mut attached: BTreeMap<ObjectRef, EntryId> = BTreeMap::new();
    let mut spans: BTreeMap<EntryId, Span> = BTreeMap::new();

    for entry in timetable.entries() {
        let Some(object) = entry.object() else {
            violations.push(Violation::MissingObject { entry: entry.id });
            continue;
        };
        if object.kind() != entry.kind() {
            violations.push(Violation::KindMismatch {
                entry: entry.id,
                kind: entry.kind(),
                object: object.kind(),
            });
        }
        let object_ref = object.object_ref(entry.id);
        if let Some(first) = attached.insert(object_ref, entry.id) {
            violations.push(Violation::DuplicateAttachment {
                object: object_ref,
                first,
                second: entry.id,
            });
        }
        match timetable.object_duration(object) {
            Ok(duration) => {
                spans.insert(entry.id, Span::new(entry.start, duration));
            }
            Err(_) => violations.push(Violation::UnknownObject {
                entry: entry.id,
                object: object_ref,
            }),
        }
    }

    for entry in timetable.entries().filter(|entry| !entry.is_deleted()) {
        let is_block = entry.kind() == EntryKind::SessionBlock;
        let span = spans.get(&entry.id);

        if is_block && span.is_some_and(|span| span.crosses_day(tz)) {
            violations.push(Violation::CrossesDay { entry: entry.id });
        }

        match entry.parent {
            None => {
                if span.is_some_and(|span| !event_span.contains(span)) {
                    violations.push(Violation::OutsideEvent { entry: entry.id });
                }
            }
            Some(_) if is_block => violations.push(Violation::NestedBlock { entry: entry.id }),
            Some(parent) => match timetable.entry(parent) {
                Err(_) => violations.push(Violation::DanglingParent {
                    entry: entry.id,
                    parent,
                }),
                Ok(parent_entry) if !parent_entry.is_session_block() => {
                    violations.push(Violation::ParentNotBlock {
                        entry: entry.id,
                        parent,
                    })
                }
                Ok(_) => {
                    if let (Some(span), Some(parent_span)) = (span, spans.get(&parent)) {
                        if !parent_span.contains(span) {
                            violations.push(Violation::OutsideParent {
                                entry: entry.id,
                                parent,
                            });
                        }
                    }
                }
            },
        }
    }

    violations
}
