//! Tests for change scopes: extension, authorization, reports and rollback.

use std::cell::RefCell;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use timetable_engine::containment::extend_parent;
use timetable_engine::placement::{delete, move_entry, schedule};
use timetable_engine::{
    AllowAll, Break, ChangeRecord, EntryId, EntryObject, Event, ObjectRef, SessionId,
    Timetable, TimetableError,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 16, hour, minute, 0).unwrap()
}

fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

/// Event 09:00-18:00 with block 10:00-11:00 (session 1).
fn conference_with_block() -> (Timetable, EntryId) {
    let mut tt = Timetable::new(Event::new("Conf", at(9, 0), at(18, 0), Tz::UTC).unwrap());
    let block = tt.add_session_block(SessionId(1), "Block", minutes(60));
    let mut scope = tt.track_changes("admin", &AllowAll);
    let entry = schedule(&mut scope, EntryObject::SessionBlock(block), at(10, 0), None, false).unwrap();
    scope.commit().unwrap();
    (tt, entry)
}

fn talk_at(
    timetable: &mut Timetable,
    start: DateTime<Utc>,
    length: i64,
    parent: Option<EntryId>,
) -> EntryId {
    let talk = timetable.add_contribution("Talk", minutes(length), None);
    let mut scope = timetable.track_changes("admin", &AllowAll);
    let id = schedule(&mut scope, EntryObject::Contribution(talk), start, parent, false).unwrap();
    scope.commit().unwrap();
    id
}

fn block_ref(timetable: &Timetable, entry: EntryId) -> ObjectRef {
    timetable.entry(entry).unwrap().object_ref().unwrap()
}

// ── Extension ───────────────────────────────────────────────────────────────

#[test]
fn scheduling_with_extension_grows_block_end() {
    // Child 10:30-11:15 in block 10:00-11:00: the block becomes 10:00-11:15.
    let (mut tt, block) = conference_with_block();
    let talk = tt.add_contribution("Talk", minutes(45), None);

    let mut scope = tt.track_changes("admin", &AllowAll);
    schedule(&mut scope, EntryObject::Contribution(talk), at(10, 30), Some(block), true).unwrap();
    let report = scope.commit().unwrap();

    let span = tt.span(block).unwrap();
    assert_eq!(span.start, at(10, 0));
    assert_eq!(span.end, at(11, 15));

    let record = report.get(block_ref(&tt, block)).unwrap();
    assert_eq!(record.old.unwrap().duration, minutes(60));
    assert_eq!(record.new.unwrap().duration, minutes(75));
}

#[test]
fn extension_by_start_keeps_block_end() {
    let (mut tt, block) = conference_with_block();
    let talk = tt.add_contribution("Talk", minutes(30), None);

    let mut scope = tt.track_changes("admin", &AllowAll);
    schedule(&mut scope, EntryObject::Contribution(talk), at(9, 30), Some(block), true).unwrap();
    scope.commit().unwrap();

    let span = tt.span(block).unwrap();
    assert_eq!(span.start, at(9, 30));
    assert_eq!(span.end, at(11, 0));
}

#[test]
fn extension_recurses_up_to_the_event() {
    // Block 17:00-18:00 at the very end of the event; a child until 18:30 grows both.
    let mut tt = Timetable::new(Event::new("Conf", at(9, 0), at(18, 0), Tz::UTC).unwrap());
    let block = tt.add_session_block(SessionId(1), "Late", minutes(60));
    let talk = tt.add_contribution("Talk", minutes(60), None);

    let mut scope = tt.track_changes("admin", &AllowAll);
    let block_entry = schedule(&mut scope, EntryObject::SessionBlock(block), at(17, 0), None, false).unwrap();
    schedule(&mut scope, EntryObject::Contribution(talk), at(17, 30), Some(block_entry), true).unwrap();
    let report = scope.commit().unwrap();

    assert_eq!(tt.span(block_entry).unwrap().end, at(18, 30));
    assert_eq!(tt.event.end, at(18, 30));
    let event = report.get(ObjectRef::Event).unwrap();
    assert_eq!(event.old.unwrap().end, at(18, 0));
    assert_eq!(event.new.unwrap().end, at(18, 30));
}

#[test]
fn extending_an_entry_that_is_already_contained_changes_nothing() {
    let (mut tt, block) = conference_with_block();
    let child = talk_at(&mut tt, at(10, 15), 30, Some(block));

    let mut scope = tt.track_changes("admin", &AllowAll);
    extend_parent(&mut scope, child, true, true).unwrap();
    assert!(scope.touched().is_empty());
    let report = scope.commit().unwrap();

    assert!(report.is_empty());
}

#[test]
fn auto_extend_grows_parents_at_commit() {
    // Moving the child to 10:45 leaves it running until 11:15; auto-extension fixes the block.
    let (mut tt, block) = conference_with_block();
    let child = talk_at(&mut tt, at(10, 0), 30, Some(block));

    let mut scope = tt.track_changes("admin", &AllowAll).with_auto_extend(true);
    move_entry(&mut scope, child, at(10, 45)).unwrap();
    let report = scope.commit().unwrap();

    assert_eq!(tt.span(block).unwrap().end, at(11, 15));
    assert_eq!(report.len(), 2);
}

#[test]
fn auto_extend_grows_the_event_for_top_level_entries() {
    let (mut tt, _) = conference_with_block();
    let talk = talk_at(&mut tt, at(16, 0), 60, None);

    let mut scope = tt.track_changes("admin", &AllowAll).with_auto_extend(true);
    assert!(scope.auto_extend());
    move_entry(&mut scope, talk, at(17, 30)).unwrap();
    scope.commit().unwrap();

    assert_eq!(tt.event.end, at(18, 30));
}

// ── Authorization ───────────────────────────────────────────────────────────

#[test]
fn cascade_into_unmanageable_block_is_rejected() {
    let (mut tt, block) = conference_with_block();
    let talk = tt.add_contribution("Talk", minutes(45), None);
    let protected = block_ref(&tt, block);
    let before = tt.clone();
    let deny_block = move |_: &str, object: ObjectRef| object != protected;

    let mut scope = tt.track_changes("speaker", &deny_block);
    schedule(&mut scope, EntryObject::Contribution(talk), at(10, 30), Some(block), true).unwrap();
    let err = scope.commit().unwrap_err();

    assert!(matches!(err, TimetableError::Unauthorized(object) if object == protected));
    assert_eq!(tt, before, "rejected cascade must roll back the whole scope");
}

#[test]
fn direct_changes_are_not_authorized() {
    // Only cascades are checked; the caller authorized the direct change already.
    let (mut tt, block) = conference_with_block();
    let deny_all = |_: &str, _: ObjectRef| false;

    let mut scope = tt.track_changes("admin", &deny_all);
    move_entry(&mut scope, block, at(14, 0)).unwrap();
    scope.commit().unwrap();

    assert_eq!(tt.entry(block).unwrap().start, at(14, 0));
}

#[test]
fn principal_is_passed_to_authorizer() {
    let (mut tt, block) = conference_with_block();
    let talk = tt.add_contribution("Talk", minutes(90), None);
    let seen = RefCell::new(Vec::new());
    let recording = |principal: &str, _: ObjectRef| {
        seen.borrow_mut().push(principal.to_string());
        true
    };

    let mut scope = tt.track_changes("alice", &recording);
    assert_eq!(scope.principal(), "alice");
    schedule(&mut scope, EntryObject::Contribution(talk), at(10, 0), Some(block), true).unwrap();
    scope.commit().unwrap();

    assert_eq!(seen.into_inner(), vec!["alice".to_string()]);
}

// ── Reports and rollback ────────────────────────────────────────────────────

#[test]
fn report_keeps_first_original_across_touches() {
    let (mut tt, _) = conference_with_block();
    let talk = talk_at(&mut tt, at(14, 0), 30, None);
    let object = tt.entry(talk).unwrap().object_ref().unwrap();

    let mut scope = tt.track_changes("admin", &AllowAll);
    move_entry(&mut scope, talk, at(15, 0)).unwrap();
    move_entry(&mut scope, talk, at(16, 0)).unwrap();
    assert_eq!(scope.original(object).unwrap().start, at(14, 0));
    let report = scope.commit().unwrap();

    assert_eq!(report.len(), 1);
    let record = report.get(object).unwrap();
    assert_eq!(record.old.unwrap().start, at(14, 0));
    assert_eq!(record.new.unwrap().start, at(16, 0));
    assert_eq!(record.shift(), Some(minutes(120)));
}

#[test]
fn objects_moved_back_are_not_reported() {
    let (mut tt, _) = conference_with_block();
    let talk = talk_at(&mut tt, at(14, 0), 30, None);

    let mut scope = tt.track_changes("admin", &AllowAll);
    move_entry(&mut scope, talk, at(15, 0)).unwrap();
    move_entry(&mut scope, talk, at(14, 0)).unwrap();
    let report = scope.commit().unwrap();

    assert!(report.is_empty());
}

#[test]
fn replacing_a_break_reports_a_deletion_and_a_creation() {
    // Coffee 15:00-15:15 is the newest entry; deleting it must not free its id
    // for the lunch break scheduled in the same scope.
    let (mut tt, _) = conference_with_block();
    let mut scope = tt.track_changes("admin", &AllowAll);
    let coffee = schedule(
        &mut scope,
        EntryObject::Break(Break::new("Coffee", minutes(15))),
        at(15, 0),
        None,
        false,
    )
    .unwrap();
    scope.commit().unwrap();

    let mut scope = tt.track_changes("admin", &AllowAll);
    delete(&mut scope, coffee).unwrap();
    let lunch = schedule(
        &mut scope,
        EntryObject::Break(Break::new("Lunch", minutes(60))),
        at(12, 0),
        None,
        false,
    )
    .unwrap();
    let report = scope.commit().unwrap();

    assert_ne!(lunch, coffee, "deleted entry ids are not handed out again");
    assert_eq!(report.len(), 2);
    let removed = report.get(ObjectRef::Break(coffee)).unwrap();
    assert_eq!(removed.old.unwrap().start, at(15, 0));
    assert!(removed.new.is_none());
    let added = report.get(ObjectRef::Break(lunch)).unwrap();
    assert!(added.old.is_none());
    assert_eq!(added.new.unwrap().start, at(12, 0));
}

#[test]
fn issued_ids_survive_a_save_and_load() {
    let (mut tt, _) = conference_with_block();
    let talk = talk_at(&mut tt, at(14, 0), 30, None);
    let mut scope = tt.track_changes("admin", &AllowAll);
    delete(&mut scope, talk).unwrap();
    scope.commit().unwrap();

    let mut restored = Timetable::from_json(&tt.to_json().unwrap()).unwrap();
    let next = talk_at(&mut restored, at(14, 0), 30, None);

    assert!(next > talk, "{next} must come after the deleted {talk}");
}

#[test]
fn listener_sees_each_changed_object_once() {
    let (mut tt, block) = conference_with_block();
    talk_at(&mut tt, at(10, 0), 20, Some(block));
    talk_at(&mut tt, at(10, 20), 20, Some(block));
    let object = block_ref(&tt, block);
    let mut seen: Vec<ChangeRecord> = Vec::new();

    {
        let mut scope = tt
            .track_changes("admin", &AllowAll)
            .on_change(|record| seen.push(record.clone()));
        move_entry(&mut scope, block, at(13, 0)).unwrap();
        move_entry(&mut scope, block, at(14, 0)).unwrap();
        let report = scope.commit().unwrap();
        assert_eq!(report.others(object), 2);
    }

    assert_eq!(seen.len(), 3, "block and both children");
    assert!(seen
        .iter()
        .all(|record| record.shift() == Some(minutes(240))));
}

#[test]
fn dropping_a_scope_rolls_back() {
    let (mut tt, block) = conference_with_block();
    let before = tt.clone();

    {
        let mut scope = tt.track_changes("admin", &AllowAll);
        move_entry(&mut scope, block, at(15, 0)).unwrap();
        assert_eq!(scope.timetable().entry(block).unwrap().start, at(15, 0));
    }

    assert_eq!(tt, before);
}

#[test]
fn explicit_rollback_discards_changes() {
    let (mut tt, block) = conference_with_block();
    let before = tt.clone();

    let mut scope = tt.track_changes("admin", &AllowAll);
    move_entry(&mut scope, block, at(15, 0)).unwrap();
    scope.rollback();

    assert_eq!(tt, before);
}

#[test]
fn report_serializes_as_list_of_records() {
    let (mut tt, block) = conference_with_block();

    let mut scope = tt.track_changes("admin", &AllowAll);
    move_entry(&mut scope, block, at(10, 30)).unwrap();
    let report = scope.commit().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let records = json.as_array().expect("report is a JSON array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["object"]["type"], "session_block");
    assert_eq!(records[0]["old"]["start"], "2026-03-16T10:00:00Z");
    assert_eq!(records[0]["new"]["start"], "2026-03-16T10:30:00Z");
    assert_eq!(records[0]["new"]["duration"], 60);
}
