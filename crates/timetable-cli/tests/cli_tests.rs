//! Integration tests for the `timetable` CLI binary.
//!
//! These run the actual binary against `tests/fixtures/conference.json`:
//! a two-day event (16 March 09:00 to 17 March 18:00 UTC) with
//!
//! - entry 4: "Opening Keynote" 09:00-09:45
//! - entry 1: "Morning Session" block 10:00-12:00 holding
//!   entry 2 (10:00-10:30) and entry 3 (10:30-11:00)
//! - entry 5: "Lunch" break 12:00-13:00
//! - entry 6: "Afternoon Session" block 14:00-15:30, empty
//! - contribution 4: "Lightning Talk" (20 min), unscheduled

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn fixture_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/conference.json")
}

fn timetable() -> Command {
    Command::cargo_bin("timetable").unwrap()
}

/// Run a subcommand against the fixture and parse the JSON it prints.
fn report(args: &[&str]) -> Value {
    let output = timetable()
        .args(args)
        .args(["-i", fixture_path()])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

/// The record for `{"type": kind, "id": id}` in a change report.
fn record<'a>(report: &'a Value, kind: &str, id: u64) -> &'a Value {
    report
        .as_array()
        .expect("report is an array")
        .iter()
        .find(|record| record["object"]["type"] == kind && record["object"]["id"] == id)
        .unwrap_or_else(|| panic!("no record for {kind} {id} in {report}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Read-only subcommands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn show_lists_days_and_nested_entries() {
    timetable()
        .args(["show", "-i", fixture_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-03-16"))
        .stdout(predicate::str::contains("2026-03-17"))
        .stdout(predicate::str::contains("09:00-09:45"))
        .stdout(predicate::str::contains("Morning Session"))
        .stdout(predicate::str::contains("    10:30-11:00"));
}

#[test]
fn show_json_has_one_entry_per_day() {
    let days = report(&["show", "--json"]);
    let days = days.as_array().unwrap();

    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["entries"].as_array().unwrap().len(), 4);
    assert_eq!(days[0]["entries"][1]["children"].as_array().unwrap().len(), 2);
    assert!(days[1]["entries"].as_array().unwrap().is_empty());
}

#[test]
fn show_reads_from_stdin() {
    let input = std::fs::read_to_string(fixture_path()).unwrap();

    timetable()
        .arg("show")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Lunch"));
}

#[test]
fn show_renders_in_requested_timezone() {
    // The keynote at 09:00 UTC is 10:00 in Zurich (CET, +01:00).
    timetable()
        .args(["show", "--tz", "Europe/Zurich", "-i", fixture_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("10:00-10:45"));

    timetable()
        .args(["show", "--tz", "Nowhere/Special", "-i", fixture_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone: Nowhere/Special"));
}

#[test]
fn validate_accepts_fixture() {
    timetable()
        .args(["validate", "-i", fixture_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn validate_reports_violations() {
    // Move entry 3 to 11:45 so it runs past the block end at 12:00.
    let broken = std::fs::read_to_string(fixture_path())
        .unwrap()
        .replace("2026-03-16T10:30:00Z", "2026-03-16T11:45:00Z");

    timetable()
        .arg("validate")
        .write_stdin(broken)
        .assert()
        .failure()
        .stdout(predicate::str::contains("entry#3 does not fit inside its parent entry#1"))
        .stderr(predicate::str::contains("1 violation(s) found"));
}

#[test]
fn gap_in_event() {
    // 09:45-10:00 is too short for 30 minutes; the next free time is after lunch.
    let slot = report(&["gap", "--day", "2026-03-16", "--minutes", "30"]);
    assert_eq!(slot["start"], "2026-03-16T13:00:00Z");
    assert_eq!(slot["end"], "2026-03-16T13:30:00Z");

    let slot = report(&["gap", "--day", "2026-03-16", "--minutes", "15"]);
    assert_eq!(slot["start"], "2026-03-16T09:45:00Z");
}

#[test]
fn gap_in_block() {
    let slot = report(&["gap", "--day", "2026-03-16", "--minutes", "30", "--block", "1"]);
    assert_eq!(slot["start"], "2026-03-16T11:00:00Z");
}

#[test]
fn gap_reports_when_nothing_fits() {
    timetable()
        .args(["gap", "-i", fixture_path(), "--day", "2026-03-16", "--minutes", "90", "--block", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No free slot of 90 minutes on 2026-03-16"));
}

#[test]
fn invalid_json_is_rejected() {
    timetable()
        .arg("show")
        .write_stdin("{ not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse timetable JSON"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutating subcommands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn schedule_into_block_writes_output() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("updated.json");

    let output = timetable()
        .args(["schedule", "--contribution", "4", "--block", "6", "--day", "2026-03-16"])
        .args(["-i", fixture_path()])
        .arg("-o")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let talk = record(&report, "contribution", 4);
    assert!(talk["old"].is_null(), "newly scheduled");
    assert_eq!(talk["new"]["start"], "2026-03-16T14:00:00Z");

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(saved["entries"]["7"]["parent"], 6);
    assert_eq!(saved["contributions"]["4"]["session_block"], 2);
}

#[test]
fn swap_children_down() {
    let report = report(&["swap", "--entry", "2", "--direction", "down"]);

    assert_eq!(record(&report, "contribution", 2)["new"]["start"], "2026-03-16T10:30:00Z");
    assert_eq!(record(&report, "contribution", 3)["new"]["start"], "2026-03-16T10:00:00Z");
    assert_eq!(report.as_array().unwrap().len(), 2);
}

#[test]
fn delete_block_unschedules_children() {
    let report = report(&["delete", "--entry", "1"]);

    for (kind, id) in [("session_block", 1), ("contribution", 2), ("contribution", 3)] {
        assert!(record(&report, kind, id)["new"].is_null(), "{kind} {id} unscheduled");
    }
}

#[test]
fn fit_shrinks_block() {
    let report = report(&["fit", "--entry", "1"]);

    let block = record(&report, "session_block", 1);
    assert_eq!(block["old"]["duration"], 120);
    assert_eq!(block["new"]["duration"], 60);
}

#[test]
fn reschedule_block_by_duration() {
    // The last child stretches to the block end at 12:00.
    let report = report(&["reschedule", "--block", "1", "--mode", "duration"]);

    assert_eq!(record(&report, "contribution", 3)["new"]["end"], "2026-03-16T12:00:00Z");
    assert_eq!(report.as_array().unwrap().len(), 1);
}

#[test]
fn reschedule_needs_a_target() {
    timetable()
        .args(["reschedule", "-i", fixture_path(), "--mode", "time"])
        .assert()
        .failure();
}

#[test]
fn move_day_keeps_time_of_day() {
    let report = report(&["move-day", "--entry", "4", "--day", "2026-03-17"]);

    let keynote = record(&report, "contribution", 1);
    assert_eq!(keynote["new"]["start"], "2026-03-17T09:00:00Z");
}

#[test]
fn shift_grows_block_through_auto_extension() {
    // Entry 3 moves to 12:00-12:30, so the block is extended to 12:30.
    let report = report(&["shift", "--entry", "2", "--minutes", "90"]);

    assert_eq!(record(&report, "session_block", 1)["new"]["end"], "2026-03-16T12:30:00Z");
}

#[test]
fn protected_session_blocks_cascade() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("timetable.toml");
    std::fs::write(&config, "[scheduling]\nprotected_sessions = [1]\n").unwrap();

    timetable()
        .args(["shift", "--entry", "2", "--minutes", "90", "-i", fixture_path()])
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not authorized to manage block#1"));
}

#[test]
fn failed_change_does_not_write_output() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("updated.json");

    timetable()
        .args(["move-parent", "--entry", "6", "--parent", "1", "-i", fixture_path()])
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("session blocks cannot be nested"));

    assert!(!out.exists());
}
