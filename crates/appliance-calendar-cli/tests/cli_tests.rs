//! Integration tests for the `apcal` binary, run against the bookings fixture.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn bookings_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bookings.json")
}

fn bookings_json() -> String {
    std::fs::read_to_string(bookings_path()).expect("bookings.json fixture must exist")
}

fn apcal() -> Command {
    let mut cmd = Command::cargo_bin("apcal").unwrap();
    // Keep results independent of the caller's environment.
    cmd.env_remove("APCAL_TIMEZONE").env_remove("RUST_LOG");
    cmd
}

fn run_json(args: &[&str]) -> Vec<Value> {
    let output = apcal().args(args).output().expect("apcal should run");
    assert!(
        output.status.success(),
        "apcal {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice::<Value>(&output.stdout)
        .expect("stdout must be JSON")
        .as_array()
        .expect("stdout must be a JSON array")
        .clone()
}

fn field<'a>(row: &'a Value, key: &str) -> &'a Value {
    &row[key]
}

// ─────────────────────────────────────────────────────────────────────────────
// split
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn split_reads_stdin() {
    apcal()
        .arg("split")
        .write_stdin(bookings_json())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"split_type\": \"End\""))
        .stdout(predicate::str::contains("\"split_type\": \"Start\""));
}

#[test]
fn split_cuts_overnight_booking_at_midnight() {
    let rows = run_json(&["split", "-i", bookings_path()]);

    let night: Vec<&Value> = rows.iter().filter(|r| r["id"] == "night").collect();
    assert_eq!(night.len(), 2);
    assert_eq!(field(night[0], "date"), "2024-03-01");
    assert_eq!(field(night[0], "start"), "22:00");
    assert_eq!(field(night[0], "end"), "24:00");
    assert_eq!(field(night[1], "date"), "2024-03-02");
    assert_eq!(field(night[1], "start"), "00:00");
    assert_eq!(field(night[1], "end"), "02:00");
}

#[test]
fn split_writes_output_file() {
    let output_path = std::env::temp_dir().join("apcal-test-split-output.json");
    let _ = std::fs::remove_file(&output_path);

    apcal()
        .args(["split", "-i", bookings_path(), "-o"])
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let rows: Vec<Value> = serde_json::from_str(&content).unwrap();
    assert_eq!(rows.len(), 5);

    let _ = std::fs::remove_file(&output_path);
}

// ─────────────────────────────────────────────────────────────────────────────
// layout
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn layout_packs_overlapping_bookings_side_by_side() {
    let rows = run_json(&["layout", "--date", "2024-03-01", "-i", bookings_path()]);

    let summary: Vec<(String, u64, u64)> = rows
        .iter()
        .map(|r| {
            (
                r["id"].as_str().unwrap().to_string(),
                r["col"].as_u64().unwrap(),
                r["col_total"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("a".to_string(), 0, 2),
            ("b".to_string(), 1, 2),
            ("c".to_string(), 0, 1),
            ("night".to_string(), 0, 1),
        ]
    );
}

#[test]
fn layout_uses_requested_timezone() {
    let rows = run_json(&[
        "--tz",
        "Asia/Vladivostok",
        "layout",
        "--date",
        "2024-03-02",
        "-i",
        bookings_path(),
    ]);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "night");
    assert_eq!(rows[0]["split_type"], "None");
    assert_eq!(rows[0]["start"], "08:00");
    assert_eq!(rows[0]["end"], "12:00");
}

#[test]
fn config_file_sets_timezone() {
    let config_path = std::env::temp_dir().join("apcal-test-config.toml");
    std::fs::write(&config_path, "timezone = \"Asia/Vladivostok\"\n").unwrap();

    let output = apcal()
        .arg("--config")
        .arg(&config_path)
        .args(["layout", "--date", "2024-03-02", "-i", bookings_path()])
        .output()
        .expect("apcal should run");
    let _ = std::fs::remove_file(&config_path);

    assert!(output.status.success());
    let rows: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "night");
}

#[test]
fn layout_of_empty_day_is_empty() {
    let rows = run_json(&["layout", "--date", "2024-03-05", "-i", bookings_path()]);
    assert!(rows.is_empty());
}

#[test]
fn unknown_timezone_fails() {
    apcal()
        .args(["--tz", "Mars/Olympus", "split", "-i", bookings_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone: Mars/Olympus"));
}

// ─────────────────────────────────────────────────────────────────────────────
// conflicts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn conflicts_lists_every_overlap() {
    let rows = run_json(&[
        "conflicts",
        "--start",
        "2024-03-01T10:30:00Z",
        "--end",
        "2024-03-01T12:30:00Z",
        "-i",
        bookings_path(),
    ]);

    let overlaps: Vec<(&str, i64)> = rows
        .iter()
        .map(|r| (r["id"].as_str().unwrap(), r["overlap_minutes"].as_i64().unwrap()))
        .collect();
    assert_eq!(overlaps, vec![("a", 30), ("b", 90), ("c", 30)]);
}

#[test]
fn conflicts_for_appliance_consider_approved_bookings_only() {
    let rows = run_json(&[
        "conflicts",
        "--appliance",
        "scope",
        "--start",
        "2024-03-01T11:00:00Z",
        "--end",
        "2024-03-01T12:00:00Z",
        "-i",
        bookings_path(),
    ]);

    assert!(rows.is_empty(), "only the pending booking overlaps: {rows:?}");
}

#[test]
fn conflicts_reject_reversed_range() {
    apcal()
        .args([
            "conflicts",
            "--start",
            "2024-03-01T12:00:00Z",
            "--end",
            "2024-03-01T10:00:00Z",
            "-i",
            bookings_path(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be before"));
}

// ─────────────────────────────────────────────────────────────────────────────
// free-slots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn free_slots_skip_busy_time() {
    let rows = run_json(&[
        "free-slots",
        "--appliance",
        "scope",
        "--date",
        "2024-03-01",
        "-i",
        bookings_path(),
    ]);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["duration_minutes"], 540);
    assert_eq!(rows[1]["start"], "2024-03-01T13:00:00Z");
    assert_eq!(rows[1]["duration_minutes"], 660);
}

// ─────────────────────────────────────────────────────────────────────────────
// errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn invalid_json_fails() {
    apcal()
        .arg("split")
        .write_stdin("this is not valid json {{{")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse bookings JSON"));
}

#[test]
fn missing_input_file_fails() {
    apcal()
        .args(["split", "-i", "/nonexistent/bookings.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn no_subcommand_shows_usage() {
    apcal()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
