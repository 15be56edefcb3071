//! Integration tests for the `ciview` CLI binary.
//!
//! Every invocation runs against the built-in mock engine, so these cover
//! argument parsing, output formats, and exit codes end to end.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ciview` binary with env isolation.
///
/// Clears all `CIVIEW_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn ciview_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ciview");
    cmd.env("HOME", "/tmp/ciview-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ciview-cli-test-nonexistent")
        .env_remove("CIVIEW_CONFIG")
        .env_remove("CIVIEW_OUTPUT")
        .env_remove("CIVIEW_DELAY_MS")
        .env_remove("CIVIEW_CORE__LOG_RETENTION")
        .env_remove("CIVIEW_MOCK__MUID")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = ciview_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("Usage"),
        "Expected 'Usage' in output:\n{text}"
    );
}

#[test]
fn test_help_flag() {
    ciview_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("MIDI-CI")
            .and(predicate::str::contains("discover"))
            .and(predicate::str::contains("set-profile"))
            .and(predicate::str::contains("subscribe")),
    );
}

#[test]
fn test_version_flag() {
    ciview_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ciview"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    ciview_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Discovery & connections ─────────────────────────────────────────

#[test]
fn test_discover_lists_mock_responder() {
    ciview_cmd()
        .arg("discover")
        .assert()
        .success()
        .stdout(predicate::str::contains("0x87654321").and(predicate::str::contains("Mock Device")));
}

#[test]
fn test_connections_json() {
    let output = ciview_cmd()
        .args(["connections", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = &parsed[0]["connection"];
    assert_eq!(first["productInstanceId"], "Mock Device");
    assert_eq!(first["targetMuid"], 0x8765_4321_u32);
}

#[test]
fn test_connection_detail() {
    ciview_cmd()
        .args(["connections", "0x87654321"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Serial:       MOCK001"));
}

#[test]
fn test_unknown_connection_is_not_found() {
    let output = ciview_cmd()
        .args(["connections", "0x00000001"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

// ── Profiles ────────────────────────────────────────────────────────

#[test]
fn test_profiles_plain() {
    ciview_cmd()
        .args(["profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0x87654321 7E 00 01 02 03"));
}

#[test]
fn test_set_profile_enables() {
    ciview_cmd()
        .args(["set-profile", "7E 00 01 02 03", "--channels", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("State:    enabled")
                .and(predicate::str::contains("Channels: 1")),
        );
}

#[test]
fn test_set_profile_rejects_too_many_channels() {
    let output = ciview_cmd()
        .args(["set-profile", "7E 00 01 02 03", "--channels", "17"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected usage error");
    assert!(combined_output(&output).contains("numChannels"));
}

#[test]
fn test_set_profile_rejects_short_id() {
    let output = ciview_cmd()
        .args(["set-profile", "7E 00"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Properties ──────────────────────────────────────────────────────

#[test]
fn test_properties_show_body() {
    ciview_cmd()
        .args(["properties", "-o", "json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("mock.property.1")
                .and(predicate::str::contains(r#"{\"value\":123}"#)),
        );
}

#[test]
fn test_subscribe_confirms_with_delay() {
    ciview_cmd()
        .args(["--delay-ms", "20", "subscribe", "mock.property.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("State:    subscribed"));
}

#[test]
fn test_subscribe_unknown_property() {
    let output = ciview_cmd()
        .args(["subscribe", "no.such.property"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_unsubscribe_plain() {
    ciview_cmd()
        .args(["unsubscribe", "mock.property.1", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsubscribed"));
}

// ── Logs ────────────────────────────────────────────────────────────

#[test]
fn test_logs_show_discovery() {
    ciview_cmd()
        .args(["logs", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Out Discovery inquiry sent"));
}

#[test]
fn test_logs_clear() {
    ciview_cmd()
        .args(["logs", "--clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Log cleared"));
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn test_devices_list() {
    ciview_cmd()
        .args(["devices", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mock MIDI In").and(predicate::str::contains("mock-out-1")));
}

#[test]
fn test_devices_select_unknown() {
    let output = ciview_cmd()
        .args(["devices", "select", "--in", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("devices list"));
}

#[test]
fn test_devices_select_marks_endpoint() {
    let output = ciview_cmd()
        .args(["devices", "select", "--in", "mock-in-2", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let selected: Vec<&str> = parsed
        .as_array()
        .unwrap()
        .iter()
        .filter(|d| d["selected"] == true)
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(selected, vec!["mock-in-2"]);
}

// ── Watch ───────────────────────────────────────────────────────────

#[test]
fn test_watch_emits_json_lines() {
    ciview_cmd()
        .args(["watch", "--duration-ms", "300", "-o", "json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"{"kind":"connections""#)
                .and(predicate::str::contains(r#""kind":"log""#)),
        );
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_invalid_config_is_usage_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[mock]\nmuid = \"not-a-muid\"").unwrap();

    let output = ciview_cmd()
        .args(["--config", file.path().to_str().unwrap(), "discover"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("mock.muid"));
}

#[test]
fn test_config_log_retention_applies() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[core]\nlog_retention = 1").unwrap();

    let output = ciview_cmd()
        .args(["--config", file.path().to_str().unwrap(), "logs", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "Expected one entry:\n{stdout}");
}
