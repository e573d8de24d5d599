use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn help_text(args: &[&str]) -> String {
    let mut cmd = cargo_bin_cmd!("lifecheck-server");
    let output = cmd
        .args(args)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn top_level_help_lists_operator_commands() {
    let text = help_text(&[]);
    for command in ["serve", "run", "status", "history", "schedule", "credential", "db"] {
        assert!(text.contains(command), "help missing '{command}'");
    }
}

#[test]
fn credential_put_documents_its_flags() {
    let text = help_text(&["credential", "put"]);
    assert!(text.contains("--subject"), "missing --subject");
    assert!(text.contains("--token"), "missing --token");
    assert!(text.contains("--status"), "missing --status");
}

#[test]
fn schedule_validate_prints_sorted_windows() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"[
            {{"month": 12, "day": 31, "startTime": "23:00", "durationHours": 2}},
            {{"month": "3", "day": "1", "startTime": "03:30", "durationHours": "4"}}
        ]"#
    )
    .expect("write schedule");

    let mut cmd = cargo_bin_cmd!("lifecheck-server");
    let output = cmd
        .env_remove("DATABASE_URL")
        .args(["schedule", "validate"])
        .arg(file.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let windows: serde_json::Value =
        serde_json::from_slice(&output).expect("json output");
    let windows = windows.as_array().expect("array");
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0]["month"], 3);
    assert_eq!(windows[0]["start_time"], "03:30:00");
    assert_eq!(windows[1]["day"], 31);
}

#[test]
fn schedule_validate_rejects_bad_start_time() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"[{{"month": 1, "day": 1, "startTime": "24:00", "durationHours": 1}}]"#
    )
    .expect("write schedule");

    let mut cmd = cargo_bin_cmd!("lifecheck-server");
    cmd.args(["schedule", "validate"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("start time"));
}

#[test]
fn schedule_validate_rejects_empty_set() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "[]").expect("write schedule");

    let mut cmd = cargo_bin_cmd!("lifecheck-server");
    cmd.args(["schedule", "validate"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one window"));
}
