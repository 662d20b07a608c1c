#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const FAKE_TASK: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$TASKDATA/calls.log"
case "$1" in
  export) cat "$TASKDATA/all.json"; exit 0 ;;
  add)
    if [ "$2" = "fail" ]; then echo "Cannot add task." >&2; exit 2; fi
    echo "Created task 42."; exit 0 ;;
esac
case "$2" in
  export)
    if [ -f "$TASKDATA/task-$1.json" ]; then cat "$TASKDATA/task-$1.json"; else echo "[]"; fi
    exit 0 ;;
  done|delete)
    if [ "$1" = "999" ]; then echo "No tasks specified." >&2; exit 1; fi
    echo "Completed 1 task."; exit 0 ;;
esac
exit 2
"#;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("taskbridge-{nanos}-{name}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn install_fake_task(dir: &Path) -> PathBuf {
    let path = dir.join("task");
    fs::write(&path, FAKE_TASK).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_export(dir: &Path) {
    let all = serde_json::json!([
        {
            "id": 1, "uuid": "00000000-0000-4000-8000-000000000001",
            "description": "Water plants", "status": "pending", "project": "home",
            "entry": "20250301T080000Z", "modified": "20250301T080000Z",
            "annotations": [
                { "description": "use the blue can", "entry": "20250302T080000Z" }
            ]
        },
        {
            "id": 2, "uuid": "00000000-0000-4000-8000-000000000002",
            "description": "Write report", "status": "pending", "project": "work",
            "entry": "20250301T080000Z", "modified": "20250301T080000Z"
        },
        {
            "id": 0, "uuid": "00000000-0000-4000-8000-000000000003",
            "description": "Old idea", "status": "deleted",
            "entry": "20250301T080000Z", "modified": "20250304T080000Z",
            "end": "20250304T080000Z"
        }
    ]);
    fs::write(dir.join("all.json"), all.to_string()).unwrap();

    let created = serde_json::json!([
        {
            "id": 42, "uuid": "00000000-0000-4000-8000-000000000042",
            "description": "Buy milk", "status": "pending",
            "entry": "20250310T080000Z", "modified": "20250310T080000Z",
            "due": "20250311T000000Z"
        }
    ]);
    fs::write(dir.join("task-42.json"), created.to_string()).unwrap();
}

fn run(dir: &Path, task_bin: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskbridge"))
        .args(args)
        .arg("--taskrc")
        .arg(dir.join("missing.taskrc"))
        .arg("--data-dir")
        .arg(dir)
        .arg("--task-bin")
        .arg(task_bin)
        .env_remove("TASKRC")
        .env_remove("TASKDATA")
        .env_remove("TASKBRIDGE_TASK_BIN")
        .env_remove("TASKBRIDGE_LOG")
        .output()
        .expect("failed to run taskbridge")
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

#[test]
fn list_pending_prints_working_tasks() {
    let dir = temp_dir("cli-list");
    let task_bin = install_fake_task(&dir);
    write_export(&dir);

    let output = run(&dir, &task_bin, &["list", "pending", "--json"]);
    let log = calls(&dir);
    fs::remove_dir_all(&dir).ok();

    assert!(output.status.success());
    let tasks = stdout_json(&output);
    let tasks = tasks.as_array().expect("task array");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["id"], 1);
    assert_eq!(tasks[0]["description"], "Water plants");
    assert_eq!(tasks[0]["annotations"][0]["description"], "use the blue can");
    assert_eq!(log, ["export rc.confirmation=off"]);
}

#[test]
fn list_all_include_deleted_adds_deleted_tasks() {
    let dir = temp_dir("cli-list-deleted");
    let task_bin = install_fake_task(&dir);
    write_export(&dir);

    let default = run(&dir, &task_bin, &["list", "all", "--json"]);
    let with_deleted = run(&dir, &task_bin, &["list", "all", "--include-deleted", "--json"]);
    let working_set = run(&dir, &task_bin, &["working-set", "--json"]);
    fs::remove_dir_all(&dir).ok();

    assert_eq!(stdout_json(&default).as_array().unwrap().len(), 2);
    assert_eq!(stdout_json(&with_deleted).as_array().unwrap().len(), 3);
    assert_eq!(stdout_json(&working_set).as_array().unwrap().len(), 2);
}

#[test]
fn plain_list_renders_a_table() {
    let dir = temp_dir("cli-table");
    let task_bin = install_fake_task(&dir);
    write_export(&dir);

    let output = run(&dir, &task_bin, &["list", "project", "home"]);
    fs::remove_dir_all(&dir).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Description"));
    assert!(stdout.contains("Water plants"));
    assert!(!stdout.contains("Write report"));
}

#[test]
fn projects_are_distinct_and_sorted() {
    let dir = temp_dir("cli-projects");
    let task_bin = install_fake_task(&dir);
    write_export(&dir);

    let output = run(&dir, &task_bin, &["projects", "--json"]);
    fs::remove_dir_all(&dir).ok();

    assert_eq!(stdout_json(&output), serde_json::json!(["home", "work"]));
}

#[test]
fn add_creates_then_reads_back_the_task() {
    let dir = temp_dir("cli-add");
    let task_bin = install_fake_task(&dir);
    write_export(&dir);

    let output = run(
        &dir,
        &task_bin,
        &["add", "Buy milk", "--due", "tomorrow", "--json"],
    );
    let log = calls(&dir);
    fs::remove_dir_all(&dir).ok();

    assert!(output.status.success());
    let task = stdout_json(&output);
    assert_eq!(task["id"], 42);
    assert_eq!(task["description"], "Buy milk");
    assert_eq!(task["status"], "pending");
    assert_eq!(
        log,
        [
            "add Buy milk due:tomorrow rc.confirmation=off",
            "42 export rc.confirmation=off"
        ]
    );
}

#[test]
fn add_failure_reports_command_failed() {
    let dir = temp_dir("cli-add-fail");
    let task_bin = install_fake_task(&dir);

    let output = run(&dir, &task_bin, &["add", "fail"]);
    fs::remove_dir_all(&dir).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: command_failed - Cannot add task."));
}

#[test]
fn done_unknown_task_is_no_task() {
    let dir = temp_dir("cli-done-missing");
    let task_bin = install_fake_task(&dir);

    let output = run(&dir, &task_bin, &["done", "999"]);
    fs::remove_dir_all(&dir).ok();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: no_task - No tasks specified."));
}

#[test]
fn done_and_delete_pass_extra_rc_overrides() {
    let dir = temp_dir("cli-done");
    let task_bin = install_fake_task(&dir);

    let done = run(&dir, &task_bin, &["done", "1", "--rc", "verbose=nothing"]);
    let delete = run(&dir, &task_bin, &["delete", "2"]);
    let log = calls(&dir);
    fs::remove_dir_all(&dir).ok();

    assert!(done.status.success());
    assert!(delete.status.success());
    assert_eq!(
        String::from_utf8_lossy(&done.stdout).trim(),
        "Completed task 1"
    );
    assert_eq!(
        log,
        [
            "1 done rc.confirmation=off rc.verbose=nothing",
            "2 delete rc.confirmation=off"
        ]
    );
}

#[test]
fn show_missing_task_is_no_task() {
    let dir = temp_dir("cli-show");
    let task_bin = install_fake_task(&dir);

    let output = run(&dir, &task_bin, &["show", "17"]);
    fs::remove_dir_all(&dir).ok();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: no_task"));
}

#[test]
fn missing_binary_is_command_not_found() {
    let dir = temp_dir("cli-missing-bin");
    let missing = dir.join("not-installed").join("task");

    let outputs = [
        run(&dir, &missing, &["list", "pending"]),
        run(&dir, &missing, &["add", "Buy milk"]),
        run(&dir, &missing, &["done", "1"]),
        run(&dir, &missing, &["delete", "1"]),
    ];
    fs::remove_dir_all(&dir).ok();

    for output in outputs {
        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: command_not_found"));
    }
}

#[test]
fn invalid_rc_override_is_rejected() {
    let dir = temp_dir("cli-bad-rc");
    let task_bin = install_fake_task(&dir);

    let output = run(&dir, &task_bin, &["projects", "--rc", "confirmation"]);
    fs::remove_dir_all(&dir).ok();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: invalid_input"));
}

#[test]
fn unknown_priority_is_invalid_input() {
    let dir = temp_dir("cli-bad-priority");
    let task_bin = install_fake_task(&dir);

    let output = run(&dir, &task_bin, &["add", "Buy milk", "--priority", "X"]);
    let log = calls(&dir);
    fs::remove_dir_all(&dir).ok();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: invalid_input"));
    assert!(log.is_empty());
}
