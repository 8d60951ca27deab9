//! End-to-end tests for the `learnsync` binary.
//!
//! Every test runs against its own `LEARNSYNC_HOME` with the server pointed
//! at a closed port, so nothing leaves the machine.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn unreachable_home() -> TempDir {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.yaml"),
        "server:\n  base_url: http://127.0.0.1:1\n  timeout_secs: 2\n",
    )
    .unwrap();
    home
}

fn learnsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("learnsync").unwrap();
    cmd.env("LEARNSYNC_HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("LEARNSYNC_USER")
        .env_remove("LEARNSYNC_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn queue_offline(home: &TempDir, args: &[&str]) {
    learnsync(home)
        .args(["--user", "u1", "queue"])
        .args(args)
        .arg("--offline")
        .assert()
        .success();
}

#[test]
fn test_help() {
    let home = unreachable_home();
    learnsync(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn test_offline_enqueue_survives_restart() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["--user", "u1", "queue", "complete", "lesson-1", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued Lesson Complete"));
    queue_offline(&home, &["note", "lesson-1", "remember the recap"]);
    queue_offline(&home, &["bookmark", "lesson-2"]);

    learnsync(&home)
        .args(["--user", "u1", "queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued actions for u1 (3)"))
        .stdout(predicate::str::contains("Note Save"));
}

#[test]
fn test_status_json() {
    let home = unreachable_home();
    queue_offline(&home, &["bookmark", "lesson-1"]);
    queue_offline(&home, &["quiz", "quiz-1", "--answer", "q1=b", "--score", "0.5"]);

    let output = learnsync(&home)
        .args(["--user", "u1", "-o", "json", "queue", "status"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["pendingCount"], 2);
    assert_eq!(json["ownerPending"], 2);
    assert_eq!(json["retrying"], 0);
}

#[test]
fn test_list_json_carries_typed_payload() {
    let home = unreachable_home();
    queue_offline(&home, &["complete", "lesson-9", "--time-spent", "120"]);

    let output = learnsync(&home)
        .args(["--user", "u1", "-o", "json", "queue", "list"])
        .output()
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["count"], 1);
    assert_eq!(json["items"][0]["action"]["kind"], "lesson_complete");
    assert_eq!(json["items"][0]["action"]["payload"]["lessonId"], "lesson-9");
    assert_eq!(json["items"][0]["action"]["payload"]["timeSpentSecs"], 120);
}

#[test]
fn test_enqueue_with_unreachable_server_keeps_action() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["--user", "u1", "queue", "note", "lesson-1", "draft"])
        .assert()
        .success()
        .stdout(predicate::str::contains("will sync later"));

    learnsync(&home)
        .args(["--user", "u1", "queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(1)"));
}

#[test]
fn test_drain_while_offline() {
    let home = unreachable_home();
    queue_offline(&home, &["bookmark", "lesson-1"]);

    learnsync(&home)
        .args(["queue", "drain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 actions remain queued"));
}

#[test]
fn test_retry_while_offline_is_rejected() {
    let home = unreachable_home();
    queue_offline(&home, &["bookmark", "lesson-1"]);

    learnsync(&home)
        .args(["queue", "retry"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("while offline"));
}

#[test]
fn test_missing_user() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["queue", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No user given"));
}

#[test]
fn test_user_from_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.yaml"),
        "general:\n  user: config-user\nserver:\n  base_url: http://127.0.0.1:1\n",
    )
    .unwrap();

    learnsync(&home)
        .args(["queue", "bookmark", "lesson-1", "--offline"])
        .assert()
        .success();

    learnsync(&home)
        .args(["queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued actions for config-user (1)"));
}

#[test]
fn test_logout_requires_force() {
    let home = unreachable_home();
    queue_offline(&home, &["bookmark", "lesson-1"]);

    learnsync(&home)
        .args(["--user", "u1", "logout"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--force"));

    learnsync(&home)
        .args(["--user", "u1", "logout", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("discarded 1 unsynced actions"));

    learnsync(&home)
        .args(["--user", "u1", "queue", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(0)"));
}

#[test]
fn test_sync_status_unreachable() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["--user", "u1", "sync", "status"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Sync status fetch failed"));
}

#[test]
fn test_watch_single_offline_iteration() {
    let home = unreachable_home();
    queue_offline(&home, &["bookmark", "lesson-1"]);

    learnsync(&home)
        .args(["--user", "u1", "watch", "--iterations", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("offline"))
        .stdout(predicate::str::contains("1 actions pending"));
}

#[test]
fn test_invalid_strategy() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["--user", "u1", "sync", "verify", "--strategy", "coin-flip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn test_invalid_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("config.yaml"), "server: [not, a, map]\n").unwrap();

    learnsync(&home)
        .args(["--user", "u1", "queue", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn test_completions() {
    let home = unreachable_home();

    learnsync(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("learnsync"));
}
