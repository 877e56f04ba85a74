#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::{read_state, write_config};
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn run_once_without_services_saves_state_and_releases_lock() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "services: []\n");

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success();

    assert!(dir.path().join("state/state.json").exists());
    assert!(read_state(dir.path()).as_object().unwrap().is_empty());
    assert!(!dir.path().join("svcmon.lock").exists());
    assert!(dir.path().join("svcmon.log").exists());
}

#[test]
fn live_lock_holder_blocks_second_instance() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "services: []\n");
    let lock_path = dir.path().join("svcmon.lock");
    fs::write(&lock_path, std::process::id().to_string()).unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Another instance is already running"));

    assert_eq!(
        fs::read_to_string(&lock_path).unwrap(),
        std::process::id().to_string()
    );
}

#[test]
fn stale_lock_is_reclaimed() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "services: []\n");
    let lock_path = dir.path().join("svcmon.lock");
    fs::write(&lock_path, "999999999").unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success();

    assert!(!lock_path.exists());
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&missing)
        .assert()
        .failure();
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "services:\n  - name: web\n    action: restart\n  - name: web\n    action: stop\n",
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("web"));
}

#[test]
fn daemon_mode_rejects_zero_interval() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "interval: 0\nservices: []\n");

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--daemon", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("interval must be greater than zero"));

    assert!(!dir.path().join("svcmon.lock").exists());
}

#[test]
fn root_requirement_is_enforced() {
    if nix::unistd::geteuid().is_root() {
        return;
    }

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "services: []\n");
    let contents = fs::read_to_string(&config)
        .unwrap()
        .replace("require_root: false", "require_root: true");
    fs::write(&config, contents).unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .failure();

    assert!(!dir.path().join("svcmon.lock").exists());
}

#[test]
fn status_reports_persisted_counters() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "services:\n  - name: web\n    action: restart\n  - name: db\n    action: start\n",
    );
    fs::create_dir_all(dir.path().join("state")).unwrap();
    fs::write(
        dir.path().join("state/state.json"),
        r#"{"web": {"failures": 3, "last_alert": 0}, "legacy": {"failures": 1, "last_alert": 0}}"#,
    )
    .unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("db"))
        .stdout(predicate::str::contains("(removed)"))
        .stdout(predicate::str::contains("never"));

    let output = Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["status", "--json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["web"]["failures"], 3);
    assert_eq!(parsed["legacy"]["failures"], 1);
}

#[test]
fn rejects_conflicting_mode_flags() {
    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .args(["run", "--once", "--daemon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
