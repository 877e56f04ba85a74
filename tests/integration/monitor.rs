#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::{install_fake_systemctl, path_with, read_state, write_config, write_script};
use std::fs;
use tempfile::tempdir;

fn mail_capture(dir: &std::path::Path) -> String {
    write_script(
        dir,
        "fake-mail",
        "#!/bin/sh\necho \"$@\" >> \"$(dirname \"$0\")/mail-args.txt\"\ncat >> \"$(dirname \"$0\")/mail-body.txt\"\n",
    )
    .display()
    .to_string()
}

#[test]
fn recovers_failed_service_and_resets_counter() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    let config = write_config(
        dir.path(),
        "services:\n  - name: web.service\n    action: restart\n",
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .env("PATH", path_with(&bin))
        .arg("run")
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let calls = fs::read_to_string(bin.join("calls.log")).unwrap();
    assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["restart web.service"]);

    let state = read_state(dir.path());
    assert_eq!(state["web.service"]["failures"], 0);
    assert!(!dir.path().join("svcmon.lock").exists());
}

#[test]
fn exhausted_retries_send_one_alert() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    let mail = mail_capture(&dir.path().join("mail"));
    let config = write_config(
        dir.path(),
        &format!(
            "alert_threshold: 1\nservices:\n  - name: db.service\n    action: restart\nnotify:\n  method: mail\n  to: ops@example.com\n  mail_command: \"{mail}\"\n"
        ),
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .env("PATH", path_with(&bin))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success();

    let calls = fs::read_to_string(bin.join("calls.log")).unwrap();
    assert_eq!(calls.lines().count(), 3);
    assert!(calls.lines().all(|line| line == "restart db.service"));

    let state = read_state(dir.path());
    assert_eq!(state["db.service"]["failures"], 1);
    assert!(state["db.service"]["last_alert"].as_u64().unwrap() > 0);

    let args = fs::read_to_string(dir.path().join("mail/mail-args.txt")).unwrap();
    assert!(args.contains("CRITICAL: Service 'db.service' failed on"));
    assert!(args.trim_end().ends_with("ops@example.com"));
    let body = fs::read_to_string(dir.path().join("mail/mail-body.txt")).unwrap();
    assert!(body.contains("db.service"));
    assert!(body.contains("restart"));
}

#[test]
fn alert_below_threshold_is_not_sent() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    let mail = mail_capture(&dir.path().join("mail"));
    let config = write_config(
        dir.path(),
        &format!(
            "retry_count: 1\nservices:\n  - name: db.service\n    action: restart\nnotify:\n  method: mail\n  to: ops@example.com\n  mail_command: \"{mail}\"\n"
        ),
    );

    for _ in 0..2 {
        Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
            .env("PATH", path_with(&bin))
            .args(["run", "--once", "--config"])
            .arg(&config)
            .assert()
            .success();
    }

    let state = read_state(dir.path());
    assert_eq!(state["db.service"]["failures"], 2);
    assert_eq!(state["db.service"]["last_alert"], 0);
    assert!(!dir.path().join("mail/mail-args.txt").exists());
}

#[test]
fn missing_and_masked_units_are_skipped() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    let config = write_config(
        dir.path(),
        "services:\n  - name: ghost.service\n    action: restart\n  - name: old.service\n    action: start\n",
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .env("PATH", path_with(&bin))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicates::str::contains("does not exist"))
        .stdout(predicates::str::contains("is masked"));

    assert!(!bin.join("calls.log").exists());
    let state = read_state(dir.path());
    assert!(state.get("ghost.service").is_none());
    assert!(state.get("old.service").is_none());
}

#[test]
fn existing_counters_survive_between_runs() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    fs::create_dir_all(dir.path().join("state")).unwrap();
    fs::write(
        dir.path().join("state/state.json"),
        r#"{"db.service": {"failures": 4, "last_alert": 1700000000.5}, "retired.service": {"failures": 2, "last_alert": 0}}"#,
    )
    .unwrap();
    let config = write_config(
        dir.path(),
        "retry_count: 1\nservices:\n  - name: db.service\n    action: restart\n    alarm: false\n",
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .env("PATH", path_with(&bin))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success();

    let state = read_state(dir.path());
    assert_eq!(state["db.service"]["failures"], 5);
    assert_eq!(state["db.service"]["last_alert"], 1700000000);
    assert_eq!(state["retired.service"]["failures"], 2);
}

#[test]
fn corrupt_state_file_starts_fresh() {
    let dir = tempdir().unwrap();
    let bin = install_fake_systemctl(&dir.path().join("bin"));
    fs::create_dir_all(dir.path().join("state")).unwrap();
    fs::write(dir.path().join("state/state.json"), "{not json").unwrap();
    let config = write_config(
        dir.path(),
        "retry_count: 1\nservices:\n  - name: db.service\n    action: restart\n",
    );

    Command::new(assert_cmd::cargo::cargo_bin!("svcmon"))
        .env("PATH", path_with(&bin))
        .args(["run", "--once", "--config"])
        .arg(&config)
        .assert()
        .success();

    let state = read_state(dir.path());
    assert_eq!(state["db.service"]["failures"], 1);
}
