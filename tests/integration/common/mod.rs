#![allow(dead_code)]

use std::{
    env, fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Writes a config rooted in `dir` whose state, lock and log files stay inside it.
pub fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let config_path = dir.join("svcmon.yaml");
    fs::write(
        &config_path,
        format!(
            r#"version: "1"
require_root: false
retry_delay: 0
stabilize_delay: 0
action_timeout: 5
state_file: "{state}"
lock_file: "{lock}"
log_file: "{log}"
{extra}
"#,
            state = dir.join("state/state.json").display(),
            lock = dir.join("svcmon.lock").display(),
            log = dir.join("svcmon.log").display(),
        ),
    )
    .expect("failed to write config");
    config_path
}

/// Installs an executable shell script named `name` in `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("failed to create script dir");
    let path = dir.join(name);
    fs::write(&path, body).expect("failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

/// Stand-in `systemctl`: `web.service` comes back after a restart, `db.service`
/// never does, and `old.service` is masked.
pub fn install_fake_systemctl(bin_dir: &Path) -> PathBuf {
    write_script(
        bin_dir,
        "systemctl",
        r#"#!/bin/sh
dir="$(dirname "$0")"
case "$1" in
  list-unit-files)
    shift 3
    for unit in "$@"; do
      case "$unit" in
        web.service|db.service|old.service) echo "$unit enabled enabled" ;;
      esac
    done
    ;;
  is-enabled)
    case "$2" in
      old.service) echo masked; exit 1 ;;
      *) echo enabled ;;
    esac
    ;;
  is-active)
    if [ -f "$dir/$2.up" ]; then echo active; else echo failed; exit 3; fi
    ;;
  show)
    echo "ActiveState=failed"
    echo "SubState=failed"
    ;;
  *)
    echo "$1 $2" >> "$dir/calls.log"
    if [ "$2" = "web.service" ]; then
      touch "$dir/$2.up"
    else
      echo "Job for $2 failed" >&2
      exit 1
    fi
    ;;
esac
"#,
    );
    bin_dir.to_path_buf()
}

/// PATH with `bin_dir` searched first.
pub fn path_with(bin_dir: &Path) -> String {
    match env::var("PATH") {
        Ok(existing) => format!("{}:{existing}", bin_dir.display()),
        Err(_) => bin_dir.display().to_string(),
    }
}

pub fn read_state(dir: &Path) -> serde_json::Value {
    let contents =
        fs::read_to_string(dir.join("state/state.json")).expect("state file missing");
    serde_json::from_str(&contents).expect("state file is not JSON")
}
