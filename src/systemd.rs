//! `systemctl`-backed implementation of the probe and action capabilities.
use std::time::Duration;
use tracing::debug;

use crate::command::run_command;
use crate::config::ActionKind;
use crate::constants::PROBE_TIMEOUT;
use crate::probe::{ActionExecutor, CommandOutput, HealthProbe};

/// Talks to systemd through the `systemctl` command line tool.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: String,
    probe_timeout: Duration,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new()
    }
}

impl Systemctl {
    pub fn new() -> Self {
        Self::with_program("systemctl")
    }

    /// Uses an alternative `systemctl` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn query(&self, args: &[&str]) -> CommandOutput {
        run_command(&self.program, args, self.probe_timeout)
    }
}

impl HealthProbe for Systemctl {
    fn exists(&self, service: &str) -> bool {
        let qualified = format!("{service}.service");
        let mut args = vec!["list-unit-files", "--no-legend", "--no-pager", service];
        // list-unit-files only matches full unit names.
        if !has_unit_suffix(service) {
            args.push(&qualified);
        }
        let output = self.query(&args);
        let found = output.stdout.lines().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|unit| unit == service || unit == qualified)
        });
        debug!("Unit '{service}' exists: {found}");
        found
    }

    fn is_masked(&self, service: &str) -> bool {
        let output = self.query(&["is-enabled", service]);
        output.stdout.trim().starts_with("masked")
    }

    fn is_active(&self, service: &str) -> bool {
        let output = self.query(&["is-active", service]);
        output.is_success() && output.stdout.trim() == "active"
    }
}

impl ActionExecutor for Systemctl {
    fn invoke(&self, service: &str, action: ActionKind, timeout: Duration) -> CommandOutput {
        run_command(&self.program, &[action.as_ref(), service], timeout)
    }
}

const UNIT_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".target",
    ".timer",
    ".mount",
    ".automount",
    ".path",
    ".slice",
    ".scope",
    ".swap",
    ".device",
];

fn has_unit_suffix(name: &str) -> bool {
    UNIT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};
    use tempfile::tempdir;

    /// Writes a stand-in `systemctl` that answers from a fixed script.
    fn fake_systemctl(dir: &Path) -> Systemctl {
        let path = dir.join("systemctl");
        fs::write(
            &path,
            r#"#!/bin/sh
case "$1" in
  list-unit-files)
    shift 3
    echo "$@" >> "$(dirname "$0")/patterns.log"
    for unit in "$@"; do
      case "$unit" in
        nginx.service) echo "nginx.service enabled enabled" ;;
        old.service) echo "old.service masked enabled" ;;
      esac
    done
    ;;
  is-enabled)
    case "$2" in
      old.service) echo masked; exit 1 ;;
      *) echo disabled; exit 1 ;;
    esac
    ;;
  is-active)
    case "$2" in
      nginx.service) echo active ;;
      *) echo inactive; exit 3 ;;
    esac
    ;;
  restart)
    echo "$1 $2" >> "$(dirname "$0")/calls.log"
    ;;
  stop)
    echo "Failed to stop $2" >&2; exit 5
    ;;
esac
"#,
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Systemctl::with_program(path.to_string_lossy().to_string())
    }

    #[test]
    fn probes_interpret_systemctl_output() {
        let dir = tempdir().unwrap();
        let systemctl = fake_systemctl(dir.path());

        assert!(systemctl.exists("nginx.service"));
        assert!(!systemctl.exists("ghost.service"));

        assert!(systemctl.is_masked("old.service"));
        assert!(!systemctl.is_masked("nginx.service"), "disabled is not masked");

        assert!(systemctl.is_active("nginx.service"));
        assert!(!systemctl.is_active("old.service"));
    }

    #[test]
    fn bare_unit_name_is_looked_up_as_service() {
        let dir = tempdir().unwrap();
        let systemctl = fake_systemctl(dir.path());

        assert!(systemctl.exists("nginx"));
        assert!(!systemctl.exists("ghost"));
        assert!(!systemctl.exists("nginx.socket"));

        let patterns = fs::read_to_string(dir.path().join("patterns.log")).unwrap();
        assert_eq!(
            patterns.lines().collect::<Vec<_>>(),
            vec!["nginx nginx.service", "ghost ghost.service", "nginx.socket"]
        );
    }

    #[test]
    fn unit_suffix_detection() {
        assert!(has_unit_suffix("nginx.service"));
        assert!(has_unit_suffix("backup.timer"));
        assert!(!has_unit_suffix("nginx"));
        assert!(!has_unit_suffix("php8.2-fpm"));
    }

    #[test]
    fn invoke_passes_action_verb() {
        let dir = tempdir().unwrap();
        let systemctl = fake_systemctl(dir.path());

        let output = systemctl.invoke("web.service", ActionKind::Restart, Duration::from_secs(5));
        assert!(output.is_success());
        let calls = fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert_eq!(calls.trim(), "restart web.service");

        let output = systemctl.invoke("web.service", ActionKind::Stop, Duration::from_secs(5));
        assert_eq!(output.exit_code, 5);
        assert!(output.stderr.contains("Failed to stop"));
    }
}
