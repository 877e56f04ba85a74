//! Capabilities the control loop consumes to observe and act on services.
use std::time::Duration;

use crate::config::ActionKind;
use crate::constants::FAILED_COMMAND_EXIT_CODE;

/// Result of invoking an external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output used when a command could not run to completion (spawn error or timeout).
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: FAILED_COMMAND_EXIT_CODE,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Read-only liveness queries against the host service manager.
pub trait HealthProbe {
    /// Whether the unit is known to the host.
    fn exists(&self, service: &str) -> bool;
    /// Whether the unit is administratively masked.
    fn is_masked(&self, service: &str) -> bool;
    /// Whether the unit is currently active.
    fn is_active(&self, service: &str) -> bool;
}

/// Invokes recovery actions against the host service manager.
pub trait ActionExecutor {
    /// Runs `action` on `service`, giving up after `timeout`. A timeout is
    /// reported as a failed [`CommandOutput`], never as a panic.
    fn invoke(&self, service: &str, action: ActionKind, timeout: Duration) -> CommandOutput;
}

/// A host backend able to both probe and act on services.
pub trait ServiceManager: HealthProbe + ActionExecutor {}

impl<T: HealthProbe + ActionExecutor> ServiceManager for T {}
