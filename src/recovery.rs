//! Bounded-retry recovery of failed services.
use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::config::{ActionKind, Config};
use crate::probe::ServiceManager;

/// Timing and retry limits for recovery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Maximum number of attempts per call to [`RecoveryExecutor::perform`].
    pub retry_count: u32,
    /// Pause after a failed command before the next attempt.
    pub retry_delay: Duration,
    /// Hard timeout for each action command.
    pub action_timeout: Duration,
    /// Wait between a successful start/restart and the verification probe.
    pub stabilize_delay: Duration,
}

impl From<&Config> for RecoveryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            action_timeout: config.action_timeout,
            stabilize_delay: config.stabilize_delay,
        }
    }
}

/// Applies a service's configured action until it sticks or the attempts run out.
pub struct RecoveryExecutor<'a> {
    manager: &'a dyn ServiceManager,
    policy: RecoveryPolicy,
}

impl<'a> RecoveryExecutor<'a> {
    pub fn new(manager: &'a dyn ServiceManager, policy: RecoveryPolicy) -> Self {
        Self { manager, policy }
    }

    /// Returns `true` once an attempt succeeds and, for start-like actions, the
    /// service is confirmed active afterwards. A failed verification uses up
    /// the attempt it belongs to.
    pub fn perform(&self, service: &str, action: ActionKind) -> bool {
        let attempts = self.policy.retry_count;

        for attempt in 1..=attempts {
            info!("Attempt {attempt}/{attempts} to {action} '{service}'");
            let output = self
                .manager
                .invoke(service, action, self.policy.action_timeout);

            if output.is_success() {
                info!("Successfully performed {action} on '{service}'");

                if !action.requires_verification() {
                    return true;
                }

                pause(self.policy.stabilize_delay);
                if self.manager.is_active(service) {
                    info!("Verified '{service}' is active after {action}");
                    return true;
                }

                warn!("Service '{service}' still not active after {action}");
                continue;
            }

            warn!(
                "Failed to {action} '{service}' (exit code {}): {}",
                output.exit_code, output.stderr
            );

            if attempt < attempts {
                pause(self.policy.retry_delay);
            }
        }

        false
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
