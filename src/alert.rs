//! Escalation decisions and alert message assembly.
use chrono::{Local, TimeZone};
use std::time::Duration;

use crate::config::{ActionKind, Config};
use crate::diagnostics::Diagnostics;
use crate::state::ServiceState;

/// Decides whether a persistently failing service should be escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertGate {
    /// Failures required before an alert may fire.
    pub threshold: u32,
    /// Minimum spacing between two alerts for the same service.
    pub rate_limit: Duration,
}

impl From<&Config> for AlertGate {
    fn from(config: &Config) -> Self {
        Self {
            threshold: config.alert_threshold,
            rate_limit: config.alert_rate_limit,
        }
    }
}

impl AlertGate {
    pub fn new(threshold: u32, rate_limit: Duration) -> Self {
        Self {
            threshold,
            rate_limit,
        }
    }

    /// Pure decision over persisted state and the current epoch time. Sending
    /// the alert and recording `last_alert` are left to the caller.
    pub fn should_alert(&self, state: &ServiceState, alarm_enabled: bool, now: u64) -> bool {
        alarm_enabled
            && state.failures >= self.threshold
            && now.saturating_sub(state.last_alert) >= self.rate_limit.as_secs()
    }
}

/// Subject and body of an escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Builds the alert for `service` from the collected diagnostics.
    pub fn compose(
        service: &str,
        action: ActionKind,
        state: &ServiceState,
        retry_count: u32,
        diagnostics: &dyn Diagnostics,
        now: u64,
    ) -> Self {
        let hostname = diagnostics.hostname();
        let checked_at = Local
            .timestamp_opt(now as i64, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| now.to_string());
        let failures = state.failures;

        let subject = format!("CRITICAL: Service '{service}' failed on {hostname}");

        let body = format!(
            "CRITICAL SERVICE ALERT
======================

Service '{service}' has failed {failures} consecutive times on {hostname}.

Alert Details:
---------------
Service: {service}
Hostname: {hostname}
Failure Count: {failures}
Last Check: {checked_at}
Configured Action: {action}
Retry Attempts: {retry_count}

System Information:
-------------------
{system}

Service Details:
----------------
{details}

System Process Overview:
------------------------
{processes}

Recent Service Monitor Logs:
----------------------------
{logs}

Recommended Actions:
-------------------
1. Check service status: systemctl status {service}
2. View service logs: journalctl -u {service} -f
3. Check system resources: free -h; df -h
4. Verify configuration files
5. Check for disk space issues

This is an automated alert from Service Monitor.
Failure count will reset when service returns to normal operation.
",
            system = diagnostics.system_info(),
            details = diagnostics.service_info(service),
            processes = diagnostics.process_overview(),
            logs = diagnostics.recent_logs(),
        );

        Self { subject, body }
    }
}
