//! Constants and default tunables for svcmon.
//!
//! Every value here is a default that the configuration file may override.

use std::time::Duration;

// ============================================================================
// File System Constants
// ============================================================================

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/svcmon/svcmon.yaml";

/// Default location of the persisted failure/alert table.
pub const DEFAULT_STATE_FILE: &str = "/var/lib/svcmon/state.json";

/// Default location of the single-instance lock file.
pub const DEFAULT_LOCK_FILE: &str = "/run/svcmon.lock";

/// Default location of the monitor's own log file.
pub const DEFAULT_LOG_FILE: &str = "/var/log/svcmon.log";

/// Suffix appended to the state file path for write-then-rename saves.
pub const STATE_TMP_SUFFIX: &str = ".tmp";

// ============================================================================
// Recovery Timing
// ============================================================================

/// Number of recovery attempts before giving up on a service in a cycle.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Pause between recovery attempts after a failed command.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Hard timeout for a single recovery command.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Time given to a freshly (re)started service before it is re-probed.
pub const DEFAULT_STABILIZE_DELAY: Duration = Duration::from_secs(3);

/// Timeout applied to probe and diagnostic commands.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Polling interval while waiting for a child command to exit.
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported for commands that timed out or could not be spawned.
pub const FAILED_COMMAND_EXIT_CODE: i32 = -1;

// ============================================================================
// Alerting
// ============================================================================

/// Consecutive failures required before an alert is considered.
pub const DEFAULT_ALERT_THRESHOLD: u32 = 10;

/// Minimum number of seconds between two alerts for the same service.
pub const DEFAULT_ALERT_RATE_LIMIT_SECS: u64 = 3600;

/// Number of monitor log lines included in an alert body.
pub const ALERT_LOG_LINES: usize = 20;

/// Number of journal lines included in the service section of an alert.
pub const ALERT_JOURNAL_LINES: usize = 5;

/// Number of processes listed per ranking in the process overview.
pub const ALERT_TOP_PROCESSES: usize = 10;

// ============================================================================
// Control Loop
// ============================================================================

/// Delay between cycles in continuous mode.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a single sleep step, which bounds shutdown latency.
pub const SHUTDOWN_POLL_STEP: Duration = Duration::from_secs(1);

// ============================================================================
// Notification
// ============================================================================

/// Default sendmail invocation.
pub const SENDMAIL_COMMAND: &str = "sendmail";

/// Default `mail` binary used by the mail notifier.
pub const DEFAULT_MAIL_COMMAND: &str = "/usr/bin/mail";
