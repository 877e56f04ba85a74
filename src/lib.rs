//! svcmon watches a fixed list of system services, restarts the ones that have
//! failed, and escalates to an administrator when recovery keeps failing. Failure
//! counters persist across runs and a lock file keeps a single instance per host.

/// Alert decisions and message composition.
pub mod alert;

/// CLI interface.
pub mod cli;

/// Bounded-timeout command execution.
pub mod command;

/// Configuration management.
pub mod config;

/// Default tunables and paths.
pub mod constants;

/// Host diagnostics for alert bodies.
pub mod diagnostics;

/// Error handling.
pub mod error;

/// Single-instance lock file.
pub mod lock;

/// The control loop.
pub mod monitor;

/// Alert transports.
pub mod notify;

/// Probe and action capabilities.
pub mod probe;

/// Recovery with bounded retries.
pub mod recovery;

/// Persisted failure/alert state.
pub mod state;

/// systemd backend.
pub mod systemd;

#[doc(hidden)]
pub mod test_utils;
