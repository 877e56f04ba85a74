//! Error handling for svcmon.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all fatal errors that can stop the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[source] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// Configuration parsed but describes an unusable setup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration references an environment variable that is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The monitor must run as root to manage system services.
    #[error("svcmon must be run as root")]
    PrivilegeError,

    /// Another live instance owns the lock file.
    #[error("Another instance is already running (lock file {path:?})")]
    LockHeld {
        /// Path of the contended lock file.
        path: PathBuf,
    },

    /// Error while acquiring the single-instance lock.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Error for the persisted state file.
    #[error("Service state error: {0}")]
    StateStore(#[from] StateStoreError),

    /// Generic I/O failure during startup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A panic escaped the control loop.
    #[error("Unexpected error in control loop: {0}")]
    Unexpected(String),
}

/// Error type for persistent service state file operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Error reading or writing the state file.
    #[error("Failed to access service state file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error (de)serializing JSON contents of the state file.
    #[error("Failed to parse service state file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Error type for the single-instance lock file.
#[derive(Debug, Error)]
pub enum LockError {
    /// Error creating, reading or writing the lock file.
    #[error("Failed to access lock file: {0}")]
    Io(#[from] std::io::Error),

    /// A stale lock was found but could not be removed.
    #[error("Failed to remove stale lock file {path:?}: {source}")]
    StaleRemoval {
        /// Path of the stale lock.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

/// Error type for notification transports.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The mail command could not be spawned or fed.
    #[error("Failed to run mail command '{command}': {source}")]
    CommandError {
        /// The command that failed.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The mail command ran but reported failure.
    #[error("Mail command '{command}' exited with status {code:?}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Exit code, if the command exited normally.
        code: Option<i32>,
    },
}
