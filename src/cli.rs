//! Command-line interface for svcmon.
use std::{str::FromStr, time::Duration};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::config::parse_duration;
use crate::constants::DEFAULT_CONFIG_PATH;

/// Verbosity accepted by `--log-level`: a level name or a number from 0 (off)
/// to 5 (trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

/// Levels indexed by their numeric shorthand.
const LEVELS_BY_NUMBER: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

impl LogLevelArg {
    /// Directive for [`tracing_subscriber::EnvFilter`].
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.0
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = raw.parse::<usize>() {
            return LEVELS_BY_NUMBER
                .get(number)
                .copied()
                .map(LogLevelArg)
                .ok_or_else(|| format!("log level number '{number}' is out of range (0-5)"));
        }

        let level = match raw.to_ascii_lowercase().as_str() {
            "off" | "none" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("unknown log level '{raw}'")),
        };
        Ok(LogLevelArg(level))
    }
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    let interval = parse_duration(raw).map_err(|err| err.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

/// Command-line interface for svcmon.
#[derive(Parser)]
#[command(name = "svcmon", version, author)]
#[command(about = "Monitors system services, recovers failures and escalates outages", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for svcmon.
#[derive(Subcommand)]
pub enum Commands {
    /// Check every configured service, recovering and alerting as needed.
    Run {
        /// Path to the configuration file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Keep checking at the configured interval until interrupted.
        #[arg(long, conflicts_with = "once")]
        daemon: bool,

        /// Perform a single cycle and exit, even if the config enables daemon mode.
        #[arg(long)]
        once: bool,

        /// Override the delay between cycles (e.g., "60", "30s", "5m").
        #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
        interval: Option<Duration>,
    },

    /// Show the persisted failure and alert counters.
    Status {
        /// Path to the configuration file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Emit machine-readable JSON output instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
