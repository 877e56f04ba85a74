//! Configuration management for svcmon.
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, env, fs, path::Path, path::PathBuf, time::Duration};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::constants::{
    DEFAULT_ACTION_TIMEOUT, DEFAULT_ALERT_RATE_LIMIT_SECS, DEFAULT_ALERT_THRESHOLD,
    DEFAULT_CHECK_INTERVAL, DEFAULT_CONFIG_PATH, DEFAULT_LOCK_FILE, DEFAULT_LOG_FILE,
    DEFAULT_MAIL_COMMAND, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY,
    DEFAULT_STABILIZE_DELAY, DEFAULT_STATE_FILE,
};
use crate::error::MonitorError;

/// Recovery action applied to a service that is found not active.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    Restart,
    Start,
    Stop,
    Mask,
    Reload,
    TryRestart,
}

impl ActionKind {
    /// Whether a successful command must be followed by a liveness re-probe.
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::Start | Self::Restart | Self::TryRestart)
    }
}

/// A single monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceSpec {
    /// Unit name as understood by the host service manager (e.g. `nginx.service`).
    pub name: String,
    /// Action taken when the service is found not active.
    pub action: ActionKind,
    /// Whether persistent failures escalate to the notifier.
    #[serde(default = "default_alarm")]
    pub alarm: bool,
}

fn default_alarm() -> bool {
    true
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, action: ActionKind, alarm: bool) -> Self {
        Self {
            name: name.into(),
            action,
            alarm,
        }
    }
}

/// Transport used to deliver alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotifyMethod {
    /// Pipe a complete message into `sendmail -t -i`.
    #[default]
    Sendmail,
    /// Pipe the body into `mail -s <subject> <recipient>`.
    Mail,
    /// Alerts are disabled.
    None,
}

/// Alert delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub method: NotifyMethod,
    /// Recipient address. Alerts are skipped when absent.
    pub to: Option<String>,
    /// Sender header; defaults to `Service Monitor <noreply@HOST>`.
    pub from: Option<String>,
    /// Path to the `mail` binary for [`NotifyMethod::Mail`].
    pub mail_command: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            method: NotifyMethod::default(),
            to: None,
            from: None,
            mail_command: DEFAULT_MAIL_COMMAND.to_string(),
        }
    }
}

/// Represents the structure of the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version.
    pub version: String,
    /// Services to monitor, checked in declaration order.
    pub services: Vec<ServiceSpec>,
    /// Recovery attempts per failed check.
    pub retry_count: u32,
    /// Delay between failed recovery attempts.
    #[serde(deserialize_with = "deserialize_duration")]
    pub retry_delay: Duration,
    /// Hard timeout for each recovery command.
    #[serde(deserialize_with = "deserialize_duration")]
    pub action_timeout: Duration,
    /// Wait before re-probing a started/restarted service.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stabilize_delay: Duration,
    /// Failures required before an alert may fire.
    pub alert_threshold: u32,
    /// Minimum spacing between alerts for one service.
    #[serde(deserialize_with = "deserialize_duration")]
    pub alert_rate_limit: Duration,
    /// Delay between cycles in continuous mode.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// Run continuously instead of performing a single cycle.
    pub daemon: bool,
    /// Refuse to start unless running as root.
    pub require_root: bool,
    pub state_file: PathBuf,
    pub lock_file: PathBuf,
    pub log_file: PathBuf,
    pub notify: NotifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            services: Vec::new(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            stabilize_delay: DEFAULT_STABILIZE_DELAY,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            alert_rate_limit: Duration::from_secs(DEFAULT_ALERT_RATE_LIMIT_SECS),
            interval: DEFAULT_CHECK_INTERVAL,
            daemon: false,
            require_root: true,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    /// Rejects configurations the control loop cannot run safely.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.daemon && self.interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "interval must be greater than zero in daemon mode".into(),
            ));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(MonitorError::InvalidConfig(
                    "service name cannot be empty".into(),
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(MonitorError::InvalidConfig(format!(
                    "service '{}' is declared more than once",
                    service.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(raw) => parse_duration(&raw).map_err(serde::de::Error::custom),
    }
}

/// Parses a user-facing duration string in the format `<number>[s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, MonitorError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(MonitorError::InvalidConfig(
            "Duration value cannot be empty".into(),
        ));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| {
        MonitorError::InvalidConfig(format!("Invalid duration value: '{raw}'"))
    })?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Expands environment variables within a string.
fn expand_env_vars(input: &str) -> Result<String, MonitorError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .map_err(|err| MonitorError::InvalidConfig(err.to_string()))?;

    if let Some(missing) = re
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .find(|name| env::var(name).is_err())
    {
        return Err(MonitorError::MissingEnvVar(missing));
    }

    let result = re.replace_all(input, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_default()
    });
    Ok(result.to_string())
}

/// Parses configuration from YAML text, expanding environment variables first.
pub fn parse_config(content: &str) -> Result<Config, MonitorError> {
    let expanded = expand_env_vars(content)?;
    let config: Config =
        serde_yaml::from_str(&expanded).map_err(MonitorError::ConfigParseError)?;
    config.validate()?;
    Ok(config)
}

/// Loads and parses the configuration file.
pub fn load_config(config_path: Option<&str>) -> Result<Config, MonitorError> {
    let config_path = Path::new(config_path.unwrap_or(DEFAULT_CONFIG_PATH));

    let content = fs::read_to_string(config_path).map_err(|e| {
        MonitorError::ConfigReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    parse_config(&content)
}
