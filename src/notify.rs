//! Alert delivery through local mail commands.
use chrono::Local;
use std::{
    io::Write,
    process::{Command, Stdio},
    thread,
    time::Duration,
};
use tracing::{error, warn};

use crate::command::wait_with_timeout;
use crate::config::{NotifyConfig, NotifyMethod};
use crate::constants::{PROBE_TIMEOUT, SENDMAIL_COMMAND};
use crate::error::NotifyError;

/// Delivers an escalation. Returns `true` only when the message was handed off.
pub trait Notifier {
    fn send(&self, subject: &str, body: &str) -> bool;
}

/// Builds the notifier described by the configuration.
pub fn from_config(config: &NotifyConfig, hostname: &str) -> Box<dyn Notifier> {
    let Some(to) = config.to.clone().filter(|to| !to.trim().is_empty()) else {
        return Box::new(DisabledNotifier::new("no recipient configured"));
    };

    match config.method {
        NotifyMethod::Sendmail => {
            let from = config
                .from
                .clone()
                .unwrap_or_else(|| format!("Service Monitor <noreply@{hostname}>"));
            Box::new(SendmailNotifier::new(from, to))
        }
        NotifyMethod::Mail => Box::new(MailNotifier::new(config.mail_command.clone(), to)),
        NotifyMethod::None => Box::new(DisabledNotifier::new("notifications disabled")),
    }
}

/// Pipes a complete RFC 5322 message into `sendmail -t -i`.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    program: String,
    from: String,
    to: String,
    timeout: Duration,
}

impl SendmailNotifier {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            program: SENDMAIL_COMMAND.to_string(),
            from: from.into(),
            to: to.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Uses an alternative sendmail-compatible executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn message(&self, subject: &str, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            self.from,
            self.to,
            subject,
            Local::now().to_rfc2822(),
            body
        )
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, subject: &str, body: &str) -> bool {
        let message = self.message(subject, body);
        report(pipe_to_command(
            &self.program,
            &["-t", "-i"],
            message.as_bytes(),
            self.timeout,
        ))
    }
}

/// Pipes the body into `mail -s <subject> <recipient>`.
#[derive(Debug, Clone)]
pub struct MailNotifier {
    program: String,
    to: String,
    timeout: Duration,
}

impl MailNotifier {
    pub fn new(program: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            to: to.into(),
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl MailNotifier {
    /// Caps how long the mail command may run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Notifier for MailNotifier {
    fn send(&self, subject: &str, body: &str) -> bool {
        report(pipe_to_command(
            &self.program,
            &["-s", subject, &self.to],
            body.as_bytes(),
            self.timeout,
        ))
    }
}

/// Stands in when no transport is configured; every send fails.
#[derive(Debug, Clone)]
pub struct DisabledNotifier {
    reason: String,
}

impl DisabledNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Notifier for DisabledNotifier {
    fn send(&self, subject: &str, _body: &str) -> bool {
        warn!("Skipping alert '{subject}': {}", self.reason);
        false
    }
}

fn report(result: Result<(), NotifyError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            error!("Failed to send alert: {err}");
            false
        }
    }
}

fn pipe_to_command(
    program: &str,
    args: &[&str],
    input: &[u8],
    timeout: Duration,
) -> Result<(), NotifyError> {
    let command_error = |source: std::io::Error| NotifyError::CommandError {
        command: program.to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(command_error)?;

    // A recipient that never drains stdin must not outlast the timeout.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        thread::spawn(move || stdin.write_all(&input))
    });

    let waited = wait_with_timeout(&mut child, timeout);
    if !matches!(waited, Ok(Some(_))) {
        let _ = child.kill();
        let _ = child.wait();
    }
    let written = writer
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")))
        })
        .unwrap_or(Ok(()));

    match waited.map_err(command_error)? {
        Some(status) if status.success() => written.map_err(command_error),
        Some(status) => Err(NotifyError::CommandFailed {
            command: program.to_string(),
            code: status.code(),
        }),
        None => {
            warn!("`{program}` timed out after {timeout:?}");
            Err(NotifyError::CommandFailed {
                command: program.to_string(),
                code: None,
            })
        }
    }
}
