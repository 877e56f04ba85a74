//! Runs external commands with a hard timeout and captured output.
use std::{
    io::Read,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

use crate::constants::COMMAND_POLL_INTERVAL;
use crate::probe::CommandOutput;

/// Runs `program` with `args`, killing it once `timeout` elapses.
///
/// Spawn failures and timeouts are folded into a failed [`CommandOutput`] so
/// callers can treat every outcome uniformly.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> CommandOutput {
    let rendered = render(program, args);
    debug!("Running `{rendered}` (timeout {:?})", timeout);

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            error!("Failed to run `{rendered}`: {err}");
            return CommandOutput::failed(err.to_string());
        }
    };

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let wait_result = wait_with_timeout(&mut child, timeout);
    let timed_out = matches!(wait_result, Ok(None));
    if timed_out {
        warn!("`{rendered}` timed out after {:?}. Terminating.", timeout);
        if let Err(err) = child.kill() {
            error!("Failed to terminate timed-out `{rendered}`: {err}");
        }
        let _ = child.wait();
    }

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);

    match wait_result {
        Ok(Some(status)) => CommandOutput {
            exit_code: exit_code(status),
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
        },
        Ok(None) => CommandOutput::failed(format!(
            "Command timed out after {} seconds",
            timeout.as_secs()
        )),
        Err(err) => {
            error!("Failed while waiting for `{rendered}`: {err}");
            CommandOutput::failed(err.to_string())
        }
    }
}

/// Wait for a child process with a timeout, returning `Ok(None)` on timeout.
pub fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(COMMAND_POLL_INTERVAL);
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}
