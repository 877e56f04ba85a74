//! Host diagnostics used to fill alert bodies.
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    thread,
};

use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, ProcessesToUpdate, System};

use crate::command::run_command;
use crate::constants::{
    ALERT_JOURNAL_LINES, ALERT_LOG_LINES, ALERT_TOP_PROCESSES, PROBE_TIMEOUT,
};

/// Supplies the free-form text sections of an alert.
pub trait Diagnostics {
    fn hostname(&self) -> String;
    /// Kernel, uptime, load and memory overview.
    fn system_info(&self) -> String;
    /// Status, unit properties and recent journal entries for `service`.
    fn service_info(&self, service: &str) -> String;
    /// Top processes by CPU and memory.
    fn process_overview(&self) -> String;
    /// Tail of the monitor's own log.
    fn recent_logs(&self) -> String;
}

/// Unit properties copied from `systemctl show` into the alert.
const SERVICE_PROPERTIES: [&str; 5] = [
    "MainPID",
    "ActiveState",
    "SubState",
    "LoadState",
    "UnitFileState",
];

/// Diagnostics gathered from the local machine.
#[derive(Debug, Clone)]
pub struct HostDiagnostics {
    log_file: PathBuf,
    systemctl: String,
}

impl HostDiagnostics {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            systemctl: "systemctl".to_string(),
        }
    }
}

impl Diagnostics for HostDiagnostics {
    fn hostname(&self) -> String {
        nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .or_else(System::host_name)
            .unwrap_or_else(|| "localhost".to_string())
    }

    fn system_info(&self) -> String {
        let mut system = System::new();
        system.refresh_memory();

        let load = System::load_average();
        let mut info = vec![
            format!("Hostname: {}", self.hostname()),
            format!(
                "System: {} {}",
                System::long_os_version().unwrap_or_default(),
                System::kernel_version().unwrap_or_default()
            ),
            format!("Uptime: {}", format_uptime(System::uptime())),
            format!(
                "Load Average: {:.2} {:.2} {:.2}",
                load.one, load.five, load.fifteen
            ),
            format!("Memory: {}", format_bytes(system.total_memory())),
            format!("Available: {}", format_bytes(system.available_memory())),
        ];

        let disks = Disks::new_with_refreshed_list();
        if let Some(root) = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
        {
            info.push(format!(
                "Root Disk: {} total, {} available",
                format_bytes(root.total_space()),
                format_bytes(root.available_space())
            ));
        }

        info.join("\n")
    }

    fn service_info(&self, service: &str) -> String {
        let status = run_command(&self.systemctl, &["is-active", service], PROBE_TIMEOUT);
        let mut info = vec![
            format!("Service: {service}"),
            format!("Status: {}", status.stdout),
        ];

        let show = run_command(
            &self.systemctl,
            &["show", service, "--no-pager"],
            PROBE_TIMEOUT,
        );
        info.extend(
            show.stdout
                .lines()
                .filter(|line| {
                    line.split_once('=')
                        .is_some_and(|(key, _)| SERVICE_PROPERTIES.contains(&key))
                })
                .map(str::to_string),
        );

        let lines = ALERT_JOURNAL_LINES.to_string();
        let journal = run_command(
            "journalctl",
            &["-u", service, "-n", &lines, "--no-pager"],
            PROBE_TIMEOUT,
        );
        info.push(format!("\nRecent Journal Entries:\n{}", journal.stdout));

        info.join("\n")
    }

    fn process_overview(&self) -> String {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut processes: Vec<_> = system.processes().values().collect();

        processes.sort_by(|a, b| b.cpu_usage().total_cmp(&a.cpu_usage()));
        let by_cpu: Vec<String> = processes
            .iter()
            .take(ALERT_TOP_PROCESSES)
            .map(|p| {
                format!(
                    "{:>8} {:>6.1}% {:>10}  {}",
                    p.pid().as_u32(),
                    p.cpu_usage(),
                    format_bytes(p.memory()),
                    p.name().to_string_lossy()
                )
            })
            .collect();

        processes.sort_by_key(|p| std::cmp::Reverse(p.memory()));
        let by_mem: Vec<String> = processes
            .iter()
            .take(ALERT_TOP_PROCESSES)
            .map(|p| {
                format!(
                    "{:>8} {:>10} {:>6.1}%  {}",
                    p.pid().as_u32(),
                    format_bytes(p.memory()),
                    p.cpu_usage(),
                    p.name().to_string_lossy()
                )
            })
            .collect();

        let load = System::load_average();
        format!(
            "=== Top Processes by CPU ===\n{}\n\n=== Top Processes by Memory ===\n{}\n\n=== Load Averages ===\n{:.2} {:.2} {:.2}",
            by_cpu.join("\n"),
            by_mem.join("\n"),
            load.one,
            load.five,
            load.fifteen
        )
    }

    fn recent_logs(&self) -> String {
        match tail_lines(&self.log_file, ALERT_LOG_LINES) {
            Ok(lines) if !lines.is_empty() => lines.join("\n"),
            _ => "Log file not available".to_string(),
        }
    }
}

/// Reads the last `lines` lines of a file.
pub fn tail_lines(path: &Path, lines: usize) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    Ok(all_lines[start..].to_vec())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{days}d {hours}h {minutes}m")
}
