use chrono::{Local, TimeZone};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    path::Path,
    process::ExitCode,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use svcmon::{
    cli::{Cli, Commands, parse_args},
    config::load_config,
    diagnostics::{Diagnostics, HostDiagnostics},
    error::MonitorError,
    lock::LockGuard,
    monitor::Monitor,
    notify,
    state::StateStore,
    systemd::Systemctl,
};

fn main() -> ExitCode {
    let args = parse_args();

    let outcome = match &args.command {
        Commands::Run {
            config,
            daemon,
            once,
            interval,
        } => start_monitor(&args, config, *daemon, *once, *interval),
        Commands::Status { config, json } => {
            init_logging(&args, None);
            show_status(config, *json)
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Cli, log_file: Option<&Path>) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(err) => {
            file_error = Some(format!("{err} ({})", path.display()));
            None
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();

    if let Some(err) = file_error {
        warn!("Logging to console only; cannot open log file: {err}");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn start_monitor(
    args: &Cli,
    config_path: &str,
    daemon: bool,
    once: bool,
    interval: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let mut config = match load_config(Some(config_path)) {
        Ok(config) => config,
        Err(err) => {
            init_logging(args, None);
            return Err(err.into());
        }
    };
    init_logging(args, Some(&config.log_file));

    if daemon {
        config.daemon = true;
    }
    if once {
        config.daemon = false;
    }
    if let Some(interval) = interval {
        config.interval = interval;
    }
    config.validate()?;

    if config.require_root && !nix::unistd::geteuid().is_root() {
        return Err(MonitorError::PrivilegeError.into());
    }

    if let Some(parent) = config.state_file.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(MonitorError::Io)?;
    }

    let mut lock = LockGuard::new(config.lock_file.clone());
    if !lock.acquire().map_err(MonitorError::Lock)? {
        return Err(MonitorError::LockHeld {
            path: config.lock_file.clone(),
        }
        .into());
    }

    let running = Arc::new(AtomicBool::new(true));
    register_signal_handler(Arc::clone(&running))?;

    let diagnostics = HostDiagnostics::new(config.log_file.clone());
    let notifier = notify::from_config(&config.notify, &diagnostics.hostname());
    let mut monitor = Monitor::new(
        config,
        Box::new(Systemctl::new()),
        notifier,
        Box::new(diagnostics),
    );

    let result = monitor.run(&running);
    lock.release();
    result?;

    Ok(())
}

fn show_status(config_path: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let config = load_config(Some(config_path))?;
    let table = StateStore::new(config.state_file.clone()).load();

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!(
        "{:<36} {:<12} {:>8}  {}",
        "SERVICE", "ACTION", "FAILURES", "LAST ALERT"
    );
    for spec in &config.services {
        let state = table.get_or_default(&spec.name);
        println!(
            "{:<36} {:<12} {:>8}  {}",
            spec.name,
            spec.action.as_ref(),
            state.failures,
            format_epoch(state.last_alert)
        );
    }

    for (name, state) in table.services() {
        if config.services.iter().any(|spec| &spec.name == name) {
            continue;
        }
        println!(
            "{:<36} {:<12} {:>8}  {}",
            name,
            "(removed)",
            state.failures,
            format_epoch(state.last_alert)
        );
    }

    Ok(())
}

fn format_epoch(secs: u64) -> String {
    if secs == 0 {
        return "never".to_string();
    }
    Local
        .timestamp_opt(secs as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn register_signal_handler(running: Arc<AtomicBool>) -> Result<(), Box<dyn Error>> {
    ctrlc::set_handler(move || {
        if running.swap(false, Ordering::SeqCst) {
            info!("Received shutdown signal, finishing current check");
        }
    })?;

    Ok(())
}
