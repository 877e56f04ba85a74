//! The detect → recover → escalate control loop.
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, warn};

use crate::alert::{AlertGate, AlertMessage};
use crate::config::{Config, ServiceSpec};
use crate::constants::SHUTDOWN_POLL_STEP;
use crate::diagnostics::Diagnostics;
use crate::error::MonitorError;
use crate::notify::Notifier;
use crate::probe::ServiceManager;
use crate::recovery::{RecoveryExecutor, RecoveryPolicy};
use crate::state::{StateStore, StateTable};

/// Checks every configured service, repairs what it can and escalates what it cannot.
pub struct Monitor {
    /// Immutable configuration shared with the cycle iterator.
    config: Arc<Config>,
    /// Host backend used for probing and recovery.
    manager: Box<dyn ServiceManager>,
    /// Alert transport.
    notifier: Box<dyn Notifier>,
    /// Supplies the alert body sections.
    diagnostics: Box<dyn Diagnostics>,
    /// Persistence for the failure table.
    store: StateStore,
    /// In-memory failure table; the only writer is this monitor.
    state: StateTable,
    gate: AlertGate,
    policy: RecoveryPolicy,
}

impl Monitor {
    /// Builds a monitor and loads the persisted failure table.
    pub fn new(
        config: Config,
        manager: Box<dyn ServiceManager>,
        notifier: Box<dyn Notifier>,
        diagnostics: Box<dyn Diagnostics>,
    ) -> Self {
        let store = StateStore::new(config.state_file.clone());
        let state = store.load();
        let gate = AlertGate::from(&config);
        let policy = RecoveryPolicy::from(&config);

        Self {
            config: Arc::new(config),
            manager,
            notifier,
            diagnostics,
            store,
            state,
            gate,
            policy,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &StateTable {
        &self.state
    }

    /// Writes the table to disk. Failures are logged and the loop carries on
    /// with the in-memory table.
    fn persist(&self) {
        if let Err(err) = self.store.save(&self.state) {
            error!("Failed to save state to {:?}: {err}", self.store.path());
        }
    }

    /// Runs one cycle using the wall clock for alert decisions.
    pub fn run_cycle(&mut self) {
        self.cycle(&epoch_now);
    }

    /// Runs one cycle as if the current epoch time were `now`.
    pub fn run_cycle_at(&mut self, now: u64) {
        self.cycle(&|| now);
    }

    fn cycle(&mut self, clock: &dyn Fn() -> u64) {
        let config = Arc::clone(&self.config);
        for spec in &config.services {
            self.check(spec, clock);
        }
    }

    /// Checks a single service as if the current epoch time were `now`.
    pub fn check_service(&mut self, spec: &ServiceSpec, now: u64) {
        self.check(spec, &|| now);
    }

    fn check(&mut self, spec: &ServiceSpec, clock: &dyn Fn() -> u64) {
        let name = spec.name.as_str();
        debug!("Checking service: {name}");

        if !self.manager.exists(name) {
            warn!("Service '{name}' does not exist, skipping");
            return;
        }

        if self.manager.is_masked(name) {
            info!("Service '{name}' is masked, skipping");
            return;
        }

        if self.manager.is_active(name) {
            info!("Service '{name}' is active");
            if self.state.get_or_default(name).failures > 0 {
                self.state.entry(name).failures = 0;
                self.persist();
            }
            return;
        }

        let failures = {
            let entry = self.state.entry(name);
            entry.failures = entry.failures.saturating_add(1);
            entry.failures
        };
        error!("Service '{name}' is not active (consecutive failures: {failures})");
        self.persist();

        let recovered =
            RecoveryExecutor::new(self.manager.as_ref(), self.policy).perform(name, spec.action);

        if recovered {
            info!("Successfully recovered '{name}'");
            self.state.entry(name).failures = 0;
            self.persist();
            return;
        }

        error!(
            "CRITICAL: Failed to recover '{name}' after {} attempts",
            self.policy.retry_count
        );

        let now = clock();
        let state = self.state.get_or_default(name);
        if !self.gate.should_alert(&state, spec.alarm, now) {
            debug!(
                "No alert for '{name}' (failures {}, last alert {})",
                state.failures, state.last_alert
            );
            return;
        }

        let message = AlertMessage::compose(
            name,
            spec.action,
            &state,
            self.policy.retry_count,
            self.diagnostics.as_ref(),
            now,
        );

        if self.notifier.send(&message.subject, &message.body) {
            warn!("Alert sent for '{name}' after {} failures", state.failures);
            self.state.entry(name).last_alert = now;
            self.persist();
        } else {
            error!("Failed to send alert for '{name}'");
        }
    }

    /// Runs cycles until `running` is cleared, or once in one-shot mode.
    ///
    /// The table is saved before returning on every path, including a panic
    /// raised from inside a cycle.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), MonitorError> {
        info!(
            "Starting Service Monitor on {}",
            self.diagnostics.hostname()
        );
        info!("Monitoring {} services", self.config.services.len());
        if self.config.daemon {
            info!(
                "Running in daemon mode, checking every {:?}",
                self.config.interval
            );
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_loop(running)));

        self.persist();
        info!("Service Monitor stopped");

        outcome.map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!("Unexpected error in control loop: {message}");
            MonitorError::Unexpected(message)
        })
    }

    fn run_loop(&mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            self.run_cycle();

            if !self.config.daemon {
                break;
            }

            sleep_while_running(self.config.interval, running);
        }
    }
}

/// Sleeps for `duration` in short steps, returning early once `running` is cleared.
pub fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let mut slept = Duration::ZERO;
    while slept < duration {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let step = duration.saturating_sub(slept).min(SHUTDOWN_POLL_STEP);
        thread::sleep(step);
        slept += step;
    }
}

/// Seconds since the Unix epoch.
pub fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
