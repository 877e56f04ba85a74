//! Shared helpers and in-memory fakes for tests.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Duration,
};

use crate::config::ActionKind;
use crate::diagnostics::Diagnostics;
use crate::notify::Notifier;
use crate::probe::{ActionExecutor, CommandOutput, HealthProbe};

/// Global lock for environment variable modifications in tests.
/// All tests that modify environment variables should acquire this lock
/// to prevent race conditions between parallel test executions.
pub static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct FakeUnit {
    masked: bool,
    active: bool,
    scripted_results: VecDeque<bool>,
    actions_succeed: bool,
    activate_on_success: bool,
    invocations: Vec<ActionKind>,
    active_probes: usize,
}

/// Scriptable stand-in for the host service manager. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    units: Arc<Mutex<HashMap<String, FakeUnit>>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_unit<R>(&self, service: &str, f: impl FnOnce(&mut FakeUnit) -> R) -> R {
        let mut units = self.units.lock().unwrap_or_else(|p| p.into_inner());
        f(units.entry(service.to_string()).or_default())
    }

    /// Registers a unit. Actions fail until configured otherwise.
    pub fn add_unit(&self, service: &str, active: bool) {
        self.with_unit(service, |unit| unit.active = active);
    }

    pub fn set_active(&self, service: &str, active: bool) {
        self.with_unit(service, |unit| unit.active = active);
    }

    pub fn set_masked(&self, service: &str, masked: bool) {
        self.with_unit(service, |unit| unit.masked = masked);
    }

    /// Every action command fails.
    pub fn fail_actions(&self, service: &str) {
        self.with_unit(service, |unit| {
            unit.actions_succeed = false;
            unit.scripted_results.clear();
        });
    }

    /// Every action command succeeds; `activates` decides whether the unit is
    /// active afterwards.
    pub fn succeed_actions(&self, service: &str, activates: bool) {
        self.with_unit(service, |unit| {
            unit.actions_succeed = true;
            unit.activate_on_success = activates;
            unit.scripted_results.clear();
        });
    }

    /// Per-attempt command results; successful scripted attempts activate the unit.
    pub fn script_actions(&self, service: &str, results: Vec<bool>) {
        self.with_unit(service, |unit| {
            unit.scripted_results = results.into();
            unit.activate_on_success = true;
        });
    }

    pub fn invocations(&self, service: &str) -> Vec<ActionKind> {
        self.with_unit(service, |unit| unit.invocations.clone())
    }

    /// Number of liveness probes issued since the first recovery action.
    pub fn active_probes(&self, service: &str) -> usize {
        self.with_unit(service, |unit| unit.active_probes)
    }

    fn known(&self, service: &str) -> bool {
        self.units
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(service)
    }
}

impl HealthProbe for FakeHost {
    fn exists(&self, service: &str) -> bool {
        self.known(service)
    }

    fn is_masked(&self, service: &str) -> bool {
        self.known(service) && self.with_unit(service, |unit| unit.masked)
    }

    fn is_active(&self, service: &str) -> bool {
        if !self.known(service) {
            return false;
        }
        self.with_unit(service, |unit| {
            if !unit.invocations.is_empty() {
                unit.active_probes += 1;
            }
            unit.active
        })
    }
}

impl ActionExecutor for FakeHost {
    fn invoke(&self, service: &str, action: ActionKind, _timeout: Duration) -> CommandOutput {
        self.with_unit(service, |unit| {
            unit.invocations.push(action);
            let ok = unit
                .scripted_results
                .pop_front()
                .unwrap_or(unit.actions_succeed);
            if ok {
                if unit.activate_on_success {
                    unit.active = true;
                }
                CommandOutput::success("")
            } else {
                CommandOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: format!("Job for {service} failed."),
                }
            }
        })
    }
}

/// Records every alert it is asked to deliver. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    attempts: Arc<Mutex<usize>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends report failure.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|p| p.into_inner()) = failing;
    }

    /// Successfully delivered `(subject, body)` pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Notifier for FakeNotifier {
    fn send(&self, subject: &str, body: &str) -> bool {
        *self.attempts.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        if *self.failing.lock().unwrap_or_else(|p| p.into_inner()) {
            return false;
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((subject.to_string(), body.to_string()));
        true
    }
}

/// Diagnostics with fixed, recognisable content.
#[derive(Debug, Clone, Default)]
pub struct StaticDiagnostics;

impl Diagnostics for StaticDiagnostics {
    fn hostname(&self) -> String {
        "test-host".to_string()
    }

    fn system_info(&self) -> String {
        "Hostname: test-host".to_string()
    }

    fn service_info(&self, service: &str) -> String {
        format!("Service: {service}\nStatus: failed")
    }

    fn process_overview(&self) -> String {
        "=== Top Processes by CPU ===".to_string()
    }

    fn recent_logs(&self) -> String {
        "no recent logs".to_string()
    }
}
