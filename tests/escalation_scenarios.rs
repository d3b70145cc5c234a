//! End-to-end escalation scenarios over the public API with a scripted host.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use storage_relief_agent::core::config::{Config, DatabaseConfig, StepConfig};
use storage_relief_agent::core::errors::{ActionError, Unavailable};
use storage_relief_agent::daemon::escalation::{EscalationOutcome, ProbeReading};
use storage_relief_agent::daemon::loop_main::{
    ESCALATION_JOB, SERVICE_WATCH_JOB, build_scheduler, run_once,
};
use storage_relief_agent::daemon::scheduler::{Pace, Pacer};
use storage_relief_agent::monitor::probe::{ResourceProbe, ServiceState, UsageSnapshot};
use storage_relief_agent::remediation::actions::{ClearSummary, RemediationActions};

struct HostState {
    disk_pct: f64,
    service: ServiceState,
    /// Percentage points each action kind frees.
    effects: HashMap<&'static str, f64>,
    fail_recreate: bool,
    calls: Vec<String>,
    disk_probes: usize,
}

struct ScriptedHost {
    state: Mutex<HostState>,
}

impl ScriptedHost {
    fn new(disk_pct: f64, effects: &[(&'static str, f64)]) -> Self {
        Self {
            state: Mutex::new(HostState {
                disk_pct,
                service: ServiceState::Active,
                effects: effects.iter().copied().collect(),
                fail_recreate: false,
                calls: Vec::new(),
                disk_probes: 0,
            }),
        }
    }

    fn act(&self, kind: &'static str, call: String) {
        let mut state = self.state.lock();
        let freed = state.effects.get(kind).copied().unwrap_or(0.0);
        state.disk_pct = (state.disk_pct - freed).max(0.0);
        state.calls.push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

impl ResourceProbe for ScriptedHost {
    fn disk_usage(&self) -> Result<UsageSnapshot, Unavailable> {
        let mut state = self.state.lock();
        state.disk_probes += 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let used = (state.disk_pct * 100.0).round() as u64;
        UsageSnapshot::from_bytes(used, 10_000)
    }

    fn memory_usage(&self) -> Result<UsageSnapshot, Unavailable> {
        UsageSnapshot::from_bytes(1, 2)
    }

    fn cpu_usage(&self) -> Result<f64, Unavailable> {
        Ok(10.0)
    }

    fn dir_size(&self, _path: &Path) -> Result<u64, Unavailable> {
        Ok(0)
    }

    fn service_state(&self, _name: &str) -> Result<ServiceState, Unavailable> {
        Ok(self.state.lock().service)
    }

    fn store_size(&self) -> Result<u64, Unavailable> {
        Ok(0)
    }
}

impl RemediationActions for ScriptedHost {
    fn vacuum_journal_older_than(&self, age: Duration) -> Result<(), ActionError> {
        self.act("vacuum", format!("vacuum {}s", age.as_secs()));
        Ok(())
    }

    fn clear_directory_unless_open(
        &self,
        path: &Path,
        _ignore: &[String],
    ) -> Result<ClearSummary, ActionError> {
        self.act("clear", format!("clear {}", path.display()));
        Ok(ClearSummary::default())
    }

    fn stop_service(&self, name: &str) -> Result<(), ActionError> {
        let mut state = self.state.lock();
        state.service = ServiceState::Inactive;
        state.calls.push(format!("stop {name}"));
        Ok(())
    }

    fn recreate_store(&self, databases: &[DatabaseConfig]) -> Result<(), ActionError> {
        let fail = self.state.lock().fail_recreate;
        if fail {
            self.state.lock().calls.push("recreate failed".to_string());
            return Err(ActionError::CommandFailed {
                command: "psql".into(),
                status: "exit status: 1".into(),
                stderr: "database \"archive\" is being accessed by other users".into(),
            });
        }
        self.act("recreate", format!("recreate {}", databases.len()));
        Ok(())
    }

    fn start_service(&self, name: &str) -> Result<(), ActionError> {
        let mut state = self.state.lock();
        state.service = ServiceState::Active;
        state.calls.push(format!("start {name}"));
        Ok(())
    }
}

fn percent(reading: Option<f64>) -> f64 {
    reading.expect("reading present")
}

#[test]
fn cheap_tiers_relieve_pressure_before_rebuild() {
    let config = Config::default();
    let host = ScriptedHost::new(95.0, &[("clear", 3.0), ("vacuum", 7.0)]);

    let run = run_once(&config, &host, &host);

    assert!(run.outcome.is_resolved());
    assert_eq!(
        host.calls(),
        vec!["clear /opt/mplc4/log".to_string(), "vacuum 604800s".to_string()]
    );
    assert_eq!(run.attempts.len(), 2);
    assert!((percent(run.attempts[0].after.as_ref().and_then(ProbeReading::percent)) - 92.0).abs() < 1e-6);
    assert!((percent(run.last_reading().percent()) - 85.0).abs() < 1e-6);
}

#[test]
fn every_tier_runs_when_pressure_persists() {
    let config = Config::default();
    let host = ScriptedHost::new(97.0, &[("clear", 1.0), ("vacuum", 1.0), ("recreate", 1.0)]);

    let run = run_once(&config, &host, &host);

    assert!(matches!(run.outcome, EscalationOutcome::ExhaustedStepsStillOverLimit));
    assert_eq!(
        host.calls(),
        vec![
            "clear /opt/mplc4/log",
            "vacuum 604800s",
            "vacuum 86400s",
            "stop mplc4",
            "recreate 2",
            "start mplc4",
        ]
    );
    assert!((percent(run.last_reading().percent()) - 93.0).abs() < 1e-6);
    assert_eq!(run.summary().outcome, "exhausted_steps_still_over_limit");
}

#[test]
fn failed_recreation_still_restarts_and_aborts() {
    let mut config = Config::default();
    config.escalation.steps = vec![
        StepConfig::VacuumJournal {
            older_than_secs: 3600,
        },
        StepConfig::RebuildStore {
            service: "mplc4".into(),
        },
        StepConfig::ClearDirectory {
            path: PathBuf::from("/srv/never"),
            ignore: Vec::new(),
        },
    ];
    let host = ScriptedHost::new(96.0, &[]);
    host.state.lock().fail_recreate = true;

    let run = run_once(&config, &host, &host);

    match &run.outcome {
        EscalationOutcome::AbortedOnActionFailure { step, name, cause } => {
            assert_eq!(*step, 1);
            assert_eq!(name, "rebuild_store(mplc4)");
            assert!(!cause.leaves_service_down());
            assert!(cause.to_string().contains("being accessed"));
        }
        other => panic!("unexpected outcome {other}"),
    }
    assert_eq!(
        host.calls(),
        vec!["vacuum 3600s", "stop mplc4", "recreate failed", "start mplc4"]
    );
    assert_eq!(host.state.lock().service, ServiceState::Active);

    let summary = serde_json::to_value(run.summary()).expect("summary json");
    assert_eq!(summary["outcome"], "aborted_on_action_failure");
    assert_eq!(summary["attempts"][1]["after"], serde_json::Value::Null);
}

struct TwoTicks {
    waits: usize,
}

impl Pacer for TwoTicks {
    fn wait(&mut self, _interval: Duration) -> Pace {
        self.waits += 1;
        if self.waits >= 2 { Pace::Stop } else { Pace::Continue }
    }
}

#[test]
fn scheduler_runs_escalation_then_service_watch_each_tick() {
    let mut config = Config::default();
    config.scheduler.interval_secs = 5;
    let host = ScriptedHost::new(50.0, &[]);

    let mut scheduler = build_scheduler(&config, &host, &host).expect("scheduler");
    assert_eq!(scheduler.job_names(), vec![ESCALATION_JOB, SERVICE_WATCH_JOB]);

    let mut pacer = TwoTicks { waits: 0 };
    scheduler.run(&mut pacer).expect("clean stop");

    assert_eq!(scheduler.ticks(), 2);
    assert_eq!(host.state.lock().disk_probes, 2);
    assert!(host.calls().is_empty());
}

#[test]
fn no_service_watch_without_services() {
    let mut config = Config::default();
    config.report.services.clear();
    let host = ScriptedHost::new(50.0, &[]);
    let scheduler = build_scheduler(&config, &host, &host).expect("scheduler");
    assert_eq!(scheduler.job_names(), vec![ESCALATION_JOB]);
}
