//! Daemon wiring: builds the jobs, registers them, and drives the scheduler.

#![allow(missing_docs)]

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::escalation::{EscalationOutcome, EscalationPolicy, EscalationRun};
use crate::daemon::scheduler::{Job, Scheduler};
use crate::monitor::probe::{ResourceProbe, ServiceState};
use crate::remediation::actions::RemediationActions;
use crate::remediation::{RemediationStep, build_steps};

pub const ESCALATION_JOB: &str = "disk_escalation";
pub const SERVICE_WATCH_JOB: &str = "service_watch";

/// Job that runs one escalation pass per tick and logs the outcome.
///
/// The outcome never leaves the job: action failures are logged and retried
/// from scratch on the next tick.
pub fn escalation_job<'a>(
    config: &'a Config,
    probe: &'a dyn ResourceProbe,
    actions: &'a dyn RemediationActions,
) -> Job<'a> {
    let policy = EscalationPolicy::new(config.escalation.threshold_pct);
    let steps = build_steps(&config.escalation.steps, &config.store, probe, actions);
    Job::new(ESCALATION_JOB, move || {
        let run = policy.run(probe, &steps);
        log_run(&run, &steps);
        Ok(())
    })
}

/// Job that reports the state of each watched service.
pub fn service_watch_job<'a>(services: &'a [String], probe: &'a dyn ResourceProbe) -> Job<'a> {
    Job::new(SERVICE_WATCH_JOB, move || {
        for service in services {
            match probe.service_state(service) {
                Ok(ServiceState::Active) => {
                    tracing::debug!(service = service.as_str(), state = "active", "service state");
                }
                Ok(state) => {
                    tracing::warn!(service = service.as_str(), state = state.as_str(), "service not active");
                }
                Err(err) => {
                    tracing::warn!(service = service.as_str(), error = %err, "service state unavailable");
                }
            }
        }
        Ok(())
    })
}

/// Scheduler with the standard jobs registered: escalation first, then the
/// service watch.
pub fn build_scheduler<'a>(
    config: &'a Config,
    probe: &'a dyn ResourceProbe,
    actions: &'a dyn RemediationActions,
) -> Result<Scheduler<'a>> {
    let mut scheduler = Scheduler::new(config.scheduler.interval())?;
    scheduler.register(escalation_job(config, probe, actions));
    if !config.report.services.is_empty() {
        scheduler.register(service_watch_job(&config.report.services, probe));
    }
    Ok(scheduler)
}

/// Single escalation pass outside the scheduler.
pub fn run_once(
    config: &Config,
    probe: &dyn ResourceProbe,
    actions: &dyn RemediationActions,
) -> EscalationRun {
    let steps = build_steps(&config.escalation.steps, &config.store, probe, actions);
    let run = EscalationPolicy::new(config.escalation.threshold_pct).run(probe, &steps);
    log_run(&run, &steps);
    run
}

fn log_run(run: &EscalationRun, steps: &[RemediationStep<'_>]) {
    let last = run.last_reading();
    match &run.outcome {
        EscalationOutcome::Resolved if run.attempts.is_empty() => {
            tracing::info!(usage = %last, "disk usage within limit");
        }
        EscalationOutcome::Resolved => {
            tracing::info!(
                before = %run.initial,
                after = %last,
                steps_applied = run.attempts.len(),
                "escalation resolved disk pressure"
            );
        }
        EscalationOutcome::ExhaustedStepsStillOverLimit => {
            tracing::error!(
                before = %run.initial,
                after = %last,
                steps_applied = run.attempts.len(),
                "escalation exhausted every step, disk still over limit"
            );
        }
        EscalationOutcome::AbortedOnActionFailure { step, name, cause } => {
            tracing::error!(
                step = step + 1,
                of = steps.len(),
                name = name.as_str(),
                before = %run.initial,
                at_failure = %last,
                error = %cause,
                service_down = cause.leaves_service_down(),
                "escalation aborted on action failure"
            );
        }
    }
}

/// Full daemon: preflight, host facade, signal-driven shutdown, scheduler loop.
#[cfg(feature = "daemon")]
pub fn run_daemon(config: &Config) -> Result<()> {
    use crate::daemon::scheduler::ShutdownPacer;
    use crate::platform::pal::SystemHost;
    use crate::platform::preflight;

    preflight::check(config)?;
    let host = SystemHost::new(config);
    let shutdown = crate::daemon::signals::install_shutdown_channel()?;
    let mut pacer = ShutdownPacer::new(shutdown);
    let mut scheduler = build_scheduler(config, &host, &host)?;
    scheduler.run(&mut pacer)
}
