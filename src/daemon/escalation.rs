//! Tiered escalation: probe, apply the next step, re-probe, stop at relief.
//!
//! ```text
//! Checking ──below──▶ Resolved
//!    │
//!    └─over/unknown──▶ Escalating(i) ──ok──▶ Checking
//!                           │
//!                           └─error──▶ Aborted
//! ```
//!
//! A step runs only when the probe immediately before it still shows pressure
//! at or above the threshold. A probe that cannot read a value counts as
//! "still over": an unreadable disk is never taken as relief.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::errors::{ActionError, Unavailable};
use crate::monitor::probe::{ResourceProbe, UsageSnapshot};
use crate::remediation::RemediationStep;

/// How one escalation run ended.
#[derive(Debug)]
pub enum EscalationOutcome {
    /// Usage is below the threshold (possibly without any step).
    Resolved,
    /// Every step ran and usage is still at or above the threshold.
    ExhaustedStepsStillOverLimit,
    /// A step failed; later steps were not attempted.
    AbortedOnActionFailure {
        /// Zero-based position of the failed step.
        step: usize,
        name: String,
        cause: ActionError,
    },
}

impl EscalationOutcome {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::ExhaustedStepsStillOverLimit => "exhausted_steps_still_over_limit",
            Self::AbortedOnActionFailure { .. } => "aborted_on_action_failure",
        }
    }
}

impl fmt::Display for EscalationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => f.write_str("resolved"),
            Self::ExhaustedStepsStillOverLimit => f.write_str("all steps exhausted, still over limit"),
            Self::AbortedOnActionFailure { step, name, cause } => {
                write!(f, "aborted at step {} ({name}): {cause}", step + 1)
            }
        }
    }
}

/// Result of a probe taken during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ProbeReading {
    Read { usage: UsageSnapshot },
    Unavailable { reason: String },
}

impl ProbeReading {
    fn from_result(result: Result<UsageSnapshot, Unavailable>) -> Self {
        match result {
            Ok(usage) => Self::Read { usage },
            Err(err) => Self::Unavailable {
                reason: err.to_string(),
            },
        }
    }

    /// Only a successful reading can show relief.
    #[must_use]
    pub fn relieved(&self, threshold_pct: f64) -> bool {
        match self {
            Self::Read { usage } => usage.below(threshold_pct),
            Self::Unavailable { .. } => false,
        }
    }

    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Read { usage } => Some(usage.percent),
            Self::Unavailable { .. } => None,
        }
    }
}

impl fmt::Display for ProbeReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { usage } => write!(f, "{usage}"),
            Self::Unavailable { reason } => write!(f, "unavailable ({reason})"),
        }
    }
}

/// One applied step with the readings around it.
#[derive(Debug, Clone, Serialize)]
pub struct StepAttempt {
    pub name: String,
    pub before: ProbeReading,
    /// `None` when the step failed and no re-probe was taken.
    pub after: Option<ProbeReading>,
}

/// Full record of a run, for logging and `sra once`.
#[derive(Debug)]
pub struct EscalationRun {
    pub initial: ProbeReading,
    pub attempts: Vec<StepAttempt>,
    pub outcome: EscalationOutcome,
}

impl EscalationRun {
    /// The most recent reading in the run.
    #[must_use]
    pub fn last_reading(&self) -> &ProbeReading {
        self.attempts
            .iter()
            .rev()
            .find_map(|attempt| attempt.after.as_ref())
            .unwrap_or(&self.initial)
    }
}

/// Serializable view of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'r> {
    pub outcome: &'static str,
    pub detail: String,
    pub service_down: bool,
    pub initial: &'r ProbeReading,
    pub attempts: &'r [StepAttempt],
}

impl EscalationRun {
    #[must_use]
    pub fn summary(&self) -> RunSummary<'_> {
        let service_down = match &self.outcome {
            EscalationOutcome::AbortedOnActionFailure { cause, .. } => cause.leaves_service_down(),
            _ => false,
        };
        RunSummary {
            outcome: self.outcome.label(),
            detail: self.outcome.to_string(),
            service_down,
            initial: &self.initial,
            attempts: &self.attempts,
        }
    }
}

/// Threshold-driven escalation over an ordered list of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    threshold_pct: f64,
}

impl EscalationPolicy {
    #[must_use]
    pub const fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }

    #[must_use]
    pub const fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Run one escalation pass. Never panics on probe or action failure;
    /// both are folded into the returned outcome.
    pub fn run(&self, probe: &dyn ResourceProbe, steps: &[RemediationStep<'_>]) -> EscalationRun {
        let threshold = self.threshold_pct;
        let initial = ProbeReading::from_result(probe.disk_usage());

        if initial.relieved(threshold) {
            tracing::debug!(usage = %initial, threshold, "disk usage below threshold");
            return EscalationRun {
                initial,
                attempts: Vec::new(),
                outcome: EscalationOutcome::Resolved,
            };
        }

        match &initial {
            ProbeReading::Read { usage } => tracing::warn!(
                usage_pct = usage.percent,
                threshold,
                steps = steps.len(),
                "disk usage over threshold, escalating"
            ),
            ProbeReading::Unavailable { reason } => tracing::warn!(
                reason = reason.as_str(),
                threshold,
                "disk usage unreadable, escalating as if over threshold"
            ),
        }

        let mut attempts = Vec::with_capacity(steps.len());
        let mut current = initial.clone();

        for (index, step) in steps.iter().enumerate() {
            tracing::info!(
                step = index + 1,
                name = step.name(),
                before = %current,
                "applying remediation step"
            );

            if let Err(cause) = step.apply() {
                tracing::error!(
                    step = index + 1,
                    name = step.name(),
                    before = %current,
                    error = %cause,
                    "remediation step failed, aborting escalation"
                );
                attempts.push(StepAttempt {
                    name: step.name().to_string(),
                    before: current,
                    after: None,
                });
                return EscalationRun {
                    initial,
                    attempts,
                    outcome: EscalationOutcome::AbortedOnActionFailure {
                        step: index,
                        name: step.name().to_string(),
                        cause,
                    },
                };
            }

            let after = ProbeReading::from_result(probe.disk_usage());
            tracing::info!(
                step = index + 1,
                name = step.name(),
                before = %current,
                after = %after,
                "remediation step applied"
            );
            attempts.push(StepAttempt {
                name: step.name().to_string(),
                before: current,
                after: Some(after.clone()),
            });

            if after.relieved(threshold) {
                tracing::info!(usage = %after, threshold, steps_applied = index + 1, "pressure relieved");
                return EscalationRun {
                    initial,
                    attempts,
                    outcome: EscalationOutcome::Resolved,
                };
            }
            current = after;
        }

        tracing::error!(
            usage = %current,
            threshold,
            steps_applied = attempts.len(),
            "all remediation steps exhausted, disk still over threshold"
        );
        EscalationRun {
            initial,
            attempts,
            outcome: EscalationOutcome::ExhaustedStepsStillOverLimit,
        }
    }
}
