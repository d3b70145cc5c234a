//! Storage Relief Agent: watches disk pressure on a host and applies tiered,
//! increasingly disruptive remediation until usage drops below a threshold.
//!
//! The scheduler drives periodic jobs; the escalation policy probes usage,
//! applies the next step, re-probes, and stops at the first sign of relief.

pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod remediation;
pub mod report;

#[cfg(feature = "cli")]
pub mod cli_app;
