//! Daemon subsystem: escalation policy, job scheduler, main loop wiring,
//! signal handling.

pub mod escalation;
pub mod loop_main;
pub mod scheduler;
#[cfg(feature = "daemon")]
pub mod signals;
