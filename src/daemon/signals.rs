//! SIGTERM/SIGINT/SIGHUP forwarding into the scheduler's shutdown channel.

use std::thread;

use crossbeam_channel::{Receiver, bounded};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::core::errors::{Result, SraError};

/// Install handlers and return the receiving end of the shutdown channel.
///
/// The first signal sends one shutdown message; the scheduler notices it at
/// its next wait, so an in-flight tick always completes.
pub fn install_shutdown_channel() -> Result<Receiver<()>> {
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP]).map_err(|err| SraError::Runtime {
        details: format!("failed to install signal handlers: {err}"),
    })?;
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("sra-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::info!(signal, "shutdown signal received, stopping after current tick");
                let _ = tx.try_send(());
            }
        })
        .map_err(|err| SraError::Runtime {
            details: format!("failed to spawn signal thread: {err}"),
        })?;
    Ok(rx)
}
