//! Idempotent remediation actions and the fail-safe destructive tier.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::core::config::DatabaseConfig;
use crate::core::errors::ActionError;
use crate::monitor::probe::{ResourceProbe, ServiceState};

/// What a directory clear did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub removed: usize,
    pub bytes_freed: u64,
    pub skipped_open: usize,
    pub skipped_ignored: usize,
}

/// Imperative host operations. None of them retries internally.
///
/// Each is safe to call when the host is already in the desired state:
/// starting an active service or vacuuming an already-small journal
/// succeeds without doing anything.
pub trait RemediationActions {
    fn vacuum_journal_older_than(&self, age: Duration) -> Result<(), ActionError>;

    /// Delete top-level regular files of `path` unless ignored or held open.
    fn clear_directory_unless_open(
        &self,
        path: &Path,
        ignore: &[String],
    ) -> Result<ClearSummary, ActionError>;

    fn stop_service(&self, name: &str) -> Result<(), ActionError>;

    /// Drop and recreate each managed database.
    fn recreate_store(&self, databases: &[DatabaseConfig]) -> Result<(), ActionError>;

    fn start_service(&self, name: &str) -> Result<(), ActionError>;
}

/// Stop `service`, recreate the store, and bring the service back.
///
/// The restart is attempted whenever the service was running beforehand (or
/// its state could not be read), including after a failed recreation. A
/// recreation error and a restart error are reported separately.
pub fn rebuild_store(
    probe: &dyn ResourceProbe,
    actions: &dyn RemediationActions,
    service: &str,
    databases: &[DatabaseConfig],
) -> Result<(), ActionError> {
    let was_running = match probe.service_state(service) {
        Ok(state) => state != ServiceState::NotFound && !state.is_stopped(),
        Err(err) => {
            tracing::warn!(service, error = %err, "prior state unknown, will restart after rebuild");
            true
        }
    };

    if let Err(cause) = actions.stop_service(service) {
        tracing::error!(service, error = %cause, "stop before rebuild failed");
        return Err(ActionError::StopFailed {
            service: service.to_string(),
            cause: Box::new(cause),
        });
    }

    let recreate = actions.recreate_store(databases).err();
    if let Some(err) = &recreate {
        tracing::error!(service, error = %err, "store recreation failed");
    }

    let restart = if was_running {
        actions.start_service(service).err()
    } else {
        tracing::info!(service, "service was stopped before rebuild, leaving it stopped");
        None
    };
    if let Some(err) = &restart {
        tracing::error!(service, error = %err, "restart after rebuild failed");
    }

    if recreate.is_none() && restart.is_none() {
        tracing::info!(service, databases = databases.len(), "store rebuilt");
        return Ok(());
    }
    Err(ActionError::RebuildFailed {
        service: service.to_string(),
        recreate: recreate.map(Box::new),
        restart: restart.map(Box::new),
    })
}

/// Delete the top-level regular files in `dir`, skipping ignored names and
/// files for which `is_open` answers true. Missing files are not an error.
///
/// Every candidate is attempted; the first removal failure is returned after
/// the sweep finishes.
pub fn clear_directory(
    dir: &Path,
    ignore: &[String],
    is_open: impl Fn(&Path) -> bool,
) -> Result<ClearSummary, ActionError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "directory absent, nothing to clear");
            return Ok(ClearSummary::default());
        }
        Err(err) => return Err(ActionError::io(dir, err)),
    };

    let mut summary = ClearSummary::default();
    let mut first_error: Option<ActionError> = None;
    let mut candidates: Vec<(PathBuf, u64)> = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|err| ActionError::io(dir, err))?;
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name();
        if ignore.iter().any(|ignored| name.as_os_str() == ignored.as_str()) {
            summary.skipped_ignored += 1;
            continue;
        }
        candidates.push((entry.path(), meta.len()));
    }
    candidates.sort();

    for (path, len) in candidates {
        if is_open(&path) {
            summary.skipped_open += 1;
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                summary.removed += 1;
                summary.bytes_freed += len;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not remove file");
                if first_error.is_none() {
                    first_error = Some(ActionError::io(&path, err));
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(summary),
    }
}
