//! Platform abstraction layer: the single host facade.
//!
//! [`SystemHost`] is built once by the entrypoint and lent to every job. It
//! implements both [`ResourceProbe`] and [`RemediationActions`] on top of
//! procfs, `statvfs`, `systemctl`, `journalctl`, `lsof` and `psql`, each
//! subprocess bounded by the configured command timeout.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::core::config::{Config, DatabaseConfig};
use crate::core::errors::{ActionError, Unavailable};
use crate::monitor::probe::{ResourceProbe, ServiceState, UsageSnapshot};
use crate::platform::command::{run_checked, run_with_timeout};
use crate::platform::linux::{
    cpu_busy_percent, parse_cpu_times, parse_meminfo, parse_store_sizes, parse_systemctl_show,
    unit_name,
};
use crate::remediation::actions::{ClearSummary, RemediationActions, clear_directory};

const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(100);

/// Real host implementation of the probe and action contracts.
#[derive(Debug, Clone)]
pub struct SystemHost {
    disk_mount: PathBuf,
    command_timeout: Duration,
    psql_user: String,
    managed_databases: Vec<String>,
}

impl SystemHost {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            disk_mount: config.probe.disk_mount.clone(),
            command_timeout: config.probe.command_timeout(),
            psql_user: config.store.psql_user.clone(),
            managed_databases: config
                .store
                .databases
                .iter()
                .map(|db| db.name.clone())
                .collect(),
        }
    }

    fn psql(&self, sql: &str, capture: bool) -> Result<String, ActionError> {
        let mut args = vec!["-U", self.psql_user.as_str(), "-d", "postgres", "-v", "ON_ERROR_STOP=1"];
        if capture {
            args.push("-At");
        }
        args.extend(["-c", sql]);
        run_checked("psql", &args, self.command_timeout).map(|out| out.stdout)
    }

    /// Whether any process holds `path` open. Unknown counts as open.
    fn is_open(&self, path: &Path) -> bool {
        let Some(path_str) = path.to_str() else {
            return true;
        };
        match run_with_timeout("lsof", &["--", path_str], self.command_timeout) {
            Ok(out) if out.success() => true,
            Ok(out) if out.code() == Some(1) && out.stdout.trim().is_empty() => false,
            Ok(out) => {
                tracing::warn!(path = path_str, stderr = out.stderr.trim(), "lsof inconclusive, keeping file");
                true
            }
            Err(err) => {
                tracing::warn!(path = path_str, error = %err, "lsof failed, keeping file");
                true
            }
        }
    }

    fn systemctl(&self, verb: &str, unit: &str) -> Result<(), ActionError> {
        run_checked("systemctl", &[verb, unit], self.command_timeout).map(|_| ())
    }
}

impl ResourceProbe for SystemHost {
    fn disk_usage(&self) -> Result<UsageSnapshot, Unavailable> {
        statvfs_usage(&self.disk_mount)
    }

    fn memory_usage(&self) -> Result<UsageSnapshot, Unavailable> {
        let raw = fs::read_to_string("/proc/meminfo")
            .map_err(|err| Unavailable::new("memory usage", err.to_string()))?;
        let (used, total) = parse_meminfo(&raw)?;
        UsageSnapshot::from_bytes(used, total)
    }

    fn cpu_usage(&self) -> Result<f64, Unavailable> {
        let sample = || {
            fs::read_to_string("/proc/stat")
                .map_err(|err| Unavailable::new("cpu usage", err.to_string()))
                .and_then(|raw| parse_cpu_times(&raw))
        };
        let first = sample()?;
        thread::sleep(CPU_SAMPLE_WINDOW);
        let second = sample()?;
        cpu_busy_percent(first, second)
    }

    fn dir_size(&self, path: &Path) -> Result<u64, Unavailable> {
        let meta = fs::symlink_metadata(path)
            .map_err(|err| Unavailable::new(format!("size of {}", path.display()), err.to_string()))?;
        if !meta.is_dir() {
            return Err(Unavailable::new(
                format!("size of {}", path.display()),
                "not a directory",
            ));
        }
        Ok(walk_size(path))
    }

    fn service_state(&self, name: &str) -> Result<ServiceState, Unavailable> {
        let unit = unit_name(name);
        let out = run_with_timeout(
            "systemctl",
            &["show", unit.as_str(), "-p", "LoadState", "-p", "ActiveState", "-p", "SubState"],
            self.command_timeout,
        )
        .map_err(|err| Unavailable::new(format!("state of {unit}"), err.to_string()))?;
        if !out.success() {
            return Err(Unavailable::new(
                format!("state of {unit}"),
                format!("systemctl exited with {}: {}", out.status, out.stderr.trim()),
            ));
        }
        parse_systemctl_show(&out.stdout)
    }

    fn store_size(&self) -> Result<u64, Unavailable> {
        let raw = self
            .psql("SELECT datname, pg_database_size(datname) FROM pg_database", true)
            .map_err(|err| Unavailable::new("store size", err.to_string()))?;
        let managed: Vec<&str> = self.managed_databases.iter().map(String::as_str).collect();
        parse_store_sizes(&raw, &managed)
    }
}

impl RemediationActions for SystemHost {
    fn vacuum_journal_older_than(&self, age: Duration) -> Result<(), ActionError> {
        let arg = format!("--vacuum-time={}s", age.as_secs());
        run_checked("journalctl", &[arg.as_str()], self.command_timeout)?;
        tracing::info!(older_than_secs = age.as_secs(), "journal vacuumed");
        Ok(())
    }

    fn clear_directory_unless_open(
        &self,
        path: &Path,
        ignore: &[String],
    ) -> Result<ClearSummary, ActionError> {
        clear_directory(path, ignore, |file| self.is_open(file))
    }

    fn stop_service(&self, name: &str) -> Result<(), ActionError> {
        let unit = unit_name(name);
        match self.service_state(name)? {
            ServiceState::NotFound => return Err(ActionError::ServiceMissing { service: unit }),
            state if state.is_stopped() => {
                tracing::info!(service = unit.as_str(), state = state.as_str(), "already stopped");
                return Ok(());
            }
            _ => {}
        }
        self.systemctl("stop", &unit)?;
        let after = self.service_state(name)?;
        if !after.is_stopped() {
            return Err(ActionError::ServiceDidNotReachState {
                service: unit,
                verb: "stop",
                expected: "inactive",
                actual: after.to_string(),
            });
        }
        tracing::info!(service = unit.as_str(), "service stopped");
        Ok(())
    }

    fn recreate_store(&self, databases: &[DatabaseConfig]) -> Result<(), ActionError> {
        for db in databases {
            self.psql(&format!("DROP DATABASE IF EXISTS \"{}\"", db.name), false)?;
            self.psql(
                &format!("CREATE DATABASE \"{}\" OWNER \"{}\"", db.name, db.owner),
                false,
            )?;
            tracing::info!(database = db.name.as_str(), owner = db.owner.as_str(), "database recreated");
        }
        Ok(())
    }

    fn start_service(&self, name: &str) -> Result<(), ActionError> {
        let unit = unit_name(name);
        match self.service_state(name)? {
            ServiceState::NotFound => return Err(ActionError::ServiceMissing { service: unit }),
            ServiceState::Active => {
                tracing::info!(service = unit.as_str(), "already active");
                return Ok(());
            }
            _ => {}
        }
        self.systemctl("start", &unit)?;
        let after = self.service_state(name)?;
        if !after.is_running() {
            return Err(ActionError::ServiceDidNotReachState {
                service: unit,
                verb: "start",
                expected: "active",
                actual: after.to_string(),
            });
        }
        tracing::info!(service = unit.as_str(), "service started");
        Ok(())
    }
}

#[cfg(unix)]
fn statvfs_usage(mount: &Path) -> Result<UsageSnapshot, Unavailable> {
    let stats = nix::sys::statvfs::statvfs(mount)
        .map_err(|err| Unavailable::new(format!("disk usage of {}", mount.display()), err.to_string()))?;
    #[allow(clippy::useless_conversion)]
    let fragment = u64::from(stats.fragment_size());
    #[allow(clippy::useless_conversion)]
    let total = u64::from(stats.blocks()).saturating_mul(fragment);
    #[allow(clippy::useless_conversion)]
    let free = u64::from(stats.blocks_free()).saturating_mul(fragment);
    UsageSnapshot::from_bytes(total.saturating_sub(free), total)
}

#[cfg(not(unix))]
fn statvfs_usage(mount: &Path) -> Result<UsageSnapshot, Unavailable> {
    Err(Unavailable::new(
        format!("disk usage of {}", mount.display()),
        "statvfs is only available on unix",
    ))
}

/// Sum regular-file sizes below `root` without following symlinks.
/// Unreadable entries are skipped.
fn walk_size(root: &Path) -> u64 {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if meta.is_dir() {
                pending.push(entry.path());
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }
    total
}
