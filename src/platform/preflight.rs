//! Startup checks run once before the daemon registers any job.
//!
//! The agent needs Linux, root, and the service/journal/file tools on `PATH`;
//! `psql` is only required when a `rebuild_store` tier is configured.

#![allow(missing_docs)]

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{Result, SraError};

const BASE_TOOLS: [&str; 3] = ["systemctl", "journalctl", "lsof"];
const STORE_TOOL: &str = "psql";

/// Outcome of a single preflight check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightCheck {
    pub name: String,
    pub ok: bool,
    pub detail: Option<String>,
}

/// Every check performed, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    fn step_ok(&mut self, name: impl Into<String>, detail: Option<String>) {
        self.checks.push(PreflightCheck {
            name: name.into(),
            ok: true,
            detail,
        });
    }

    fn step_fail(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.checks.push(PreflightCheck {
            name: name.into(),
            ok: false,
            detail: Some(detail.into()),
        });
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.ok)
    }
}

/// Tools that must be on `PATH` for the given configuration.
#[must_use]
pub fn required_tools(config: &Config) -> Vec<&'static str> {
    let mut tools = BASE_TOOLS.to_vec();
    if config.uses_store() {
        tools.push(STORE_TOOL);
    }
    tools
}

/// First executable named `tool` in the `PATH`-style list `search`.
#[must_use]
pub fn find_tool(tool: &str, search: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// Run every check without stopping at the first failure.
#[must_use]
pub fn inspect(config: &Config) -> PreflightReport {
    let search = std::env::var_os("PATH").unwrap_or_default();
    evaluate(
        cfg!(target_os = "linux"),
        running_as_root(),
        &required_tools(config),
        |tool| find_tool(tool, &search),
    )
}

/// Pure core of [`inspect`], with the host facts passed in.
pub fn evaluate(
    is_linux: bool,
    is_root: bool,
    tools: &[&str],
    locate: impl Fn(&str) -> Option<PathBuf>,
) -> PreflightReport {
    let mut report = PreflightReport::default();
    if is_linux {
        report.step_ok("platform", Some(std::env::consts::OS.to_string()));
    } else {
        report.step_fail(
            "platform",
            format!("linux required, running on {}", std::env::consts::OS),
        );
    }
    if is_root {
        report.step_ok("privileges", None);
    } else {
        report.step_fail("privileges", "must run as root");
    }
    for tool in tools {
        match locate(tool) {
            Some(path) => report.step_ok(*tool, Some(path.display().to_string())),
            None => report.step_fail(*tool, "not found on PATH"),
        }
    }
    report
}

/// Turn the first failed check into the matching startup error.
pub fn into_result(report: &PreflightReport) -> Result<()> {
    let Some(failed) = report.checks.iter().find(|check| !check.ok) else {
        return Ok(());
    };
    let details = failed.detail.clone().unwrap_or_default();
    Err(match failed.name.as_str() {
        "platform" => SraError::UnsupportedPlatform { details },
        "privileges" => SraError::PermissionDenied { details },
        tool => SraError::MissingTool {
            tool: tool.to_string(),
            details,
        },
    })
}

/// Run the preflight and fail on the first unmet requirement.
pub fn check(config: &Config) -> Result<()> {
    let report = inspect(config);
    for check in &report.checks {
        if check.ok {
            tracing::debug!(check = check.name.as_str(), detail = ?check.detail, "preflight ok");
        } else {
            tracing::error!(check = check.name.as_str(), detail = ?check.detail, "preflight failed");
        }
    }
    into_result(&report)
}
