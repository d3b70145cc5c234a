//! SRA-prefixed error types with structured error codes and exit statuses.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SraError>;

/// Process exit statuses. Every fatal class gets its own value so that the
/// service manager (and operators reading `systemctl status`) can tell them apart.
pub mod exit_status {
    pub const CLEAN: i32 = 0;
    pub const RUNTIME: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const STARTUP: i32 = 3;
    pub const FATAL_JOB: i32 = 4;
}

/// Top-level error type for Storage Relief Agent.
#[derive(Debug, Error)]
pub enum SraError {
    #[error("[SRA-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SRA-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SRA-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SRA-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[SRA-1102] insufficient privileges: {details}")]
    PermissionDenied { details: String },

    #[error("[SRA-1103] required tool `{tool}` is not available: {details}")]
    MissingTool { tool: String, details: String },

    #[error("[SRA-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SRA-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SRA-4001] job `{job}` failed: {source}")]
    FatalJob {
        job: String,
        #[source]
        source: JobError,
    },

    #[error("[SRA-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SraError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SRA-1001",
            Self::MissingConfig { .. } => "SRA-1002",
            Self::ConfigParse { .. } => "SRA-1003",
            Self::UnsupportedPlatform { .. } => "SRA-1101",
            Self::PermissionDenied { .. } => "SRA-1102",
            Self::MissingTool { .. } => "SRA-1103",
            Self::Serialization { .. } => "SRA-2101",
            Self::Io { .. } => "SRA-3002",
            Self::FatalJob { .. } => "SRA-4001",
            Self::Runtime { .. } => "SRA-3900",
        }
    }

    /// Process exit status for this error class.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. } => {
                exit_status::CONFIG
            }
            Self::UnsupportedPlatform { .. }
            | Self::PermissionDenied { .. }
            | Self::MissingTool { .. } => exit_status::STARTUP,
            Self::FatalJob { .. } => exit_status::FATAL_JOB,
            Self::Serialization { .. } | Self::Io { .. } | Self::Runtime { .. } => {
                exit_status::RUNTIME
            }
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SraError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SraError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SraError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}

/// A probe could not produce a value this time.
///
/// Never fatal on its own: callers decide how conservative to be.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what} unavailable: {reason}")]
pub struct Unavailable {
    pub what: String,
    pub reason: String,
}

impl Unavailable {
    #[must_use]
    pub fn new(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single remediation action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("could not launch `{command}`: {details}")]
    Spawn { command: String, details: String },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("service {service} is {actual} after {verb}, expected {expected}")]
    ServiceDidNotReachState {
        service: String,
        verb: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("service {service} does not exist")]
    ServiceMissing { service: String },

    #[error(transparent)]
    Unavailable(#[from] Unavailable),

    #[error("could not stop {service} before rebuild: {cause}")]
    StopFailed {
        service: String,
        #[source]
        cause: Box<ActionError>,
    },

    /// Destructive-tier failure. Recreation and restart errors are kept
    /// apart so the log shows which half went wrong.
    #[error("{}", describe_rebuild(.service, .recreate.as_deref(), .restart.as_deref()))]
    RebuildFailed {
        service: String,
        recreate: Option<Box<ActionError>>,
        restart: Option<Box<ActionError>>,
    },
}

impl ActionError {
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the failure may have left the dependent service stopped.
    #[must_use]
    pub const fn leaves_service_down(&self) -> bool {
        matches!(self, Self::RebuildFailed { restart: Some(_), .. })
    }
}

fn describe_rebuild(
    service: &str,
    recreate: Option<&ActionError>,
    restart: Option<&ActionError>,
) -> String {
    match (recreate, restart) {
        (Some(rec), Some(res)) => {
            format!("store recreation failed ({rec}) and {service} could not be restarted ({res})")
        }
        (Some(rec), None) => format!("store recreation failed ({rec}); {service} was restored"),
        (None, Some(res)) => {
            format!("store recreated but {service} could not be restarted ({res})")
        }
        (None, None) => format!("rebuild of {service} failed"),
    }
}

/// Error a job hands back to the scheduler. Always fatal to the process.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job panicked: {message}")]
    Panicked { message: String },

    /// Returned by jobs registered through the library API. The built-in
    /// jobs never fail this way; only a panic ends them.
    #[error("{details}")]
    Failed { details: String },
}
