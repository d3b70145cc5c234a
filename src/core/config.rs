//! Layered configuration: built-in defaults, TOML file, CLI override of the path.
//!
//! The loaded [`Config`] is immutable. It is validated once at startup and then
//! handed by reference to the scheduler, escalation policy and status report.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SraError};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/storage-relief-agent/config.toml";

/// Upper bound for `probe.command_timeout_secs`.
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 86_400;

/// Environment variable naming an alternate configuration file.
pub const CONFIG_ENV_VAR: &str = "SRA_CONFIG";

static SQL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Full agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub escalation: EscalationConfig,
    pub store: StoreConfig,
    pub probe: ProbeConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

/// Tick pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds to sleep after every job in the registry has run.
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 1800 }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Threshold and ordered remediation tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Disk usage percentage at or above which remediation starts.
    pub threshold_pct: f64,
    /// Most conservative first.
    pub steps: Vec<StepConfig>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 90.0,
            steps: vec![
                StepConfig::ClearDirectory {
                    path: PathBuf::from("/opt/mplc4/log"),
                    ignore: vec!["start_log.txt".to_string()],
                },
                StepConfig::VacuumJournal {
                    older_than_secs: 7 * 86_400,
                },
                StepConfig::VacuumJournal {
                    older_than_secs: 86_400,
                },
                StepConfig::RebuildStore {
                    service: "mplc4".to_string(),
                },
            ],
        }
    }
}

/// One remediation tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    /// Delete top-level files of a directory that no process holds open.
    ClearDirectory {
        path: PathBuf,
        #[serde(default)]
        ignore: Vec<String>,
    },
    /// Drop system journal entries older than the given age.
    VacuumJournal { older_than_secs: u64 },
    /// Stop the service, drop and recreate the managed databases, restart it.
    RebuildStore { service: String },
}

impl StepConfig {
    /// Log-friendly step name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::ClearDirectory { path, .. } => format!("clear_directory({})", path.display()),
            Self::VacuumJournal { older_than_secs } => {
                format!("vacuum_journal({older_than_secs}s)")
            }
            Self::RebuildStore { service } => format!("rebuild_store({service})"),
        }
    }
}

/// Managed PostgreSQL databases recreated by the destructive tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub psql_user: String,
    pub databases: Vec<DatabaseConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            psql_user: "postgres".to_string(),
            databases: vec![
                DatabaseConfig {
                    name: "archive".to_string(),
                    owner: "technology".to_string(),
                },
                DatabaseConfig {
                    name: "security_archive".to_string(),
                    owner: "security".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub owner: String,
}

/// Probe targets and subprocess limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Mount whose usage drives escalation.
    pub disk_mount: PathBuf,
    /// Upper bound for every external command.
    pub command_timeout_secs: u64,
    pub journal_dir: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            disk_mount: PathBuf::from("/"),
            command_timeout_secs: 30,
            journal_dir: PathBuf::from("/var/log/journal"),
        }
    }
}

impl ProbeConfig {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Size unit used by the status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeUnit {
    #[default]
    B,
    K,
    M,
    G,
    T,
    P,
}

impl SizeUnit {
    pub const ALL: [Self; 6] = [Self::B, Self::K, Self::M, Self::G, Self::T, Self::P];

    /// Power-of-two shift for this unit.
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::B => 0,
            Self::K => 10,
            Self::M => 20,
            Self::G => 30,
            Self::T => 40,
            Self::P => 50,
        }
    }

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::K => "K",
            Self::M => "M",
            Self::G => "G",
            Self::T => "T",
            Self::P => "P",
        }
    }
}

impl std::str::FromStr for SizeUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.suffix().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown size unit {s:?}, expected one of B K M G T P"))
    }
}

/// A directory shown in the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDirectory {
    pub label: String,
    pub path: PathBuf,
}

/// Status report rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub width: usize,
    pub size_unit: SizeUnit,
    pub human_readable: bool,
    pub color: bool,
    pub warning_pct: f64,
    pub critical_pct: f64,
    pub services: Vec<String>,
    pub directories: Vec<ReportDirectory>,
    pub project_info: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            width: 50,
            size_unit: SizeUnit::B,
            human_readable: false,
            color: true,
            warning_pct: 75.0,
            critical_pct: 90.0,
            services: vec![
                "postgresql".to_string(),
                "mplc4".to_string(),
                "arm-cleaner".to_string(),
            ],
            directories: vec![ReportDirectory {
                label: "MPLC4 Journal".to_string(),
                path: PathBuf::from("/opt/mplc4/log"),
            }],
            project_info: Some(PathBuf::from("/opt/mplc4/server/cfg/ProjInfo.json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Resolve the config path: explicit flag, then `SRA_CONFIG`, then the default.
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path.to_path_buf(), true);
        }
        if let Some(from_env) = std::env::var_os(CONFIG_ENV_VAR) {
            return (PathBuf::from(from_env), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_PATH), false)
    }

    /// Load and validate configuration.
    ///
    /// A missing file is only an error when the path was asked for explicitly;
    /// otherwise the built-in defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = Self::resolve_path(explicit);
        let config = match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if required {
                    return Err(SraError::MissingConfig { path });
                }
                Self::default()
            }
            Err(err) => return Err(SraError::io(&path, err)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without validating it.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the agent cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            return invalid("scheduler.interval_secs must be greater than zero");
        }
        let threshold = self.escalation.threshold_pct;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return invalid(format!(
                "escalation.threshold_pct must be within (0, 100], got {threshold}"
            ));
        }
        if self.escalation.steps.is_empty() {
            return invalid("escalation.steps must list at least one remediation step");
        }
        for step in &self.escalation.steps {
            match step {
                StepConfig::ClearDirectory { path, .. } => {
                    if !path.is_absolute() {
                        return invalid(format!(
                            "clear_directory path must be absolute: {}",
                            path.display()
                        ));
                    }
                }
                StepConfig::VacuumJournal { older_than_secs } => {
                    if *older_than_secs == 0 {
                        return invalid("vacuum_journal older_than_secs must be greater than zero");
                    }
                }
                StepConfig::RebuildStore { service } => {
                    if service.trim().is_empty() {
                        return invalid("rebuild_store service must not be empty");
                    }
                    if self.store.databases.is_empty() {
                        return invalid("rebuild_store requires at least one store.databases entry");
                    }
                }
            }
        }
        if !SQL_IDENTIFIER.is_match(&self.store.psql_user) {
            return invalid(format!(
                "store.psql_user is not a plain identifier: {:?}",
                self.store.psql_user
            ));
        }
        for db in &self.store.databases {
            for ident in [&db.name, &db.owner] {
                if !SQL_IDENTIFIER.is_match(ident) {
                    return invalid(format!("store database identifier is not plain: {ident:?}"));
                }
            }
        }
        if self.probe.command_timeout_secs == 0 {
            return invalid("probe.command_timeout_secs must be greater than zero");
        }
        if self.probe.command_timeout_secs > MAX_COMMAND_TIMEOUT_SECS {
            return invalid(format!(
                "probe.command_timeout_secs must not exceed {MAX_COMMAND_TIMEOUT_SECS}"
            ));
        }
        let report = &self.report;
        if !(0.0..=100.0).contains(&report.warning_pct)
            || !(0.0..=100.0).contains(&report.critical_pct)
        {
            return invalid("report thresholds must be within 0-100");
        }
        if report.warning_pct > report.critical_pct {
            return invalid("report.warning_pct must not exceed report.critical_pct");
        }
        Ok(())
    }

    /// Whether any configured tier needs `psql`.
    #[must_use]
    pub fn uses_store(&self) -> bool {
        self.escalation
            .steps
            .iter()
            .any(|step| matches!(step, StepConfig::RebuildStore { .. }))
    }
}

fn invalid(details: impl Into<String>) -> Result<()> {
    Err(SraError::InvalidConfig {
        details: details.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().expect("defaults validate");
    }

    #[test]
    fn default_tiers_run_cheapest_first() {
        let steps = Config::default().escalation.steps;
        assert!(matches!(steps[0], StepConfig::ClearDirectory { .. }));
        assert!(matches!(
            steps.last(),
            Some(StepConfig::RebuildStore { .. })
        ));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [scheduler]
            interval_secs = 60

            [escalation]
            threshold_pct = 85.5

            [[escalation.steps]]
            kind = "vacuum_journal"
            older_than_secs = 3600

            [[escalation.steps]]
            kind = "clear_directory"
            path = "/srv/app/log"
            "#,
        )
        .expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.scheduler.interval(), Duration::from_secs(60));
        assert!((config.escalation.threshold_pct - 85.5).abs() < f64::EPSILON);
        assert_eq!(
            config.escalation.steps,
            vec![
                StepConfig::VacuumJournal {
                    older_than_secs: 3600
                },
                StepConfig::ClearDirectory {
                    path: PathBuf::from("/srv/app/log"),
                    ignore: Vec::new(),
                },
            ]
        );
        assert_eq!(config.probe, ProbeConfig::default());
        assert!(!config.uses_store());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 0;
        let err = config.validate().expect_err("must reject");
        assert_eq!(err.code(), "SRA-1001");
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        for bad in [0.0, -5.0, 100.5, f64::NAN] {
            let mut config = Config::default();
            config.escalation.threshold_pct = bad;
            assert!(config.validate().is_err(), "threshold {bad} accepted");
        }
    }

    #[test]
    fn empty_step_list_is_rejected() {
        let mut config = Config::default();
        config.escalation.steps.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn injected_database_name_is_rejected() {
        let mut config = Config::default();
        config.store.databases[0].name = "archive; DROP ROLE x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_command_timeout_is_rejected() {
        let mut config = Config::default();
        config.probe.command_timeout_secs = u64::MAX;
        let err = config.validate().expect_err("must reject");
        assert_eq!(err.code(), "SRA-1001");
        config.probe.command_timeout_secs = MAX_COMMAND_TIMEOUT_SECS;
        config.validate().expect("upper bound accepted");
    }

    #[test]
    fn warning_above_critical_is_rejected() {
        let mut config = Config::default();
        config.report.warning_pct = 95.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_step_kind_fails_to_parse() {
        let err = Config::from_toml_str(
            r#"
            [[escalation.steps]]
            kind = "format_disk"
            "#,
        )
        .expect_err("unknown kind");
        assert_eq!(err.code(), "SRA-1003");
    }

    #[test]
    fn toml_round_trip_preserves_defaults() {
        let config = Config::default();
        let text = config.to_toml_string().expect("serialize");
        assert_eq!(Config::from_toml_str(&text).expect("parse"), config);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(Some(&dir.path().join("absent.toml"))).expect_err("missing");
        assert_eq!(err.code(), "SRA-1002");
    }

    #[test]
    fn size_unit_parses_case_insensitively() {
        assert_eq!("g".parse::<SizeUnit>(), Ok(SizeUnit::G));
        assert!("GB".parse::<SizeUnit>().is_err());
    }
}
