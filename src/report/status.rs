//! One snapshot of everything the status command shows.
//!
//! Collection and rendering are separate so the table and the JSON output
//! always describe the same readings.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::config::{Config, SizeUnit};
use crate::core::errors::{Result, Unavailable};
use crate::monitor::probe::{ResourceProbe, ServiceState, UsageSnapshot};
use crate::monitor::project::{ProjectInfo, read_project_info};
use crate::report::format::{
    Align, SizeFormat, align, err_out, format_service_state, format_size, format_size_pair,
    format_usage, split_size, title,
};
use crate::report::theme::{Palette, SemanticToken};

/// Timestamp format used in headers and the project block.
pub const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// A probed value or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probed<T> {
    Ok(T),
    Unavailable(String),
}

impl<T> Probed<T> {
    pub fn as_result(&self) -> std::result::Result<&T, &str> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Unavailable(reason) => Err(reason.as_str()),
        }
    }
}

impl<T> From<std::result::Result<T, Unavailable>> for Probed<T> {
    fn from(value: std::result::Result<T, Unavailable>) -> Self {
        match value {
            Ok(v) => Self::Ok(v),
            Err(err) => Self::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceLine {
    pub name: String,
    pub state: Probed<ServiceState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryLine {
    pub label: String,
    pub path: PathBuf,
    pub bytes: Probed<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Local>,
    /// `None` when no project descriptor is configured.
    pub project: Option<Probed<ProjectInfo>>,
    pub services: Vec<ServiceLine>,
    pub cpu_pct: Probed<f64>,
    pub memory: Probed<UsageSnapshot>,
    pub disk: Probed<UsageSnapshot>,
    /// `None` when no managed databases are configured.
    pub store_bytes: Option<Probed<u64>>,
    pub directories: Vec<DirectoryLine>,
    pub journal_bytes: Probed<u64>,
}

impl StatusReport {
    /// Query every configured source once.
    pub fn collect(config: &Config, probe: &dyn ResourceProbe) -> Self {
        let report = &config.report;
        Self {
            generated_at: Local::now(),
            project: report
                .project_info
                .as_deref()
                .map(|path| read_project_info(path).into()),
            services: report
                .services
                .iter()
                .map(|name| ServiceLine {
                    name: name.clone(),
                    state: probe.service_state(name).into(),
                })
                .collect(),
            cpu_pct: probe.cpu_usage().into(),
            memory: probe.memory_usage().into(),
            disk: probe.disk_usage().into(),
            store_bytes: (!config.store.databases.is_empty()).then(|| probe.store_size().into()),
            directories: report
                .directories
                .iter()
                .map(|dir| DirectoryLine {
                    label: dir.label.clone(),
                    path: dir.path.clone(),
                    bytes: probe.dir_size(&dir.path).into(),
                })
                .collect(),
            journal_bytes: probe.dir_size(&config.probe.journal_dir).into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Table rendering options, resolved from config and command-line overrides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub width: usize,
    pub size: SizeFormat,
    pub palette: Palette,
    pub warning_pct: f64,
    pub critical_pct: f64,
}

impl RenderOptions {
    #[must_use]
    pub fn from_config(config: &Config, palette: Palette) -> Self {
        let report = &config.report;
        Self {
            width: report.width,
            size: SizeFormat {
                unit: report.size_unit,
                human: report.human_readable,
            },
            palette,
            warning_pct: report.warning_pct,
            critical_pct: report.critical_pct,
        }
    }

    #[must_use]
    pub const fn with_unit(mut self, unit: SizeUnit) -> Self {
        self.size.unit = unit;
        self
    }
}

struct Table<'o> {
    out: String,
    opts: &'o RenderOptions,
    columns: (usize, usize),
}

impl<'o> Table<'o> {
    fn new(opts: &'o RenderOptions) -> Self {
        Self {
            out: String::new(),
            opts,
            columns: split_size(opts.width, 3),
        }
    }

    fn section(&mut self, name: &str) {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "{}", title(name, self.opts.width, self.opts.palette));
        let _ = writeln!(self.out);
    }

    fn row(&mut self, label: &str, value: &str) {
        let _ = writeln!(
            self.out,
            "{}{}",
            align(label, Align::Left, self.columns.0, ' '),
            align(value, Align::Right, self.columns.1, ' ')
        );
    }
}

/// Render the report as an aligned text table.
#[must_use]
pub fn render(report: &StatusReport, opts: &RenderOptions) -> String {
    let palette = opts.palette;
    let missing = || palette.paint("None", SemanticToken::Danger);
    let mut table = Table::new(opts);

    if let Some(project) = &report.project {
        table.section("Project");
        match project.as_result() {
            Ok(info) => {
                let name = info.name.clone().unwrap_or_else(missing);
                let modified = info
                    .last_modified
                    .map_or_else(missing, |t| t.format(DATETIME_FORMAT).to_string());
                table.row("Name", &name);
                table.row("Last modified", &modified);
            }
            Err(_) => {
                table.row("Name", &err_out(palette));
                table.row("Last modified", &err_out(palette));
            }
        }
    }

    if !report.services.is_empty() {
        table.section("Services");
        for service in &report.services {
            let label = service.name.trim_end_matches(".service");
            table.row(label, &format_service_state(service.state.as_result().copied(), palette));
        }
    }

    table.section("System resources");
    let usage = |value: std::result::Result<f64, &str>| {
        format_usage(value, opts.warning_pct, opts.critical_pct, palette)
    };
    table.row("CPU", &usage(report.cpu_pct.as_result().copied()));
    table.row("RAM", &usage(report.memory.as_result().map(|m| m.percent)));
    table.row("Diskspace", &usage(report.disk.as_result().map(|d| d.percent)));

    table.section("Diskspace usage details");
    table.row(
        "General",
        &format_size_pair(
            report.disk.as_result().map(|d| (d.used, d.total)),
            opts.size,
            palette,
        ),
    );
    if let Some(store) = &report.store_bytes {
        table.row("Store", &format_size(store.as_result().copied(), opts.size, palette));
    }
    for dir in &report.directories {
        table.row(
            &dir.label,
            &format_size(dir.bytes.as_result().copied(), opts.size, palette),
        );
    }
    table.row(
        "System Journal",
        &format_size(report.journal_bytes.as_result().copied(), opts.size, palette),
    );
    table.out
}

/// `Every N sec..` on the left, the current time on the right.
#[must_use]
pub fn watch_header(interval_secs: u64, now: DateTime<Local>, width: usize) -> String {
    let (left, right) = split_size(width, 2);
    format!(
        "{}{}",
        align(&format!("Every {interval_secs} sec.."), Align::Left, left, ' '),
        align(&now.format(DATETIME_FORMAT).to_string(), Align::Right, right, ' ')
    )
}
