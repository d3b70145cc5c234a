//! Application project descriptor: name and last-modified time of the project
//! currently deployed on the host.

#![allow(missing_docs)]

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::errors::Unavailable;

const LAST_MODIFIED_KEY: &str = "Дата последнего изменения";
const LAST_MODIFIED_FORMAT: &str = "%d.%m.%Y %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub last_modified: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(rename = "ProjectName")]
    project_name: Option<String>,
    #[serde(rename = "VersionEditsInfo", default)]
    version_edits: serde_json::Map<String, serde_json::Value>,
}

/// Read the descriptor at `path`.
pub fn read_project_info(path: &Path) -> Result<ProjectInfo, Unavailable> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| Unavailable::new("project descriptor", format!("{}: {err}", path.display())))?;
    parse_project_info(&raw)
}

pub fn parse_project_info(raw: &str) -> Result<ProjectInfo, Unavailable> {
    let descriptor: RawDescriptor = serde_json::from_str(raw)
        .map_err(|err| Unavailable::new("project descriptor", err.to_string()))?;
    let last_modified = match descriptor
        .version_edits
        .get(LAST_MODIFIED_KEY)
        .and_then(serde_json::Value::as_str)
    {
        Some(text) => Some(
            NaiveDateTime::parse_from_str(text, LAST_MODIFIED_FORMAT).map_err(|err| {
                Unavailable::new("project descriptor", format!("bad timestamp {text:?}: {err}"))
            })?,
        ),
        None => None,
    };
    Ok(ProjectInfo {
        name: descriptor.project_name,
        last_modified,
    })
}
