//! Remediation tiers: host actions and the ordered step list built from config.

pub mod actions;

use std::fmt;
use std::time::Duration;

use crate::core::config::{StepConfig, StoreConfig};
use crate::core::errors::ActionError;
use crate::monitor::probe::ResourceProbe;

use self::actions::{RemediationActions, rebuild_store};

/// A named remediation tier. Attempted at most once per escalation run.
pub struct RemediationStep<'a> {
    name: String,
    apply: Box<dyn Fn() -> Result<(), ActionError> + 'a>,
}

impl<'a> RemediationStep<'a> {
    pub fn new(
        name: impl Into<String>,
        apply: impl Fn() -> Result<(), ActionError> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            apply: Box::new(apply),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self) -> Result<(), ActionError> {
        (self.apply)()
    }
}

impl fmt::Debug for RemediationStep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Build the ordered step list described by `steps`, bound to one host.
pub fn build_steps<'a>(
    steps: &'a [StepConfig],
    store: &'a StoreConfig,
    probe: &'a dyn ResourceProbe,
    actions: &'a dyn RemediationActions,
) -> Vec<RemediationStep<'a>> {
    steps
        .iter()
        .map(|step| {
            let name = step.name();
            match step {
                StepConfig::ClearDirectory { path, ignore } => RemediationStep::new(name, move || {
                    let summary = actions.clear_directory_unless_open(path, ignore)?;
                    tracing::info!(
                        dir = %path.display(),
                        removed = summary.removed,
                        bytes_freed = summary.bytes_freed,
                        skipped_open = summary.skipped_open,
                        "directory cleared"
                    );
                    Ok(())
                }),
                StepConfig::VacuumJournal { older_than_secs } => {
                    let age = Duration::from_secs(*older_than_secs);
                    RemediationStep::new(name, move || actions.vacuum_journal_older_than(age))
                }
                StepConfig::RebuildStore { service } => RemediationStep::new(name, move || {
                    rebuild_store(probe, actions, service, &store.databases)
                }),
            }
        })
        .collect()
}
