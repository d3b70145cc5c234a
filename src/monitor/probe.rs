//! Read-only resource probes: usage snapshots and service states.

#![allow(missing_docs)]

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::Unavailable;

/// Usage of a bounded resource at one instant. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub used: u64,
    pub total: u64,
    pub percent: f64,
}

impl UsageSnapshot {
    /// Build a snapshot, rejecting an empty or inconsistent total.
    pub fn from_bytes(used: u64, total: u64) -> Result<Self, Unavailable> {
        if total == 0 {
            return Err(Unavailable::new("usage", "total capacity reported as zero"));
        }
        if used > total {
            return Err(Unavailable::new(
                "usage",
                format!("used {used} exceeds total {total}"),
            ));
        }
        #[allow(clippy::cast_precision_loss)]
        let percent = used as f64 / total as f64 * 100.0;
        Ok(Self {
            used,
            total,
            percent,
        })
    }

    #[must_use]
    pub fn free(&self) -> u64 {
        self.total - self.used
    }

    /// Pressure is relieved strictly below the threshold.
    #[must_use]
    pub fn below(&self, threshold_pct: f64) -> bool {
        self.percent < threshold_pct
    }
}

impl fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}% ({}/{} bytes)", self.percent, self.used, self.total)
    }
}

/// Unit state as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    Active,
    Inactive,
    Activating,
    Deactivating,
    Failed,
    NotFound,
    Dead,
}

impl ServiceState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::Failed => "failed",
            Self::NotFound => "not-found",
            Self::Dead => "dead",
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Active | Self::Activating)
    }

    /// States from which `stop` has nothing left to do.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Inactive | Self::Failed | Self::Dead)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous, side-effect-free host queries.
///
/// Per-call failures come back as [`Unavailable`]; missing prerequisites are
/// caught once at startup by preflight instead.
pub trait ResourceProbe {
    /// Usage of the filesystem that drives escalation.
    fn disk_usage(&self) -> Result<UsageSnapshot, Unavailable>;

    fn memory_usage(&self) -> Result<UsageSnapshot, Unavailable>;

    /// Busy CPU percentage over a short sampling window.
    fn cpu_usage(&self) -> Result<f64, Unavailable>;

    /// Total bytes of regular files below `path`.
    fn dir_size(&self, path: &Path) -> Result<u64, Unavailable>;

    fn service_state(&self, name: &str) -> Result<ServiceState, Unavailable>;

    /// Combined size of the managed databases.
    fn store_size(&self) -> Result<u64, Unavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_percent_is_used_over_total() {
        let snap = UsageSnapshot::from_bytes(95, 100).expect("valid");
        assert!((snap.percent - 95.0).abs() < 1e-9);
        assert_eq!(snap.free(), 5);
        assert!(!snap.below(90.0));
        assert!(snap.below(95.5));
    }

    #[test]
    fn usage_exactly_at_threshold_is_not_relief() {
        let snap = UsageSnapshot::from_bytes(90, 100).expect("valid");
        assert!(!snap.below(90.0));
    }

    #[test]
    fn zero_total_is_unavailable() {
        assert!(UsageSnapshot::from_bytes(0, 0).is_err());
        assert!(UsageSnapshot::from_bytes(11, 10).is_err());
    }

    #[test]
    fn service_state_serializes_kebab_case() {
        let json = serde_json::to_string(&ServiceState::NotFound).expect("serialize");
        assert_eq!(json, "\"not-found\"");
        assert!(ServiceState::Dead.is_stopped());
        assert!(!ServiceState::Deactivating.is_stopped());
    }
}
