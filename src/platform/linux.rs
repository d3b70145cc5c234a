//! Parsers for Linux procfs files and service-manager / psql command output.
//!
//! Kept free of IO so each format is unit-tested against captured samples.

#![allow(missing_docs)]

use std::collections::HashMap;

use crate::core::errors::Unavailable;
use crate::monitor::probe::ServiceState;

/// Append `.service` unless the name already carries a unit suffix.
#[must_use]
pub fn unit_name(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.service")
    }
}

/// `(used, total)` bytes from `/proc/meminfo`.
///
/// Used memory excludes free, buffers and page cache.
pub fn parse_meminfo(raw: &str) -> Result<(u64, u64), Unavailable> {
    let mut fields = HashMap::new();
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kib) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        fields.insert(key.trim(), kib.saturating_mul(1024));
    }
    let get = |key: &str| {
        fields
            .get(key)
            .copied()
            .ok_or_else(|| Unavailable::new("memory usage", format!("/proc/meminfo lacks {key}")))
    };
    let total = get("MemTotal")?;
    let free = get("MemFree")?;
    let buffers = get("Buffers").unwrap_or(0);
    let cached = get("Cached").unwrap_or(0);
    let used = total.saturating_sub(free + buffers + cached);
    Ok((used, total))
}

/// `(idle, total)` jiffies from the aggregate `cpu` line of `/proc/stat`.
pub fn parse_cpu_times(raw: &str) -> Result<(u64, u64), Unavailable> {
    let line = raw
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| Unavailable::new("cpu usage", "/proc/stat has no aggregate cpu line"))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(7)
        .map(str::parse::<u64>)
        .collect::<Result<_, _>>()
        .map_err(|err| Unavailable::new("cpu usage", format!("malformed /proc/stat: {err}")))?;
    if values.len() < 4 {
        return Err(Unavailable::new("cpu usage", "too few cpu time columns"));
    }
    Ok((values[3], values.iter().sum()))
}

/// Busy percentage between two `(idle, total)` samples.
pub fn cpu_busy_percent(first: (u64, u64), second: (u64, u64)) -> Result<f64, Unavailable> {
    let total = second.1.saturating_sub(first.1);
    if total == 0 {
        return Err(Unavailable::new("cpu usage", "no cpu time elapsed between samples"));
    }
    let idle = second.0.saturating_sub(first.0).min(total);
    #[allow(clippy::cast_precision_loss)]
    let busy = (1.0 - idle as f64 / total as f64) * 100.0;
    Ok(busy)
}

/// Interpret `systemctl show -p LoadState -p ActiveState -p SubState`.
pub fn parse_systemctl_show(raw: &str) -> Result<ServiceState, Unavailable> {
    let props: HashMap<&str, &str> = raw
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    if props.get("LoadState") == Some(&"not-found") {
        return Ok(ServiceState::NotFound);
    }
    let active = props
        .get("ActiveState")
        .ok_or_else(|| Unavailable::new("service state", "systemctl output lacks ActiveState"))?;
    let state = match *active {
        "active" | "reloading" | "refreshing" => ServiceState::Active,
        "activating" => ServiceState::Activating,
        "deactivating" => ServiceState::Deactivating,
        "failed" => ServiceState::Failed,
        "inactive" if props.get("SubState") == Some(&"dead") => ServiceState::Dead,
        "inactive" => ServiceState::Inactive,
        other => {
            return Err(Unavailable::new(
                "service state",
                format!("unknown ActiveState {other:?}"),
            ));
        }
    };
    Ok(state)
}

/// Sum the sizes of `managed` databases from `psql -At` output (`name|bytes` rows).
pub fn parse_store_sizes(raw: &str, managed: &[&str]) -> Result<u64, Unavailable> {
    let mut total = 0u64;
    let mut seen = 0usize;
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (name, size) = line
            .split_once('|')
            .ok_or_else(|| Unavailable::new("store size", format!("malformed psql row {line:?}")))?;
        if !managed.contains(&name.trim()) {
            continue;
        }
        let bytes: u64 = size
            .trim()
            .parse()
            .map_err(|err| Unavailable::new("store size", format!("bad size in {line:?}: {err}")))?;
        total += bytes;
        seen += 1;
    }
    if seen == 0 && !managed.is_empty() {
        return Err(Unavailable::new("store size", "no managed database found"));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:        8000000 kB
MemFree:         1000000 kB
MemAvailable:    4000000 kB
Buffers:          500000 kB
Cached:          2500000 kB
SwapCached:            0 kB
";

    #[test]
    fn meminfo_excludes_buffers_and_cache() {
        let (used, total) = parse_meminfo(MEMINFO).expect("parse");
        assert_eq!(total, 8_000_000 * 1024);
        assert_eq!(used, 4_000_000 * 1024);
    }

    #[test]
    fn meminfo_without_total_is_unavailable() {
        assert!(parse_meminfo("MemFree: 10 kB\n").is_err());
    }

    #[test]
    fn cpu_busy_between_samples() {
        let first = parse_cpu_times("cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 1 2 3 4\n").expect("first");
        let second = parse_cpu_times("cpu  150 0 150 900 0 0 0 0 0 0\n").expect("second");
        assert_eq!(first, (800, 1000));
        let busy = cpu_busy_percent(first, second).expect("busy");
        assert!((busy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn identical_cpu_samples_are_unavailable() {
        assert!(cpu_busy_percent((5, 10), (5, 10)).is_err());
    }

    #[test]
    fn systemctl_states_map_to_enum() {
        let cases = [
            ("LoadState=loaded\nActiveState=active\nSubState=running\n", ServiceState::Active),
            ("LoadState=loaded\nActiveState=inactive\nSubState=dead\n", ServiceState::Dead),
            ("LoadState=loaded\nActiveState=inactive\nSubState=exited\n", ServiceState::Inactive),
            ("LoadState=loaded\nActiveState=failed\nSubState=failed\n", ServiceState::Failed),
            ("LoadState=loaded\nActiveState=activating\nSubState=start\n", ServiceState::Activating),
            ("LoadState=not-found\nActiveState=inactive\nSubState=dead\n", ServiceState::NotFound),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_systemctl_show(raw).expect(raw), expected);
        }
    }

    #[test]
    fn garbled_systemctl_output_is_unavailable() {
        assert!(parse_systemctl_show("Failed to connect to bus").is_err());
        assert!(parse_systemctl_show("ActiveState=maintenance").is_err());
    }

    #[test]
    fn store_size_sums_only_managed_databases() {
        let raw = "postgres|8000000\narchive|1000\nsecurity_archive|234\ntemplate1|77\n";
        let size = parse_store_sizes(raw, &["archive", "security_archive"]).expect("parse");
        assert_eq!(size, 1234);
    }

    #[test]
    fn store_size_with_no_managed_rows_is_unavailable() {
        assert!(parse_store_sizes("postgres|1\n", &["archive"]).is_err());
        assert!(parse_store_sizes("garbage\n", &["archive"]).is_err());
    }

    #[test]
    fn unit_names_gain_service_suffix() {
        assert_eq!(unit_name("mplc4"), "mplc4.service");
        assert_eq!(unit_name("postgresql.service"), "postgresql.service");
    }
}
