//! Integration smoke tests for the `sra` CLI surface.

mod common;

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: sra [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
    for sub in ["daemon", "once", "status", "config", "completions"] {
        assert!(
            result.stdout.contains(sub),
            "help lacks {sub}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.starts_with("sra "),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_check_accepts_valid_file() {
    let (_dir, path) = common::config_file(
        r#"
        [scheduler]
        interval_secs = 60

        [escalation]
        threshold_pct = 85.0

        [[escalation.steps]]
        kind = "vacuum_journal"
        older_than_secs = 86400
        "#,
    );
    let path = path.to_str().expect("utf-8 path");
    let result = common::run_cli_case(
        "config_check_accepts_valid_file",
        &["--config", path, "config", "check"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("configuration OK") && result.stdout.contains("1 steps"),
        "log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_show_prints_effective_toml() {
    let (_dir, path) = common::config_file("[scheduler]\ninterval_secs = 42\n");
    let result = common::run_cli_case_with_env(
        "config_show_prints_effective_toml",
        &["config", "show"],
        &[("SRA_CONFIG", path.to_str().expect("utf-8 path"))],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("interval_secs = 42"));
    assert!(result.stdout.contains("threshold_pct = 90.0"));
    assert!(result.stdout.contains("kind = \"rebuild_store\""));
}

#[test]
fn zero_interval_is_a_config_error() {
    let (_dir, path) = common::config_file("[scheduler]\ninterval_secs = 0\n");
    let path = path.to_str().expect("utf-8 path");
    for args in [
        ["--config", path, "daemon"].as_slice(),
        ["--config", path, "config", "check"].as_slice(),
    ] {
        let result = common::run_cli_case("zero_interval_is_a_config_error", args);
        assert_eq!(result.code(), Some(2), "log: {}", result.log_path.display());
        assert!(
            result.stderr.contains("SRA-1001"),
            "log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn missing_explicit_config_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let result = common::run_cli_case(
        "missing_explicit_config_is_a_config_error",
        &["--config", missing.to_str().expect("utf-8 path"), "status"],
    );
    assert_eq!(result.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRA-1002"));
}

#[test]
fn malformed_config_is_a_config_error() {
    let (_dir, path) = common::config_file("[scheduler\ninterval_secs = ");
    let result = common::run_cli_case(
        "malformed_config_is_a_config_error",
        &["--config", path.to_str().expect("utf-8 path"), "config", "check"],
    );
    assert_eq!(result.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRA-1003"));
}

#[test]
fn status_json_reports_every_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("app.log"), vec![0u8; 4096]).expect("write");
    let (_cfg_dir, path) = common::config_file(&format!(
        r#"
        [store]
        databases = []

        [[escalation.steps]]
        kind = "vacuum_journal"
        older_than_secs = 3600

        [report]
        services = []
        project_info = "{root}/ProjInfo.json"

        [[report.directories]]
        label = "App Log"
        path = "{root}"
        "#,
        root = dir.path().display()
    ));
    let result = common::run_cli_case(
        "status_json_reports_every_section",
        &["--config", path.to_str().expect("utf-8 path"), "status", "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let value: serde_json::Value = serde_json::from_str(&result.stdout).expect("json stdout");
    assert_eq!(value["directories"][0]["bytes"]["ok"], 4096);
    assert!(value["project"]["unavailable"].is_string());
    assert!(value["store_bytes"].is_null());
    assert!(value.get("disk").is_some() && value.get("journal_bytes").is_some());
}

#[test]
fn completions_command_generates_shell_script() {
    let result = common::run_cli_case(
        "completions_command_generates_shell_script",
        &["completions", "bash"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("sra"),
        "expected completion script contents; log: {}",
        result.log_path.display()
    );
}
