//! Shared harness for driving the built `sra` binary.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Transcript of the case, kept for failure messages.
    pub log_path: PathBuf,
}

impl CliResult {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `sra args..` with a clean config environment.
pub fn run_cli_case(case: &str, args: &[&str]) -> CliResult {
    run_cli_case_with_env(case, args, &[])
}

pub fn run_cli_case_with_env(case: &str, args: &[&str], env: &[(&str, &str)]) -> CliResult {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sra"));
    command
        .args(args)
        .env_remove("SRA_CONFIG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("spawn sra binary");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("cli-cases");
    fs::create_dir_all(&log_dir).expect("create log dir");
    let log_path = log_dir.join(format!("{case}.log"));
    fs::write(
        &log_path,
        format!(
            "args: {args:?}\nenv: {env:?}\nstatus: {}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
            output.status
        ),
    )
    .expect("write case log");

    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write `contents` to a fresh config file; the directory lives as long as the guard.
pub fn config_file(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}
