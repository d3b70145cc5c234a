//! Bounded subprocess execution.
//!
//! Every external command the agent runs goes through [`run_with_timeout`]. The
//! command runs in its own process group. If it, or anything it left holding
//! its output pipes, outlives the deadline, the group is killed and the call
//! returns [`CommandError::TimedOut`].

#![allow(missing_docs)]

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use thiserror::Error;

use crate::core::config::MAX_COMMAND_TIMEOUT_SECS;
use crate::core::errors::ActionError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("waiting on `{command}` failed: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<CommandError> for ActionError {
    fn from(value: CommandError) -> Self {
        match value {
            CommandError::Spawn { command, source } | CommandError::Wait { command, source } => {
                Self::Spawn {
                    command,
                    details: source.to_string(),
                }
            }
            CommandError::TimedOut { command, timeout } => Self::TimedOut { command, timeout },
        }
    }
}

/// Printable form of a command line for logs and errors.
#[must_use]
pub fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program args..` to completion or until `timeout` elapses.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let command = display_command(program, args);
    let timeout = timeout.min(Duration::from_secs(MAX_COMMAND_TIMEOUT_SECS));
    let started = Instant::now();
    let deadline = started.checked_add(timeout).unwrap_or(started);

    let mut builder = Command::new(program);
    builder
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut builder, 0);
    let mut child = builder.spawn().map_err(|source| CommandError::Spawn {
        command: command.clone(),
        source,
    })?;

    // Drain pipes on their own threads so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_group(&mut child);
            return Err(CommandError::TimedOut { command, timeout });
        }
        Err(source) => {
            kill_group(&mut child);
            return Err(CommandError::Wait { command, source });
        }
    };

    // A descendant that inherited the pipes keeps them open after the child exits.
    let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
    else {
        kill_group(&mut child);
        return Err(CommandError::TimedOut { command, timeout });
    };

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Run a command and turn a non-zero exit into [`ActionError::CommandFailed`].
pub fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, ActionError> {
    let output = run_with_timeout(program, args, timeout)?;
    if output.success() {
        Ok(output)
    } else {
        Err(ActionError::CommandFailed {
            command: display_command(program, args),
            status: output.status.to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Pipe contents, or `None` if the pipe is still open at the deadline.
fn collect(pipe: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    match pipe {
        Some(rx) => rx.recv_deadline(deadline).ok(),
        None => Some(String::new()),
    }
}

/// Kill the child's process group, then reap the child.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = i32::try_from(child.id()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}
