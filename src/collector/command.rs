//! Bounded execution of external probe tools.
//!
//! Hardware inventory and GPU collectors shell out to tools that may be
//! missing, privileged, or hung. This helper gives every invocation a hard
//! deadline: the child is polled and killed once the budget elapses. Output
//! is drained after exit, which is fine for the small-output query tools
//! used here.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Errors from running an external tool.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The binary is not installed or not on PATH.
    #[error("command not found: {0}")]
    NotFound(String),

    /// The deadline elapsed; the child was killed.
    #[error("command '{1}' timed out after {0:?}")]
    Timeout(Duration, String),

    /// The tool ran but exited non-zero.
    #[error("command '{name}' failed with status {status}")]
    Failed { name: String, status: i32 },

    /// Spawning or reaping the child failed.
    #[error("command io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Missing tools are expected on many hosts and map to empty results
    /// rather than error payloads.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Run a tool and return its stdout, enforcing a wall-clock deadline.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotFound(program.to_string())
            } else {
                CommandError::Io(e)
            }
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let mut output = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout.read_to_string(&mut output)?;
                }
                if status.success() {
                    return Ok(output);
                }
                return Err(CommandError::Failed {
                    name: program.to_string(),
                    status: status.code().unwrap_or(-1),
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::Timeout(timeout, program.to_string()));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
