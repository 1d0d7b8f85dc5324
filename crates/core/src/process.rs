//! Short-lived host command execution.
//!
//! The platform probe shells out to `uname -m` on ARM hosts. That call goes
//! through [`ProcessExecutor`] so tests can substitute canned output.

use crate::{Error, Result};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default wait applied to probe subprocesses.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a host command and returns the first line of its standard output.
pub trait ProcessExecutor: Send + Sync {
    /// Execute `program` with `args` and return its first output line, trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or produced no output.
    fn execute(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// [`ProcessExecutor`] backed by `std::process`.
///
/// The child gets a bounded wait. A child that outlives the wait is killed and
/// whatever it already wrote to stdout is used.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    /// Create an executor with the default probe timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Create an executor with a custom timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(e, None, format!("spawn {program}")))?;

        match child.wait_timeout(self.timeout) {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(
                    program,
                    timeout_secs = self.timeout.as_secs(),
                    "Probe command did not finish in time, using buffered output"
                );
                let _ = child.kill();
                let _ = child.wait();
            }
            Err(e) => return Err(Error::io(e, None, format!("wait for {program}"))),
        }

        let Some(stdout) = child.stdout.take() else {
            return Err(Error::process(format!("{program} has no stdout"), None));
        };

        let mut line = String::new();
        BufReader::new(stdout)
            .read_line(&mut line)
            .map_err(|e| Error::io(e, None, format!("read output of {program}")))?;

        if line.is_empty() {
            return Err(Error::process(format!("{program} produced no output"), None));
        }

        Ok(line.trim().to_string())
    }
}
