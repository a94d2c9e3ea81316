//! Runs external tools with cancellation and a timeout.
//!
//! stdout and stderr are drained on helper threads so a chatty tool never
//! blocks on a full pipe while the caller polls for exit.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::cancel::CancelHandle;

/// How often the runner checks for exit, cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("I/O error while waiting for {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Captured output of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code (`None` if killed by a signal).
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last `n` non-empty stderr lines, for error messages.
    pub fn stderr_tail(&self, n: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}

/// Runner for one external program.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    program: String,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the program to completion.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::code`].
    pub fn run<I, S>(&self, args: I, cancel: &CancelHandle) -> Result<ToolOutput, RunError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                tool: self.program.clone(),
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::trace!("Running {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| RunError::Spawn {
            tool: self.program.clone(),
            source: e,
        })?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let started = Instant::now();
        let code = loop {
            if cancel.is_cancelled() {
                // Readers are detached; a grandchild may still hold the pipes
                kill(&mut child);
                tracing::debug!(tool = %self.program, "Killed on cancellation");
                return Err(RunError::Cancelled {
                    tool: self.program.clone(),
                });
            }

            if started.elapsed() > self.timeout {
                kill(&mut child);
                tracing::warn!(tool = %self.program, "Killed after {:?}", self.timeout);
                return Err(RunError::TimedOut {
                    tool: self.program.clone(),
                    after: self.timeout,
                });
            }

            match child.try_wait() {
                Ok(Some(status)) => break status.code(),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill(&mut child);
                    return Err(RunError::Io {
                        tool: self.program.clone(),
                        source: e,
                    });
                }
            }
        };

        Ok(ToolOutput {
            code,
            stdout: String::from_utf8_lossy(&join(stdout_reader)).to_string(),
            stderr: String::from_utf8_lossy(&join(stderr_reader)).to_string(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
