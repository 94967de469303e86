//! Subprocess execution for a single experiment.

use std::{process::Stdio, time::Duration};

use runexp_config::{HarnessSettings, OutputStream};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};

use crate::{
    output::{Metrics, parse_output},
    sweep::Combination,
};

/// Captured result of a successful experiment.
#[derive(Debug, Clone, Default)]
pub struct ExperimentOutput {
    pub metrics: Metrics,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns the sweep command with a combination's environment.
#[derive(Debug, Clone)]
pub struct Runner {
    command: Vec<String>,
    metrics: Vec<String>,
    stream: OutputStream,
    timeout: Option<Duration>,
}

impl Runner {
    pub fn new(command: Vec<String>, settings: &HarnessSettings) -> Result<Self, RunError> {
        if command.is_empty() {
            return Err(RunError::NoCommand);
        }
        Ok(Self {
            command,
            metrics: settings.metrics.clone(),
            stream: settings.stream,
            timeout: settings.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Start the command for `combination`.
    ///
    /// The child runs in its own process group so a terminal Ctrl-C reaches
    /// only the harness, which then forwards it exactly once.
    pub fn spawn(&self, combination: &Combination) -> Result<RunHandle, RunError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(RunError::NoCommand)?;

        tracing::debug!("Spawning [{combination}]: {}", self.command.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(combination.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| RunError::Spawn(program.clone(), e))?;
        let pid = child
            .id()
            .ok_or_else(|| RunError::Spawn(program.clone(), std::io::Error::other("no PID")))?;

        Ok(RunHandle { child, pid })
    }

    /// Wait for the experiment, capture its output and scrape metrics.
    ///
    /// The timeout covers both the exit and the end of output, so a
    /// background process still holding the pipes cannot outlive it.
    pub async fn wait(&self, mut handle: RunHandle) -> Result<ExperimentOutput, RunError> {
        let pid = handle.pid;
        let stdout_pipe = handle.child.stdout.take();
        let stderr_pipe = handle.child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let child = &mut handle.child;
        let run = async {
            let (status, (), ()) = tokio::join!(
                child.wait(),
                drain(stdout_pipe, pid, "stdout", &mut stdout_buf),
                drain(stderr_pipe, pid, "stderr", &mut stderr_buf),
            );
            status
        };
        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        if status.is_none() {
            tracing::warn!(
                "PID {pid}: not done after {}s, killing",
                self.timeout.map_or(0, |t| t.as_secs())
            );
            signal_group(pid, libc::SIGKILL);
            let _ = handle.child.wait().await;
        }

        let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();

        let status = match status {
            None => {
                return Err(RunError::TimedOut {
                    secs: self.timeout.map_or(0, |t| t.as_secs()),
                    stdout,
                    stderr,
                });
            }
            Some(status) => status.map_err(RunError::Wait)?,
        };

        if !status.success() {
            return Err(RunError::Failed {
                code: status.code(),
                stdout,
                stderr,
            });
        }

        let metrics = match self.stream {
            OutputStream::Stdout => parse_output(&stdout, &self.metrics),
            OutputStream::Stderr => parse_output(&stderr, &self.metrics),
            // Newline keeps stdout's last line from joining stderr's first
            OutputStream::Both => parse_output(&format!("{stdout}\n{stderr}"), &self.metrics),
        };

        let missing = metrics.missing(&self.metrics);
        if !missing.is_empty() {
            return Err(RunError::MissingMetrics {
                missing: missing.join(", "),
                stdout,
                stderr,
            });
        }

        Ok(ExperimentOutput {
            metrics,
            stdout,
            stderr,
        })
    }
}

/// Read a child stream to the end into `captured`, tracing each line as it
/// arrives.
async fn drain<R: AsyncRead + Unpin>(
    stream: Option<R>,
    pid: u32,
    name: &'static str,
    captured: &mut Vec<u8>,
) {
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                tracing::trace!("[{pid} {name}] {}", String::from_utf8_lossy(&line).trim_end());
                captured.extend_from_slice(&line);
            }
            Err(e) => {
                tracing::warn!("PID {pid}: failed reading {name}: {e}");
                break;
            }
        }
    }
}

/// Send `signal` to the process group led by `pid`.
pub fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the group created by `process_group(0)` at spawn.
    unsafe { libc::kill(-pgid, signal) == 0 }
}

/// Handle to a running experiment.
pub struct RunHandle {
    child: Child,
    /// Process ID, also the process group ID.
    pub pid: u32,
}

/// Errors that can occur when running an experiment.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no command specified")]
    NoCommand,
    #[error("failed to execute {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("failed waiting for process: {0}")]
    Wait(std::io::Error),
    #[error("command failed with exit code {}", describe_exit(.code))]
    Failed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("command timed out after {secs}s")]
    TimedOut {
        secs: u64,
        stdout: String,
        stderr: String,
    },
    #[error("missing metrics in output: {missing}")]
    MissingMetrics {
        missing: String,
        stdout: String,
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string())
}

impl RunError {
    /// Output captured before the failure, if the process ran at all.
    #[must_use]
    pub fn captured(&self) -> Option<(&str, &str)> {
        match self {
            Self::Failed { stdout, stderr, .. }
            | Self::TimedOut { stdout, stderr, .. }
            | Self::MissingMetrics { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}
