use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch kernel {executable}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("kernel {executable} exited with {status} on run {run}; log tail:\n{log_tail}")]
    Failed {
        executable: PathBuf,
        run: usize,
        status: ExitStatus,
        log_tail: String,
    },
    #[error("kernel {executable} timed out after {}s on run {run}", .timeout.as_secs())]
    TimedOut {
        executable: PathBuf,
        run: usize,
        timeout: Duration,
    },
    #[error("kernel log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no `{marker}` line in kernel log")]
    MissingLatency { marker: &'static str },
    #[error("cannot read a latency from `{line}`")]
    MalformedLatency { line: String },
}

/// Failure while measuring: the kernel did not run cleanly, or its log broke
/// the output contract.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
