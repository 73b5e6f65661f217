use nmbench_kernels::error::ConfigError;
use nmbench_runtime::error::{ExecutionError, ParseError, RunError};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch compiler {compiler}: {source}")]
    Spawn {
        compiler: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("compiler exited with {status} building {source_path}; output tail:\n{output_tail}")]
    Failed {
        source_path: PathBuf,
        status: ExitStatus,
        output_tail: String,
    },
    #[error("compiler timed out after {}s building {source_path}", .timeout.as_secs())]
    TimedOut {
        source_path: PathBuf,
        timeout: Duration,
    },
    #[error("compiler reported success but produced no executable at {0}")]
    MissingArtifact(PathBuf),
}

/// Every way a benchmark invocation can abort without a report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl From<RunError> for HarnessError {
    fn from(value: RunError) -> Self {
        match value {
            RunError::Execution(err) => HarnessError::Execution(err),
            RunError::Parse(err) => HarnessError::Parse(err),
        }
    }
}
