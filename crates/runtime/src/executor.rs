//! Repeated kernel execution with warm-up runs.

use crate::error::{ExecutionError, RunError};
use crate::parser::{extract_latency, extract_success};
use crate::process::{run_with_timeout, tail, Completion, DEFAULT_TIMEOUT};
use nmbench_kernels::config::SparsityRatio;
use nmbench_kernels::error::ConfigError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const LOG_TAIL_LINES: usize = 20;

/// How many times the kernel runs and how long each run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    warmup_runs: usize,
    measured_runs: usize,
    timeout: Duration,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            warmup_runs: 1,
            measured_runs: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RunPolicy {
    pub fn new(
        warmup_runs: usize,
        measured_runs: usize,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if measured_runs == 0 {
            return Err(ConfigError::InvalidRunPolicy(
                "at least one measured run is required".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(ConfigError::InvalidRunPolicy(
                "run timeout must be positive".into(),
            ));
        }
        Ok(Self {
            warmup_runs,
            measured_runs,
            timeout,
        })
    }

    pub fn warmup_runs(&self) -> usize {
        self.warmup_runs
    }

    pub fn measured_runs(&self) -> usize {
        self.measured_runs
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One measured execution.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub latency: f64,
    pub success: bool,
    pub log: String,
}

/// Runs a built kernel, sending stdout and stderr to a single log file.
///
/// The log is truncated on every run, so only the last run's output
/// survives on disk.
pub struct ExecutionDriver {
    log_path: PathBuf,
    policy: RunPolicy,
}

impl ExecutionDriver {
    pub fn new(log_path: impl Into<PathBuf>, policy: RunPolicy) -> Self {
        Self {
            log_path: log_path.into(),
            policy,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Execute warm-up runs (logs discarded unparsed), then measured runs.
    pub fn run(
        &self,
        executable: &Path,
        sparsity: SparsityRatio,
    ) -> Result<Vec<RunResult>, RunError> {
        let mut run = 0;

        for _ in 0..self.policy.warmup_runs {
            self.invoke(executable, sparsity, run)?;
            run += 1;
        }
        debug!(warmup_runs = self.policy.warmup_runs, "warm-up complete");

        let mut results = Vec::with_capacity(self.policy.measured_runs);
        for _ in 0..self.policy.measured_runs {
            self.invoke(executable, sparsity, run)?;
            run += 1;

            let log = self.read_log()?;
            let latency = extract_latency(&log)?;
            let success = extract_success(&log);
            info!(run, latency, success, "measured run parsed");
            results.push(RunResult {
                latency,
                success,
                log,
            });
        }

        Ok(results)
    }

    fn invoke(
        &self,
        executable: &Path,
        sparsity: SparsityRatio,
        run: usize,
    ) -> Result<(), ExecutionError> {
        let log_err = |source| ExecutionError::Log {
            path: self.log_path.clone(),
            source,
        };
        let stdout = File::create(&self.log_path).map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        let mut command = Command::new(executable);
        command
            .arg(sparsity.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let start = Instant::now();
        let completion = run_with_timeout(&mut command, self.policy.timeout).map_err(|source| {
            ExecutionError::Spawn {
                executable: executable.to_path_buf(),
                source,
            }
        })?;

        match completion {
            Completion::Exited(status) if status.success() => {
                debug!(
                    run,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "kernel run finished"
                );
                Ok(())
            }
            Completion::Exited(status) => Err(ExecutionError::Failed {
                executable: executable.to_path_buf(),
                run,
                status,
                log_tail: self
                    .read_log()
                    .map(|log| tail(&log, LOG_TAIL_LINES))
                    .unwrap_or_default(),
            }),
            Completion::TimedOut => Err(ExecutionError::TimedOut {
                executable: executable.to_path_buf(),
                run,
                timeout: self.policy.timeout,
            }),
        }
    }

    fn read_log(&self) -> Result<String, ExecutionError> {
        let bytes = fs::read(&self.log_path).map_err(|source| ExecutionError::Log {
            path: self.log_path.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn sparsity() -> SparsityRatio {
        SparsityRatio::new(0.9).unwrap()
    }

    #[test]
    fn test_run_policy_validation() {
        assert!(RunPolicy::new(1, 0, DEFAULT_TIMEOUT).is_err());
        assert!(RunPolicy::new(0, 1, Duration::ZERO).is_err());
        let policy = RunPolicy::new(0, 3, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(policy.warmup_runs(), 0);
        assert_eq!(policy.measured_runs(), 3);
        assert_eq!(RunPolicy::default().timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_warmup_log_is_not_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("count");
        // The first invocation prints nothing parseable; later ones do.
        let body = format!(
            "if [ -f {c} ]; then echo \"arg=$1 Time= 7.5 ms\"; echo Pass; else touch {c}; echo warming; fi\n",
            c = counter.display()
        );
        let kernel = write_script(dir.path(), "kernel", &body);
        let driver = ExecutionDriver::new(dir.path().join("output_log.txt"), RunPolicy::default());

        let results = driver.run(&kernel, sparsity()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].latency, 7.5);
        assert!(results[0].success);
        assert!(results[0].log.contains("arg=0.9"));
    }

    #[test]
    fn test_stderr_is_captured_in_log() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = write_script(dir.path(), "kernel", "echo 'Time= 2.0 ms'\necho Pass >&2\n");
        let policy = RunPolicy::new(0, 2, DEFAULT_TIMEOUT).unwrap();
        let driver = ExecutionDriver::new(dir.path().join("output_log.txt"), policy);

        let results = driver.run(&kernel, sparsity()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[test]
    fn test_non_zero_exit_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = write_script(dir.path(), "kernel", "echo 'segfault here'\nexit 3\n");
        let driver = ExecutionDriver::new(dir.path().join("output_log.txt"), RunPolicy::default());

        match driver.run(&kernel, sparsity()) {
            Err(RunError::Execution(ExecutionError::Failed { run, log_tail, .. })) => {
                assert_eq!(run, 0);
                assert!(log_tail.contains("segfault here"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = write_script(dir.path(), "kernel", "sleep 30\n");
        let policy = RunPolicy::new(0, 1, Duration::from_millis(200)).unwrap();
        let driver = ExecutionDriver::new(dir.path().join("output_log.txt"), policy);

        assert!(matches!(
            driver.run(&kernel, sparsity()),
            Err(RunError::Execution(ExecutionError::TimedOut { .. }))
        ));
    }

    #[test]
    fn test_missing_latency_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = write_script(dir.path(), "kernel", "echo Pass\n");
        let driver = ExecutionDriver::new(dir.path().join("output_log.txt"), RunPolicy::default());

        assert!(matches!(
            driver.run(&kernel, sparsity()),
            Err(RunError::Parse(ParseError::MissingLatency { .. }))
        ));
    }
}
