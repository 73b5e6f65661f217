//! Per-invocation build directory.
//!
//! Each run gets `<work_root>/<run_id>/`, holding the generated source, the
//! executable, the compiler output and the kernel log. Two invocations with
//! different run ids never touch the same files.

use crate::error::BuildError;
use nmbench_kernels::error::ConfigError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

pub const KERNEL_LOG_FILE: &str = "output_log.txt";
pub const BUILD_LOG_FILE: &str = "build.log";

#[derive(Debug, Clone)]
pub struct BuildWorkspace {
    run_id: String,
    dir: PathBuf,
}

impl BuildWorkspace {
    /// Workspace `<work_root>/<run_id>/`.
    ///
    /// `run_id` must be exactly one normal path component, so the workspace
    /// can never resolve to the work root itself or outside it.
    pub fn new(
        work_root: impl AsRef<Path>,
        run_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let run_id = run_id.into();
        validate_run_id(&run_id)?;
        let dir = work_root.as_ref().join(&run_id);
        Ok(Self { run_id, dir })
    }

    /// Workspace keyed by a fresh random run id.
    pub fn fresh(work_root: impl AsRef<Path>) -> Self {
        let run_id = Uuid::new_v4().to_string();
        let dir = work_root.as_ref().join(&run_id);
        Self { run_id, dir }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if missing; idempotent.
    pub fn ensure(&self) -> Result<(), BuildError> {
        fs::create_dir_all(&self.dir).map_err(|source| BuildError::Workspace {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn kernel_log_path(&self) -> PathBuf {
        self.file(KERNEL_LOG_FILE)
    }

    pub fn build_log_path(&self) -> PathBuf {
        self.file(BUILD_LOG_FILE)
    }

    pub fn remove(&self) -> Result<(), BuildError> {
        match fs::remove_dir_all(&self.dir) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(BuildError::Workspace {
                path: self.dir.clone(),
                source: err,
            }),
            _ => Ok(()),
        }
    }
}

pub fn validate_run_id(run_id: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(run_id).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !run_id.contains(['/', '\\']);
    if single_normal {
        Ok(())
    } else {
        Err(ConfigError::InvalidRunId(run_id.to_string()))
    }
}
