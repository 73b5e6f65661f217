//! Kernel build driver.

use crate::error::BuildError;
use crate::workspace::BuildWorkspace;
use nmbench_kernels::registry::KernelVariant;
use nmbench_kernels::template::KernelSource;
use nmbench_runtime::process::{run_with_timeout, tail, Completion, DEFAULT_TIMEOUT};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const BUILD_OUTPUT_TAIL_LINES: usize = 30;

/// CUTLASS subdirectories the block-sparse kernels include from.
pub const CUTLASS_INCLUDE_SUBDIRS: [&str; 4] = [
    "include",
    "examples/common",
    "examples/43_gemm_block_sparse",
    "tools/util/include",
];

/// Device compiler invocation settings.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub compiler: PathBuf,
    /// Compute capability without the dot, e.g. `80` for sm_80.
    pub arch: String,
    pub cutlass_root: PathBuf,
    pub extra_include_dirs: Vec<PathBuf>,
    pub extra_flags: Vec<String>,
    pub timeout: Duration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("nvcc"),
            arch: "80".to_string(),
            cutlass_root: default_cutlass_root(),
            extra_include_dirs: Vec::new(),
            extra_flags: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// CUTLASS checkout expected at the repository root.
pub fn default_cutlass_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("cutlass")
}

impl CompilerConfig {
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        CUTLASS_INCLUDE_SUBDIRS
            .iter()
            .map(|sub| self.cutlass_root.join(sub))
            .chain(self.extra_include_dirs.iter().cloned())
            .collect()
    }

    /// Full argument list for compiling `source` into `output`.
    pub fn compile_args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-gencode".into(),
            format!("arch=compute_{0},code=sm_{0}", self.arch).into(),
        ];
        for dir in self.include_dirs() {
            let mut flag = OsString::from("-I");
            flag.push(dir);
            args.push(flag);
        }
        args.extend(self.extra_flags.iter().map(OsString::from));
        args.push(source.into());
        args.push("-o".into());
        args.push(output.into());
        args
    }
}

/// Generated source and the executable compiled from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub source_path: PathBuf,
    pub executable_path: PathBuf,
}

pub struct CompilerPipeline {
    config: CompilerConfig,
}

impl CompilerPipeline {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Write `source` into the workspace and compile it.
    ///
    /// The workspace is a single slot: the source, executable and compiler
    /// output from any earlier build in it are overwritten.
    pub fn compile(
        &self,
        source: &KernelSource,
        variant: &KernelVariant,
        workspace: &BuildWorkspace,
    ) -> Result<BuildArtifact, BuildError> {
        workspace.ensure()?;

        let source_path = workspace.file(&variant.source_file);
        let executable_path = workspace.file(variant.executable_stem());
        let workspace_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| BuildError::Workspace { path, source }
        };

        fs::write(&source_path, source).map_err(workspace_err(&source_path))?;
        match fs::remove_file(&executable_path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                return Err(workspace_err(&executable_path)(err));
            }
            _ => {}
        }

        let build_log_path = workspace.build_log_path();
        let stdout = File::create(&build_log_path).map_err(workspace_err(&build_log_path))?;
        let stderr = stdout
            .try_clone()
            .map_err(workspace_err(&build_log_path))?;

        let mut command = Command::new(&self.config.compiler);
        command
            .args(self.config.compile_args(&source_path, &executable_path))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        debug!(?command, "invoking device compiler");

        let start = Instant::now();
        let completion = run_with_timeout(&mut command, self.config.timeout).map_err(|source| {
            BuildError::Spawn {
                compiler: self.config.compiler.clone(),
                source,
            }
        })?;

        match completion {
            Completion::Exited(status) if status.success() => {}
            Completion::Exited(status) => {
                let output = fs::read(&build_log_path).unwrap_or_default();
                return Err(BuildError::Failed {
                    source_path,
                    status,
                    output_tail: tail(&String::from_utf8_lossy(&output), BUILD_OUTPUT_TAIL_LINES),
                });
            }
            Completion::TimedOut => {
                return Err(BuildError::TimedOut {
                    source_path,
                    timeout: self.config.timeout,
                });
            }
        }

        if !executable_path.is_file() {
            return Err(BuildError::MissingArtifact(executable_path));
        }

        info!(
            kernel = %variant.id,
            executable = %executable_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "kernel built"
        );

        Ok(BuildArtifact {
            source_path,
            executable_path,
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }
}
