//! Benchmark session orchestration.
//!
//! One session run walks the pipeline strictly in order: configured,
//! templated, built, measured (warm-up runs first, measured logs parsed),
//! reported.
//! Any failure before the report aborts the run; a kernel that fails its own
//! verification still yields a report carrying the sentinel latency.

use crate::error::HarnessError;
use crate::pipeline::{BuildArtifact, CompilerConfig, CompilerPipeline};
use crate::workspace::BuildWorkspace;
use nmbench_kernels::config::KernelConfig;
use nmbench_kernels::registry::KernelRegistry;
use nmbench_kernels::template::KernelTemplate;
use nmbench_runtime::aggregate::BenchmarkReport;
use nmbench_runtime::executor::{ExecutionDriver, RunPolicy};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Configured,
    Templated,
    Built,
    Measured,
    Reported,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Configured => "configured",
            PipelineStage::Templated => "templated",
            PipelineStage::Built => "built",
            PipelineStage::Measured => "measured",
            PipelineStage::Reported => "reported",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Parent of the per-run build directories.
    pub work_root: PathBuf,
    /// Run directory name; a fresh UUID when unset.
    pub run_id: Option<String>,
    /// Overrides the directory the kernel template is read from.
    pub template_dir: Option<PathBuf>,
    pub keep_workspace: bool,
    pub run_policy: RunPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("nmbench"),
            run_id: None,
            template_dir: None,
            keep_workspace: true,
            run_policy: RunPolicy::default(),
        }
    }
}

/// What to benchmark: a kernel variant, its configuration and a shape tag.
#[derive(Debug, Clone)]
pub struct BenchmarkRequest {
    pub name: String,
    pub kernel: String,
    pub config: KernelConfig,
}

pub struct BenchmarkSession {
    pipeline: CompilerPipeline,
    registry: KernelRegistry,
    options: SessionOptions,
}

impl BenchmarkSession {
    pub fn new(config: CompilerConfig, options: SessionOptions) -> Self {
        Self {
            pipeline: CompilerPipeline::new(config),
            registry: KernelRegistry::with_default_variants(),
            options,
        }
    }

    pub fn with_registry(mut self, registry: KernelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn config(&self) -> &CompilerConfig {
        self.pipeline.config()
    }

    pub fn run(&self, request: &BenchmarkRequest) -> Result<BenchmarkReport, HarnessError> {
        let workspace = match &self.options.run_id {
            Some(run_id) => BuildWorkspace::new(&self.options.work_root, run_id.clone())?,
            None => BuildWorkspace::fresh(&self.options.work_root),
        };
        let span = info_span!("benchmark", run_id = workspace.run_id(), name = %request.name);
        let _guard = span.enter();

        let report = self.run_in(request, &workspace)?;

        if !self.options.keep_workspace {
            if let Err(err) = workspace.remove() {
                warn!(error = %err, "failed to remove build workspace");
            }
        }
        Ok(report)
    }

    fn run_in(
        &self,
        request: &BenchmarkRequest,
        workspace: &BuildWorkspace,
    ) -> Result<BenchmarkReport, HarnessError> {
        let config = &request.config;
        let mut variant = self.registry.find(&request.kernel)?.clone();
        if let Some(dir) = &self.options.template_dir {
            variant = variant.with_template_dir(dir);
        }
        info!(
            stage = %PipelineStage::Configured,
            kernel = %variant.id,
            m = config.problem.m,
            k = config.problem.k,
            n = config.problem.n,
            sparsity = config.sparsity.value(),
            chunk_k = config.chunk_k.value(),
            "benchmark configured"
        );

        let template = KernelTemplate::load(&variant.template_path())?;
        let source = template.render(&config.bindings())?;
        info!(
            stage = %PipelineStage::Templated,
            template = template.name(),
            "kernel source rendered"
        );

        let BuildArtifact {
            executable_path, ..
        } = self.pipeline.compile(&source, &variant, workspace)?;
        info!(stage = %PipelineStage::Built, dir = %workspace.dir().display(), "build ready");

        let driver = ExecutionDriver::new(workspace.kernel_log_path(), self.options.run_policy);
        let runs = driver.run(&executable_path, config.sparsity)?;
        info!(stage = %PipelineStage::Measured, runs = runs.len(), "measurement complete");

        let report = BenchmarkReport::from_runs(&request.name, &variant.id, config, &runs);
        info!(
            stage = %PipelineStage::Reported,
            success = report.success,
            latency = report.latency,
            "report ready"
        );
        if !report.success {
            warn!("kernel verification failed; reporting sentinel latency");
        }
        Ok(report)
    }
}
