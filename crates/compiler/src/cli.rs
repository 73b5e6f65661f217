//! CLI wiring for the nmbench harness.

use crate::pipeline::{default_cutlass_root, CompilerConfig};
use crate::session::{BenchmarkRequest, BenchmarkSession, SessionOptions};
use crate::workspace::validate_run_id;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use nmbench_kernels::config::{KernelConfig, SparseMatmulProblem, SparsityRatio};
use nmbench_runtime::aggregate::BenchmarkReport;
use nmbench_runtime::executor::RunPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "nmbench",
    about = "Build and benchmark a templated N:M sparse matmul kernel"
)]
pub struct Cli {
    /// Fraction of pruned weight blocks, strictly between 0 and 1.
    #[arg(long, alias = "sparsity_ratio", default_value_t = 0.9)]
    pub sparsity_ratio: f64,

    /// Shape tag printed in the report line.
    #[arg(long, default_value = "M9")]
    pub name: String,

    #[arg(long, alias = "M", default_value_t = 256)]
    pub m: usize,
    #[arg(long, alias = "K", default_value_t = 1024)]
    pub k: usize,
    #[arg(long, alias = "N", default_value_t = 1024)]
    pub n: usize,

    #[arg(long, default_value = "nmSPARSE_BW64x64")]
    pub kernel: String,

    /// Directory holding the kernel templates.
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Parent directory for per-run build workspaces.
    #[arg(long, env = "NMBENCH_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Name of this run's workspace directory; random when omitted.
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub keep_workspace: bool,

    #[arg(long, env = "NVCC", default_value = "nvcc")]
    pub nvcc: PathBuf,

    /// Compute capability, e.g. 80 for sm_80.
    #[arg(long, default_value = "80")]
    pub arch: String,

    #[arg(long, env = "CUTLASS_DIR")]
    pub cutlass_dir: Option<PathBuf>,

    #[arg(long = "include-dir")]
    pub include_dirs: Vec<PathBuf>,

    /// Extra flag passed verbatim to the compiler; repeatable.
    #[arg(long = "nvcc-flag", allow_hyphen_values = true)]
    pub nvcc_flags: Vec<String>,

    /// Bound on each compile and each kernel run.
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 1)]
    pub warmup_runs: usize,

    #[arg(long, default_value_t = 1)]
    pub measured_runs: usize,

    /// Also write the report as JSON to this path.
    #[arg(long)]
    pub json_output: Option<PathBuf>,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            compiler: self.nvcc.clone(),
            arch: self.arch.clone(),
            cutlass_root: self.cutlass_dir.clone().unwrap_or_else(default_cutlass_root),
            extra_include_dirs: self.include_dirs.clone(),
            extra_flags: self.nvcc_flags.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        let defaults = SessionOptions::default();
        if let Some(run_id) = &self.run_id {
            validate_run_id(run_id)?;
        }
        Ok(SessionOptions {
            work_root: self.work_dir.clone().unwrap_or(defaults.work_root),
            run_id: self.run_id.clone(),
            template_dir: self.template_dir.clone(),
            keep_workspace: self.keep_workspace,
            run_policy: RunPolicy::new(self.warmup_runs, self.measured_runs, self.timeout())?,
        })
    }

    pub fn request(&self) -> Result<BenchmarkRequest> {
        let problem = SparseMatmulProblem::new(self.m, self.k, self.n)?;
        let sparsity = SparsityRatio::new(self.sparsity_ratio)?;
        Ok(BenchmarkRequest {
            name: self.name.clone(),
            kernel: self.kernel.clone(),
            config: KernelConfig::new(problem, sparsity),
        })
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let request = cli.request()?;
    let session = BenchmarkSession::new(cli.compiler_config(), cli.session_options()?);
    let report = session.run(&request)?;

    // A failed JSON write must abort before the report line is printed.
    if let Some(path) = &cli.json_output {
        write_json_report(&report, path)?;
        info!(path = %path.display(), "report written");
    }

    println!("{}", report.summary_line());
    Ok(())
}

fn write_json_report(report: &BenchmarkReport, path: &Path) -> Result<()> {
    fs::write(path, report.to_json()?)
        .with_context(|| format!("writing report to {}", path.display()))
}
