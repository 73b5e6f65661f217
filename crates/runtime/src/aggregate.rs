//! Latency aggregation and the final benchmark report.

use crate::executor::RunResult;
use nmbench_kernels::config::{KernelConfig, SparseMatmulProblem, SparsityRatio};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latency reported for a kernel that failed its own verification.
///
/// Large enough that a failing configuration ranks below every passing one.
pub const SENTINEL_LATENCY: f64 = 10000.0;

pub fn mean_latency(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Mean of `samples`, or [`SENTINEL_LATENCY`] when verification failed.
pub fn aggregate_latency(samples: &[f64], success: bool) -> f64 {
    if !success {
        return SENTINEL_LATENCY;
    }
    mean_latency(samples).unwrap_or(SENTINEL_LATENCY)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub name: String,
    pub kernel: String,
    pub sparsity: SparsityRatio,
    pub problem: SparseMatmulProblem,
    pub chunk_k: u32,
    pub success: bool,
    pub latency: f64,
    pub samples: Vec<f64>,
}

impl BenchmarkReport {
    /// Build the report from measured runs; warm-up runs must already be excluded.
    ///
    /// Success requires every measured run to have passed.
    pub fn from_runs(
        name: impl Into<String>,
        kernel: impl Into<String>,
        config: &KernelConfig,
        runs: &[RunResult],
    ) -> Self {
        let samples: Vec<f64> = runs.iter().map(|run| run.latency).collect();
        let success = !runs.is_empty() && runs.iter().all(|run| run.success);

        Self {
            name: name.into(),
            kernel: kernel.into(),
            sparsity: config.sparsity,
            problem: config.problem,
            chunk_k: config.chunk_k.value(),
            success,
            latency: aggregate_latency(&samples, success),
            samples,
        }
    }

    /// Latency keeps at least one decimal place (`5.0`, `10000.0`).
    pub fn summary_line(&self) -> String {
        format!(
            "SpMM on TensorCore sparsity ratio={} shape={} kernel={} latency={:?}",
            self.sparsity, self.name, self.kernel, self.latency
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}
