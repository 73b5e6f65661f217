//! Kernel configuration structures.

use crate::error::ConfigError;
use crate::template::TemplateBindings;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const M_GLOBAL_PLACEHOLDER: &str = "M_GLOBAL_VAL";
pub const K_GLOBAL_PLACEHOLDER: &str = "K_GLOBAL_VAL";
pub const N_GLOBAL_PLACEHOLDER: &str = "N_GLOBAL_VAL";
pub const SPARSITY_RATIO_PLACEHOLDER: &str = "SPARSITY_RATIO_VAL";
pub const CHUNK_K_PLACEHOLDER: &str = "CHUNK_K_VAL";

/// Fraction of structured-zero elements in the weight matrix.
///
/// Always lies in the open interval (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SparsityRatio(f64);

impl SparsityRatio {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || value <= 0.0 || value >= 1.0 {
            return Err(ConfigError::InvalidSparsity(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for SparsityRatio {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SparsityRatio> for f64 {
    fn from(value: SparsityRatio) -> f64 {
        value.0
    }
}

impl fmt::Display for SparsityRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of `C[M, N] = A[M, K] * B[K, N]` where `B` carries the sparsity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseMatmulProblem {
    pub m: usize,
    pub k: usize,
    pub n: usize,
}

impl SparseMatmulProblem {
    pub fn new(m: usize, k: usize, n: usize) -> Result<Self, ConfigError> {
        for (name, value) in [("M", m), ("K", k), ("N", n)] {
            if value == 0 {
                return Err(ConfigError::InvalidDimension { name });
            }
        }
        Ok(Self { m, k, n })
    }
}

/// Reduction-dimension tile depth baked into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkK {
    K32,
    K64,
}

impl ChunkK {
    /// Half-sparse weights use the shallow tile; every other ratio the deep one.
    pub fn for_sparsity(sparsity: SparsityRatio) -> Self {
        if sparsity.value() == 0.5 {
            ChunkK::K32
        } else {
            ChunkK::K64
        }
    }

    pub fn value(self) -> u32 {
        match self {
            ChunkK::K32 => 32,
            ChunkK::K64 => 64,
        }
    }
}

/// Fully resolved parameters for one kernel instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub problem: SparseMatmulProblem,
    pub sparsity: SparsityRatio,
    pub chunk_k: ChunkK,
}

impl KernelConfig {
    pub fn new(problem: SparseMatmulProblem, sparsity: SparsityRatio) -> Self {
        Self {
            problem,
            sparsity,
            chunk_k: ChunkK::for_sparsity(sparsity),
        }
    }

    /// Placeholder values substituted into the kernel template.
    pub fn bindings(&self) -> TemplateBindings {
        let mut bindings = TemplateBindings::new();
        bindings.bind(M_GLOBAL_PLACEHOLDER, self.problem.m);
        bindings.bind(K_GLOBAL_PLACEHOLDER, self.problem.k);
        bindings.bind(N_GLOBAL_PLACEHOLDER, self.problem.n);
        bindings.bind(SPARSITY_RATIO_PLACEHOLDER, self.sparsity);
        bindings.bind(CHUNK_K_PLACEHOLDER, self.chunk_k.value());
        bindings
    }
}
