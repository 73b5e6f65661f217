use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read kernel template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template `{template}` has no `{placeholder}` placeholder")]
    MissingPlaceholder {
        template: String,
        placeholder: String,
    },
    #[error("template `{template}` contains unbound placeholder `{token}`")]
    UnknownPlaceholder { template: String, token: String },
    #[error("sparsity ratio must lie strictly between 0 and 1, got {0}")]
    InvalidSparsity(f64),
    #[error("problem dimension {name} must be non-zero")]
    InvalidDimension { name: &'static str },
    #[error("unknown kernel variant `{0}`")]
    UnknownKernel(String),
    #[error("run id `{0}` must be a single plain directory name")]
    InvalidRunId(String),
    #[error("invalid run policy: {0}")]
    InvalidRunPolicy(String),
}
