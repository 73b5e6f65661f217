//! Kernel template instantiation.
//!
//! Templates are plain kernel sources whose tunable constants are written as
//! upper-case tokens ending in `_VAL` (for example `CHUNK_K_VAL`). Rendering
//! is strict in both directions: every bound placeholder must occur in the
//! template, and every `_VAL` token in the template must be bound.

use crate::error::ConfigError;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Z][A-Z0-9_]*_VAL\b").expect("placeholder pattern is a valid regex")
    })
}

/// Placeholder name to rendered value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateBindings {
    values: BTreeMap<String, String>,
}

impl TemplateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, placeholder: impl Into<String>, value: impl fmt::Display) {
        self.values.insert(placeholder.into(), value.to_string());
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.values.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct KernelTemplate {
    name: String,
    text: String,
}

impl KernelTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder tokens present in the template text.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        placeholder_pattern()
            .find_iter(&self.text)
            .map(|m| m.as_str())
            .collect()
    }

    /// Substitute every placeholder with its bound value.
    pub fn render(&self, bindings: &TemplateBindings) -> Result<KernelSource, ConfigError> {
        let present = self.placeholders();

        if let Some((missing, _)) = bindings.iter().find(|(name, _)| !present.contains(name)) {
            return Err(ConfigError::MissingPlaceholder {
                template: self.name.clone(),
                placeholder: missing.to_string(),
            });
        }
        if let Some(unbound) = present.iter().find(|token| bindings.get(token).is_none()) {
            return Err(ConfigError::UnknownPlaceholder {
                template: self.name.clone(),
                token: unbound.to_string(),
            });
        }

        // Single pass over whole tokens, so one value can never be re-matched
        // as part of another placeholder.
        let text = placeholder_pattern().replace_all(&self.text, |caps: &Captures<'_>| {
            bindings.get(&caps[0]).unwrap_or(&caps[0]).to_string()
        });

        Ok(KernelSource {
            text: text.into_owned(),
        })
    }
}

/// Template text with every placeholder substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    text: String,
}

impl KernelSource {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<[u8]> for KernelSource {
    fn as_ref(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelConfig, SparseMatmulProblem, SparsityRatio};
    use std::io::Write;

    const TEMPLATE: &str = "\
#define M_GLOBAL M_GLOBAL_VAL
#define K_GLOBAL K_GLOBAL_VAL
#define N_GLOBAL N_GLOBAL_VAL
#define CHUNK_K CHUNK_K_VAL
const float kSparsity = SPARSITY_RATIO_VAL;
static_assert(M_GLOBAL_VAL % 64 == 0, \"M tile\");
";

    fn config(sparsity: f64) -> KernelConfig {
        KernelConfig::new(
            SparseMatmulProblem::new(256, 1024, 1024).unwrap(),
            SparsityRatio::new(sparsity).unwrap(),
        )
    }

    #[test]
    fn test_render_replaces_every_placeholder() {
        let template = KernelTemplate::new("spmm", TEMPLATE);
        let source = template.render(&config(0.9).bindings()).unwrap();

        assert!(source.as_str().contains("#define M_GLOBAL 256"));
        assert!(source.as_str().contains("#define CHUNK_K 64"));
        assert!(source.as_str().contains("kSparsity = 0.9;"));
        assert!(source.as_str().contains("static_assert(256 % 64 == 0"));
        assert!(!source.as_str().contains("_VAL"));
    }

    #[test]
    fn test_render_half_sparsity_uses_shallow_chunk() {
        let template = KernelTemplate::new("spmm", TEMPLATE);
        let source = template.render(&config(0.5).bindings()).unwrap();
        assert!(source.as_str().contains("#define CHUNK_K 32"));
    }

    #[test]
    fn test_render_rejects_missing_placeholder() {
        let template = KernelTemplate::new("spmm", "#define M M_GLOBAL_VAL\n");
        let mut bindings = TemplateBindings::new();
        bindings.bind("M_GLOBAL_VAL", 256);
        bindings.bind("CHUNK_K_VAL", 64);

        let err = template.render(&bindings).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingPlaceholder { ref placeholder, .. } if placeholder == "CHUNK_K_VAL"
        ));
    }

    #[test]
    fn test_render_rejects_unbound_token() {
        let template = KernelTemplate::new("spmm", "M_GLOBAL_VAL WARP_COUNT_VAL");
        let mut bindings = TemplateBindings::new();
        bindings.bind("M_GLOBAL_VAL", 256);

        let err = template.render(&bindings).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownPlaceholder { ref token, .. } if token == "WARP_COUNT_VAL"
        ));
    }

    #[test]
    fn test_overlapping_names_substitute_whole_tokens() {
        let template = KernelTemplate::new("spmm", "A_VAL BA_VAL");
        let mut bindings = TemplateBindings::new();
        bindings.bind("A_VAL", "x");
        bindings.bind("BA_VAL", "y");

        let source = template.render(&bindings).unwrap();
        assert_eq!(source.as_str(), "x y");
    }

    #[test]
    fn test_load_missing_template_is_config_error() {
        let err = KernelTemplate::load(Path::new("/nonexistent/spmm.cu")).unwrap_err();
        assert!(matches!(err, ConfigError::TemplateRead { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();

        let template = KernelTemplate::load(file.path()).unwrap();
        assert_eq!(template.placeholders().len(), 5);
    }
}
