//! Kernel variant registry for lookup and discovery.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// One benchmarkable kernel: its reported identifier and shipped template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelVariant {
    pub id: String,
    pub source_file: String,
    template_dir: PathBuf,
}

impl KernelVariant {
    pub fn new(id: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_file: source_file.into(),
            template_dir: default_template_dir(),
        }
    }

    /// 64x64 block-wise N:M sparse matmul on tensor cores.
    pub fn block_wise_64x64() -> Self {
        Self::new("nmSPARSE_BW64x64", "spmm_TC_BW64x64.cu")
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.source_file)
    }

    /// Stem of the source file; the built executable carries this name.
    pub fn executable_stem(&self) -> &str {
        Path::new(&self.source_file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.source_file)
    }
}

/// Templates ship next to this crate's manifest.
pub fn default_template_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    variants: Vec<KernelVariant>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            variants: Vec::new(),
        }
    }

    pub fn with_default_variants() -> Self {
        let mut registry = Self::new();
        registry.register(KernelVariant::block_wise_64x64());
        registry
    }

    pub fn register(&mut self, variant: KernelVariant) {
        self.variants.retain(|existing| existing.id != variant.id);
        self.variants.push(variant);
    }

    pub fn variants(&self) -> &[KernelVariant] {
        &self.variants
    }

    pub fn find(&self, id: &str) -> Result<&KernelVariant, ConfigError> {
        self.variants
            .iter()
            .find(|variant| variant.id == id)
            .ok_or_else(|| ConfigError::UnknownKernel(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::KernelTemplate;

    #[test]
    fn test_default_variant_lookup() {
        let registry = KernelRegistry::with_default_variants();
        let variant = registry.find("nmSPARSE_BW64x64").unwrap();
        assert_eq!(variant.executable_stem(), "spmm_TC_BW64x64");
        assert!(variant.template_path().ends_with("templates/spmm_TC_BW64x64.cu"));
    }

    #[test]
    fn test_unknown_variant() {
        let registry = KernelRegistry::with_default_variants();
        assert!(matches!(
            registry.find("nmSPARSE_EW"),
            Err(ConfigError::UnknownKernel(_))
        ));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = KernelRegistry::with_default_variants();
        registry.register(KernelVariant::block_wise_64x64().with_template_dir("/tmp/tpl"));
        assert_eq!(registry.variants().len(), 1);
        assert_eq!(
            registry.find("nmSPARSE_BW64x64").unwrap().template_path(),
            PathBuf::from("/tmp/tpl/spmm_TC_BW64x64.cu")
        );
    }

    #[test]
    fn test_shipped_template_is_complete() {
        let variant = KernelVariant::block_wise_64x64();
        let template = KernelTemplate::load(&variant.template_path()).unwrap();
        let placeholders = template.placeholders();
        for name in [
            crate::config::M_GLOBAL_PLACEHOLDER,
            crate::config::K_GLOBAL_PLACEHOLDER,
            crate::config::N_GLOBAL_PLACEHOLDER,
            crate::config::SPARSITY_RATIO_PLACEHOLDER,
            crate::config::CHUNK_K_PLACEHOLDER,
        ] {
            assert!(placeholders.contains(name), "{name}");
        }
        assert_eq!(placeholders.len(), 5);
    }
}
