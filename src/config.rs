//! genvault configuration management

use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::output::{OutputFileType, DEFAULT_MEDIA_THRESHOLD};
use crate::storage::SCRATCH_DIR_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main genvault configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenVaultConfig {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-category file storage thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

impl GenVaultConfig {
    /// Load from a TOML file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Default location: `<config dir>/genvault/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join("genvault").join("config.toml"))
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Container that in-bundle storage areas live under
    pub bundle_root: PathBuf,

    /// Root for scratch areas
    pub scratch_dir: PathBuf,

    /// Record SHA-256 checksums for written files
    pub compute_checksums: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let bundle_root = dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("genvault");

        Self {
            bundle_root,
            scratch_dir: std::env::temp_dir().join(SCRATCH_DIR_NAME),
            compute_checksums: true,
        }
    }
}

/// Byte size at or above which a category's payloads are written to disk.
/// `None` leaves the decision to the category default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub text: Option<u64>,
    pub structured_data: Option<u64>,
    pub code: Option<u64>,
    pub audio: Option<u64>,
    pub image: Option<u64>,
    pub video: Option<u64>,
    pub embedding: Option<u64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            text: None,
            structured_data: None,
            code: None,
            audio: Some(DEFAULT_MEDIA_THRESHOLD),
            image: Some(DEFAULT_MEDIA_THRESHOLD),
            video: Some(DEFAULT_MEDIA_THRESHOLD),
            embedding: Some(DEFAULT_MEDIA_THRESHOLD),
        }
    }
}

impl ThresholdConfig {
    pub fn for_category(&self, category: ProviderCategory) -> Option<u64> {
        match category {
            ProviderCategory::Text => self.text,
            ProviderCategory::StructuredData => self.structured_data,
            ProviderCategory::Code => self.code,
            ProviderCategory::Audio => self.audio,
            ProviderCategory::Image => self.image,
            ProviderCategory::Video => self.video,
            ProviderCategory::Embedding => self.embedding,
        }
    }

    /// Replace `output`'s threshold with the one configured for its category
    pub fn apply(&self, output: OutputFileType) -> OutputFileType {
        let threshold = self.for_category(output.category);
        output.with_threshold(threshold)
    }
}
