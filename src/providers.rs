//! Built-in requestor catalog
//!
//! Describes the requestors genvault knows about out of the box. None of
//! them can reach a real service: each is wired to [`UnconfiguredBackend`],
//! which fails with `MissingCredentials`. Embedders swap in their own
//! [`GenerationBackend`] when building requestors by hand.

use crate::category::ProviderCategory;
use crate::config::GenVaultConfig;
use crate::error::{Error, Result};
use crate::output::OutputFileType;
use crate::requestor::{
    AudioRequestor, EmbeddingRequestor, GenerationBackend, ImageRequestor, ProviderBuilder,
    RequestorDescriptor, RequestorRegistry, StaticProvider, TextRequestor,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Backend for a provider that has no credentials configured
#[derive(Debug, Clone)]
pub struct UnconfiguredBackend {
    provider_id: String,
}

impl UnconfiguredBackend {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }
}

#[async_trait]
impl<C, P> GenerationBackend<C, P> for UnconfiguredBackend
where
    C: Send + Sync + 'static,
    P: Send + 'static,
{
    async fn generate(&self, _prompt: &str, _configuration: &C) -> Result<P> {
        Err(Error::MissingCredentials(self.provider_id.clone()))
    }
}

fn descriptor(
    config: &GenVaultConfig,
    provider_id: &str,
    category: ProviderCategory,
    variant: &str,
    display_name: &str,
    output: OutputFileType,
) -> Result<RequestorDescriptor> {
    Ok(RequestorDescriptor::new(
        provider_id,
        category,
        variant,
        display_name,
        config.thresholds.apply(output),
    )?
    .with_schema_version("1"))
}

fn openai(config: &GenVaultConfig) -> Result<StaticProvider> {
    let backend = Arc::new(UnconfiguredBackend::new("openai"));
    let checksums = config.storage.compute_checksums;

    let text = TextRequestor::new(
        descriptor(
            config,
            "openai",
            ProviderCategory::Text,
            "gpt-4o",
            "GPT-4o",
            OutputFileType::plain_text(),
        )?,
        "gpt-4o",
        16_384,
        backend.clone(),
    )?
    .with_checksums(checksums);

    let image = ImageRequestor::new(
        descriptor(
            config,
            "openai",
            ProviderCategory::Image,
            "gpt-image-1",
            "GPT Image",
            OutputFileType::png(),
        )?
        .with_max_size_estimate(4_000_000),
        "gpt-image-1",
        256..=4096,
        backend.clone(),
    )?
    .with_checksums(checksums);

    // 4-byte header + 4 bytes per float + preview text and token count
    let large = EmbeddingRequestor::new(
        descriptor(
            config,
            "openai",
            ProviderCategory::Embedding,
            "text-embedding-3-large",
            "Text Embedding 3 Large",
            OutputFileType::float_vector(),
        )?
        .with_max_size_estimate(4 + 3072 * 4 + 4 + 800 + 4),
        "text-embedding-3-large",
        256..=3072,
        backend.clone(),
    )?
    .with_checksums(checksums);

    let small = EmbeddingRequestor::new(
        descriptor(
            config,
            "openai",
            ProviderCategory::Embedding,
            "text-embedding-3-small",
            "Text Embedding 3 Small",
            OutputFileType::float_vector(),
        )?
        .with_max_size_estimate(4 + 1536 * 4 + 4 + 800 + 4),
        "text-embedding-3-small",
        512..=1536,
        backend,
    )?
    .with_checksums(checksums);

    ProviderBuilder::new("openai", "OpenAI")
        .requestor(text)
        .requestor(image)
        .requestor(large)
        .requestor(small)
        .build()
}

fn anthropic(config: &GenVaultConfig) -> Result<StaticProvider> {
    let text = TextRequestor::new(
        descriptor(
            config,
            "anthropic",
            ProviderCategory::Text,
            "claude-sonnet",
            "Claude Sonnet",
            OutputFileType::plain_text(),
        )?,
        "claude-sonnet-4-5",
        8_192,
        Arc::new(UnconfiguredBackend::new("anthropic")),
    )?
    .with_checksums(config.storage.compute_checksums);

    ProviderBuilder::new("anthropic", "Anthropic")
        .requestor(text)
        .build()
}

fn elevenlabs(config: &GenVaultConfig) -> Result<StaticProvider> {
    let speech = AudioRequestor::new(
        descriptor(
            config,
            "elevenlabs",
            ProviderCategory::Audio,
            "tts",
            "ElevenLabs Text to Speech",
            OutputFileType::mp3(),
        )?
        .with_max_size_estimate(10_000_000),
        "21m00Tcm4TlvDq8ikWAM",
        "eleven_multilingual_v2",
        Arc::new(UnconfiguredBackend::new("elevenlabs")),
    )
    .with_checksums(config.storage.compute_checksums);

    ProviderBuilder::new("elevenlabs", "ElevenLabs")
        .requestor(speech)
        .build()
}

/// All built-in providers, thresholds taken from `config`
pub fn builtin_providers(config: &GenVaultConfig) -> Result<Vec<StaticProvider>> {
    Ok(vec![openai(config)?, anthropic(config)?, elevenlabs(config)?])
}

/// A registry holding every built-in requestor
pub fn builtin_registry(config: &GenVaultConfig) -> Result<RequestorRegistry> {
    let mut registry = RequestorRegistry::new();
    for provider in builtin_providers(config)? {
        registry.register_provider(&provider)?;
    }
    tracing::info!("Loaded {} built-in requestors", registry.len());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::requestor::{AnyRequestor, Requestor, TextConfiguration};
    use crate::storage::StorageAreaReference;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_builtin_catalog() {
        let registry = builtin_registry(&GenVaultConfig::default()).unwrap();
        let ids: Vec<&str> = registry
            .all()
            .iter()
            .map(|r| r.describe().requestor_id())
            .collect();
        assert_eq!(
            ids,
            vec![
                "openai.text.gpt-4o",
                "openai.image.gpt-image-1",
                "openai.embedding.text-embedding-3-large",
                "openai.embedding.text-embedding-3-small",
                "anthropic.text.claude-sonnet",
                "elevenlabs.audio.tts",
            ]
        );
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.by_category(ProviderCategory::Embedding).len(), 2);
        assert_eq!(registry.by_provider("anthropic").len(), 1);
        assert_eq!(registry.providers().len(), 3);

        for r in registry.all() {
            let defaults = r.default_configuration_json().unwrap();
            assert!(
                r.validate_configuration_json(defaults).is_ok(),
                "{} defaults should validate",
                r.describe().requestor_id()
            );
        }
    }

    #[test]
    fn test_embedding_range_from_catalog() {
        let registry = builtin_registry(&GenVaultConfig::default()).unwrap();
        let large = registry
            .typed::<EmbeddingRequestor>("openai.embedding.text-embedding-3-large")
            .unwrap();
        assert_eq!(large.dimension_range(), &(256..=3072));

        let err = large
            .validate_configuration_json(serde_json::json!({
                "model": "text-embedding-3-large",
                "dimensions": 100
            }))
            .unwrap_err()
            .to_string();
        assert!(err.contains("256") && err.contains("3072"));
    }

    #[test]
    fn test_configured_thresholds_reach_descriptors() {
        let config = GenVaultConfig {
            thresholds: ThresholdConfig {
                text: Some(2048),
                ..Default::default()
            },
            ..Default::default()
        };
        let registry = builtin_registry(&config).unwrap();
        let gpt = registry.get("openai.text.gpt-4o").unwrap();
        assert_eq!(gpt.describe().output_file_type().file_threshold, Some(2048));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_reports_missing_credentials() {
        let dir = TempDir::new().unwrap();
        let registry = builtin_registry(&GenVaultConfig::default()).unwrap();
        let claude = registry
            .typed::<TextRequestor>("anthropic.text.claude-sonnet")
            .unwrap();
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());
        let cfg: TextConfiguration = claude.default_configuration();

        let err = claude.request("hello", &cfg, &area).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredentials(ref p) if p == "anthropic"));
        assert!(!area.exists().await);
    }
}
