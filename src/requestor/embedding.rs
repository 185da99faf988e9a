//! Embedding requestor
//!
//! Each model declares the output dimensions it accepts. Vectors come back
//! encoded in the fixed float layout so they can be stored inline or as a
//! `.vec` file without another conversion.

use super::{
    check_not_empty, check_range, store_if_large, GenerationBackend, RequestOutcome, Requestor,
    RequestorDescriptor,
};
use crate::error::{Error, Result};
use crate::format::VectorPayload;
use crate::records::embedding::INPUT_PREVIEW_CHARS;
use crate::records::{GeneratedEmbeddingRecord, RecordMetadata};
use crate::storage::{StorageAreaReference, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use uuid::Uuid;

/// Embedding request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfiguration {
    pub model: String,
    pub dimensions: u32,
}

/// What the backend hands back for an embedding request
#[derive(Debug, Clone, Default)]
pub struct EmbeddingPayload {
    pub values: Vec<f32>,
    pub token_count: Option<u32>,
    pub estimated_cost: Option<f64>,
}

/// Transient embedding result.
///
/// `vector` holds the encoded layout, or `None` once written to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingData {
    pub vector: Option<Vec<u8>>,
    pub dimensions: usize,
    pub input_preview: String,
    pub token_count: Option<u32>,
    pub model: String,
    pub estimated_cost: Option<f64>,
}

pub struct EmbeddingRequestor {
    descriptor: RequestorDescriptor,
    default_model: String,
    dimension_range: RangeInclusive<u32>,
    default_dimensions: u32,
    backend: Arc<dyn GenerationBackend<EmbeddingConfiguration, EmbeddingPayload>>,
    compute_checksums: bool,
}

impl EmbeddingRequestor {
    /// The model's native size is the top of `dimension_range`.
    pub fn new(
        descriptor: RequestorDescriptor,
        default_model: impl Into<String>,
        dimension_range: RangeInclusive<u32>,
        backend: Arc<dyn GenerationBackend<EmbeddingConfiguration, EmbeddingPayload>>,
    ) -> Result<Self> {
        if dimension_range.is_empty() || *dimension_range.start() == 0 {
            return Err(Error::invalid_field(
                "dimension_range",
                "must be a non-empty range of positive sizes",
            ));
        }
        let default_dimensions = *dimension_range.end();
        Ok(Self {
            descriptor,
            default_model: default_model.into(),
            dimension_range,
            default_dimensions,
            backend,
            compute_checksums: true,
        })
    }

    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.compute_checksums = enabled;
        self
    }

    pub fn dimension_range(&self) -> &RangeInclusive<u32> {
        &self.dimension_range
    }
}

#[async_trait]
impl Requestor for EmbeddingRequestor {
    type TypedData = EmbeddingData;
    type Record = GeneratedEmbeddingRecord;
    type Configuration = EmbeddingConfiguration;

    fn descriptor(&self) -> &RequestorDescriptor {
        &self.descriptor
    }

    fn default_configuration(&self) -> EmbeddingConfiguration {
        EmbeddingConfiguration {
            model: self.default_model.clone(),
            dimensions: self.default_dimensions,
        }
    }

    fn validate_configuration(&self, configuration: &EmbeddingConfiguration) -> Result<()> {
        check_not_empty("model", &configuration.model)?;
        check_range(
            "dimensions",
            configuration.dimensions,
            *self.dimension_range.start(),
            *self.dimension_range.end(),
        )
    }

    async fn request(
        &self,
        prompt: &str,
        configuration: &EmbeddingConfiguration,
        storage_area: &StorageAreaReference,
    ) -> Result<RequestOutcome<EmbeddingData>> {
        self.validate_configuration(configuration)?;
        if prompt.is_empty() {
            return Err(Error::invalid_field("input", "must not be empty"));
        }
        tracing::info!(
            requestor = self.descriptor.requestor_id(),
            request_id = %storage_area.request_id(),
            dimensions = configuration.dimensions,
            "Requesting embedding"
        );

        let payload = self.backend.generate(prompt, configuration).await?;
        let expected = configuration.dimensions as usize;
        if payload.values.len() != expected {
            return Err(Error::UnexpectedResponse(format!(
                "expected {} dimensions, got {}",
                expected,
                payload.values.len()
            )));
        }

        let input_preview: String = prompt.chars().take(INPUT_PREVIEW_CHARS).collect();
        let mut vector = VectorPayload::new(payload.values).with_input_text(input_preview.clone());
        if let Some(count) = payload.token_count {
            let count = i32::try_from(count).map_err(|_| {
                Error::Encode(format!("token count {} does not fit the vector layout", count))
            })?;
            vector = vector.with_token_count(count);
        }
        let encoded = vector.to_bytes()?;

        let output = self.descriptor.output_file_type();
        let file_name = format!("embedding.{}", output.file_extension);
        let file_reference = store_if_large(
            output,
            storage_area,
            &file_name,
            &output.mime_type,
            &encoded,
            self.compute_checksums,
        )
        .await?;

        tracing::debug!(
            bytes = encoded.len(),
            file_backed = file_reference.is_some(),
            "Embedding complete"
        );

        Ok(RequestOutcome {
            data: EmbeddingData {
                vector: if file_reference.is_some() {
                    None
                } else {
                    Some(encoded)
                },
                dimensions: expected,
                input_preview,
                token_count: payload.token_count,
                model: configuration.model.clone(),
                estimated_cost: payload.estimated_cost,
            },
            file_reference,
        })
    }

    fn make_record(
        &self,
        data: EmbeddingData,
        file_reference: Option<TypedDataFileReference>,
        request_id: Uuid,
    ) -> GeneratedEmbeddingRecord {
        let mut metadata = RecordMetadata::new(
            self.descriptor.provider_id(),
            self.descriptor.requestor_id(),
            request_id,
        );
        if let Some(cost) = data.estimated_cost {
            metadata = metadata.with_estimated_cost(cost);
        }

        let mut record =
            GeneratedEmbeddingRecord::new(metadata, data.vector, data.dimensions, file_reference)
                .with_input_preview(&data.input_preview);
        if let Some(count) = data.token_count {
            record = record.with_token_count(count);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ProviderCategory;
    use crate::output::{OutputFileType, DEFAULT_MEDIA_THRESHOLD};
    use crate::records::GeneratedRecord;
    use crate::providers::UnconfiguredBackend;
    use crate::requestor::FnBackend;
    use tempfile::TempDir;

    fn requestor_with(
        backend: impl GenerationBackend<EmbeddingConfiguration, EmbeddingPayload> + 'static,
        output: OutputFileType,
    ) -> EmbeddingRequestor {
        EmbeddingRequestor::new(
            RequestorDescriptor::new(
                "openai",
                ProviderCategory::Embedding,
                "text-embedding-3-large",
                "OpenAI Embeddings (large)",
                output,
            )
            .unwrap(),
            "text-embedding-3-large",
            256..=3072,
            Arc::new(backend),
        )
        .unwrap()
    }

    fn requestor_with_threshold(threshold: u64) -> EmbeddingRequestor {
        requestor_with(
            FnBackend(|prompt: String, cfg: EmbeddingConfiguration| async move {
                Ok::<_, Error>(EmbeddingPayload {
                    values: (0..cfg.dimensions).map(|i| i as f32 * 0.001).collect(),
                    token_count: Some(prompt.split_whitespace().count() as u32),
                    estimated_cost: None,
                })
            }),
            OutputFileType::float_vector().with_threshold(Some(threshold)),
        )
    }

    fn requestor() -> EmbeddingRequestor {
        requestor_with_threshold(DEFAULT_MEDIA_THRESHOLD)
    }

    #[test]
    fn test_dimensions_below_range_names_both_bounds() {
        let r = requestor();
        let cfg = EmbeddingConfiguration {
            model: "text-embedding-3-large".to_string(),
            dimensions: 100,
        };
        let message = r.validate_configuration(&cfg).unwrap_err().to_string();
        assert!(message.contains("dimensions"));
        assert!(message.contains("256"));
        assert!(message.contains("3072"));
    }

    #[test]
    fn test_default_uses_native_dimensions() {
        let r = requestor();
        let cfg = r.default_configuration();
        assert_eq!(cfg.dimensions, 3072);
        assert!(r.validate_configuration(&cfg).is_ok());
    }

    #[tokio::test]
    async fn test_small_vector_stays_inline() {
        let dir = TempDir::new().unwrap();
        let r = requestor();
        let request_id = Uuid::new_v4();
        let area = StorageAreaReference::temporary_in(dir.path(), request_id);
        let cfg = EmbeddingConfiguration {
            model: "text-embedding-3-large".to_string(),
            dimensions: 256,
        };

        let outcome = r.request("the quick brown fox", &cfg, &area).await.unwrap();
        assert!(outcome.file_reference.is_none());
        assert_eq!(outcome.data.dimensions, 256);

        let record = r.make_record(outcome.data, None, request_id);
        assert_eq!(record.token_count, Some(4));
        assert_eq!(record.input_preview.as_deref(), Some("the quick brown fox"));
        let payload = record.content(dir.path().into()).await.unwrap();
        assert_eq!(payload.values.len(), 256);
        assert_eq!(payload.input_text.as_deref(), Some("the quick brown fox"));
        assert_eq!(payload.token_count, Some(4));
    }

    #[tokio::test]
    async fn test_large_vector_goes_to_file() {
        let dir = TempDir::new().unwrap();
        // 3072 floats is ~12 KB, under the default threshold
        let r = requestor_with_threshold(8_192).with_checksums(false);
        let request_id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), request_id, "bundle");

        let prompt = "w ".repeat(20_000);
        let outcome = r
            .request(&prompt, &r.default_configuration(), &area)
            .await
            .unwrap();
        let reference = outcome.file_reference.clone().unwrap();
        assert_eq!(reference.file_name(), "embedding.vec");
        assert!(reference.checksum().is_none());
        assert!(outcome.data.vector.is_none());

        let record = r.make_record(outcome.data, outcome.file_reference, request_id);
        assert_eq!(
            record.input_preview.as_ref().map(|p| p.chars().count()),
            Some(INPUT_PREVIEW_CHARS)
        );
        let values = record.vector(dir.path().into()).await.unwrap();
        assert_eq!(values.len(), 3072);
        assert_eq!(values[1], 0.001);
    }

    #[tokio::test]
    async fn test_wrong_length_response_is_rejected() {
        let dir = TempDir::new().unwrap();
        let r = requestor_with(FnBackend(|_: String, _: EmbeddingConfiguration| async move {
            Ok::<_, Error>(EmbeddingPayload {
                values: vec![0.5; 10],
                ..Default::default()
            })
        }), OutputFileType::float_vector());
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());

        let err = r
            .request("text", &r.default_configuration(), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
        assert!(!area.exists().await);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let r = requestor_with(FnBackend(|_: String, _: EmbeddingConfiguration| async move {
            Err::<EmbeddingPayload, _>(Error::Network("connection reset".to_string()))
        }), OutputFileType::float_vector());
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());

        let err = r
            .request("text", &r.default_configuration(), &area)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_oversized_token_count_is_an_encode_error() {
        let dir = TempDir::new().unwrap();
        let r = requestor_with(
            FnBackend(|_: String, cfg: EmbeddingConfiguration| async move {
                Ok::<_, Error>(EmbeddingPayload {
                    values: vec![0.25; cfg.dimensions as usize],
                    token_count: Some(u32::MAX),
                    estimated_cost: None,
                })
            }),
            OutputFileType::float_vector(),
        );
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());

        let err = r
            .request("text", &r.default_configuration(), &area)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_degenerate_dimension_ranges_are_rejected() {
        for range in [RangeInclusive::new(3072, 256), 0..=1536] {
            let descriptor = RequestorDescriptor::new(
                "openai",
                ProviderCategory::Embedding,
                "text-embedding-3-large",
                "OpenAI Embeddings (large)",
                OutputFileType::float_vector(),
            )
            .unwrap();
            let result = EmbeddingRequestor::new(
                descriptor,
                "text-embedding-3-large",
                range,
                Arc::new(UnconfiguredBackend::new("openai")),
            );
            assert!(result.is_err());
        }
    }
}
