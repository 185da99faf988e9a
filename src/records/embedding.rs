//! Generated embedding records
//!
//! Vectors are kept in the fixed binary layout from
//! [`crate::format::vector`], inline or in a file. Reading one back checks
//! that the payload carries exactly the declared number of dimensions.

use super::{base64_bytes, check_single_tier, read_file_backed, GeneratedRecord, RecordMetadata};
use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::format::VectorPayload;
use crate::storage::{FileLocation, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Characters of the input text kept on the record for display
pub const INPUT_PREVIEW_CHARS: usize = 200;

/// An embedding generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbeddingRecord")]
pub struct GeneratedEmbeddingRecord {
    pub metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    embedding_data: Option<Vec<u8>>,
    pub dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
}

#[derive(Deserialize)]
struct RawEmbeddingRecord {
    metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes")]
    embedding_data: Option<Vec<u8>>,
    dimensions: usize,
    #[serde(default)]
    input_preview: Option<String>,
    #[serde(default)]
    token_count: Option<u32>,
}

impl TryFrom<RawEmbeddingRecord> for GeneratedEmbeddingRecord {
    type Error = Error;

    fn try_from(raw: RawEmbeddingRecord) -> Result<Self> {
        check_single_tier(&raw.metadata, raw.embedding_data.is_some(), "embedding")?;
        Ok(Self {
            metadata: raw.metadata,
            embedding_data: raw.embedding_data,
            dimensions: raw.dimensions,
            input_preview: raw.input_preview,
            token_count: raw.token_count,
        })
    }
}

impl GeneratedEmbeddingRecord {
    /// `embedding_data` must already be in the fixed vector layout.
    pub fn new(
        metadata: RecordMetadata,
        embedding_data: Option<Vec<u8>>,
        dimensions: usize,
        file_reference: Option<TypedDataFileReference>,
    ) -> Self {
        let embedding_data = if file_reference.is_some() {
            None
        } else {
            embedding_data
        };
        Self {
            metadata: metadata.attach(file_reference),
            embedding_data,
            dimensions,
            input_preview: None,
            token_count: None,
        }
    }

    /// Encode `payload` and keep it inline (or drop it if file-backed).
    pub fn from_payload(
        metadata: RecordMetadata,
        payload: &VectorPayload,
        file_reference: Option<TypedDataFileReference>,
    ) -> Result<Self> {
        let data = if file_reference.is_some() {
            None
        } else {
            Some(payload.to_bytes()?)
        };
        let mut record = Self::new(metadata, data, payload.dimensions(), file_reference);
        if let Some(text) = &payload.input_text {
            record = record.with_input_preview(text);
        }
        if let Some(count) = payload.token_count {
            let count = u32::try_from(count).map_err(|_| {
                Error::Decode(format!("token count {} cannot be stored on a record", count))
            })?;
            record.token_count = Some(count);
        }
        Ok(record)
    }

    /// Keep the first [`INPUT_PREVIEW_CHARS`] characters of the input
    pub fn with_input_preview(mut self, text: &str) -> Self {
        self.input_preview = Some(text.chars().take(INPUT_PREVIEW_CHARS).collect());
        self
    }

    pub fn with_token_count(mut self, count: u32) -> Self {
        self.token_count = Some(count);
        self
    }

    /// Encoded inline vector bytes, `None` when file-backed
    pub fn embedding_data(&self) -> Option<&[u8]> {
        self.embedding_data.as_deref()
    }

    /// Just the vector values
    pub async fn vector(&self, location: FileLocation<'_>) -> Result<Vec<f32>> {
        Ok(self.content(location).await?.values)
    }
}

#[async_trait]
impl GeneratedRecord for GeneratedEmbeddingRecord {
    type Content = VectorPayload;

    const CATEGORY: ProviderCategory = ProviderCategory::Embedding;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn inline_size(&self) -> Option<u64> {
        self.embedding_data.as_ref().map(|d| d.len() as u64)
    }

    async fn content(&self, location: FileLocation<'_>) -> Result<VectorPayload> {
        match &self.embedding_data {
            Some(data) => VectorPayload::from_bytes_with_dimensions(data, self.dimensions),
            None => {
                let data = read_file_backed(&self.metadata, location, "embedding").await?;
                VectorPayload::from_bytes_with_dimensions(&data, self.dimensions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageAreaReference;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn meta(request_id: Uuid) -> RecordMetadata {
        RecordMetadata::new("openai", "openai.embedding.text-embedding-3-large", request_id)
    }

    #[tokio::test]
    async fn test_inline_vector_round_trip() {
        let dir = TempDir::new().unwrap();
        let payload = VectorPayload::new(vec![1.0, 2.0, 3.0])
            .with_input_text("three numbers")
            .with_token_count(2);
        let record = GeneratedEmbeddingRecord::from_payload(meta(Uuid::new_v4()), &payload, None)
            .unwrap();

        assert_eq!(record.dimensions, 3);
        assert_eq!(record.token_count, Some(2));
        assert_eq!(record.input_preview.as_deref(), Some("three numbers"));
        assert_eq!(record.data_size(), payload.encoded_len() as u64);

        let values = record.vector(dir.path().into()).await.unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_file_backed_vector() {
        let dir = TempDir::new().unwrap();
        let request_id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), request_id, "bundle");
        let values: Vec<f32> = (0..3072).map(|i| (i as f32).sin()).collect();
        let bytes = VectorPayload::new(values.clone()).to_bytes().unwrap();
        let reference = area
            .write_file("embedding.vec", &bytes, "application/x-float32-vector", true)
            .await
            .unwrap();

        let record = GeneratedEmbeddingRecord::new(
            meta(request_id),
            Some(bytes.clone()),
            3072,
            Some(reference),
        );
        assert!(record.embedding_data().is_none());
        assert_eq!(record.data_size(), bytes.len() as u64);
        assert_eq!(record.vector(dir.path().into()).await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let bytes = VectorPayload::new(vec![0.1, 0.2]).to_bytes().unwrap();
        let record = GeneratedEmbeddingRecord::new(meta(Uuid::new_v4()), Some(bytes), 3, None);
        assert!(matches!(
            record.content(dir.path().into()).await,
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "x".repeat(INPUT_PREVIEW_CHARS * 2);
        let record = GeneratedEmbeddingRecord::new(meta(Uuid::new_v4()), None, 0, None)
            .with_input_preview(&long);
        assert_eq!(
            record.input_preview.unwrap().chars().count(),
            INPUT_PREVIEW_CHARS
        );
    }

    #[test]
    fn test_negative_token_count_is_rejected() {
        let payload = VectorPayload::new(vec![0.5]).with_token_count(-1);
        let err = GeneratedEmbeddingRecord::from_payload(meta(Uuid::new_v4()), &payload, None)
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_deserialize_rejects_both_tiers() {
        let request_id = Uuid::new_v4();
        let payload = VectorPayload::new(vec![1.0, 2.0]);
        let bytes = payload.to_bytes().unwrap();
        let reference = TypedDataFileReference::from_data(
            request_id,
            "embedding.vec",
            &bytes,
            "application/x-float32-vector",
            false,
        )
        .unwrap();
        let record =
            GeneratedEmbeddingRecord::from_payload(meta(request_id), &payload, Some(reference))
                .unwrap();
        let mut json = serde_json::to_value(&record).unwrap();
        json["embedding_data"] = serde_json::json!(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            &bytes
        ));

        let err = serde_json::from_value::<GeneratedEmbeddingRecord>(json).unwrap_err();
        assert!(err.to_string().contains("both inline content and a file reference"));
    }
}
