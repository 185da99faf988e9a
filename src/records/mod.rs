//! Persistable records for generated content
//!
//! One record type per category. Every record holds its payload inline or
//! points at a file through a [`TypedDataFileReference`], never both:
//! constructors drop the inline payload whenever a file reference is
//! supplied. Readers call [`GeneratedRecord::content`] and get the payload
//! back from whichever tier it landed in.

pub mod audio;
pub mod embedding;
pub mod image;
pub mod store;
pub mod text;

pub use audio::{AudioFormat, GeneratedAudioRecord};
pub use embedding::GeneratedEmbeddingRecord;
pub use image::{GeneratedImageRecord, ImageFormat};
pub use store::RecordStore;
pub use text::GeneratedTextRecord;

use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::storage::{FileLocation, TypedDataFileReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields shared by every record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Record identity
    pub id: Uuid,
    /// Provider that generated the content
    pub provider_id: String,
    /// Requestor that generated the content
    pub requestor_id: String,
    /// Request whose storage area holds any file
    pub request_id: Uuid,
    /// When the content was generated
    pub generated_at: DateTime<Utc>,
    /// Last modification or access
    pub modified_at: DateTime<Utc>,
    /// Estimated generation cost in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_reference: Option<TypedDataFileReference>,
}

impl RecordMetadata {
    pub fn new(
        provider_id: impl Into<String>,
        requestor_id: impl Into<String>,
        request_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.into(),
            requestor_id: requestor_id.into(),
            request_id,
            generated_at: now,
            modified_at: now,
            estimated_cost: None,
            file_reference: None,
        }
    }

    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }

    pub fn file_reference(&self) -> Option<&TypedDataFileReference> {
        self.file_reference.as_ref()
    }

    fn attach(mut self, file_reference: Option<TypedDataFileReference>) -> Self {
        self.file_reference = file_reference;
        self
    }
}

/// Uniform access surface over the record family
#[async_trait]
pub trait GeneratedRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Decoded payload type
    type Content: Send;

    /// Category this record type stores
    const CATEGORY: ProviderCategory;

    fn metadata(&self) -> &RecordMetadata;

    fn metadata_mut(&mut self) -> &mut RecordMetadata;

    /// Byte length of the inline payload, if any
    fn inline_size(&self) -> Option<u64>;

    /// The payload, from memory if inline, otherwise read and decoded from
    /// the referenced file under `location`.
    async fn content(&self, location: FileLocation<'_>) -> Result<Self::Content>;

    fn id(&self) -> Uuid {
        self.metadata().id
    }

    fn category(&self) -> ProviderCategory {
        Self::CATEGORY
    }

    fn file_reference(&self) -> Option<&TypedDataFileReference> {
        self.metadata().file_reference()
    }

    fn is_file_stored(&self) -> bool {
        self.file_reference().is_some()
    }

    /// Inline length when memory-resident, declared file size when
    /// file-backed.
    fn data_size(&self) -> u64 {
        match self.file_reference() {
            Some(reference) => reference.file_size(),
            None => self.inline_size().unwrap_or(0),
        }
    }

    /// Mark the record as recently accessed
    fn touch(&mut self) {
        self.metadata_mut().modified_at = Utc::now();
    }
}

/// Read a file-backed payload, or report that both tiers are empty.
async fn read_file_backed(
    metadata: &RecordMetadata,
    location: FileLocation<'_>,
    kind: &str,
) -> Result<Vec<u8>> {
    match metadata.file_reference() {
        Some(reference) => reference.read_verified(location).await,
        None => Err(Error::MissingContent(format!(
            "{} record {} has no inline content and no file reference",
            kind, metadata.id
        ))),
    }
}

/// Deserialized records must hold their payload in one tier only
pub(crate) fn check_single_tier(
    metadata: &RecordMetadata,
    has_inline: bool,
    kind: &str,
) -> Result<()> {
    if has_inline && metadata.file_reference().is_some() {
        return Err(Error::Decode(format!(
            "{} record {} carries both inline content and a file reference",
            kind, metadata.id
        )));
    }
    Ok(())
}

/// Serde helper for optional inline binary payloads, stored as base64
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let request_id = Uuid::new_v4();
        let meta = RecordMetadata::new("openai", "openai.text.gpt-4o", request_id);
        assert_eq!(meta.request_id, request_id);
        assert_eq!(meta.generated_at, meta.modified_at);
        assert!(meta.file_reference().is_none());
        assert!(meta.estimated_cost.is_none());

        let meta = meta.with_estimated_cost(0.002);
        assert_eq!(meta.estimated_cost, Some(0.002));
    }

    #[test]
    fn test_category_follows_record_type() {
        let meta = RecordMetadata::new("openai", "openai.text.gpt-4o", Uuid::new_v4());
        let text = GeneratedTextRecord::new(meta.clone(), Some("hi".to_string()), None);
        assert_eq!(text.category(), ProviderCategory::Text);

        let vector = GeneratedEmbeddingRecord::new(meta, None, 0, None);
        assert_eq!(vector.category(), ProviderCategory::Embedding);
    }
}
