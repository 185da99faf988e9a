//! Requestors: one generation capability per (provider, content type)
//!
//! A [`Requestor`] declares three associated shapes: the configuration it
//! accepts, the transient result it returns, and the record that result
//! becomes once persisted. [`AnyRequestor`] erases those shapes so that
//! requestors of every kind can share one registry.
//!
//! ## Flow
//!
//! ```text
//! validate_configuration ─▶ request(prompt, cfg, area) ─▶ RequestOutcome
//!                                 │                          │
//!                       GenerationBackend            make_record(..)
//!                       (network, external)                  │
//!                                                     GeneratedRecord
//! ```

pub mod audio;
pub mod embedding;
pub mod image;
pub mod registry;
pub mod text;

pub use audio::{AudioConfiguration, AudioData, AudioPayload, AudioRequestor};
pub use embedding::{EmbeddingConfiguration, EmbeddingData, EmbeddingPayload, EmbeddingRequestor};
pub use image::{ImageConfiguration, ImageData, ImagePayload, ImageQuality, ImageRequestor};
pub use registry::{Provider, ProviderBuilder, RequestorRegistry, StaticProvider};
pub use text::{TextConfiguration, TextData, TextPayload, TextRequestor};

use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::output::OutputFileType;
use crate::records::GeneratedRecord;
use crate::storage::{StorageAreaReference, TypedDataFileReference};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use uuid::Uuid;

/// Provider ids and variants: lowercase alphanumerics, `-` and `_`
const ID_SEGMENT_PATTERN: &str = r"^[a-z0-9][a-z0-9_-]*$";

/// Identity of a requestor. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestorDescriptor {
    requestor_id: String,
    display_name: String,
    provider_id: String,
    category: ProviderCategory,
    output_file_type: OutputFileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_size_estimate: Option<u64>,
}

impl RequestorDescriptor {
    /// Build a descriptor whose id is `{provider_id}.{category}.{variant}`.
    ///
    /// Provider and variant must be lowercase alphanumerics, `-` or `_`.
    pub fn new(
        provider_id: impl Into<String>,
        category: ProviderCategory,
        variant: &str,
        display_name: impl Into<String>,
        output_file_type: OutputFileType,
    ) -> Result<Self> {
        let provider_id = provider_id.into();
        let segment_re = Regex::new(ID_SEGMENT_PATTERN)
            .map_err(|e| Error::Registry(format!("invalid id pattern: {}", e)))?;
        for (what, segment) in [("provider id", provider_id.as_str()), ("variant", variant)] {
            if !segment_re.is_match(segment) {
                return Err(Error::Registry(format!(
                    "invalid {} '{}' in requestor id",
                    what, segment
                )));
            }
        }
        if output_file_type.category != category {
            return Err(Error::Registry(format!(
                "output type {} is {} content but the requestor is {}",
                output_file_type.mime_type, output_file_type.category, category
            )));
        }

        Ok(Self {
            requestor_id: format!("{}.{}.{}", provider_id, category, variant),
            display_name: display_name.into(),
            provider_id,
            category,
            output_file_type,
            schema_version: None,
            max_size_estimate: None,
        })
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    pub fn with_max_size_estimate(mut self, bytes: u64) -> Self {
        self.max_size_estimate = Some(bytes);
        self
    }

    pub fn requestor_id(&self) -> &str {
        &self.requestor_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn category(&self) -> ProviderCategory {
        self.category
    }

    pub fn output_file_type(&self) -> &OutputFileType {
        &self.output_file_type
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    pub fn max_size_estimate(&self) -> Option<u64> {
        self.max_size_estimate
    }
}

/// Result of one request: typed data plus the file it was written to, if
/// the payload was large enough to leave memory.
#[derive(Debug, Clone)]
pub struct RequestOutcome<T> {
    pub data: T,
    pub file_reference: Option<TypedDataFileReference>,
}

/// The external generator: `(prompt, configuration) -> payload`.
///
/// Implementations own network calls, credentials, timeouts and retries.
#[async_trait]
pub trait GenerationBackend<C, P>: Send + Sync
where
    C: Send + Sync,
    P: Send,
{
    async fn generate(&self, prompt: &str, configuration: &C) -> Result<P>;
}

/// Adapts an async closure into a [`GenerationBackend`]
pub struct FnBackend<F>(pub F);

#[async_trait]
impl<C, P, F, Fut> GenerationBackend<C, P> for FnBackend<F>
where
    C: Clone + Send + Sync + 'static,
    P: Send + 'static,
    F: Fn(String, C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<P>> + Send,
{
    async fn generate(&self, prompt: &str, configuration: &C) -> Result<P> {
        (self.0)(prompt.to_string(), configuration.clone()).await
    }
}

/// One generation capability with its own configuration, result and
/// record shapes.
#[async_trait]
pub trait Requestor: Send + Sync + 'static {
    /// Transient result of `request`
    type TypedData: Send;
    /// Persistable form of `TypedData`
    type Record: GeneratedRecord;
    /// Request configuration
    type Configuration: Clone + Send + Sync + Serialize + DeserializeOwned;

    fn descriptor(&self) -> &RequestorDescriptor;

    /// Deterministic defaults; always pass `validate_configuration`.
    fn default_configuration(&self) -> Self::Configuration;

    /// Reject any out-of-range field, naming it and its valid range.
    fn validate_configuration(&self, configuration: &Self::Configuration) -> Result<()>;

    /// Generate content. Large payloads are written into `storage_area` and
    /// returned with inline content emptied plus a file reference.
    async fn request(
        &self,
        prompt: &str,
        configuration: &Self::Configuration,
        storage_area: &StorageAreaReference,
    ) -> Result<RequestOutcome<Self::TypedData>>;

    /// Convert a result into its record. Pure; call it wherever the record
    /// store's writer runs.
    fn make_record(
        &self,
        data: Self::TypedData,
        file_reference: Option<TypedDataFileReference>,
        request_id: Uuid,
    ) -> Self::Record;
}

/// Type-erased view of a [`Requestor`] for discovery
pub trait AnyRequestor: Send + Sync {
    fn describe(&self) -> &RequestorDescriptor;

    fn default_configuration_json(&self) -> Result<serde_json::Value>;

    fn validate_configuration_json(&self, configuration: serde_json::Value) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

impl<R: Requestor> AnyRequestor for R {
    fn describe(&self) -> &RequestorDescriptor {
        self.descriptor()
    }

    fn default_configuration_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.default_configuration())?)
    }

    fn validate_configuration_json(&self, configuration: serde_json::Value) -> Result<()> {
        let configuration: R::Configuration = serde_json::from_value(configuration)
            .map_err(|e| Error::invalid_field("configuration", e.to_string()))?;
        self.validate_configuration(&configuration)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Run `operation` unless `cancelled` completes first.
///
/// Dropping a request future mid-write never leaves a partial file behind,
/// so cancellation only has to stop polling it.
pub async fn with_cancellation<T>(
    operation: impl Future<Output = Result<T>>,
    cancelled: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        result = operation => result,
        _ = cancelled => Err(Error::Cancelled("request cancelled before completion".to_string())),
    }
}

/// Write `data` to `file_name` if `output_type` says a payload this size
/// belongs on disk.
pub(crate) async fn store_if_large(
    output_type: &OutputFileType,
    storage_area: &StorageAreaReference,
    file_name: &str,
    mime_type: &str,
    data: &[u8],
    compute_checksum: bool,
) -> Result<Option<TypedDataFileReference>> {
    if !output_type.should_store_as_file(Some(data.len() as u64)) {
        return Ok(None);
    }
    let reference = storage_area
        .write_file(file_name, data, mime_type, compute_checksum)
        .await?;
    Ok(Some(reference))
}

/// Inclusive range check shared by configuration validators
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    // Written so NaN fails too
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(Error::out_of_range(field, value, min, max))
    }
}

pub(crate) fn check_not_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_field(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_descriptor_id_format() {
        let d = RequestorDescriptor::new(
            "openai",
            ProviderCategory::Embedding,
            "text-embedding-3-small",
            "OpenAI Embeddings (small)",
            OutputFileType::float_vector(),
        )
        .unwrap()
        .with_schema_version("1")
        .with_max_size_estimate(6_200);

        assert_eq!(d.requestor_id(), "openai.embedding.text-embedding-3-small");
        assert_eq!(d.category(), ProviderCategory::Embedding);
        assert_eq!(d.schema_version(), Some("1"));
        assert_eq!(d.max_size_estimate(), Some(6_200));
    }

    #[test]
    fn test_descriptor_rejects_bad_segments() {
        let cases = [("Open AI", "x"), ("openai", "gpt.4"), ("", "x"), ("openai", "")];
        for (provider, variant) in cases {
            assert!(RequestorDescriptor::new(
                provider,
                ProviderCategory::Text,
                variant,
                "bad",
                OutputFileType::plain_text(),
            )
            .is_err());
        }
    }

    #[test]
    fn test_descriptor_rejects_mismatched_output_category() {
        let err = RequestorDescriptor::new(
            "openai",
            ProviderCategory::Text,
            "gpt-4o",
            "GPT-4o",
            OutputFileType::png(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("t", 1.0, 0.0, 2.0).is_ok());
        assert!(check_range("t", 0.0, 0.0, 2.0).is_ok());
        assert!(check_range("t", 2.0, 0.0, 2.0).is_ok());
        assert!(check_range("t", 2.1, 0.0, 2.0).is_err());
        assert!(check_range("t", f64::NAN, 0.0, 2.0).is_err());
    }

    #[tokio::test]
    async fn test_fn_backend() {
        let backend = FnBackend(|prompt: String, suffix: String| async move {
            Ok::<_, Error>(format!("{}{}", prompt, suffix))
        });
        let out = backend.generate("hello", &"!".to_string()).await.unwrap();
        assert_eq!(out, "hello!");
    }

    #[tokio::test]
    async fn test_with_cancellation() {
        let finished = with_cancellation(async { Ok(7) }, std::future::pending()).await;
        assert_eq!(finished.unwrap(), 7);

        let cancelled = with_cancellation(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
            tokio::time::sleep(Duration::from_millis(5)),
        )
        .await;
        assert!(matches!(cancelled, Err(Error::Cancelled(_))));
    }
}
