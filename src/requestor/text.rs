//! Text generation requestor

use super::{
    check_not_empty, check_range, store_if_large, GenerationBackend, RequestOutcome, Requestor,
    RequestorDescriptor,
};
use crate::error::{Error, Result};
use crate::records::text::count_text;
use crate::records::{GeneratedTextRecord, RecordMetadata};
use crate::storage::{StorageAreaReference, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Text request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfiguration {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// What the backend hands back for a text request
#[derive(Debug, Clone, Default)]
pub struct TextPayload {
    pub text: String,
    pub language: Option<String>,
    pub estimated_cost: Option<f64>,
}

/// Transient text result. `content` is `None` once the text lives in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct TextData {
    pub content: Option<String>,
    pub word_count: usize,
    pub character_count: usize,
    pub language: Option<String>,
    pub model: String,
    pub estimated_cost: Option<f64>,
}

pub struct TextRequestor {
    descriptor: RequestorDescriptor,
    default_model: String,
    max_output_tokens: u32,
    backend: Arc<dyn GenerationBackend<TextConfiguration, TextPayload>>,
    compute_checksums: bool,
}

impl TextRequestor {
    pub fn new(
        descriptor: RequestorDescriptor,
        default_model: impl Into<String>,
        max_output_tokens: u32,
        backend: Arc<dyn GenerationBackend<TextConfiguration, TextPayload>>,
    ) -> Result<Self> {
        if max_output_tokens == 0 {
            return Err(Error::invalid_field("max_output_tokens", "must be at least 1"));
        }
        Ok(Self {
            descriptor,
            default_model: default_model.into(),
            max_output_tokens,
            backend,
            compute_checksums: true,
        })
    }

    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.compute_checksums = enabled;
        self
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

#[async_trait]
impl Requestor for TextRequestor {
    type TypedData = TextData;
    type Record = GeneratedTextRecord;
    type Configuration = TextConfiguration;

    fn descriptor(&self) -> &RequestorDescriptor {
        &self.descriptor
    }

    fn default_configuration(&self) -> TextConfiguration {
        TextConfiguration {
            model: self.default_model.clone(),
            temperature: 0.7,
            max_tokens: self.max_output_tokens.min(1024),
            system_prompt: None,
        }
    }

    fn validate_configuration(&self, configuration: &TextConfiguration) -> Result<()> {
        check_not_empty("model", &configuration.model)?;
        check_range(
            "temperature",
            configuration.temperature,
            MIN_TEMPERATURE,
            MAX_TEMPERATURE,
        )?;
        check_range("max_tokens", configuration.max_tokens, 1, self.max_output_tokens)
    }

    async fn request(
        &self,
        prompt: &str,
        configuration: &TextConfiguration,
        storage_area: &StorageAreaReference,
    ) -> Result<RequestOutcome<TextData>> {
        self.validate_configuration(configuration)?;
        tracing::info!(
            requestor = self.descriptor.requestor_id(),
            request_id = %storage_area.request_id(),
            model = %configuration.model,
            "Requesting text generation"
        );

        let payload = self.backend.generate(prompt, configuration).await?;
        if payload.text.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "{} returned no text",
                self.descriptor.requestor_id()
            )));
        }

        let (word_count, character_count) = count_text(&payload.text);
        let output = self.descriptor.output_file_type();
        let file_name = format!("text.{}", output.file_extension);
        let file_reference = store_if_large(
            output,
            storage_area,
            &file_name,
            &output.mime_type,
            payload.text.as_bytes(),
            self.compute_checksums,
        )
        .await?;

        tracing::debug!(
            words = word_count,
            file_backed = file_reference.is_some(),
            "Text generation complete"
        );

        Ok(RequestOutcome {
            data: TextData {
                content: if file_reference.is_some() {
                    None
                } else {
                    Some(payload.text)
                },
                word_count,
                character_count,
                language: payload.language,
                model: configuration.model.clone(),
                estimated_cost: payload.estimated_cost,
            },
            file_reference,
        })
    }

    fn make_record(
        &self,
        data: TextData,
        file_reference: Option<TypedDataFileReference>,
        request_id: Uuid,
    ) -> GeneratedTextRecord {
        let mut metadata = RecordMetadata::new(
            self.descriptor.provider_id(),
            self.descriptor.requestor_id(),
            request_id,
        );
        if let Some(cost) = data.estimated_cost {
            metadata = metadata.with_estimated_cost(cost);
        }

        let mut record = GeneratedTextRecord::new(metadata, data.content, file_reference)
            .with_counts(data.word_count, data.character_count);
        if let Some(language) = data.language {
            record = record.with_language(language);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ProviderCategory;
    use crate::output::OutputFileType;
    use crate::records::GeneratedRecord;
    use crate::providers::UnconfiguredBackend;
    use crate::requestor::FnBackend;
    use tempfile::TempDir;

    fn requestor(output: OutputFileType) -> TextRequestor {
        let backend = FnBackend(|prompt: String, _cfg: TextConfiguration| async move {
            Ok::<_, Error>(TextPayload {
                text: format!("Echo: {}", prompt),
                language: Some("en".to_string()),
                estimated_cost: Some(0.002),
            })
        });
        TextRequestor::new(
            RequestorDescriptor::new("openai", ProviderCategory::Text, "gpt-4o", "GPT-4o", output)
                .unwrap(),
            "gpt-4o",
            4096,
            Arc::new(backend),
        )
        .unwrap()
    }

    #[test]
    fn test_default_configuration_is_valid() {
        let r = requestor(OutputFileType::plain_text());
        let cfg = r.default_configuration();
        assert_eq!(cfg.model, "gpt-4o");
        assert!(r.validate_configuration(&cfg).is_ok());
    }

    #[test]
    fn test_temperature_out_of_range() {
        let r = requestor(OutputFileType::plain_text());
        let mut cfg = r.default_configuration();
        cfg.temperature = 2.5;

        let err = r.validate_configuration(&cfg).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("temperature"));
        assert!(message.contains("2.5"));
        assert!(message.contains("[0, 2]"));
    }

    #[test]
    fn test_max_tokens_bounds() {
        let r = requestor(OutputFileType::plain_text());
        let mut cfg = r.default_configuration();
        cfg.max_tokens = 0;
        assert!(r.validate_configuration(&cfg).is_err());
        cfg.max_tokens = 4096;
        assert!(r.validate_configuration(&cfg).is_ok());
        cfg.max_tokens = 4097;
        assert!(r.validate_configuration(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_short_text_stays_inline() {
        let dir = TempDir::new().unwrap();
        let r = requestor(OutputFileType::plain_text());
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());

        let outcome = r
            .request("hello world", &r.default_configuration(), &area)
            .await
            .unwrap();
        assert!(outcome.file_reference.is_none());
        assert_eq!(outcome.data.content.as_deref(), Some("Echo: hello world"));
        assert_eq!(outcome.data.word_count, 3);
        assert!(!area.exists().await);

        let record = r.make_record(outcome.data, outcome.file_reference, area.request_id());
        assert_eq!(record.text(), Some("Echo: hello world"));
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(record.metadata.estimated_cost, Some(0.002));
        assert_eq!(record.metadata.requestor_id, "openai.text.gpt-4o");
    }

    #[tokio::test]
    async fn test_text_over_threshold_goes_to_file() {
        let dir = TempDir::new().unwrap();
        let r = requestor(OutputFileType::plain_text().with_threshold(Some(16)));
        let request_id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), request_id, "bundle");

        let outcome = r
            .request("a prompt long enough to cross it", &r.default_configuration(), &area)
            .await
            .unwrap();
        let reference = outcome.file_reference.clone().unwrap();
        assert!(outcome.data.content.is_none());
        assert_eq!(reference.file_name(), "text.txt");

        let record = r.make_record(outcome.data, outcome.file_reference, request_id);
        assert!(record.is_file_stored());
        assert_eq!(record.word_count, 8);
        assert_eq!(
            record.content(dir.path().into()).await.unwrap(),
            "Echo: a prompt long enough to cross it"
        );
    }

    #[tokio::test]
    async fn test_invalid_configuration_never_calls_backend() {
        let backend = FnBackend(|_: String, _: TextConfiguration| async move {
            Err::<TextPayload, _>(Error::Network("should not be reached".to_string()))
        });
        let r = TextRequestor::new(
            RequestorDescriptor::new(
                "anthropic",
                ProviderCategory::Text,
                "claude",
                "Claude",
                OutputFileType::plain_text(),
            )
            .unwrap(),
            "claude",
            8192,
            Arc::new(backend),
        )
        .unwrap();
        let dir = TempDir::new().unwrap();
        let area = StorageAreaReference::temporary_in(dir.path(), Uuid::new_v4());
        let mut cfg = r.default_configuration();
        cfg.model = "  ".to_string();

        let err = r.request("hi", &cfg, &area).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_zero_token_limit_is_rejected() {
        let descriptor = RequestorDescriptor::new(
            "openai",
            ProviderCategory::Text,
            "gpt-4o",
            "GPT-4o",
            OutputFileType::plain_text(),
        )
        .unwrap();
        let result = TextRequestor::new(
            descriptor,
            "gpt-4o",
            0,
            Arc::new(UnconfiguredBackend::new("openai")),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfiguration { ref field, .. }) if field == "max_output_tokens"
        ));
    }
}
