//! Image generation requestor

use super::{
    check_not_empty, check_range, store_if_large, GenerationBackend, RequestOutcome, Requestor,
    RequestorDescriptor,
};
use crate::error::{Error, Result};
use crate::records::{GeneratedImageRecord, ImageFormat, RecordMetadata};
use crate::storage::{StorageAreaReference, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

/// Image request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfiguration {
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    #[serde(default)]
    pub quality: ImageQuality,
}

/// What the backend hands back for an image request
#[derive(Debug, Clone, Default)]
pub struct ImagePayload {
    pub image: Vec<u8>,
    pub revised_prompt: Option<String>,
    pub estimated_cost: Option<f64>,
}

/// Transient image result. `image` is `None` once written to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub image: Option<Vec<u8>>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub revised_prompt: Option<String>,
    pub model: String,
    pub estimated_cost: Option<f64>,
}

pub struct ImageRequestor {
    descriptor: RequestorDescriptor,
    default_model: String,
    size_range: RangeInclusive<u32>,
    backend: Arc<dyn GenerationBackend<ImageConfiguration, ImagePayload>>,
    compute_checksums: bool,
}

impl ImageRequestor {
    /// `size_range` bounds both width and height and must not be empty.
    pub fn new(
        descriptor: RequestorDescriptor,
        default_model: impl Into<String>,
        size_range: RangeInclusive<u32>,
        backend: Arc<dyn GenerationBackend<ImageConfiguration, ImagePayload>>,
    ) -> Result<Self> {
        if size_range.is_empty() {
            return Err(Error::invalid_field("size_range", "must not be empty"));
        }
        Ok(Self {
            descriptor,
            default_model: default_model.into(),
            size_range,
            backend,
            compute_checksums: true,
        })
    }

    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.compute_checksums = enabled;
        self
    }

    pub fn size_range(&self) -> &RangeInclusive<u32> {
        &self.size_range
    }
}

#[async_trait]
impl Requestor for ImageRequestor {
    type TypedData = ImageData;
    type Record = GeneratedImageRecord;
    type Configuration = ImageConfiguration;

    fn descriptor(&self) -> &RequestorDescriptor {
        &self.descriptor
    }

    fn default_configuration(&self) -> ImageConfiguration {
        let side = 1024u32.clamp(*self.size_range.start(), *self.size_range.end());
        ImageConfiguration {
            model: self.default_model.clone(),
            width: side,
            height: side,
            format: ImageFormat::Png,
            quality: ImageQuality::Standard,
        }
    }

    fn validate_configuration(&self, configuration: &ImageConfiguration) -> Result<()> {
        check_not_empty("model", &configuration.model)?;
        let (min, max) = (*self.size_range.start(), *self.size_range.end());
        check_range("width", configuration.width, min, max)?;
        check_range("height", configuration.height, min, max)
    }

    async fn request(
        &self,
        prompt: &str,
        configuration: &ImageConfiguration,
        storage_area: &StorageAreaReference,
    ) -> Result<RequestOutcome<ImageData>> {
        self.validate_configuration(configuration)?;
        tracing::info!(
            requestor = self.descriptor.requestor_id(),
            request_id = %storage_area.request_id(),
            width = configuration.width,
            height = configuration.height,
            "Requesting image generation"
        );

        let payload = self.backend.generate(prompt, configuration).await?;
        if payload.image.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "{} returned no image data",
                self.descriptor.requestor_id()
            )));
        }

        let format_type = configuration.format.output_file_type();
        let file_name = format!("image.{}", configuration.format.file_extension());
        let file_reference = store_if_large(
            self.descriptor.output_file_type(),
            storage_area,
            &file_name,
            &format_type.mime_type,
            &payload.image,
            self.compute_checksums,
        )
        .await?;

        Ok(RequestOutcome {
            data: ImageData {
                image: if file_reference.is_some() {
                    None
                } else {
                    Some(payload.image)
                },
                format: configuration.format,
                width: configuration.width,
                height: configuration.height,
                revised_prompt: payload.revised_prompt,
                model: configuration.model.clone(),
                estimated_cost: payload.estimated_cost,
            },
            file_reference,
        })
    }

    fn make_record(
        &self,
        data: ImageData,
        file_reference: Option<TypedDataFileReference>,
        request_id: Uuid,
    ) -> GeneratedImageRecord {
        let mut metadata = RecordMetadata::new(
            self.descriptor.provider_id(),
            self.descriptor.requestor_id(),
            request_id,
        );
        if let Some(cost) = data.estimated_cost {
            metadata = metadata.with_estimated_cost(cost);
        }

        let mut record =
            GeneratedImageRecord::new(metadata, data.image, data.format, file_reference)
                .with_dimensions(data.width, data.height);
        if let Some(prompt) = data.revised_prompt {
            record = record.with_revised_prompt(prompt);
        }
        record
    }
}
