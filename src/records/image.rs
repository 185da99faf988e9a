//! Generated image records

use super::{base64_bytes, check_single_tier, read_file_backed, GeneratedRecord, RecordMetadata};
use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::output::OutputFileType;
use crate::storage::{FileLocation, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Image encoding produced by an image requestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn output_file_type(&self) -> OutputFileType {
        match self {
            ImageFormat::Png => OutputFileType::png(),
            ImageFormat::Jpeg => OutputFileType::jpeg(),
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// An image generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawImageRecord")]
pub struct GeneratedImageRecord {
    pub metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    image_data: Option<Vec<u8>>,
    pub format: ImageFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Prompt as rewritten by the provider, when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

#[derive(Deserialize)]
struct RawImageRecord {
    metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes")]
    image_data: Option<Vec<u8>>,
    format: ImageFormat,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

impl TryFrom<RawImageRecord> for GeneratedImageRecord {
    type Error = Error;

    fn try_from(raw: RawImageRecord) -> Result<Self> {
        check_single_tier(&raw.metadata, raw.image_data.is_some(), "image")?;
        Ok(Self {
            metadata: raw.metadata,
            image_data: raw.image_data,
            format: raw.format,
            width: raw.width,
            height: raw.height,
            revised_prompt: raw.revised_prompt,
        })
    }
}

impl GeneratedImageRecord {
    pub fn new(
        metadata: RecordMetadata,
        image_data: Option<Vec<u8>>,
        format: ImageFormat,
        file_reference: Option<TypedDataFileReference>,
    ) -> Self {
        let image_data = if file_reference.is_some() {
            None
        } else {
            image_data
        };
        Self {
            metadata: metadata.attach(file_reference),
            image_data,
            format,
            width: None,
            height: None,
            revised_prompt: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_revised_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.revised_prompt = Some(prompt.into());
        self
    }

    pub fn image_data(&self) -> Option<&[u8]> {
        self.image_data.as_deref()
    }
}

#[async_trait]
impl GeneratedRecord for GeneratedImageRecord {
    type Content = Vec<u8>;

    const CATEGORY: ProviderCategory = ProviderCategory::Image;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn inline_size(&self) -> Option<u64> {
        self.image_data.as_ref().map(|d| d.len() as u64)
    }

    async fn content(&self, location: FileLocation<'_>) -> Result<Vec<u8>> {
        match &self.image_data {
            Some(data) => Ok(data.clone()),
            None => read_file_backed(&self.metadata, location, "image").await,
        }
    }
}
