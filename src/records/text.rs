//! Generated text records

use super::{check_single_tier, read_file_backed, GeneratedRecord, RecordMetadata};
use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::storage::{FileLocation, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A text generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTextRecord")]
pub struct GeneratedTextRecord {
    pub metadata: RecordMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Deserialize)]
struct RawTextRecord {
    metadata: RecordMetadata,
    #[serde(default)]
    text: Option<String>,
    word_count: usize,
    character_count: usize,
    #[serde(default)]
    language: Option<String>,
}

impl TryFrom<RawTextRecord> for GeneratedTextRecord {
    type Error = Error;

    fn try_from(raw: RawTextRecord) -> Result<Self> {
        check_single_tier(&raw.metadata, raw.text.is_some(), "text")?;
        Ok(Self {
            metadata: raw.metadata,
            text: raw.text,
            word_count: raw.word_count,
            character_count: raw.character_count,
            language: raw.language,
        })
    }
}

impl GeneratedTextRecord {
    /// Counts are taken from `text`; the text itself is dropped when a file
    /// reference is supplied.
    pub fn new(
        metadata: RecordMetadata,
        text: Option<String>,
        file_reference: Option<TypedDataFileReference>,
    ) -> Self {
        let (word_count, character_count) = text.as_deref().map(count_text).unwrap_or((0, 0));
        let text = if file_reference.is_some() { None } else { text };
        Self {
            metadata: metadata.attach(file_reference),
            text,
            word_count,
            character_count,
            language: None,
        }
    }

    /// Override counts computed before the text was moved to a file
    pub fn with_counts(mut self, word_count: usize, character_count: usize) -> Self {
        self.word_count = word_count;
        self.character_count = character_count;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Inline text, `None` when file-backed
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Whitespace-separated words and Unicode scalar values
pub fn count_text(text: &str) -> (usize, usize) {
    (text.split_whitespace().count(), text.chars().count())
}

#[async_trait]
impl GeneratedRecord for GeneratedTextRecord {
    type Content = String;

    const CATEGORY: ProviderCategory = ProviderCategory::Text;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn inline_size(&self) -> Option<u64> {
        self.text.as_ref().map(|t| t.len() as u64)
    }

    async fn content(&self, location: FileLocation<'_>) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let data = read_file_backed(&self.metadata, location, "text").await?;
        String::from_utf8(data)
            .map_err(|e| Error::Decode(format!("stored text is not UTF-8: {}", e)))
    }
}
