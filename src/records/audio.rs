//! Generated audio records

use super::{base64_bytes, check_single_tier, read_file_backed, GeneratedRecord, RecordMetadata};
use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use crate::output::OutputFileType;
use crate::storage::{FileLocation, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Audio container produced by a speech requestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
}

impl AudioFormat {
    pub fn output_file_type(&self) -> OutputFileType {
        match self {
            AudioFormat::Mp3 => OutputFileType::mp3(),
            AudioFormat::Wav => OutputFileType::wav(),
            AudioFormat::M4a => OutputFileType::m4a(),
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
        }
    }
}

/// A speech or audio generation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAudioRecord")]
pub struct GeneratedAudioRecord {
    pub metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    audio_data: Option<Vec<u8>>,
    pub format: AudioFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Deserialize)]
struct RawAudioRecord {
    metadata: RecordMetadata,
    #[serde(default, with = "base64_bytes")]
    audio_data: Option<Vec<u8>>,
    format: AudioFormat,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    sample_rate: Option<u32>,
    #[serde(default)]
    bit_rate: Option<u32>,
    #[serde(default)]
    channels: Option<u16>,
    #[serde(default)]
    voice_id: Option<String>,
}

impl TryFrom<RawAudioRecord> for GeneratedAudioRecord {
    type Error = Error;

    fn try_from(raw: RawAudioRecord) -> Result<Self> {
        check_single_tier(&raw.metadata, raw.audio_data.is_some(), "audio")?;
        Ok(Self {
            metadata: raw.metadata,
            audio_data: raw.audio_data,
            format: raw.format,
            duration_seconds: raw.duration_seconds,
            sample_rate: raw.sample_rate,
            bit_rate: raw.bit_rate,
            channels: raw.channels,
            voice_id: raw.voice_id,
        })
    }
}

impl GeneratedAudioRecord {
    pub fn new(
        metadata: RecordMetadata,
        audio_data: Option<Vec<u8>>,
        format: AudioFormat,
        file_reference: Option<TypedDataFileReference>,
    ) -> Self {
        let audio_data = if file_reference.is_some() {
            None
        } else {
            audio_data
        };
        Self {
            metadata: metadata.attach(file_reference),
            audio_data,
            format,
            duration_seconds: None,
            sample_rate: None,
            bit_rate: None,
            channels: None,
            voice_id: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = Some(hz);
        self
    }

    pub fn with_bit_rate(mut self, bits_per_second: u32) -> Self {
        self.bit_rate = Some(bits_per_second);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }

    pub fn audio_data(&self) -> Option<&[u8]> {
        self.audio_data.as_deref()
    }
}

#[async_trait]
impl GeneratedRecord for GeneratedAudioRecord {
    type Content = Vec<u8>;

    const CATEGORY: ProviderCategory = ProviderCategory::Audio;

    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RecordMetadata {
        &mut self.metadata
    }

    fn inline_size(&self) -> Option<u64> {
        self.audio_data.as_ref().map(|d| d.len() as u64)
    }

    async fn content(&self, location: FileLocation<'_>) -> Result<Vec<u8>> {
        match &self.audio_data {
            Some(data) => Ok(data.clone()),
            None => read_file_backed(&self.metadata, location, "audio").await,
        }
    }
}
