//! Speech synthesis requestor
//!
//! Voice settings are bounded the way hosted TTS services bound them:
//! stability and similarity boost in `[0, 1]`, speed in `[0.7, 1.2]`.

use super::{
    check_not_empty, check_range, store_if_large, GenerationBackend, RequestOutcome, Requestor,
    RequestorDescriptor,
};
use crate::error::{Error, Result};
use crate::records::{AudioFormat, GeneratedAudioRecord, RecordMetadata};
use crate::storage::{StorageAreaReference, TypedDataFileReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const MIN_SPEED: f64 = 0.7;
pub const MAX_SPEED: f64 = 1.2;

/// Speech request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfiguration {
    pub voice_id: String,
    pub model: String,
    pub stability: f64,
    pub similarity_boost: f64,
    pub speed: f64,
    pub format: AudioFormat,
}

/// What the backend hands back for a speech request
#[derive(Debug, Clone, Default)]
pub struct AudioPayload {
    pub audio: Vec<u8>,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<u32>,
    pub channels: Option<u16>,
    pub estimated_cost: Option<f64>,
}

/// Transient speech result. `audio` is `None` once written to a file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub audio: Option<Vec<u8>>,
    pub format: AudioFormat,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<u32>,
    pub channels: Option<u16>,
    pub voice_id: String,
    pub model: String,
    pub estimated_cost: Option<f64>,
}

pub struct AudioRequestor {
    descriptor: RequestorDescriptor,
    default_voice_id: String,
    default_model: String,
    backend: Arc<dyn GenerationBackend<AudioConfiguration, AudioPayload>>,
    compute_checksums: bool,
}

impl AudioRequestor {
    pub fn new(
        descriptor: RequestorDescriptor,
        default_voice_id: impl Into<String>,
        default_model: impl Into<String>,
        backend: Arc<dyn GenerationBackend<AudioConfiguration, AudioPayload>>,
    ) -> Self {
        Self {
            descriptor,
            default_voice_id: default_voice_id.into(),
            default_model: default_model.into(),
            backend,
            compute_checksums: true,
        }
    }

    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.compute_checksums = enabled;
        self
    }
}

#[async_trait]
impl Requestor for AudioRequestor {
    type TypedData = AudioData;
    type Record = GeneratedAudioRecord;
    type Configuration = AudioConfiguration;

    fn descriptor(&self) -> &RequestorDescriptor {
        &self.descriptor
    }

    fn default_configuration(&self) -> AudioConfiguration {
        AudioConfiguration {
            voice_id: self.default_voice_id.clone(),
            model: self.default_model.clone(),
            stability: 0.5,
            similarity_boost: 0.75,
            speed: 1.0,
            format: AudioFormat::Mp3,
        }
    }

    fn validate_configuration(&self, configuration: &AudioConfiguration) -> Result<()> {
        check_not_empty("voice_id", &configuration.voice_id)?;
        check_not_empty("model", &configuration.model)?;
        check_range("stability", configuration.stability, 0.0, 1.0)?;
        check_range("similarity_boost", configuration.similarity_boost, 0.0, 1.0)?;
        check_range("speed", configuration.speed, MIN_SPEED, MAX_SPEED)
    }

    async fn request(
        &self,
        prompt: &str,
        configuration: &AudioConfiguration,
        storage_area: &StorageAreaReference,
    ) -> Result<RequestOutcome<AudioData>> {
        self.validate_configuration(configuration)?;
        tracing::info!(
            requestor = self.descriptor.requestor_id(),
            request_id = %storage_area.request_id(),
            voice = %configuration.voice_id,
            "Requesting speech synthesis"
        );

        let payload = self.backend.generate(prompt, configuration).await?;
        if payload.audio.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "{} returned an empty audio stream",
                self.descriptor.requestor_id()
            )));
        }

        // Threshold comes from the descriptor; naming follows the requested container.
        let format_type = configuration.format.output_file_type();
        let file_name = format!("speech.{}", configuration.format.file_extension());
        let file_reference = store_if_large(
            self.descriptor.output_file_type(),
            storage_area,
            &file_name,
            &format_type.mime_type,
            &payload.audio,
            self.compute_checksums,
        )
        .await?;

        tracing::debug!(
            bytes = payload.audio.len(),
            file_backed = file_reference.is_some(),
            "Speech synthesis complete"
        );

        Ok(RequestOutcome {
            data: AudioData {
                audio: if file_reference.is_some() {
                    None
                } else {
                    Some(payload.audio)
                },
                format: configuration.format,
                duration_seconds: payload.duration_seconds,
                sample_rate: payload.sample_rate,
                bit_rate: payload.bit_rate,
                channels: payload.channels,
                voice_id: configuration.voice_id.clone(),
                model: configuration.model.clone(),
                estimated_cost: payload.estimated_cost,
            },
            file_reference,
        })
    }

    fn make_record(
        &self,
        data: AudioData,
        file_reference: Option<TypedDataFileReference>,
        request_id: Uuid,
    ) -> GeneratedAudioRecord {
        let mut metadata = RecordMetadata::new(
            self.descriptor.provider_id(),
            self.descriptor.requestor_id(),
            request_id,
        );
        if let Some(cost) = data.estimated_cost {
            metadata = metadata.with_estimated_cost(cost);
        }

        let mut record =
            GeneratedAudioRecord::new(metadata, data.audio, data.format, file_reference)
                .with_voice_id(data.voice_id);
        if let Some(seconds) = data.duration_seconds {
            record = record.with_duration(seconds);
        }
        if let Some(hz) = data.sample_rate {
            record = record.with_sample_rate(hz);
        }
        if let Some(bps) = data.bit_rate {
            record = record.with_bit_rate(bps);
        }
        if let Some(channels) = data.channels {
            record = record.with_channels(channels);
        }
        record
    }
}
