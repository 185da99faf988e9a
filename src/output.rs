//! Output file type descriptors
//!
//! Each content type a requestor can produce is described by an
//! `OutputFileType`. The descriptor decides whether a payload of a given
//! size is kept inline or written to the request's storage area.

use crate::category::ProviderCategory;
use crate::format::SerializationFormat;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Default size above which media payloads are written to files.
///
/// Hand-tuned, not derived; override through `ThresholdConfig`.
pub const DEFAULT_MEDIA_THRESHOLD: u64 = 100_000;

/// Descriptor for one kind of generated file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFileType {
    /// MIME type, e.g. `audio/mpeg`
    pub mime_type: String,
    /// File extension without the dot
    pub file_extension: String,
    /// Platform type tag (e.g. a uniform type identifier), informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,
    /// Content domain
    pub category: ProviderCategory,
    /// How structured payloads of this type are encoded
    pub serialization_format: SerializationFormat,
    /// Size in bytes at or above which the payload is file-backed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_threshold: Option<u64>,
}

impl OutputFileType {
    pub fn new(
        mime_type: impl Into<String>,
        file_extension: impl Into<String>,
        category: ProviderCategory,
        serialization_format: SerializationFormat,
        file_threshold: Option<u64>,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            file_extension: file_extension.into(),
            platform_type: None,
            category,
            serialization_format,
            file_threshold,
        }
    }

    pub fn with_platform_type(mut self, tag: impl Into<String>) -> Self {
        self.platform_type = Some(tag.into());
        self
    }

    pub fn with_threshold(mut self, threshold: Option<u64>) -> Self {
        self.file_threshold = threshold;
        self
    }

    /// First step: the per-type threshold alone.
    ///
    /// `None` when there is no threshold or the size is unknown, meaning the
    /// threshold has no opinion.
    pub fn threshold_decision(&self, estimated_size: Option<u64>) -> Option<bool> {
        match (self.file_threshold, estimated_size) {
            (Some(threshold), Some(size)) => Some(size >= threshold),
            _ => None,
        }
    }

    /// Second step: the category's default.
    pub fn category_default(&self) -> bool {
        self.category.requires_file_storage_by_default()
    }

    /// Whether a payload of `estimated_size` bytes should be file-backed
    pub fn should_store_as_file(&self, estimated_size: Option<u64>) -> bool {
        self.threshold_decision(estimated_size)
            .unwrap_or_else(|| self.category_default())
    }

    // =========================================================================
    // Built-in types
    // =========================================================================

    pub fn plain_text() -> Self {
        Self::new(
            "text/plain",
            "txt",
            ProviderCategory::Text,
            SerializationFormat::Json,
            None,
        )
        .with_platform_type("public.plain-text")
    }

    pub fn structured_text() -> Self {
        Self::new(
            "application/json",
            "json",
            ProviderCategory::StructuredData,
            SerializationFormat::Json,
            None,
        )
        .with_platform_type("public.json")
    }

    pub fn mp3() -> Self {
        Self::audio("audio/mpeg", "mp3", "public.mp3")
    }

    pub fn wav() -> Self {
        Self::audio("audio/wav", "wav", "com.microsoft.waveform-audio")
    }

    pub fn m4a() -> Self {
        Self::audio("audio/mp4", "m4a", "com.apple.m4a-audio")
    }

    pub fn png() -> Self {
        Self::media("image/png", "png", "public.png", ProviderCategory::Image)
    }

    pub fn jpeg() -> Self {
        Self::media("image/jpeg", "jpg", "public.jpeg", ProviderCategory::Image)
    }

    pub fn mp4() -> Self {
        Self::media("video/mp4", "mp4", "public.mpeg-4", ProviderCategory::Video)
    }

    pub fn quicktime() -> Self {
        Self::media(
            "video/quicktime",
            "mov",
            "com.apple.quicktime-movie",
            ProviderCategory::Video,
        )
    }

    pub fn property_list() -> Self {
        Self::new(
            SerializationFormat::PropertyList.mime_type(),
            "plist",
            ProviderCategory::StructuredData,
            SerializationFormat::PropertyList,
            None,
        )
        .with_platform_type("com.apple.property-list")
    }

    pub fn binary() -> Self {
        Self::new(
            "application/octet-stream",
            "bin",
            ProviderCategory::StructuredData,
            SerializationFormat::Binary,
            Some(DEFAULT_MEDIA_THRESHOLD),
        )
        .with_platform_type("public.data")
    }

    /// Embedding vectors in the fixed little-endian layout
    pub fn float_vector() -> Self {
        Self::new(
            "application/x-float32-vector",
            "vec",
            ProviderCategory::Embedding,
            SerializationFormat::Binary,
            Some(DEFAULT_MEDIA_THRESHOLD),
        )
    }

    fn audio(mime: &str, ext: &str, tag: &str) -> Self {
        Self::media(mime, ext, tag, ProviderCategory::Audio)
    }

    fn media(mime: &str, ext: &str, tag: &str, category: ProviderCategory) -> Self {
        Self::new(
            mime,
            ext,
            category,
            SerializationFormat::Binary,
            Some(DEFAULT_MEDIA_THRESHOLD),
        )
        .with_platform_type(tag)
    }
}

// The platform tag is descriptive and does not take part in identity.
impl PartialEq for OutputFileType {
    fn eq(&self, other: &Self) -> bool {
        self.mime_type == other.mime_type
            && self.file_extension == other.file_extension
            && self.category == other.category
            && self.serialization_format == other.serialization_format
            && self.file_threshold == other.file_threshold
    }
}

impl Eq for OutputFileType {}

impl Hash for OutputFileType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mime_type.hash(state);
        self.file_extension.hash(state);
        self.category.hash(state);
        self.serialization_format.hash(state);
        self.file_threshold.hash(state);
    }
}
