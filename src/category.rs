//! Content domains produced by generators
//!
//! A category carries two heuristics used when nothing more specific is
//! known: a typical payload size, and whether payloads of this kind go to
//! disk by default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content domain of a requestor's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    /// Prose, chat completions
    Text,
    /// Speech and other audio
    Audio,
    /// Still images
    Image,
    /// Video clips
    Video,
    /// Numeric embedding vectors
    Embedding,
    /// Source code
    Code,
    /// JSON and other structured documents
    StructuredData,
}

impl ProviderCategory {
    /// All categories in declaration order
    pub const ALL: [ProviderCategory; 7] = [
        ProviderCategory::Text,
        ProviderCategory::Audio,
        ProviderCategory::Image,
        ProviderCategory::Video,
        ProviderCategory::Embedding,
        ProviderCategory::Code,
        ProviderCategory::StructuredData,
    ];

    /// Stable lowercase name, used as the middle segment of requestor ids
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderCategory::Text => "text",
            ProviderCategory::Audio => "audio",
            ProviderCategory::Image => "image",
            ProviderCategory::Video => "video",
            ProviderCategory::Embedding => "embedding",
            ProviderCategory::Code => "code",
            ProviderCategory::StructuredData => "structured_data",
        }
    }

    /// Rough size of one payload in bytes
    pub fn typical_size_bytes(&self) -> u64 {
        match self {
            ProviderCategory::Text => 5_000,
            ProviderCategory::Code => 10_000,
            ProviderCategory::StructuredData => 20_000,
            // 1536 float32 values plus framing
            ProviderCategory::Embedding => 6_200,
            ProviderCategory::Image => 1_500_000,
            ProviderCategory::Audio => 2_000_000,
            ProviderCategory::Video => 50_000_000,
        }
    }

    /// Whether payloads go to a file when no size threshold applies
    pub fn requires_file_storage_by_default(&self) -> bool {
        matches!(
            self,
            ProviderCategory::Audio | ProviderCategory::Image | ProviderCategory::Video
        )
    }
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::invalid_field("category", format!("unknown category '{}'", s)))
    }
}
