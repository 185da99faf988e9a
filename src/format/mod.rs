//! Wire encodings for typed data and records
//!
//! Three formats have codecs: JSON, XML property lists and MessagePack as
//! the compact opaque binary form. Two more are reserved so callers can
//! name them today; selecting them fails with [`Error::NotImplemented`]
//! rather than producing bytes in some other format.

pub mod vector;

pub use vector::VectorPayload;

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payloads at or above this size that nobody needs to read are encoded
/// as binary.
pub const BINARY_RECOMMENDATION_THRESHOLD: u64 = 1_000_000;

/// Serialization format for typed data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// Textual structured data (JSON)
    Json,
    /// Textual XML property list
    PropertyList,
    /// Compact opaque binary (MessagePack)
    Binary,
    /// Reserved: Protocol Buffers
    Protobuf,
    /// Reserved: FlatBuffers
    FlatBuffers,
}

impl SerializationFormat {
    /// MIME type of encoded output
    pub fn mime_type(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "application/json",
            SerializationFormat::PropertyList => "application/x-plist",
            SerializationFormat::Binary => "application/octet-stream",
            SerializationFormat::Protobuf => "application/x-protobuf",
            SerializationFormat::FlatBuffers => "application/x-flatbuffers",
        }
    }

    /// File extension (without the dot)
    pub fn file_extension(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::PropertyList => "plist",
            SerializationFormat::Binary => "bin",
            SerializationFormat::Protobuf => "pb",
            SerializationFormat::FlatBuffers => "fb",
        }
    }

    pub fn is_human_readable(&self) -> bool {
        matches!(
            self,
            SerializationFormat::Json | SerializationFormat::PropertyList
        )
    }

    /// Whether `encode`/`decode` are available for this format
    pub fn has_default_implementation(&self) -> bool {
        matches!(
            self,
            SerializationFormat::Json
                | SerializationFormat::PropertyList
                | SerializationFormat::Binary
        )
    }

    /// Pick a format for a payload.
    ///
    /// Textual payloads and payloads someone needs to inspect get JSON.
    /// Opaque payloads of at least [`BINARY_RECOMMENDATION_THRESHOLD`] bytes
    /// get binary. Everything else, including unknown sizes, gets JSON.
    pub fn recommend(
        is_textual: bool,
        needs_inspection: bool,
        estimated_size: Option<u64>,
    ) -> SerializationFormat {
        if is_textual || needs_inspection {
            return SerializationFormat::Json;
        }
        match estimated_size {
            Some(size) if size >= BINARY_RECOMMENDATION_THRESHOLD => SerializationFormat::Binary,
            _ => SerializationFormat::Json,
        }
    }

    /// Encode a value in this format
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Json => Ok(serde_json::to_vec_pretty(value)?),
            SerializationFormat::PropertyList => {
                let mut buf = Vec::new();
                plist::to_writer_xml(&mut buf, value)
                    .map_err(|e| Error::Encode(format!("property list: {}", e)))?;
                Ok(buf)
            }
            SerializationFormat::Binary => rmp_serde::to_vec_named(value)
                .map_err(|e| Error::Encode(format!("binary: {}", e))),
            SerializationFormat::Protobuf | SerializationFormat::FlatBuffers => {
                Err(self.not_implemented())
            }
        }
    }

    /// Decode a value from bytes in this format
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| Error::Decode(format!("json: {}", e))),
            SerializationFormat::PropertyList => plist::from_bytes(data)
                .map_err(|e| Error::Decode(format!("property list: {}", e))),
            SerializationFormat::Binary => rmp_serde::from_slice(data)
                .map_err(|e| Error::Decode(format!("binary: {}", e))),
            SerializationFormat::Protobuf | SerializationFormat::FlatBuffers => {
                Err(self.not_implemented())
            }
        }
    }

    fn not_implemented(&self) -> Error {
        Error::NotImplemented(format!(
            "serialization format '{}' is reserved and has no codec",
            self
        ))
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SerializationFormat::Json => "json",
            SerializationFormat::PropertyList => "property_list",
            SerializationFormat::Binary => "binary",
            SerializationFormat::Protobuf => "protobuf",
            SerializationFormat::FlatBuffers => "flatbuffers",
        };
        f.write_str(name)
    }
}
