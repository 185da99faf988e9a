//! genvault - Typed results and tiered storage for generated content
//!
//! genvault sits between pluggable content generators (text, image, audio,
//! embedding) and durable storage. Each generator is wrapped in a
//! *requestor* that declares its own configuration, result and record
//! shapes. Results are kept in memory or written into a request-scoped
//! file area depending on their size, and records read their content back
//! from whichever tier it landed in.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     RequestorRegistry                        │
//! │   openai.text.gpt-4o   openai.embedding.*   elevenlabs.audio │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ request(prompt, cfg, area)
//! ┌──────────────▼──────────────┐     ┌───────────────────────────┐
//! │         Requestor           │────▶│   GenerationBackend       │
//! │  validate → generate →      │     │   (external, pluggable)   │
//! │  OutputFileType threshold   │     └───────────────────────────┘
//! └──────┬───────────────┬──────┘
//!        │ small         │ large
//!        ▼               ▼
//!   inline bytes   StorageAreaReference ── assets/{request_id}/{file}
//!        │               │ TypedDataFileReference (size, sha256)
//!        └───────┬───────┘
//!                ▼
//!         GeneratedRecord ── content() reads inline or from file
//!                │
//!           RecordStore
//! ```
//!
//! ## Modules
//!
//! - [`requestor`]: the requestor contract, concrete requestors, registry
//! - [`providers`]: built-in provider catalog
//! - [`records`]: persistable record family and the in-memory store
//! - [`storage`]: request-scoped file areas and file references
//! - [`format`]: serialization formats and the binary vector layout
//! - [`output`]: output file types and the file-storage decision
//! - [`config`]: configuration management

pub mod category;
pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod providers;
pub mod records;
pub mod requestor;
pub mod storage;

pub use category::ProviderCategory;
pub use config::GenVaultConfig;
pub use error::{Error, Result};
pub use format::{SerializationFormat, VectorPayload};
pub use output::OutputFileType;
pub use records::{GeneratedRecord, RecordMetadata, RecordStore};
pub use requestor::{AnyRequestor, Requestor, RequestorDescriptor, RequestorRegistry};
pub use storage::{StorageAreaReference, TypedDataFileReference};
