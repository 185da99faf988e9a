//! Tiered storage: request-scoped file areas and durable file references

pub mod area;
pub mod file_ref;

pub use area::{StorageAreaReference, ASSETS_DIR, DEFAULT_DATA_FILE_NAME, SCRATCH_DIR_NAME};
pub use file_ref::{sha256_hex, FileLocation, TypedDataFileReference};
