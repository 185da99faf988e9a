//! Request-scoped storage areas
//!
//! Every request gets its own directory at `{root}/assets/{request_id}`.
//! Since no two requests share a directory, concurrent writers never need
//! to coordinate.

use super::file_ref::TypedDataFileReference;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Directory under a root that holds one subdirectory per request
pub const ASSETS_DIR: &str = "assets";

/// File name used by `default_data_file_url`
pub const DEFAULT_DATA_FILE_NAME: &str = "data.bin";

/// Subdirectory of the process temp dir used for scratch areas
pub const SCRATCH_DIR_NAME: &str = "genvault";

/// An isolated directory owned by a single generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageAreaReference {
    request_id: Uuid,
    base_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bundle_identifier: Option<String>,
}

impl StorageAreaReference {
    /// Scratch area under the process temp directory
    pub fn temporary(request_id: Uuid) -> Self {
        Self::temporary_in(std::env::temp_dir().join(SCRATCH_DIR_NAME), request_id)
    }

    /// Scratch area under an explicit scratch root
    pub fn temporary_in(scratch_root: impl AsRef<Path>, request_id: Uuid) -> Self {
        Self {
            request_id,
            base_path: area_path(scratch_root.as_ref(), request_id),
            bundle_identifier: None,
        }
    }

    /// Area nested inside a caller-supplied bundle container
    pub fn in_bundle(
        container: impl AsRef<Path>,
        request_id: Uuid,
        bundle_identifier: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            base_path: area_path(container.as_ref(), request_id),
            bundle_identifier: Some(bundle_identifier.into()),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn bundle_identifier(&self) -> Option<&str> {
        self.bundle_identifier.as_deref()
    }

    /// The root this area hangs off (`base_path` minus `assets/{request_id}`)
    pub fn root(&self) -> Option<&Path> {
        self.base_path.parent().and_then(Path::parent)
    }

    pub fn file_url(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }

    pub fn file_url_with_extension(&self, base_name: &str, extension: &str) -> PathBuf {
        self.file_url(&format!("{}.{}", base_name, extension))
    }

    pub fn default_data_file_url(&self) -> PathBuf {
        self.file_url(DEFAULT_DATA_FILE_NAME)
    }

    /// Create the area directory. Safe to call repeatedly.
    pub async fn create_directory(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| {
                Error::FileOperation(format!(
                    "failed to create {}: {}",
                    self.base_path.display(),
                    e
                ))
            })
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Files currently in the area, sorted by path.
    ///
    /// Returns an empty list when the directory does not exist. In-flight
    /// partial writes are not listed.
    pub async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::FileOperation(format!(
                    "failed to list {}: {}",
                    self.base_path.display(),
                    e
                )))
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().await?.is_file() {
                continue;
            }
            files.push(entry.path());
        }
        files.sort();
        Ok(files)
    }

    /// Delete the area and everything in it. Returns `false` if it did not
    /// exist.
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_dir_all(&self.base_path).await {
            Ok(()) => {
                tracing::debug!(request_id = %self.request_id, "Removed storage area");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::FileOperation(format!(
                "failed to remove {}: {}",
                self.base_path.display(),
                e
            ))),
        }
    }

    /// Write `data` to `file_name` inside the area.
    ///
    /// The bytes land in a hidden sibling first and are renamed into place,
    /// so the final name only ever holds a complete file. The write runs on
    /// the blocking pool; dropping the returned future stops it at the next
    /// chunk and the sibling is deleted by the thread that created it.
    pub async fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        mime_type: &str,
        compute_checksum: bool,
    ) -> Result<TypedDataFileReference> {
        validate_file_name(file_name)?;
        self.create_directory().await?;

        let final_path = self.file_url(file_name);
        let partial_path = self
            .base_path
            .join(format!(".{}.{}.partial", file_name, Uuid::new_v4().simple()));

        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancelled.clone());
        let bytes = Bytes::copy_from_slice(data);
        let target = final_path.clone();
        tokio::task::spawn_blocking(move || {
            write_atomically(&partial_path, &target, &bytes, &cancelled)
        })
        .await
        .map_err(|e| Error::FileOperation(format!("write task failed: {}", e)))?
        .map_err(|e| {
            Error::FileOperation(format!("failed to write {}: {}", final_path.display(), e))
        })?;

        tracing::debug!(
            request_id = %self.request_id,
            file = file_name,
            bytes = data.len(),
            "Wrote generated file"
        );

        TypedDataFileReference::from_data(
            self.request_id,
            file_name,
            data,
            mime_type,
            compute_checksum,
        )
    }
}

fn area_path(root: &Path, request_id: Uuid) -> PathBuf {
    root.join(ASSETS_DIR).join(request_id.to_string())
}

/// File names must stay inside the area and must not collide with
/// in-flight partial files.
pub(crate) fn validate_file_name(file_name: &str) -> Result<()> {
    let invalid = file_name.is_empty()
        || file_name.starts_with('.')
        || file_name.contains('/')
        || file_name.contains('\\');
    if invalid {
        return Err(Error::FileOperation(format!(
            "invalid file name '{}' for a storage area",
            file_name
        )));
    }
    Ok(())
}

/// Deletes a partially written file unless disarmed
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to clean up {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// Raises the shared flag when the owning future goes away
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Bytes handed to the filesystem per write call
const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Write `data` into `partial`, then rename it to `target`.
///
/// Checks `cancelled` before every chunk and before the rename. On any
/// early exit the guard removes `partial` on this same thread.
fn write_atomically(
    partial: &Path,
    target: &Path,
    data: &[u8],
    cancelled: &AtomicBool,
) -> std::io::Result<()> {
    let interrupted = || std::io::Error::new(std::io::ErrorKind::Interrupted, "write cancelled");

    let mut guard = PartialFile::new(partial.to_path_buf());
    let mut file = std::fs::File::create(partial)?;
    for chunk in data.chunks(WRITE_CHUNK_SIZE) {
        if cancelled.load(Ordering::Acquire) {
            return Err(interrupted());
        }
        file.write_all(chunk)?;
    }
    file.sync_all()?;
    drop(file);

    if cancelled.load(Ordering::Acquire) {
        return Err(interrupted());
    }
    std::fs::rename(partial, target)?;
    guard.disarm();
    Ok(())
}

impl PartialEq for StorageAreaReference {
    fn eq(&self, other: &Self) -> bool {
        self.request_id == other.request_id && self.base_path == other.base_path
    }
}

impl Eq for StorageAreaReference {}

impl Hash for StorageAreaReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.request_id.hash(state);
        self.base_path.hash(state);
    }
}
