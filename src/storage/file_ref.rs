//! Durable pointers to generated files
//!
//! A `TypedDataFileReference` is created at the moment its file is written
//! and never changes afterwards. Its `relative_path` is the same no matter
//! how it is resolved, so a reference written by one process can be read
//! back by another through either a storage area or the bundle root.

use super::area::{validate_file_name, StorageAreaReference, ASSETS_DIR};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Where to resolve a file reference against
#[derive(Debug, Clone, Copy)]
pub enum FileLocation<'a> {
    /// The request's own storage area
    Area(&'a StorageAreaReference),
    /// A bundle root containing `assets/`
    BundleRoot(&'a Path),
}

impl<'a> From<&'a StorageAreaReference> for FileLocation<'a> {
    fn from(area: &'a StorageAreaReference) -> Self {
        FileLocation::Area(area)
    }
}

impl<'a> From<&'a Path> for FileLocation<'a> {
    fn from(root: &'a Path) -> Self {
        FileLocation::BundleRoot(root)
    }
}

impl<'a> From<&'a PathBuf> for FileLocation<'a> {
    fn from(root: &'a PathBuf) -> Self {
        FileLocation::BundleRoot(root.as_path())
    }
}

/// Pointer to one file written into a storage area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataFileReference {
    request_id: Uuid,
    #[serde(deserialize_with = "deserialize_file_name")]
    file_name: String,
    file_size: u64,
    mime_type: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl TypedDataFileReference {
    /// Reference for bytes that were just written as `file_name`
    pub fn from_data(
        request_id: Uuid,
        file_name: impl Into<String>,
        data: &[u8],
        mime_type: impl Into<String>,
        compute_checksum: bool,
    ) -> Result<Self> {
        let file_name = file_name.into();
        validate_file_name(&file_name)?;
        Ok(Self {
            request_id,
            file_name,
            file_size: data.len() as u64,
            mime_type: mime_type.into(),
            created_at: Utc::now(),
            checksum: compute_checksum.then(|| sha256_hex(data)),
        })
    }

    /// Reference for a file already on disk.
    ///
    /// Only stats the file unless a checksum is requested.
    pub async fn from_file(
        request_id: Uuid,
        path: &Path,
        mime_type: impl Into<String>,
        compute_checksum: bool,
    ) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::FileOperation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        validate_file_name(&file_name)?;

        let (file_size, checksum) = if compute_checksum {
            let data = read_file(path).await?;
            (data.len() as u64, Some(sha256_hex(&data)))
        } else {
            let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                Error::FileOperation(format!("failed to stat {}: {}", path.display(), e))
            })?;
            (metadata.len(), None)
        };

        Ok(Self {
            request_id,
            file_name,
            file_size,
            mime_type: mime_type.into(),
            created_at: Utc::now(),
            checksum,
        })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// `assets/{request_id}/{file_name}`, independent of resolution target
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}", ASSETS_DIR, self.request_id, self.file_name)
    }

    /// Absolute path of the file under `location`
    pub fn file_url<'a>(&self, location: impl Into<FileLocation<'a>>) -> PathBuf {
        match location.into() {
            FileLocation::Area(area) => area.file_url(&self.file_name),
            FileLocation::BundleRoot(root) => root
                .join(ASSETS_DIR)
                .join(self.request_id.to_string())
                .join(&self.file_name),
        }
    }

    /// Path under `location`, refusing names that would leave the area
    pub(crate) fn resolve<'a>(&self, location: impl Into<FileLocation<'a>>) -> Result<PathBuf> {
        validate_file_name(&self.file_name)?;
        let location = location.into();
        if let FileLocation::Area(area) = location {
            if area.request_id() != self.request_id {
                return Err(Error::FileOperation(format!(
                    "file {} belongs to request {} but was resolved against area {}",
                    self.file_name,
                    self.request_id,
                    area.request_id()
                )));
            }
        }
        Ok(self.file_url(location))
    }

    /// Read the file's bytes as they are on disk
    pub async fn read_data<'a>(&self, location: impl Into<FileLocation<'a>>) -> Result<Vec<u8>> {
        let path = self.resolve(location)?;
        read_file(&path).await
    }

    /// Read the file and check it against the recorded size and checksum
    pub async fn read_verified<'a>(
        &self,
        location: impl Into<FileLocation<'a>>,
    ) -> Result<Vec<u8>> {
        let path = self.resolve(location)?;
        let data = read_file(&path).await?;

        if data.len() as u64 != self.file_size {
            return Err(Error::FileOperation(format!(
                "{} is {} bytes but the reference records {}",
                path.display(),
                data.len(),
                self.file_size
            )));
        }
        if let Some(expected) = &self.checksum {
            let actual = sha256_hex(&data);
            if &actual != expected {
                return Err(Error::FileOperation(format!(
                    "checksum mismatch for {}",
                    path.display()
                )));
            }
        }
        Ok(data)
    }

    /// Whether the file is present. Never fails.
    pub async fn file_exists<'a>(&self, location: impl Into<FileLocation<'a>>) -> bool {
        match self.resolve(location) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Compare the on-disk size with the recorded size without reading the
    /// file, catching truncation cheaply.
    pub async fn verify_size_matches<'a>(
        &self,
        location: impl Into<FileLocation<'a>>,
    ) -> Result<bool> {
        let path = self.resolve(location)?;
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            Error::FileOperation(format!("failed to stat {}: {}", path.display(), e))
        })?;
        Ok(metadata.len() == self.file_size)
    }

    /// Recompute the checksum. `None` when no checksum was recorded.
    pub async fn verify_checksum<'a>(
        &self,
        location: impl Into<FileLocation<'a>>,
    ) -> Result<Option<bool>> {
        let Some(expected) = &self.checksum else {
            return Ok(None);
        };
        let data = self.read_data(location).await?;
        Ok(Some(&sha256_hex(&data) == expected))
    }
}

fn deserialize_file_name<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let file_name = String::deserialize(d)?;
    validate_file_name(&file_name).map_err(serde::de::Error::custom)?;
    Ok(file_name)
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::FileOperation(format!("failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path() {
        let id = Uuid::new_v4();
        let reference =
            TypedDataFileReference::from_data(id, "speech.mp3", b"abc", "audio/mpeg", false)
                .unwrap();
        assert_eq!(reference.relative_path(), format!("assets/{}/speech.mp3", id));
        assert_eq!(reference.file_size(), 3);
        assert!(reference.checksum().is_none());
    }

    #[test]
    fn test_area_and_bundle_root_agree() {
        let root = Path::new("/library/project.bundle");
        let id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(root, id, "com.example");
        let reference =
            TypedDataFileReference::from_data(id, "image.png", b"png", "image/png", false).unwrap();

        let via_area = reference.file_url(&area);
        let via_root = reference.file_url(root);
        assert_eq!(via_area, via_root);
        assert_eq!(via_root, root.join(reference.relative_path()));
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        let reference =
            TypedDataFileReference::from_data(Uuid::new_v4(), "x", b"abc", "text/plain", true)
                .unwrap();
        assert_eq!(
            reference.checksum(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[tokio::test]
    async fn test_read_back_through_both_targets() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), id, "bundle");
        let reference = area
            .write_file("out.bin", &[9, 8, 7, 6], "application/octet-stream", true)
            .await
            .unwrap();

        assert_eq!(reference.read_data(&area).await.unwrap(), vec![9, 8, 7, 6]);
        assert_eq!(reference.read_verified(dir.path()).await.unwrap(), vec![9, 8, 7, 6]);
        assert!(reference.file_exists(&area).await);
        assert!(reference.verify_size_matches(dir.path()).await.unwrap());
        assert_eq!(reference.verify_checksum(&area).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_truncation_detected() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), id, "bundle");
        let reference = area
            .write_file("out.bin", &[1u8; 64], "application/octet-stream", true)
            .await
            .unwrap();

        std::fs::write(area.file_url("out.bin"), [1u8; 10]).unwrap();
        assert!(!reference.verify_size_matches(&area).await.unwrap());
        assert!(matches!(
            reference.read_verified(&area).await,
            Err(Error::FileOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_tampering_detected_by_checksum() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), id, "bundle");
        let reference = area
            .write_file("out.txt", b"hello", "text/plain", true)
            .await
            .unwrap();

        std::fs::write(area.file_url("out.txt"), b"jello").unwrap();
        assert!(reference.verify_size_matches(&area).await.unwrap());
        assert_eq!(reference.verify_checksum(&area).await.unwrap(), Some(false));
        assert!(reference.read_verified(&area).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_checks() {
        let dir = TempDir::new().unwrap();
        let reference = TypedDataFileReference::from_data(
            Uuid::new_v4(),
            "gone.bin",
            b"x",
            "application/octet-stream",
            false,
        )
        .unwrap();
        assert!(!reference.file_exists(dir.path()).await);
        assert!(reference.verify_size_matches(dir.path()).await.is_err());
        assert!(matches!(
            reference.read_data(dir.path()).await,
            Err(Error::FileOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_area_is_rejected() {
        let dir = TempDir::new().unwrap();
        let area = StorageAreaReference::in_bundle(dir.path(), Uuid::new_v4(), "bundle");
        let other = StorageAreaReference::in_bundle(dir.path(), Uuid::new_v4(), "bundle");
        let reference = area
            .write_file("a.txt", b"a", "text/plain", false)
            .await
            .unwrap();
        assert!(!reference.file_exists(&other).await);
        assert!(reference.read_data(&other).await.is_err());
    }

    #[tokio::test]
    async fn test_from_file_stats_or_hashes() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let area = StorageAreaReference::in_bundle(dir.path(), id, "bundle");
        area.create_directory().await.unwrap();
        let path = area.file_url("existing.wav");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let stat_only = TypedDataFileReference::from_file(id, &path, "audio/wav", false)
            .await
            .unwrap();
        assert_eq!(stat_only.file_name(), "existing.wav");
        assert_eq!(stat_only.file_size(), 2048);
        assert!(stat_only.checksum().is_none());

        let hashed = TypedDataFileReference::from_file(id, &path, "audio/wav", true)
            .await
            .unwrap();
        assert_eq!(hashed.checksum(), Some(sha256_hex(&vec![0u8; 2048]).as_str()));
        assert!(hashed.read_verified(&area).await.is_ok());
    }

    #[test]
    fn test_serde_round_trip() {
        let reference =
            TypedDataFileReference::from_data(Uuid::new_v4(), "a.png", b"img", "image/png", true)
                .unwrap();
        let json = serde_json::to_string(&reference).unwrap();
        let back: TypedDataFileReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }

    #[test]
    fn test_escaping_names_rejected_on_construction() {
        for name in ["../secret.txt", "a/b.bin", "..", ".hidden", ""] {
            assert!(
                TypedDataFileReference::from_data(Uuid::new_v4(), name, b"x", "text/plain", false)
                    .is_err(),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_escaping_names_rejected_on_deserialize() {
        let id = Uuid::new_v4();
        let mut json = serde_json::to_value(
            TypedDataFileReference::from_data(id, "ok.txt", b"outside", "text/plain", false)
                .unwrap(),
        )
        .unwrap();
        json["file_name"] = serde_json::json!("../../secret.txt");

        let err = serde_json::from_value::<TypedDataFileReference>(json).unwrap_err();
        assert!(err.to_string().contains("invalid file name"));
    }

    #[tokio::test]
    async fn test_resolution_refuses_escaping_names() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"outside").unwrap();
        let mut reference = TypedDataFileReference::from_data(
            Uuid::new_v4(),
            "ok.txt",
            b"outside",
            "text/plain",
            false,
        )
        .unwrap();
        reference.file_name = "../../secret.txt".to_string();

        assert!(matches!(
            reference.read_data(dir.path()).await,
            Err(Error::FileOperation(_))
        ));
        assert!(!reference.file_exists(dir.path()).await);
        assert!(reference.verify_size_matches(dir.path()).await.is_err());
    }
}
