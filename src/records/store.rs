//! In-memory record store
//!
//! A reference implementation of the persistence contract: insert, update
//! and delete by identity, plus predicate queries over record fields. All
//! mutation goes through one `tokio::sync::RwLock` write guard, which is
//! what gives record writes their single-writer discipline. `get_and_touch()`
//! marks a record as accessed; `get()` does not.

use super::GeneratedRecord;
use crate::error::{Error, Result};
use crate::storage::ASSETS_DIR;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store for one record type
pub struct RecordStore<R: GeneratedRecord> {
    records: Arc<RwLock<HashMap<Uuid, R>>>,
}

impl<R: GeneratedRecord> RecordStore<R> {
    /// Create a new empty record store
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a new record. Fails if the id is already present.
    pub async fn insert(&self, record: R) -> Result<Uuid> {
        let id = record.id();
        let mut map = self.records.write().await;
        if map.contains_key(&id) {
            return Err(Error::Store(format!("record {} already exists", id)));
        }
        map.insert(id, record);
        Ok(id)
    }

    /// Replace an existing record with a new version of itself
    pub async fn update(&self, record: R) -> Result<()> {
        let id = record.id();
        let mut map = self.records.write().await;
        match map.get_mut(&id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(Error::Store(format!("record {} not found", id))),
        }
    }

    /// Retrieve a record by ID without touching it
    pub async fn get(&self, id: &Uuid) -> Option<R> {
        self.records.read().await.get(id).cloned()
    }

    /// Retrieve a record by ID, updating its modification timestamp
    pub async fn get_and_touch(&self, id: &Uuid) -> Option<R> {
        let mut map = self.records.write().await;
        map.get_mut(id).map(|record| {
            record.touch();
            record.clone()
        })
    }

    /// Records matching `predicate`, oldest first
    pub async fn find<F>(&self, predicate: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        let mut matches: Vec<R> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.metadata().generated_at);
        matches
    }

    /// Records generated by one provider
    pub async fn find_by_provider(&self, provider_id: &str) -> Vec<R> {
        self.find(|r| r.metadata().provider_id == provider_id).await
    }

    /// Records generated by one requestor
    pub async fn find_by_requestor(&self, requestor_id: &str) -> Vec<R> {
        self.find(|r| r.metadata().requestor_id == requestor_id)
            .await
    }

    /// Remove a record by ID, leaving any file in place
    pub async fn remove(&self, id: &Uuid) -> Option<R> {
        self.records.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove a record and its file together.
    ///
    /// The file goes first; if that fails the record stays in the store.
    pub async fn delete_with_files(&self, id: &Uuid, root: &Path) -> Result<Option<R>> {
        let mut map = self.records.write().await;
        let Some(record) = map.get(id) else {
            return Ok(None);
        };
        delete_record_files(record, root).await?;
        Ok(map.remove(id))
    }

    /// Replace `old_id` with `replacement`, deleting the old record's file.
    ///
    /// Runs under a single write guard, so readers see either the old record
    /// or the new one. Nothing changes if the old file cannot be deleted.
    pub async fn supersede(&self, old_id: &Uuid, replacement: R, root: &Path) -> Result<R> {
        let new_id = replacement.id();
        let mut map = self.records.write().await;

        let Some(old) = map.get(old_id) else {
            return Err(Error::Store(format!("record {} not found", old_id)));
        };
        if new_id != *old_id && map.contains_key(&new_id) {
            return Err(Error::Store(format!("record {} already exists", new_id)));
        }

        delete_record_files(old, root).await?;
        let old = map
            .remove(old_id)
            .ok_or_else(|| Error::Store(format!("record {} not found", old_id)))?;
        map.insert(new_id, replacement);

        tracing::info!(old = %old_id, new = %new_id, "Superseded generated record");
        Ok(old)
    }

    /// Check every file-backed record's file against its recorded size,
    /// concurrently. Inline records are skipped.
    pub async fn verify_files(&self, root: &Path) -> Vec<(Uuid, Result<bool>)> {
        let records: Vec<R> = self.records.read().await.values().cloned().collect();
        let checks = records.iter().filter_map(|record| {
            record.file_reference().map(|reference| async move {
                (record.id(), reference.verify_size_matches(root).await)
            })
        });
        futures::future::join_all(checks).await
    }
}

impl<R: GeneratedRecord> Default for RecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

async fn delete_record_files<R: GeneratedRecord>(record: &R, root: &Path) -> Result<()> {
    let Some(reference) = record.file_reference() else {
        return Ok(());
    };

    let path = reference.resolve(root)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("File for record {} was already gone: {}", record.id(), path.display());
        }
        Err(e) => {
            return Err(Error::FileOperation(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            )))
        }
    }

    // Drop the request directory once it is empty; other files keep it alive.
    let area_dir = root
        .join(ASSETS_DIR)
        .join(reference.request_id().to_string());
    if let Err(e) = tokio::fs::remove_dir(&area_dir).await {
        tracing::debug!("Kept storage area {}: {}", area_dir.display(), e);
    }
    Ok(())
}
