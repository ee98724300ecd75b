//! Record persistence behind a store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::record::{FileId, FileRecord};
use crate::{Error, Result};

/// Closure applied atomically to a stored record.
pub type RecordUpdate<'a> = &'a mut (dyn FnMut(&mut FileRecord) -> Result<()> + Send);

/// Persistence of [`FileRecord`]s for one store.
///
/// Implementations must apply [`Catalog::update`] atomically with respect to
/// other calls on the same id; the single-writer claim relies on it.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Inserts a new record, failing with a conflict if the id exists.
    async fn insert(&self, record: FileRecord) -> Result<()>;

    /// Returns the record with `id`.
    async fn get(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Applies `update` to the record with `id`.
    ///
    /// Returns the updated record, or `None` if it does not exist. When the
    /// closure fails the stored record is left untouched.
    async fn update(&self, id: &FileId, update: RecordUpdate<'_>) -> Result<Option<FileRecord>>;

    /// Removes and returns the record with `id`.
    async fn remove(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Returns all records.
    async fn list(&self) -> Result<Vec<FileRecord>>;
}

/// In-process catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<HashMap<FileId, FileRecord>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert(&self, record: FileRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(Error::conflict()
                .with_file_id(&record.id)
                .with_message("file id already exists"));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, id: &FileId, update: RecordUpdate<'_>) -> Result<Option<FileRecord>> {
        let mut records = self.records.write().await;
        let Some(stored) = records.get_mut(id) else {
            return Ok(None);
        };

        let mut record = stored.clone();
        update(&mut record)?;
        *stored = record.clone();
        Ok(Some(record))
    }

    async fn remove(&self, id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self.records.write().await.remove(id))
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::record::NewFile;

    fn record() -> FileRecord {
        FileRecord::pending(
            FileId::generate(),
            &NewFile::new("a.txt", "text/plain", 3),
            "docs",
            None,
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let catalog = MemoryCatalog::new();
        let record = record();
        catalog.insert(record.clone()).await.unwrap();

        let err = catalog.insert(record).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn failed_update_leaves_record_untouched() {
        let catalog = MemoryCatalog::new();
        let record = record();
        catalog.insert(record.clone()).await.unwrap();

        let result = catalog
            .update(&record.id, &mut |r| {
                r.progress = 99;
                Err(Error::conflict())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(catalog.get(&record.id).await.unwrap().unwrap().progress, 0);

        let updated = catalog
            .update(&record.id, &mut |r| {
                r.progress = 3;
                Ok(())
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.progress, 3);
    }

    #[tokio::test]
    async fn update_and_remove_missing() {
        let catalog = MemoryCatalog::new();
        let id = FileId::generate();
        assert!(catalog.update(&id, &mut |_| Ok(())).await.unwrap().is_none());
        assert!(catalog.remove(&id).await.unwrap().is_none());
        assert!(catalog.list().await.unwrap().is_empty());
    }
}
