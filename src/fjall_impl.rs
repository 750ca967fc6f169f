use std::path::Path;
use std::sync::Arc;

use fjall::{TransactionalKeyspace, TransactionalPartitionHandle};
use tempfile::TempDir;

use crate::blobstore::{BlobEntry, BlobId, BlobMetadata, BlobStore};
use crate::recordstore::{PhotoRecord, RecordId, RecordStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage engine error")]
    Fjall(#[from] fjall::Error),
    #[error("stored value could not be decoded")]
    Codec(#[from] postcard::Error),
    #[error("conflicting concurrent write")]
    WriteConflict,
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// A persistent implementation of both stores on top of a transactional
/// [`fjall`] keyspace.
///
/// Blobs are keyed by the postcard-encoded `(filename, blob id)` tuple, with
/// payloads and metadata in separate partitions under the same key, so
/// looking up all blobs of one filename is a prefix scan. Records are keyed
/// by their assigned id, with a by-user index partition next to them.
///
/// Cloning is cheap, the keyspace and partition handles are reference
/// counted internally.
#[derive(Clone)]
pub struct FjallStore {
    _tempdir: Option<Arc<TempDir>>,
    keyspace: TransactionalKeyspace,
    blob_meta: TransactionalPartitionHandle,
    blob_data: TransactionalPartitionHandle,
    records: TransactionalPartitionHandle,
    records_by_user: TransactionalPartitionHandle,
}

impl FjallStore {
    /// Opens (or creates) a store in `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let keyspace = fjall::Config::new(path).open_transactional()?;
        Self::with_keyspace(keyspace, None)
    }

    /// Opens a store in a fresh temporary directory, which is removed when
    /// the last clone of the store is dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let tempdir = tempfile::tempdir()?;
        let keyspace = fjall::Config::new(&tempdir).open_transactional()?;
        Self::with_keyspace(keyspace, Some(Arc::new(tempdir)))
    }

    fn with_keyspace(
        keyspace: TransactionalKeyspace,
        tempdir: Option<Arc<TempDir>>,
    ) -> Result<Self, StoreError> {
        let blob_meta = keyspace.open_partition("blob_meta", Default::default())?;
        let blob_data = keyspace.open_partition("blob_data", Default::default())?;
        let records = keyspace.open_partition("records", Default::default())?;
        let records_by_user = keyspace.open_partition("records_by_user", Default::default())?;

        Ok(Self {
            _tempdir: tempdir,
            keyspace,
            blob_meta,
            blob_data,
            records,
            records_by_user,
        })
    }
}

fn blob_key(filename: &str, id: BlobId) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_stdvec(&(filename, id))
}

/// The key prefix shared by all blobs of one filename.
fn filename_prefix(filename: &str) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_stdvec(&filename)
}

#[async_trait::async_trait]
impl BlobStore for FjallStore {
    type Error = StoreError;

    async fn find(&self, filename: &str) -> Result<Vec<BlobEntry>, Self::Error> {
        let prefix = filename_prefix(filename)?;
        let read_tx = self.keyspace.read_tx();

        let mut entries = vec![];
        for kv in read_tx.prefix(&self.blob_meta, prefix) {
            let (key, value) = kv?;

            let (_filename, id): (String, BlobId) = postcard::from_bytes(&key)?;
            let metadata: BlobMetadata = postcard::from_bytes(&value)?;

            entries.push(BlobEntry { id, metadata });
        }

        Ok(entries)
    }

    async fn store(
        &self,
        filename: &str,
        metadata: BlobMetadata,
        blob: Vec<u8>,
    ) -> Result<BlobId, Self::Error> {
        let id = BlobId::random();
        let key = blob_key(filename, id)?;
        let prefix = filename_prefix(filename)?;
        let metadata = postcard::to_stdvec(&metadata)?;

        let mut write_tx = self.keyspace.write_tx()?;

        // replace-on-store: all blobs under this filename go away in the
        // same transaction that inserts the new one
        let stale_keys = write_tx
            .prefix(&self.blob_meta, prefix)
            .map(|kv| kv.map(|(key, _value)| key))
            .collect::<Result<Vec<_>, _>>()?;
        for stale_key in stale_keys {
            write_tx.remove(&self.blob_meta, stale_key.clone());
            write_tx.remove(&self.blob_data, stale_key);
        }

        write_tx.insert(&self.blob_meta, key.as_slice(), metadata);
        write_tx.insert(&self.blob_data, key.as_slice(), blob);
        write_tx.commit()?.map_err(|_| StoreError::WriteConflict)?;

        Ok(id)
    }

    async fn fetch(&self, filename: &str, id: BlobId) -> Result<Option<Vec<u8>>, Self::Error> {
        let key = blob_key(filename, id)?;
        let read_tx = self.keyspace.read_tx();

        let payload = read_tx.get(&self.blob_data, key)?;
        Ok(payload.map(|slice| slice.to_vec()))
    }

    async fn delete(&self, filename: &str, id: BlobId) -> Result<(), Self::Error> {
        let key = blob_key(filename, id)?;

        let mut write_tx = self.keyspace.write_tx()?;
        write_tx.remove(&self.blob_meta, key.as_slice());
        write_tx.remove(&self.blob_data, key.as_slice());
        write_tx.commit()?.map_err(|_| StoreError::WriteConflict)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for FjallStore {
    type Error = StoreError;

    async fn save(&self, mut record: PhotoRecord) -> Result<PhotoRecord, Self::Error> {
        let id = RecordId::random();
        record.id = Some(id);

        let user_key = record.user_id.to_be_bytes();
        let value = postcard::to_stdvec(&record)?;

        let mut write_tx = self.keyspace.write_tx()?;
        if let Some(old_id) = write_tx.get(&self.records_by_user, user_key.as_slice())? {
            write_tx.remove(&self.records, old_id);
        }
        write_tx.insert(&self.records, id.0.as_slice(), value);
        write_tx.insert(&self.records_by_user, user_key.as_slice(), id.0.as_slice());
        write_tx.commit()?.map_err(|_| StoreError::WriteConflict)?;

        Ok(record)
    }

    async fn find_by_user_id(&self, user_id: u64) -> Result<Option<PhotoRecord>, Self::Error> {
        let user_key = user_id.to_be_bytes();
        let read_tx = self.keyspace.read_tx();

        let Some(id) = read_tx.get(&self.records_by_user, user_key.as_slice())? else {
            return Ok(None);
        };
        let Some(value) = read_tx.get(&self.records, id)? else {
            return Ok(None);
        };

        Ok(Some(postcard::from_bytes(&value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(user_id: u64) -> BlobMetadata {
        BlobMetadata {
            user_id,
            when: 12345,
            content_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let store = FjallStore::temporary().unwrap();

        let id = store
            .store("42", metadata(42), b"pixels".to_vec())
            .await
            .unwrap();

        let entries = store.find("42").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].metadata.user_id, 42);
        assert_eq!(entries[0].metadata.when, 12345);
        assert_eq!(entries[0].metadata.content_type, "image/png");

        let payload = store.fetch("42", id).await.unwrap();
        assert_eq!(payload.as_deref(), Some(b"pixels".as_slice()));
    }

    #[tokio::test]
    async fn test_filename_prefix_is_exact() {
        let store = FjallStore::temporary().unwrap();

        store.store("4", metadata(4), b"four".to_vec()).await.unwrap();
        store
            .store("42", metadata(42), b"fortytwo".to_vec())
            .await
            .unwrap();

        // "4" must not pick up "42"
        assert_eq!(store.find("4").await.unwrap().len(), 1);
        assert_eq!(store.find("42").await.unwrap().len(), 1);
        assert!(store.find("421").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_replaces_by_filename() {
        let store = FjallStore::temporary().unwrap();

        let old_id = store
            .store("42", metadata(42), b"old".to_vec())
            .await
            .unwrap();
        let new_id = store
            .store("42", metadata(42), b"new".to_vec())
            .await
            .unwrap();

        let entries = store.find("42").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, new_id);

        assert_eq!(store.fetch("42", old_id).await.unwrap(), None);
        let payload = store.fetch("42", new_id).await.unwrap();
        assert_eq!(payload.as_deref(), Some(b"new".as_slice()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = FjallStore::temporary().unwrap();

        let id = store
            .store("42", metadata(42), b"pixels".to_vec())
            .await
            .unwrap();
        store.delete("42", id).await.unwrap();

        assert!(store.find("42").await.unwrap().is_empty());
        assert_eq!(store.fetch("42", id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_save_replaces() {
        let store = FjallStore::temporary().unwrap();

        let first = store
            .save(PhotoRecord::new(42, "image/png"))
            .await
            .unwrap();
        let second = store
            .save(PhotoRecord::new(42, "image/jpeg"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let found = store.find_by_user_id(42).await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
        assert_eq!(found.content_type, "image/jpeg");

        assert!(store.find_by_user_id(7).await.unwrap().is_none());
    }
}
