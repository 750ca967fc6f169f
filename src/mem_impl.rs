use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use crate::blobstore::{BlobEntry, BlobId, BlobMetadata, BlobStore};
use crate::recordstore::{PhotoRecord, RecordId, RecordStore};

/// An in-memory implementation of both stores, primarily used as a test
/// substitute for [`FjallStore`](crate::fjall_impl::FjallStore).
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: Vec<StoredBlob>,
    records: HashMap<u64, PhotoRecord>,
}

#[derive(Debug)]
struct StoredBlob {
    filename: String,
    id: BlobId,
    metadata: BlobMetadata,
    payload: Vec<u8>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of blobs currently filed under `filename`.
    pub fn blob_count(&self, filename: &str) -> usize {
        let inner = self.inner.read().unwrap();
        inner.blobs.iter().filter(|b| b.filename == filename).count()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemStore {
    type Error = Infallible;

    async fn find(&self, filename: &str) -> Result<Vec<BlobEntry>, Self::Error> {
        let inner = self.inner.read().unwrap();
        let entries = inner
            .blobs
            .iter()
            .filter(|b| b.filename == filename)
            .map(|b| BlobEntry {
                id: b.id,
                metadata: b.metadata.clone(),
            })
            .collect();
        Ok(entries)
    }

    async fn store(
        &self,
        filename: &str,
        metadata: BlobMetadata,
        blob: Vec<u8>,
    ) -> Result<BlobId, Self::Error> {
        let id = BlobId::random();

        let mut inner = self.inner.write().unwrap();
        // replace-on-store: anything already filed under this name goes away
        // within the same lock hold
        inner.blobs.retain(|b| b.filename != filename);
        inner.blobs.push(StoredBlob {
            filename: filename.into(),
            id,
            metadata,
            payload: blob,
        });

        Ok(id)
    }

    async fn fetch(&self, filename: &str, id: BlobId) -> Result<Option<Vec<u8>>, Self::Error> {
        let inner = self.inner.read().unwrap();
        let payload = inner
            .blobs
            .iter()
            .find(|b| b.filename == filename && b.id == id)
            .map(|b| b.payload.clone());
        Ok(payload)
    }

    async fn delete(&self, filename: &str, id: BlobId) -> Result<(), Self::Error> {
        let mut inner = self.inner.write().unwrap();
        inner.blobs.retain(|b| !(b.filename == filename && b.id == id));
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemStore {
    type Error = Infallible;

    async fn save(&self, mut record: PhotoRecord) -> Result<PhotoRecord, Self::Error> {
        record.id = Some(RecordId::random());

        let mut inner = self.inner.write().unwrap();
        inner.records.insert(record.user_id, record.clone());

        Ok(record)
    }

    async fn find_by_user_id(&self, user_id: u64) -> Result<Option<PhotoRecord>, Self::Error> {
        let inner = self.inner.read().unwrap();
        Ok(inner.records.get(&user_id).cloned())
    }
}
