use std::time::{SystemTime, UNIX_EPOCH};

use crate::blobstore::{BlobMetadata, BlobStore};
use crate::errors::{Error, Result};
use crate::recordstore::{PhotoRecord, RecordStore};

/// One user's profile photo, fully loaded into memory.
#[derive(Debug, Clone)]
pub struct Photo {
    pub user_id: u64,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Orchestrates the photo write/read workflow over two injected stores.
///
/// Blobs are filed under the decimal string form of the user id. The
/// delete/store/save sequence of [`write_photo`](Self::write_photo) is not
/// transactional across the two stores; a failure in between can leave a
/// blob without a record.
#[derive(Debug)]
pub struct PhotoService<B, R> {
    blobs: B,
    records: R,
}

impl<B: BlobStore, R: RecordStore> PhotoService<B, R> {
    pub fn new(blobs: B, records: R) -> Self {
        Self { blobs, records }
    }

    pub async fn write_photo(
        &self,
        user_id: u64,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let filename = user_id.to_string();

        let existing = self.blobs.find(&filename).await.map_err(store_err)?;
        if !existing.is_empty() {
            tracing::debug!(user_id, count = existing.len(), "deleting prior photo");
        }
        for entry in existing {
            self.blobs
                .delete(&filename, entry.id)
                .await
                .map_err(store_err)?;
        }

        let metadata = BlobMetadata {
            user_id,
            when: epoch_millis(),
            content_type: content_type.to_string(),
        };
        let size = bytes.len();
        self.blobs
            .store(&filename, metadata, bytes)
            .await
            .map_err(store_err)?;

        self.records
            .save(PhotoRecord::new(user_id, content_type))
            .await
            .map_err(store_err)?;

        tracing::info!(user_id, content_type, size, "stored photo");
        Ok(())
    }

    pub async fn read_photo(&self, user_id: u64) -> Result<Photo> {
        let filename = user_id.to_string();

        let entries = self.blobs.find(&filename).await.map_err(store_err)?;
        assert!(
            entries.len() <= 1,
            "there should be 0-1 stored photos for user {user_id}, found {}",
            entries.len()
        );
        let Some(entry) = entries.into_iter().next() else {
            return Err(Error::NotFound { user_id });
        };

        let bytes = self
            .blobs
            .fetch(&filename, entry.id)
            .await
            .map_err(store_err)?
            // the blob was deleted between find and fetch
            .ok_or(Error::NotFound { user_id })?;

        Ok(Photo {
            user_id,
            content_type: entry.metadata.content_type,
            bytes,
        })
    }
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
    Error::Store(err.into())
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mem_impl::MemStore;

    fn service() -> (PhotoService<MemStore, MemStore>, MemStore) {
        let store = MemStore::new();
        (PhotoService::new(store.clone(), store.clone()), store)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (service, _store) = service();

        let bytes: Vec<u8> = (0..1024).map(|i| i as u8).collect();
        service
            .write_photo(42, "image/png", bytes.clone())
            .await
            .unwrap();

        let photo = service.read_photo(42).await.unwrap();
        assert_eq!(photo.user_id, 42);
        assert_eq!(photo.content_type, "image/png");
        assert_eq!(photo.bytes, bytes);
    }

    #[tokio::test]
    async fn test_second_write_replaces_first() {
        let (service, store) = service();

        service
            .write_photo(42, "image/png", b"first".to_vec())
            .await
            .unwrap();
        service
            .write_photo(42, "image/jpeg", b"second".to_vec())
            .await
            .unwrap();

        assert_eq!(store.blob_count("42"), 1);

        let photo = service.read_photo(42).await.unwrap();
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(photo.bytes, b"second");
    }

    #[tokio::test]
    async fn test_read_missing_photo_is_not_found() {
        let (service, _store) = service();

        let err = service.read_photo(42).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { user_id: 42 }));
    }

    #[tokio::test]
    async fn test_write_saves_record() {
        use crate::recordstore::RecordStore;

        let (service, store) = service();

        service
            .write_photo(42, "image/png", b"pixels".to_vec())
            .await
            .unwrap();

        let record = store.find_by_user_id(42).await.unwrap().unwrap();
        assert!(record.id.is_some());
        assert_eq!(record.user_id, 42);
        assert_eq!(record.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_one_blob() {
        let (service, store) = service();
        let service = Arc::new(service);

        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.write_photo(42, "image/png", vec![0xaa; 512]).await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.write_photo(42, "image/png", vec![0xbb; 512]).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(store.blob_count("42"), 1);

        // whichever write landed last, the photo is readable in one piece
        let photo = service.read_photo(42).await.unwrap();
        assert!(photo.bytes == vec![0xaa; 512] || photo.bytes == vec![0xbb; 512]);
    }
}
