use core::fmt;

use serde::{Deserialize, Serialize};

/// The id of a stored blob, assigned by the store.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlobId(pub [u8; 16]);

impl BlobId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({:x})", base16ct::HexDisplay(&self.0))
    }
}

/// Sidecar metadata stored alongside each blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub user_id: u64,
    /// Upload timestamp, in milliseconds since the unix epoch.
    pub when: u64,
    pub content_type: String,
}

/// A stored blob as returned by [`BlobStore::find`], without its payload.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub id: BlobId,
    pub metadata: BlobMetadata,
}

/// Binary storage for blobs filed under a filename, with sidecar metadata.
///
/// More than one blob may be filed under the same filename, except that
/// [`BlobStore::store`] replaces all of them in one step. The photo service
/// relies on that to keep at most one photo per user even with concurrent
/// uploaders.
#[async_trait::async_trait]
pub trait BlobStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists all blobs filed under `filename`.
    async fn find(&self, filename: &str) -> Result<Vec<BlobEntry>, Self::Error>;

    /// Stores `blob` under `filename`, atomically replacing any blob
    /// already filed under that filename.
    async fn store(
        &self,
        filename: &str,
        metadata: BlobMetadata,
        blob: Vec<u8>,
    ) -> Result<BlobId, Self::Error>;

    /// Reads a blob's payload fully into memory.
    async fn fetch(&self, filename: &str, id: BlobId) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn delete(&self, filename: &str, id: BlobId) -> Result<(), Self::Error>;
}
