use core::fmt;

use serde::{Deserialize, Serialize};

/// The internally assigned id of a [`PhotoRecord`].
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecordId(pub [u8; 16]);

impl RecordId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({:x})", base16ct::HexDisplay(&self.0))
    }
}

/// The per-user photo metadata record. The payload itself lives in the blob
/// store and is not persisted here redundantly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Assigned by the store on save.
    pub id: Option<RecordId>,
    pub user_id: u64,
    pub content_type: String,
}

impl PhotoRecord {
    pub fn new(user_id: u64, content_type: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id,
            content_type: content_type.into(),
        }
    }
}

/// Key-value persistence for small per-user metadata records.
#[async_trait::async_trait]
pub trait RecordStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Saves `record` under a freshly assigned id, replacing any prior
    /// record for the same user. Returns the record with its id filled in.
    async fn save(&self, record: PhotoRecord) -> Result<PhotoRecord, Self::Error>;

    async fn find_by_user_id(&self, user_id: u64) -> Result<Option<PhotoRecord>, Self::Error>;
}
