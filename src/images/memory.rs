//! In-memory image storage
//!
//! Same semantics as the PostgreSQL store, kept in a map. Used to run the
//! HTTP layer without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{ImageRepository, NewImage, StoreError, StoredImage};

/// In-memory image store
#[derive(Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<String, StoredImage>>,
    next_id: AtomicI64,
}

impl MemoryImageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images, expired ones included
    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    /// Whether the store holds no images
    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }

    /// Whether a row exists for `share_id`, ignoring expiry
    pub fn contains(&self, share_id: &str) -> bool {
        self.images.read().contains_key(share_id)
    }
}

#[async_trait]
impl ImageRepository for MemoryImageStore {
    async fn insert(&self, image: NewImage) -> Result<Option<i64>, StoreError> {
        let mut images = self.images.write();
        if images.contains_key(&image.share_id) {
            return Err(StoreError::DuplicateShareId(image.share_id));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let size = image.size();
        images.insert(
            image.share_id.clone(),
            StoredImage {
                share_id: image.share_id,
                original_name: image.original_name,
                mime_type: image.mime_type,
                size,
                data: image.data,
                expires_at: image.expires_at,
            },
        );
        Ok(Some(id))
    }

    async fn find_active(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredImage>, StoreError> {
        Ok(self
            .images
            .read()
            .get(share_id)
            .filter(|image| image.expires_at > now)
            .cloned())
    }

    async fn delete(&self, share_id: &str) -> Result<bool, StoreError> {
        Ok(self.images.write().remove(share_id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut images = self.images.write();
        let before = images.len();
        images.retain(|_, image| image.expires_at > now);
        Ok((before - images.len()) as u64)
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self
            .images
            .read()
            .values()
            .filter(|image| image.expires_at <= now)
            .count() as u64)
    }
}
