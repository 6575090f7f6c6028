//! Image storage module
//!
//! Provides:
//! - The `ImageRepository` seam the HTTP layer talks to
//! - PostgreSQL and in-memory implementations
//! - Share identifier generation and expiry policy
//! - The expired-image reaper

mod memory;
pub mod reaper;
mod store;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

pub use memory::MemoryImageStore;
pub use store::PgImageStore;

/// Largest accepted upload (5 MiB)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// How long a shared image stays retrievable
pub const SHARE_TTL_DAYS: i64 = 30;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate share id: {0}")]
    DuplicateShareId(String),
}

/// An image about to be stored
#[derive(Debug, Clone)]
pub struct NewImage {
    pub share_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl NewImage {
    /// Build a record for a fresh upload: new share id, expiry 30 days out
    pub fn from_upload(original_name: String, mime_type: String, data: Vec<u8>) -> Self {
        Self {
            share_id: generate_share_id(),
            original_name,
            mime_type,
            data,
            expires_at: expiry_from(Utc::now()),
        }
    }

    /// Size in bytes as stored in the `size` column
    pub fn size(&self) -> i64 {
        self.data.len() as i64
    }
}

/// An image read back from storage
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub share_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub data: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

/// Persistence for shared images
///
/// Every method is a single statement against the backing store.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a new image, returning its row id (`None` if nothing was returned)
    async fn insert(&self, image: NewImage) -> Result<Option<i64>, StoreError>;

    /// Fetch an image whose expiry is strictly after `now`
    async fn find_active(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredImage>, StoreError>;

    /// Delete an image regardless of expiry; true if exactly one row was removed
    async fn delete(&self, share_id: &str) -> Result<bool, StoreError>;

    /// Delete every image whose expiry is at or before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Count images whose expiry is at or before `now`
    async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Release backing resources on shutdown
    async fn close(&self) {}
}

/// Generate an unguessable share id: 16 random bytes, hex encoded
pub fn generate_share_id() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    hex::encode(random_bytes)
}

/// Expiry timestamp for an image uploaded at `uploaded_at`
pub fn expiry_from(uploaded_at: DateTime<Utc>) -> DateTime<Utc> {
    uploaded_at + Duration::days(SHARE_TTL_DAYS)
}
