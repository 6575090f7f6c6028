//! PostgreSQL image storage
//!
//! One row per shared image in the `images` table. Reads filter on
//! `expiry_date > $now`; expired rows stay until deleted or purged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::{ImageRepository, NewImage, StoreError, StoredImage};

type ImageRow = (String, String, String, i64, Vec<u8>, DateTime<Utc>);

/// PostgreSQL-backed image store
#[derive(Clone)]
pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    /// Create a new image store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageStore {
    async fn insert(&self, image: NewImage) -> Result<Option<i64>, StoreError> {
        let size = image.size();
        let row: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO images (share_id, original_name, mimetype, size, image_data, expiry_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&image.share_id)
        .bind(&image.original_name)
        .bind(&image.mime_type)
        .bind(size)
        .bind(&image.data)
        .bind(image.expires_at)
        .fetch_optional(&self.pool)
        .await?;

        debug!("Stored image {} ({} bytes)", image.share_id, size);
        Ok(row.map(|(id,)| id))
    }

    async fn find_active(
        &self,
        share_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredImage>, StoreError> {
        let row: Option<ImageRow> = sqlx::query_as(
            "SELECT share_id, original_name, mimetype, size, image_data, expiry_date
             FROM images
             WHERE share_id = $1 AND expiry_date > $2",
        )
        .bind(share_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(share_id, original_name, mime_type, size, data, expires_at)| StoredImage {
                share_id,
                original_name,
                mime_type,
                size,
                data,
                expires_at,
            },
        ))
    }

    async fn delete(&self, share_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE share_id = $1")
            .bind(share_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE expiry_date <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM images WHERE expiry_date <= $1")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;

        Ok(count as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
