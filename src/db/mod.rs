//! Database module - PostgreSQL pool and the images schema

#[cfg(all(test, feature = "integration"))]
pub mod test_utils;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use tracing::info;

use crate::config::{DatabaseConfig, TlsMode};

/// Database handle wrapping the PostgreSQL connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect, verify the connection and ensure the schema exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options =
            PgConnectOptions::from_str(&config.url)?.ssl_mode(pg_ssl_mode(config.tls_mode));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.health_check().await?;
        info!(
            "Database connection verified (sslmode={})",
            config.tls_mode
        );
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                id BIGSERIAL PRIMARY KEY,
                share_id TEXT UNIQUE NOT NULL,
                original_name TEXT NOT NULL,
                mimetype TEXT NOT NULL,
                size BIGINT NOT NULL,
                image_data BYTEA NOT NULL,
                expiry_date TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_expiry_date ON images(expiry_date)")
            .execute(&self.pool)
            .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if database is reachable
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT NOW()").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn pg_ssl_mode(mode: TlsMode) -> PgSslMode {
    match mode {
        TlsMode::Disable => PgSslMode::Disable,
        TlsMode::Allow => PgSslMode::Allow,
        TlsMode::Prefer => PgSslMode::Prefer,
        TlsMode::Require => PgSslMode::Require,
        TlsMode::VerifyCa => PgSslMode::VerifyCa,
        TlsMode::VerifyFull => PgSslMode::VerifyFull,
    }
}
