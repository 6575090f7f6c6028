//! Shared test utilities for database operations
//!
//! Connects to the PostgreSQL instance named by `DATABASE_URL` (falling back
//! to a local test database) with the full schema applied. Settings go through
//! the same validation as the server's, as a development deployment, so a local
//! database without TLS needs `sslmode=disable` in its URL.

use figment::providers::{Env, Serialized};
use figment::Figment;

use crate::config::Config;

use super::Database;

const LOCAL_TEST_DATABASE: &str = "postgres://localhost:5432/imgshare_test?sslmode=disable";

/// Connect to the test database with migrations applied
pub async fn test_database() -> Database {
    let figment = Figment::new()
        .merge(Serialized::default("database_url", LOCAL_TEST_DATABASE))
        .merge(Env::raw().only(&["DATABASE_URL"]))
        .merge(Serialized::default("app_env", "development"))
        .merge(Serialized::default("db_max_connections", 5));
    let config = Config::from_figment(figment).expect("Invalid test database settings");

    Database::connect(&config.database)
        .await
        .expect("Failed to connect to test database")
}
