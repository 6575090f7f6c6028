//! imgshare - image sharing server daemon
//!
//! Upload an image, get back a random share id, fetch it by that id for
//! thirty days.

pub mod api;
pub mod config;
pub mod db;
pub mod images;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AllowedOrigins;
use config::{Config, ServerConfig};
use db::Database;
use images::{ImageRepository, PgImageStore};

/// The imgshare server instance
pub struct Server {
    config: ServerConfig,
    store: Arc<dyn ImageRepository>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Connect to PostgreSQL and create a server over it
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database).await?;
        let store = Arc::new(PgImageStore::new(db.pool().clone()));
        Ok(Self::with_store(config.server, store))
    }

    /// Create a server over an already constructed image store
    pub fn with_store(config: ServerConfig, store: Arc<dyn ImageRepository>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            store,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Build the router
    fn router(&self) -> Router {
        let origins = AllowedOrigins::new(self.config.allowed_origins());
        api::router(self.store.clone(), origins)
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("imgshare listening on {}", local_addr);

        let reaper = self.config.purge_interval.map(|every| {
            images::reaper::spawn(self.store.clone(), every, self.shutdown_rx.clone())
        });

        let router = self.router();
        let shutdown_rx = self.shutdown_rx.clone();

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await;

        // Stop the reaper even if serving failed
        self.shutdown();
        if let Some(handle) = reaper {
            handle.await.ok();
        }
        self.store.close().await;
        info!("Image store closed");

        served?;
        info!("imgshare shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Resolve once the shutdown flag is set (or its sender is gone)
pub(crate) async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    rx.wait_for(|stop| *stop).await.ok();
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides `default_filter`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
