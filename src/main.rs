//! imgshare - image sharing server daemon

use std::sync::Arc;

use anyhow::Result;
use imgshare::{config::Config, init_tracing, Server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("imgshare=info,tower_http=debug");

    let config = Config::from_env()?;
    info!(
        "Starting imgshare ({:?}, db sslmode={})",
        config.environment, config.database.tls_mode
    );

    let server = Arc::new(Server::new(config).await?);

    // Ctrl-C drains in-flight requests, then closes the pool
    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
