//! imgshare_purge - One-shot removal of expired images
//!
//! Reads the same environment as the server daemon.

use anyhow::Result;
use clap::Parser;
use imgshare::config::Config;
use imgshare::db::Database;
use imgshare::images::{reaper, PgImageStore};
use imgshare::init_tracing;
use tracing::info;

/// imgshare expired image purge tool
#[derive(Parser, Debug)]
#[command(
    name = "imgshare_purge",
    version,
    about = "Delete images whose share has expired"
)]
struct Args {
    /// Count expired images without deleting them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("imgshare=info");

    let args = Args::parse();
    let config = Config::from_env()?;

    let db = Database::connect(&config.database).await?;
    let store = PgImageStore::new(db.pool().clone());

    let count = reaper::purge_expired_now(&store, args.dry_run).await?;
    if args.dry_run {
        info!("{} expired images would be purged", count);
    } else {
        info!("Purged {} expired images", count);
    }
    println!("{}", count);

    db.close().await;
    Ok(())
}
