//! Expired image reaper
//!
//! Reads already hide expired images; the reaper reclaims their storage.
//! It is off unless a purge interval is configured.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::{ImageRepository, StoreError};

/// Delete (or, on a dry run, count) every image expired as of now
pub async fn purge_expired_now(
    store: &dyn ImageRepository,
    dry_run: bool,
) -> Result<u64, StoreError> {
    let now = Utc::now();
    if dry_run {
        store.count_expired(now).await
    } else {
        store.purge_expired(now).await
    }
}

/// Spawn the periodic reaper; it stops once `shutdown` flips to true
pub fn spawn(
    store: Arc<dyn ImageRepository>,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Reaper purging expired images every {:?}", every);

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stop = crate::wait_for_shutdown(shutdown);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    match purge_expired_now(store.as_ref(), false).await {
                        Ok(0) => {}
                        Ok(purged) => info!("Reaper purged {} expired images", purged),
                        Err(e) => error!("Reaper purge failed: {}", e),
                    }
                }
            }
        }

        info!("Reaper stopped");
    })
}
