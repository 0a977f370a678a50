//! Offsite backup of the durable store's backing file.
//!
//! Best-effort by construction: every failure here is a warning, never a
//! reason to abort startup or stop the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serenity::async_trait;
use tracing::{info, warn};

use crate::immut_data::consts::BACKUP_INTERVAL;

pub(crate) mod github;

#[async_trait]
pub(crate) trait BackupStore: Send + Sync {
    /// Fetches the most recent snapshot, `None` when no snapshot exists yet.
    async fn pull(&self) -> crate::Result<Option<Vec<u8>>>;
    async fn push(&self, bytes: &[u8]) -> crate::Result<()>;
}

/// Adopts the latest offsite snapshot as the initial store state. Run before
/// the database pool is opened.
pub(crate) async fn restore_on_startup(store: &dyn BackupStore, db_path: &Path) {
    match store.pull().await {
        Ok(Some(bytes)) => match tokio::fs::write(db_path, &bytes).await {
            Ok(()) => info!(path = %db_path.display(), "restored store from offsite snapshot"),
            Err(e) => warn!(error = %e, "failed to write restored snapshot; starting from local state"),
        },
        Ok(None) => info!("no offsite snapshot found; starting fresh"),
        Err(e) => warn!(error = %e, "offsite restore failed; starting from local state"),
    }
}

/// Pushes the store file to the offsite sink on a fixed interval, for the
/// lifetime of the process.
pub(crate) async fn run_backup_loop(store: Arc<dyn BackupStore>, db_path: PathBuf) {
    let mut interval = tokio::time::interval(BACKUP_INTERVAL);
    loop {
        interval.tick().await;
        let bytes = match tokio::fs::read(&db_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "store file unreadable; skipping this backup tick");
                continue;
            }
        };
        match store.push(&bytes).await {
            Ok(()) => info!(size = bytes.len(), "pushed store snapshot offsite"),
            Err(e) => warn!(error = %e, "offsite backup failed; will retry next tick"),
        }
    }
}
