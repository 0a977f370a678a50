//! Write-through queue between the in-memory cache and the durable store.
//!
//! Mutations return immediately; each one enqueues a snapshot of the affected
//! table taken at mutation time. A single worker task drains the queue and
//! applies the snapshots as replace-all transactions, so the last snapshot to
//! be applied wins. Persistence failures never roll back in-memory state.

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::warn;

use crate::db::{self, dao};

#[derive(Debug)]
pub(crate) enum PersistReq {
    Settings(Vec<dao::SettingsRow>),
    XpTable { guild_id: i64, rows: Vec<(i64, i64)> },
    ModLog { guild_id: i64, rows: Vec<dao::ModStatRow> },
    DeletedMedia { guild_id: i64, rows: Vec<dao::DeletedMediaRow> },
    AfkTable(Vec<dao::AfkRow>),
    LastSeen(Vec<(i64, String)>),
}

impl PersistReq {
    fn kind(&self) -> &'static str {
        match self {
            Self::Settings(_) => "settings",
            Self::XpTable { .. } => "xp",
            Self::ModLog { .. } => "mod_stats",
            Self::DeletedMedia { .. } => "last_deleted_media",
            Self::AfkTable(_) => "afk",
            Self::LastSeen(_) => "last_seen",
        }
    }
}

#[derive(Clone)]
pub(crate) struct PersistHandle {
    tx: mpsc::Sender<PersistReq>,
}

impl PersistHandle {
    /// Builds the handle plus the receiving end for [`run_worker`].
    pub(crate) fn pair(depth: usize) -> (Self, mpsc::Receiver<PersistReq>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Enqueues a snapshot without blocking. A full queue drops the snapshot:
    /// a later mutation of the same table will enqueue a fresher one.
    pub(crate) fn enqueue(&self, req: PersistReq) {
        let kind = req.kind();
        if let Err(e) = self.tx.try_send(req) {
            warn!(kind, error = %e, "write-through queue rejected snapshot; keeping in-memory state only");
        }
    }
}

pub(crate) async fn run_worker(pool: SqlitePool, mut rx: mpsc::Receiver<PersistReq>) {
    while let Some(req) = rx.recv().await {
        let kind = req.kind();
        if let Err(e) = apply(&pool, req).await {
            warn!(kind, error = %e, "write-through failed; in-memory state is ahead of the store");
        }
    }
}

async fn apply(pool: &SqlitePool, req: PersistReq) -> Result<(), sqlx::Error> {
    match req {
        PersistReq::Settings(rows) => db::replace_settings(pool, &rows).await,
        PersistReq::XpTable { guild_id, rows } => db::replace_xp(pool, guild_id, &rows).await,
        PersistReq::ModLog { guild_id, rows } => db::replace_mod_stats(pool, guild_id, &rows).await,
        PersistReq::DeletedMedia { guild_id, rows } => {
            db::replace_deleted_media(pool, guild_id, &rows).await
        }
        PersistReq::AfkTable(rows) => db::replace_afk(pool, &rows).await,
        PersistReq::LastSeen(rows) => db::replace_last_seen(pool, &rows).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_applies_enqueued_snapshots() {
        let pool = db::memory_pool().await;
        let (handle, rx) = PersistHandle::pair(8);
        let worker = tokio::spawn(run_worker(pool.clone(), rx));

        handle.enqueue(PersistReq::XpTable {
            guild_id: 1,
            rows: vec![(10, 300)],
        });
        handle.enqueue(PersistReq::XpTable {
            guild_id: 1,
            rows: vec![(10, 350), (11, 40)],
        });
        drop(handle);
        worker.await.unwrap();

        let mut rows = db::load_xp(&pool, 1).await.unwrap();
        rows.sort_by_key(|r| r.user_id);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].xp, 350);
        assert_eq!(rows[1].xp, 40);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (handle, rx) = PersistHandle::pair(1);
        handle.enqueue(PersistReq::LastSeen(vec![]));
        // Queue depth is 1 and nothing drains it; this must return.
        handle.enqueue(PersistReq::LastSeen(vec![]));
        drop(rx);
        handle.enqueue(PersistReq::LastSeen(vec![]));
    }
}
