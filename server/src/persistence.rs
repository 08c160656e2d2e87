//! Best-effort, non-blocking grid persistence
//!
//! The coordinator publishes a snapshot after every successful capture and
//! returns immediately. A background task writes the most recent snapshot on
//! a blocking thread; snapshots published while a write is in flight are
//! coalesced, since only the latest grid matters. Write failures are logged
//! and never reach the coordinator or any client.

use crate::grid_store::save_snapshot;
use log::{debug, error, info};
use shared::Cell;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub type Snapshot = Arc<Vec<Cell>>;
pub type SnapshotReceiver = watch::Receiver<Option<Snapshot>>;

/// Handle used by the coordinator to request a save
pub struct SnapshotWriter {
    tx: watch::Sender<Option<Snapshot>>,
}

impl SnapshotWriter {
    /// Creates a writer and the receiver its snapshot task consumes
    pub fn channel() -> (Self, SnapshotReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Hands the snapshot to the writer task without waiting for the disk.
    pub fn publish(&self, snapshot: Snapshot) {
        // send_replace succeeds even when the task has gone away
        self.tx.send_replace(Some(snapshot));
    }
}

/// Spawns the task that writes published snapshots to `path`.
///
/// The task ends once the [`SnapshotWriter`] is dropped, after flushing the
/// last snapshot it has not written yet.
pub fn spawn_snapshot_task(path: PathBuf, mut rx: SnapshotReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_written: Option<Snapshot> = None;

        loop {
            let closed = rx.changed().await.is_err();
            let latest = rx.borrow_and_update().clone();

            if let Some(cells) = latest {
                let already_written = last_written
                    .as_ref()
                    .is_some_and(|prev| Arc::ptr_eq(prev, &cells));
                if !already_written {
                    write_snapshot(path.clone(), Arc::clone(&cells)).await;
                    last_written = Some(cells);
                }
            }

            if closed {
                break;
            }
        }

        info!("Snapshot writer stopped");
    })
}

async fn write_snapshot(path: PathBuf, cells: Snapshot) {
    let display = path.display().to_string();
    let result = tokio::task::spawn_blocking(move || save_snapshot(&path, &cells)).await;

    match result {
        Ok(Ok(())) => debug!("Saved grid state to {}", display),
        Ok(Err(e)) => error!("Failed to save grid state to {}: {}", display, e),
        Err(e) => error!("Grid state save task failed: {}", e),
    }
}
