use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;

use super::service::FileService;

/// Purges trashed files once their retention window has passed.
#[derive(Clone)]
pub struct TrashSweeper {
    files: Arc<FileService>,
    every: Duration,
}

impl TrashSweeper {
    pub fn new(files: Arc<FileService>, every: Duration) -> Self {
        Self { files, every }
    }

    /// Sweeps at start and then every `every` until `shutdown` turns true.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.every);

            loop {
                tokio::select! {
                    _ = sweep_interval.tick() => {
                        self.sweep().await;
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            tracing::debug!("Trash sweeper stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    #[tracing::instrument(skip(self), fields(cleanup.operation = "trash"))]
    async fn sweep(&self) -> usize {
        let started = std::time::Instant::now();
        let purged = self.files.purge_expired(Utc::now()).await;

        if purged > 0 {
            tracing::info!(
                purged,
                duration_ms = started.elapsed().as_millis() as u64,
                "Expired files purged from trash"
            );
        } else {
            tracing::debug!("Nothing to purge");
        }
        purged
    }
}
