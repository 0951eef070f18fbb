//! Periodic queue status reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Counts statements put on a file's job queue and claimed from it.
#[derive(Debug, Default)]
pub struct QueueGauge {
    enqueued: AtomicUsize,
    claimed: AtomicUsize,
}

impl QueueGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claimed(&self) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Statements waiting in the queue, not yet claimed by a worker.
    pub fn pending(&self) -> usize {
        let claimed = self.claimed.load(Ordering::Relaxed);
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        enqueued.saturating_sub(claimed)
    }

    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Relaxed)
    }
}

/// Spawn the status ticker for one file.
///
/// Logs the queue depth every `interval` until `stop` is cancelled.
pub fn spawn_status_reporter(
    label: String,
    gauge: Arc<QueueGauge>,
    total: usize,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    log::info!("{}: queue {} of {}", label, gauge.pending(), total);
                }
            }
        }
    })
}
