//! Completion progress sinks.
//!
//! The collector of each file import reports one unit per executed statement.
//! Several files can be in flight at once, so every call carries the file label.

use dashmap::DashMap;

/// Receives "N more units done" events.
pub trait ProgressSink: Send + Sync {
    /// A file with `total` statements is about to start.
    fn begin(&self, _label: &str, _total: u64) {}

    /// `n` more statements of `label` completed.
    fn advance(&self, label: &str, n: u64);

    /// `label` finished, successfully or not.
    fn finish(&self, _label: &str) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _label: &str, _n: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct FileProgress {
    done: u64,
    total: u64,
    last_logged_step: u64,
}

/// Logs per-file progress every ten percent.
#[derive(Debug, Default)]
pub struct LogProgress {
    files: DashMap<String, FileProgress>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed statements of a file that has not finished yet.
    pub fn completed(&self, label: &str) -> Option<u64> {
        self.files.get(label).map(|entry| entry.done)
    }
}

impl ProgressSink for LogProgress {
    fn begin(&self, label: &str, total: u64) {
        log::info!("{}: {} statements to process", label, total);
        self.files.insert(
            label.to_string(),
            FileProgress {
                total,
                ..Default::default()
            },
        );
    }

    fn advance(&self, label: &str, n: u64) {
        let Some(mut entry) = self.files.get_mut(label) else {
            return;
        };
        entry.done += n;
        if entry.total == 0 {
            return;
        }

        let step = entry.done.saturating_mul(10) / entry.total;
        if step > entry.last_logged_step {
            entry.last_logged_step = step;
            log::info!(
                "{}: {}/{} statements ({}%)",
                label,
                entry.done,
                entry.total,
                (step * 10).min(100)
            );
        }
    }

    fn finish(&self, label: &str) {
        if let Some((_, progress)) = self.files.remove(label) {
            log::debug!(
                "{}: finished after {}/{} statements",
                label,
                progress.done,
                progress.total
            );
        }
    }
}
