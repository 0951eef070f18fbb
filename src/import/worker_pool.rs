//! Per-file statement execution.
//!
//! One producer task feeds a bounded job queue, a fixed number of worker tasks
//! drain it concurrently, and the calling task collects results as they arrive.
//! The first failed statement cancels the file: the producer stops enqueueing,
//! idle workers stop claiming, and statements already running are left to finish.
//! Nothing that already executed is rolled back.

use crate::db::StatementExecutor;
use crate::error::ImportError;
use crate::import::data_structures::{ImportJob, JobResult, file_label};
use crate::import::progress::ProgressSink;
use crate::import::stats::ImportStats;
use crate::import::status::{QueueGauge, spawn_status_reporter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Concurrency knobs shared by every file of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    /// Concurrent statements per file, and concurrent files in the data phase.
    pub workers: usize,
    /// Capacity of the job and result queues.
    pub channel_buffer_size: usize,
    /// Interval of the queue status log line; `None` disables it.
    pub status_interval: Option<Duration>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_buffer_size: 2000,
            status_interval: Some(Duration::from_secs(1)),
        }
    }
}

impl ImportSettings {
    pub(crate) fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    fn effective_capacity(&self) -> usize {
        self.channel_buffer_size.max(1)
    }
}

type SharedJobs = Arc<Mutex<mpsc::Receiver<ImportJob>>>;

/// Execute the statements of one file with bounded concurrency.
///
/// Returns on the first failed statement without waiting for in-flight
/// statements of the same file.
pub async fn execute_statements<E: StatementExecutor>(
    executor: &Arc<E>,
    settings: &ImportSettings,
    file: Arc<Path>,
    statements: Vec<String>,
    progress: &dyn ProgressSink,
) -> Result<ImportStats, ImportError> {
    let gauge = Arc::new(QueueGauge::new());
    execute_with_gauge(executor, settings, file, statements, progress, gauge).await
}

async fn execute_with_gauge<E: StatementExecutor>(
    executor: &Arc<E>,
    settings: &ImportSettings,
    file: Arc<Path>,
    statements: Vec<String>,
    progress: &dyn ProgressSink,
    gauge: Arc<QueueGauge>,
) -> Result<ImportStats, ImportError> {
    let label = file_label(&file);
    let total = statements.len();
    let workers = settings.effective_workers();
    let capacity = settings.effective_capacity();

    progress.begin(&label, total as u64);

    // cancelled on every exit path
    let shutdown = CancellationToken::new();
    let _shutdown_guard = shutdown.clone().drop_guard();

    if let Some(interval) = settings.status_interval.filter(|interval| !interval.is_zero()) {
        spawn_status_reporter(label.clone(), gauge.clone(), total, interval, shutdown.clone());
    }

    let (job_tx, job_rx) = mpsc::channel::<ImportJob>(capacity);
    let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(capacity);
    let jobs: SharedJobs = Arc::new(Mutex::new(job_rx));

    for worker_id in 0..workers {
        tokio::spawn(run_worker(
            worker_id,
            executor.clone(),
            jobs.clone(),
            result_tx.clone(),
            gauge.clone(),
            shutdown.clone(),
        ));
    }
    // the result channel closes once the last worker exits
    drop(result_tx);

    tokio::spawn(produce(
        file.clone(),
        statements,
        job_tx,
        gauge.clone(),
        shutdown.clone(),
    ));

    let mut stats = ImportStats::default();
    let outcome = loop {
        let Some(result) = result_rx.recv().await else {
            break Ok(());
        };

        match result.outcome {
            Ok(rows) => {
                stats.statements += 1;
                stats.rows_affected += rows;
                progress.advance(&label, 1);
            }
            Err(source) => {
                shutdown.cancel();
                log::error!(
                    "{}: statement {} failed, aborting file",
                    label,
                    result.job.position
                );
                break Err(ImportError::Statement {
                    path: file.to_path_buf(),
                    position: result.job.position,
                    statement: result.job.statement,
                    source,
                });
            }
        }
    };
    progress.finish(&label);
    outcome?;

    if stats.statements != total {
        return Err(ImportError::Worker {
            path: file.to_path_buf(),
            reason: format!(
                "{} of {} statements reported a result",
                stats.statements, total
            ),
        });
    }

    stats.files = 1;
    Ok(stats)
}

async fn produce(
    file: Arc<Path>,
    statements: Vec<String>,
    jobs: mpsc::Sender<ImportJob>,
    gauge: Arc<QueueGauge>,
    shutdown: CancellationToken,
) {
    for (position, statement) in statements.into_iter().enumerate() {
        let job = ImportJob {
            file: file.clone(),
            position,
            statement,
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            sent = jobs.send(job) => {
                if sent.is_err() {
                    return;
                }
            }
        }
        gauge.record_enqueued();
    }
}

async fn run_worker<E: StatementExecutor>(
    worker_id: usize,
    executor: Arc<E>,
    jobs: SharedJobs,
    results: mpsc::Sender<JobResult>,
    gauge: Arc<QueueGauge>,
    shutdown: CancellationToken,
) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                job = jobs.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };
        gauge.record_claimed();

        let outcome = executor.execute(&job.statement).await;
        if results.send(JobResult { job, outcome }).await.is_err() {
            break;
        }
    }

    log::trace!("worker {} exiting", worker_id);
}
