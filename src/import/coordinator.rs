//! Import coordination.
//!
//! Single files go straight to the worker pool. Directory imports run in two
//! phases: schema files one at a time in lexical order, then data files fanned
//! out with at most `workers` files in flight, each with its own worker pool.

use crate::db::StatementExecutor;
use crate::error::ImportError;
use crate::import::data_structures::SqlFile;
use crate::import::discovery::discover_files;
use crate::import::progress::{LogProgress, ProgressSink};
use crate::import::splitter::read_statements;
use crate::import::stats::ImportStats;
use crate::import::worker_pool::{ImportSettings, execute_statements};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Loads SQL files through a shared statement executor.
pub struct Importer<E> {
    executor: Arc<E>,
    settings: ImportSettings,
    progress: Arc<dyn ProgressSink>,
}

impl<E> Clone for Importer<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            settings: self.settings,
            progress: self.progress.clone(),
        }
    }
}

impl<E: StatementExecutor> Importer<E> {
    pub fn new(executor: Arc<E>, settings: ImportSettings) -> Self {
        Self {
            executor,
            settings,
            progress: Arc::new(LogProgress::new()),
        }
    }

    /// Replace the default logging progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import a single SQL file.
    pub async fn import_file(&self, path: &Path) -> Result<ImportStats, ImportError> {
        let statements = read_statements(path).await?;
        log::info!(
            "found {} statements to process in {}",
            statements.len(),
            path.display()
        );

        execute_statements(
            &self.executor,
            &self.settings,
            Arc::from(path),
            statements,
            self.progress.as_ref(),
        )
        .await
    }

    /// Import every schema file, then every data file, of a dump directory.
    ///
    /// A failing schema file stops the import before any data file starts. A
    /// failing data file stops further data files from being dispatched; files
    /// already running finish, and the first failure is returned afterwards.
    pub async fn import_directory(
        &self,
        directory: &Path,
        pattern: &str,
    ) -> Result<ImportStats, ImportError> {
        let files = discover_files(directory, pattern)?;
        let (schema_files, data_files): (Vec<SqlFile>, Vec<SqlFile>) =
            files.into_iter().partition(|file| file.is_schema);

        log::info!(
            "found {} files to process ({} schema, {} data)",
            schema_files.len() + data_files.len(),
            schema_files.len(),
            data_files.len()
        );

        let mut stats = ImportStats::default();
        for file in &schema_files {
            log::info!("importing schema file: {}", file.label());
            let file_stats =
                self.import_file(&file.path)
                    .await
                    .map_err(|source| ImportError::SchemaPhase {
                        path: file.path.clone(),
                        source: Box::new(source),
                    })?;
            stats.merge(file_stats);
        }

        stats.merge(self.import_data_files(directory, data_files).await?);
        Ok(stats)
    }

    async fn import_data_files(
        &self,
        directory: &Path,
        files: Vec<SqlFile>,
    ) -> Result<ImportStats, ImportError> {
        let total = files.len();
        let slots = Arc::new(Semaphore::new(self.settings.effective_workers()));
        let failed = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for file in files {
            let permit = tokio::select! {
                biased;
                _ = failed.cancelled() => break,
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let importer = self.clone();
            let failed = failed.clone();
            tasks.spawn(async move {
                let _permit = permit;
                log::info!("importing data file: {}", file.label());

                let result = importer.import_file(&file.path).await.map_err(|source| {
                    ImportError::DataPhase {
                        path: file.path.clone(),
                        source: Box::new(source),
                    }
                });
                if let Err(err) = &result {
                    log::error!("{}", err);
                    failed.cancel();
                }
                result
            });
        }

        let dispatched = tasks.len();
        if dispatched < total {
            log::warn!(
                "{} of {} data files not started after an earlier failure",
                total - dispatched,
                total
            );
        }

        let mut stats = ImportStats::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|err| {
                Err(ImportError::Worker {
                    path: directory.to_path_buf(),
                    reason: err.to_string(),
                })
            });

            match result {
                Ok(file_stats) => stats.merge(file_stats),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(err) => log::debug!("additional data file failure: {}", err),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}
