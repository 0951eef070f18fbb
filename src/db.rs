use crate::config::LoaderConfig;
use crate::error::{ExecError, ImportError};
use sqlx::Executor;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::future::Future;

/// Executes one SQL statement outside any explicit transaction.
///
/// Implementations are shared by every worker of every file being imported, so
/// they must be safe to call concurrently.
pub trait StatementExecutor: Send + Sync + 'static {
    /// Run `statement`, returning the number of rows affected.
    fn execute(&self, statement: &str) -> impl Future<Output = Result<u64, ExecError>> + Send;
}

impl StatementExecutor for MySqlPool {
    fn execute(&self, statement: &str) -> impl Future<Output = Result<u64, ExecError>> + Send {
        let pool = self.clone();
        let statement = statement.to_owned();
        async move {
            // a bare &str has no arguments, so it goes through the text protocol,
            // which accepts statements the prepared protocol rejects
            let result = Executor::execute(&pool, statement.as_str()).await?;
            Ok::<_, ExecError>(result.rows_affected())
        }
    }
}

/// Open the shared connection pool.
///
/// Directory imports nest a worker pool inside each in-flight data file, so the
/// pool is sized to give every nested worker its own connection.
pub async fn connect(config: &LoaderConfig) -> Result<MySqlPool, ImportError> {
    let max_connections = config.max_connections();
    log::info!(
        "connecting to {} (pool size {})",
        config.redacted_url(),
        max_connections
    );

    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(config.connect_options())
        .await
        .map_err(ImportError::Connection)
}
