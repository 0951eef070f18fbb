pub mod config;
pub mod db;
pub mod error;
pub mod import;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialise `env_logger` once; `RUST_LOG` overrides the default filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn"))
            .format_timestamp(None)
            .init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::db::StatementExecutor;
    use crate::error::ExecError;
    use crate::import::ProgressSink;
    use dashmap::DashMap;
    use parking_lot::Mutex;
    use std::future::Future;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    pub use database::{TestDatabase, TestDatabaseError};

    /// Start or end of one statement execution, in the order they happened.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ExecEvent {
        Started(String),
        Finished(String),
    }

    /// In-memory executor that records every statement it is asked to run.
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        events: Mutex<Vec<ExecEvent>>,
        fail_on: Vec<String>,
        panic_on: Vec<String>,
        delay: Option<Duration>,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail every statement containing `needle`.
        pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
            self.fail_on.push(needle.into());
            self
        }

        /// Panic inside the executing task on every statement containing `needle`.
        pub fn panicking_on(mut self, needle: impl Into<String>) -> Self {
            self.panic_on.push(needle.into());
            self
        }

        /// Hold every statement for `delay` before it completes.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn events(&self) -> Vec<ExecEvent> {
            self.events.lock().clone()
        }

        /// Statements in the order their execution started.
        pub fn executed(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|event| match event {
                    ExecEvent::Started(statement) => Some(statement.clone()),
                    ExecEvent::Finished(_) => None,
                })
                .collect()
        }

        /// Most statements selected by `filter` that were running at once.
        pub fn peak_running(&self, filter: impl Fn(&str) -> bool) -> usize {
            let mut running = 0usize;
            let mut peak = 0;
            for event in self.events.lock().iter() {
                match event {
                    ExecEvent::Started(statement) if filter(statement) => {
                        running += 1;
                        peak = peak.max(running);
                    }
                    ExecEvent::Finished(statement) if filter(statement) => {
                        running = running.saturating_sub(1);
                    }
                    _ => {}
                }
            }
            peak
        }

        /// How many times `statement` was started.
        pub fn attempts(&self, statement: &str) -> usize {
            self.executed().iter().filter(|s| s.as_str() == statement).count()
        }
    }

    impl StatementExecutor for RecordingExecutor {
        fn execute(&self, statement: &str) -> impl Future<Output = Result<u64, ExecError>> + Send {
            self.events
                .lock()
                .push(ExecEvent::Started(statement.to_string()));
            let fails = self.fail_on.iter().any(|needle| statement.contains(needle));
            let panics = self.panic_on.iter().any(|needle| statement.contains(needle));
            let delay = self.delay;
            let statement = statement.to_string();

            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if panics {
                    panic!("simulated crash: {statement}");
                }
                self.events
                    .lock()
                    .push(ExecEvent::Finished(statement.clone()));
                let outcome: Result<u64, ExecError> = if fails {
                    Err(format!("simulated failure: {statement}").into())
                } else {
                    Ok(1)
                };
                outcome
            }
        }
    }

    /// Progress sink that counts events per label.
    #[derive(Debug, Default)]
    pub struct CountingProgress {
        advanced: AtomicU64,
        per_label: DashMap<String, u64>,
        begun: DashMap<String, u64>,
    }

    impl CountingProgress {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn total_advanced(&self) -> u64 {
            self.advanced.load(Ordering::SeqCst)
        }

        pub fn advanced(&self, label: &str) -> u64 {
            self.per_label.get(label).map(|count| *count).unwrap_or(0)
        }

        /// Statement total announced for `label`, if the file started.
        pub fn announced_total(&self, label: &str) -> Option<u64> {
            self.begun.get(label).map(|total| *total)
        }
    }

    impl ProgressSink for CountingProgress {
        fn begin(&self, label: &str, total: u64) {
            self.begun.insert(label.to_string(), total);
        }

        fn advance(&self, label: &str, n: u64) {
            self.advanced.fetch_add(n, Ordering::SeqCst);
            *self.per_label.entry(label.to_string()).or_insert(0) += n;
        }
    }

    pub mod database {
        use log::LevelFilter;
        use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
        use sqlx::{ConnectOptions, Executor};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        /// Set to `1` to provision a disposable MySQL container when
        /// `TEST_DATABASE_URL` is not set.
        pub const CONTAINER_ENV: &str = "BULKLOAD_TEST_CONTAINERS";

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<MySqlPool>,
            admin_options: MySqlConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            /// Provision a fresh database on `TEST_DATABASE_URL`, or in a
            /// container when [`CONTAINER_ENV`] is `1`.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::with_admin_url(&url, None).await;
                }
                if std::env::var(CONTAINER_ENV).is_ok_and(|value| value == "1") {
                    return Self::new().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            /// Provision a fresh database by launching a disposable MySQL container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                // the entrypoint's bootstrap server listens on port 0; wait for the real one
                let image = GenericImage::new("mysql", "8.0").with_wait_for(
                    WaitFor::message_on_stderr("port: 3306  MySQL Community Server"),
                );

                let container = image
                    .with_env_var("MYSQL_ROOT_PASSWORD", "bulkload")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(3306).await?;
                let admin_url = format!("mysql://root:bulkload@{}:{}/mysql", host, port);

                Self::with_admin_url(&admin_url, Some(container)).await
            }

            async fn with_admin_url(
                admin_url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let admin_options: MySqlConnectOptions = admin_url.parse()?;
                let admin_options = admin_options.log_statements(LevelFilter::Off);

                let admin_pool = MySqlPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("bulkload_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE `{}`", database_name);
                admin_pool.execute(create_sql.as_str()).await?;
                admin_pool.close().await;

                let pool = MySqlPoolOptions::new()
                    .max_connections(16)
                    .connect_with(admin_options.clone().database(&database_name))
                    .await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    container,
                })
            }

            /// Cloneable connection pool bound to the fresh database.
            pub fn pool(&self) -> &MySqlPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> MySqlPool {
                self.pool().clone()
            }

            pub fn database_name(&self) -> &str {
                &self.database_name
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: MySqlConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = MySqlPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_sql = format!("DROP DATABASE IF EXISTS `{}`", database_name);
            admin_pool.execute(drop_sql.as_str()).await?;
            admin_pool.close().await;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database(admin_options, &db_name).await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }
}
