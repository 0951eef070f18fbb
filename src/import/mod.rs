//! Parallel SQL file import.
//!
//! This module loads dump files into the database as fast as the connection
//! pool allows, trading atomicity for speed:
//!
//! 1. **Splitting** (`splitter`) - Turns file content into `;`-separated statements
//! 2. **Discovery** (`discovery`) - Finds schema and data files and orders them
//! 3. **Worker pool** (`worker_pool`) - Executes one file's statements concurrently
//! 4. **Coordination** (`coordinator`) - Schema phase, then bounded data-file fan-out
//! 5. **Reporting** (`progress`, `status`, `stats`) - Progress events, queue depth, counters
//!
//! # Ordering
//!
//! Every schema file finishes before the first data file starts. Nothing else is
//! ordered: data files run side by side, and statements of one file race each
//! other across workers.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use sql_bulk_loader::import::{Importer, ImportSettings};
//!
//! let importer = Importer::new(Arc::new(pool), ImportSettings::default());
//! let stats = importer.import_directory(Path::new("dump"), "*-thread*.sql").await?;
//!
//! println!("Executed {} statements", stats.statements);
//! ```

pub mod coordinator;
pub mod data_structures;
pub mod discovery;
pub mod progress;
pub mod splitter;
pub mod stats;
pub mod status;
pub mod worker_pool;

// Re-export main types
pub use coordinator::Importer;
pub use data_structures::{ImportJob, JobResult, SqlFile};
pub use discovery::{DEFAULT_DATA_PATTERN, SCHEMA_PATTERN, discover_files};
pub use progress::{LogProgress, NoopProgress, ProgressSink};
pub use stats::ImportStats;
pub use worker_pool::ImportSettings;
