//! Values passed between the stages of an import.

use crate::error::ExecError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A SQL file found during directory discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFile {
    pub path: PathBuf,
    /// `true` for table definition files, which run before any data file.
    pub is_schema: bool,
}

impl SqlFile {
    pub fn new(path: impl Into<PathBuf>, is_schema: bool) -> Self {
        Self {
            path: path.into(),
            is_schema,
        }
    }

    /// File name used in log lines and progress labels.
    pub fn label(&self) -> String {
        file_label(&self.path)
    }
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One statement waiting in a file's job queue.
#[derive(Debug, Clone)]
pub struct ImportJob {
    /// Originating file; shared by every job of that file.
    pub file: Arc<Path>,
    /// 0-based position of the statement in its file.
    pub position: usize,
    pub statement: String,
}

/// Outcome of executing one [`ImportJob`].
#[derive(Debug)]
pub struct JobResult {
    pub job: ImportJob,
    /// Rows affected on success.
    pub outcome: Result<u64, ExecError>,
}
