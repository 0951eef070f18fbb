use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by a statement executor.
pub type ExecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the import pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("error reading file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error discovering sql files in {}: {reason}", .directory.display())]
    Discovery { directory: PathBuf, reason: String },
    #[error("error connecting to database: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("statement {position} of {} failed: {source} (statement: {})", .path.display(), preview(.statement))]
    Statement {
        path: PathBuf,
        position: usize,
        statement: String,
        #[source]
        source: ExecError,
    },
    #[error("error importing schema file {}: {source}", .path.display())]
    SchemaPhase {
        path: PathBuf,
        #[source]
        source: Box<ImportError>,
    },
    #[error("error importing {}: {source}", .path.display())]
    DataPhase {
        path: PathBuf,
        #[source]
        source: Box<ImportError>,
    },
    #[error("import of {} lost a worker: {reason}", .path.display())]
    Worker { path: PathBuf, reason: String },
}

impl ImportError {
    pub fn discovery(directory: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ImportError::Discovery {
            directory: directory.into(),
            reason: reason.to_string(),
        }
    }

    /// The innermost statement failure, if this error was caused by one.
    pub fn statement(&self) -> Option<&str> {
        match self {
            ImportError::Statement { statement, .. } => Some(statement),
            ImportError::SchemaPhase { source, .. } | ImportError::DataPhase { source, .. } => {
                source.statement()
            }
            _ => None,
        }
    }
}

const PREVIEW_CHARS: usize = 120;

fn preview(statement: &str) -> String {
    if statement.chars().count() <= PREVIEW_CHARS {
        return statement.to_string();
    }
    let head: String = statement.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Reasons a file name pattern is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern '{0}' must match file names, not paths")]
    ContainsSeparator(String),
    #[error("pattern '{0}' ends with a dangling escape")]
    DanglingEscape(String),
    #[error("pattern '{0}' has an empty class")]
    EmptyClass(String),
    #[error("pattern '{0}' has an unclosed '['")]
    UnclosedClass(String),
    #[error("pattern '{0}' has an incomplete range")]
    IncompleteRange(String),
    #[error("pattern '{pattern}' has a reversed range {lo}-{hi}")]
    ReversedRange { pattern: String, lo: char, hi: char },
    #[error("invalid pattern '{pattern}': {reason}")]
    Regex { pattern: String, reason: String },
}

/// Errors raised while assembling the loader configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load ini file {}: {source}", .path.display())]
    IniFile {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
