//! Statement splitting.
//!
//! Statements are separated by a single delimiter character. The splitter has no
//! notion of quoting or comments, so a delimiter inside a string literal splits
//! the statement. Dump files produced by parallel export tools never rely on that.

use crate::error::ImportError;
use std::path::Path;

/// Delimiter used between statements in dump files.
pub const STATEMENT_DELIMITER: char = ';';

/// Split raw file content into trimmed, non-empty statements, preserving order.
pub fn split_statements(content: &str, delimiter: char) -> Vec<String> {
    content
        .split(delimiter)
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a SQL file and split it into statements.
///
/// Invalid UTF-8 is replaced rather than rejected; the database decides whether
/// the resulting statement is acceptable.
pub async fn read_statements(path: &Path) -> Result<Vec<String>, ImportError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let content = String::from_utf8_lossy(&bytes);
    Ok(split_statements(&content, STATEMENT_DELIMITER))
}
