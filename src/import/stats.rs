//! Import statistics tracking.

/// Counters for a file or directory import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Number of files fully imported
    pub files: usize,
    /// Number of statements executed successfully
    pub statements: usize,
    /// Rows affected as reported by the database
    pub rows_affected: u64,
}

impl ImportStats {
    /// Merge another ImportStats into this one by summing all counts.
    pub fn merge(&mut self, other: ImportStats) {
        self.files += other.files;
        self.statements += other.statements;
        self.rows_affected += other.rows_affected;
    }
}
