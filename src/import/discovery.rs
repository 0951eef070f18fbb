//! SQL file discovery and ordering.
//!
//! A dump directory holds table definition files (`*-definition.sql`) and data
//! files split per export thread (`*-thread<N>.sql`). Definition files are always
//! picked up, whatever pattern the caller passes, and always run first.

use crate::error::{ImportError, PatternError};
use crate::import::data_structures::SqlFile;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default pattern for data files.
pub const DEFAULT_DATA_PATTERN: &str = "*-thread*.sql";

/// Pattern that always selects schema files.
pub const SCHEMA_PATTERN: &str = "*-definition.sql";

/// Marker in a file name that classifies it as a schema file.
pub const SCHEMA_MARKER: &str = "-definition";

/// Shell-style file name pattern.
///
/// Supports `*`, `?`, bracket classes (`[abc]`, `[a-z]`, negated with `^` or `!`)
/// and `\` escapes. Wildcards never match a path separator.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.contains('/') {
            return Err(PatternError::ContainsSeparator(pattern.to_string()));
        }

        let translated = translate(pattern)?;
        let regex = Regex::new(&translated).map_err(|e| PatternError::Regex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn translate(pattern: &str) -> Result<String, PatternError> {
    let dangling = || PatternError::DanglingEscape(pattern.to_string());
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars.next().ok_or_else(dangling)?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                let mut class = String::from("[");
                let negated = matches!(chars.peek(), Some('^') | Some('!'));
                if negated {
                    chars.next();
                    class.push('^');
                }

                let mut items = 0;
                loop {
                    let lo = match chars.next() {
                        Some(']') if items > 0 => break,
                        Some(']') => return Err(PatternError::EmptyClass(pattern.to_string())),
                        Some('\\') => chars.next().ok_or_else(dangling)?,
                        Some(c) => c,
                        None => return Err(PatternError::UnclosedClass(pattern.to_string())),
                    };
                    class.push_str(&regex::escape(&lo.to_string()));
                    items += 1;

                    if chars.peek() == Some(&'-') {
                        chars.next();
                        let hi = match chars.next() {
                            Some('\\') => chars.next().ok_or_else(dangling)?,
                            Some(']') | None => {
                                return Err(PatternError::IncompleteRange(pattern.to_string()));
                            }
                            Some(c) => c,
                        };
                        if hi < lo {
                            return Err(PatternError::ReversedRange {
                                pattern: pattern.to_string(),
                                lo,
                                hi,
                            });
                        }
                        class.push('-');
                        class.push_str(&regex::escape(&hi.to_string()));
                    }
                }

                if negated {
                    // negated classes still never match a separator
                    class.push('/');
                }
                class.push(']');
                out.push_str(&class);
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

/// Whether a file name follows the schema naming convention.
pub fn is_schema_name(name: &str) -> bool {
    name.contains(SCHEMA_MARKER)
}

/// Find the files of a dump directory and return them in import order.
///
/// The result is the union of files matching `pattern` and files matching
/// [`SCHEMA_PATTERN`], each path listed once.
pub fn discover_files(directory: &Path, pattern: &str) -> Result<Vec<SqlFile>, ImportError> {
    let data_glob = GlobPattern::new(pattern).map_err(|e| ImportError::discovery(directory, e))?;
    let schema_glob =
        GlobPattern::new(SCHEMA_PATTERN).map_err(|e| ImportError::discovery(directory, e))?;

    let entries = std::fs::read_dir(directory).map_err(|e| ImportError::discovery(directory, e))?;

    let mut found: BTreeMap<PathBuf, bool> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| ImportError::discovery(directory, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| ImportError::discovery(directory, e))?;
        if file_type.is_dir() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            log::warn!("skipping non UTF-8 file name {:?}", file_name);
            continue;
        };

        if schema_glob.matches(name) || data_glob.matches(name) {
            found.insert(entry.path(), is_schema_name(name));
        }
    }

    let mut files: Vec<SqlFile> = found
        .into_iter()
        .map(|(path, is_schema)| SqlFile::new(path, is_schema))
        .collect();
    order_files(&mut files);

    log::debug!(
        "discovered {} files in {} (pattern '{}')",
        files.len(),
        directory.display(),
        data_glob.as_str()
    );
    Ok(files)
}

/// Schema files first, then data files; lexical path order within each class.
pub fn order_files(files: &mut [SqlFile]) {
    files.sort_by(|a, b| b.is_schema.cmp(&a.is_schema).then_with(|| a.path.cmp(&b.path)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "SELECT 1;").expect("write fixture");
    }

    fn names(files: &[SqlFile]) -> Vec<(String, bool)> {
        files.iter().map(|f| (f.label(), f.is_schema)).collect()
    }

    #[test]
    fn glob_wildcards() {
        let glob = GlobPattern::new("*-thread*.sql").expect("valid");
        assert!(glob.matches("shop.orders-thread1.sql"));
        assert!(glob.matches("-thread.sql"));
        assert!(!glob.matches("shop.orders-definition.sql"));
        assert!(!glob.matches("shop.orders-thread1.sql.gz"));

        let glob = GlobPattern::new("part-?.sql").expect("valid");
        assert!(glob.matches("part-1.sql"));
        assert!(!glob.matches("part-12.sql"));
    }

    #[test]
    fn glob_classes_and_escapes() {
        let glob = GlobPattern::new("t[0-2].sql").expect("valid");
        assert!(glob.matches("t1.sql"));
        assert!(!glob.matches("t3.sql"));

        let glob = GlobPattern::new("t[!0-2].sql").expect("valid");
        assert!(glob.matches("t3.sql"));
        assert!(!glob.matches("t0.sql"));

        let glob = GlobPattern::new(r"a\*.sql").expect("valid");
        assert!(glob.matches("a*.sql"));
        assert!(!glob.matches("ab.sql"));

        let glob = GlobPattern::new("a.sql").expect("valid");
        assert!(!glob.matches("axsql"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for pattern in ["t[0-2.sql", "[]", "trailing\\", "t[z-a].sql", "", "sub/*.sql"] {
            assert!(GlobPattern::new(pattern).is_err(), "{pattern} should be rejected");
        }
    }

    #[test]
    fn pattern_errors_name_the_defect() {
        let reject = |pattern: &str| GlobPattern::new(pattern).expect_err("rejected");

        assert_eq!(reject(""), PatternError::Empty);
        assert_eq!(
            reject("sub/*.sql"),
            PatternError::ContainsSeparator("sub/*.sql".into())
        );
        assert_eq!(reject("t[0-2.sql"), PatternError::UnclosedClass("t[0-2.sql".into()));
        assert_eq!(reject("[]"), PatternError::EmptyClass("[]".into()));
        assert_eq!(reject("t[0-].sql"), PatternError::IncompleteRange("t[0-].sql".into()));
        assert_eq!(reject("trailing\\"), PatternError::DanglingEscape("trailing\\".into()));
        assert_eq!(
            reject("t[z-a].sql"),
            PatternError::ReversedRange {
                pattern: "t[z-a].sql".into(),
                lo: 'z',
                hi: 'a',
            }
        );
    }

    #[test]
    fn discovers_schema_files_regardless_of_pattern() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "shop.orders-thread2.sql");
        touch(dir.path(), "shop.orders-definition.sql");
        touch(dir.path(), "shop.items-thread1.sql");
        touch(dir.path(), "shop.items-definition.sql");
        touch(dir.path(), "notes.txt");

        let files = discover_files(dir.path(), DEFAULT_DATA_PATTERN).expect("discovery");
        assert_eq!(
            names(&files),
            vec![
                ("shop.items-definition.sql".to_string(), true),
                ("shop.orders-definition.sql".to_string(), true),
                ("shop.items-thread1.sql".to_string(), false),
                ("shop.orders-thread2.sql".to_string(), false),
            ]
        );
    }

    #[test]
    fn file_matching_both_is_schema_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "a-definition.sql");
        touch(dir.path(), "a-thread1.sql");

        let files = discover_files(dir.path(), "*.sql").expect("discovery");
        assert_eq!(
            names(&files),
            vec![
                ("a-definition.sql".to_string(), true),
                ("a-thread1.sql".to_string(), false),
            ]
        );
    }

    #[test]
    fn classification_partitions_discovered_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "a-definition.sql",
            "b-definition.sql",
            "a-thread1.sql",
            "a-thread2.sql",
            "b-thread1.sql",
            "c.sql",
        ] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested-thread1.sql")).expect("subdir");

        let files = discover_files(dir.path(), "*.sql").expect("discovery");
        let unique: HashSet<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(unique.len(), files.len());
        assert_eq!(files.len(), 6);

        let schema = files.iter().filter(|f| f.is_schema).count();
        let data = files.iter().filter(|f| !f.is_schema).count();
        assert_eq!(schema, 2);
        assert_eq!(data, 4);

        let first_data = files.iter().position(|f| !f.is_schema).expect("data present");
        assert!(files[..first_data].iter().all(|f| f.is_schema));
        assert!(files[first_data..].iter().all(|f| !f.is_schema));
    }

    #[test]
    fn unreadable_directory_is_discovery_error() {
        let err = discover_files(Path::new("/no/such/dump/dir"), DEFAULT_DATA_PATTERN)
            .expect_err("missing directory");
        assert!(matches!(err, ImportError::Discovery { .. }));
    }

    #[test]
    fn malformed_pattern_is_discovery_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = discover_files(dir.path(), "*-thread[.sql").expect_err("bad pattern");
        assert!(matches!(err, ImportError::Discovery { .. }));
    }

    #[test]
    fn order_puts_schema_first_then_lexical() {
        let mut files = vec![
            SqlFile::new("/d/b-thread1.sql", false),
            SqlFile::new("/d/z-definition.sql", true),
            SqlFile::new("/d/a-thread1.sql", false),
            SqlFile::new("/d/a-definition.sql", true),
        ];
        order_files(&mut files);

        let paths: Vec<_> = files.iter().map(|f| f.path.to_string_lossy().into_owned()).collect();
        assert_eq!(
            paths,
            vec![
                "/d/a-definition.sql",
                "/d/z-definition.sql",
                "/d/a-thread1.sql",
                "/d/b-thread1.sql",
            ]
        );
    }
}
