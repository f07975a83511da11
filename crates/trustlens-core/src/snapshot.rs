//! Codebase snapshots - the raw input of an analysis run
//!
//! A snapshot is an ordered list of file records. Content is either held
//! inline or referenced on disk and read lazily by the feature extractor,
//! which is the only component that ever sees it.

use crate::extraction::language::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never worth scanning
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
];

/// Settings for loading and extracting a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Files larger than this are recorded as skipped
    pub max_file_bytes: u64,

    /// Directory names pruned during the walk
    pub ignored_dirs: Vec<String>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Where a file's text lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Text already in memory
    Inline(String),

    /// Path on disk, read during extraction
    Reference(PathBuf),

    /// Not read at all (size limit)
    Skipped { reason: String },
}

/// A single file of the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Repository-relative path with forward slashes
    pub path: String,
    pub language: Language,
    /// Zero until known (references are counted at extraction)
    pub line_count: usize,
    pub content: FileContent,
}

impl FileRecord {
    pub fn inline(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let content = content.into();
        Self {
            language: Language::from_path(&path),
            line_count: content.lines().count(),
            path,
            content: FileContent::Inline(content),
        }
    }

    pub fn reference(path: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        let path = normalize_path(&path.into());
        Self {
            language: Language::from_path(&path),
            line_count: 0,
            path,
            content: FileContent::Reference(location.into()),
        }
    }

    pub fn skipped(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        Self {
            language: Language::from_path(&path),
            line_count: 0,
            path,
            content: FileContent::Skipped {
                reason: reason.into(),
            },
        }
    }
}

/// Ordered collection of files handed to the extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodebaseSnapshot {
    pub files: Vec<FileRecord>,
    /// Problems met while acquiring the source (unreachable root, walk errors)
    pub source_errors: Vec<String>,
}

impl CodebaseSnapshot {
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self {
            files,
            source_errors: Vec::new(),
        }
    }

    /// Snapshot standing in for a source that could not be acquired
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            source_errors: vec![reason.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Walk a local checkout. Never fails: problems are recorded in
    /// `source_errors` and surface later as an extraction-incomplete flag.
    pub fn from_directory(root: &Path, settings: &ExtractorSettings) -> Self {
        if !root.is_dir() {
            return Self::unreadable(format!("{} is not a readable directory", root.display()));
        }

        let mut snapshot = Self::default();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !is_ignored_dir(entry.file_name().to_string_lossy().as_ref(), settings)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    snapshot.source_errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > settings.max_file_bytes {
                snapshot.files.push(FileRecord::skipped(
                    relative,
                    format!("{} bytes exceeds limit of {}", size, settings.max_file_bytes),
                ));
            } else {
                snapshot
                    .files
                    .push(FileRecord::reference(relative, entry.path().to_path_buf()));
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = snapshot.files.len(),
            errors = snapshot.source_errors.len(),
            "Loaded codebase snapshot"
        );

        snapshot
    }
}

fn is_ignored_dir(name: &str, settings: &ExtractorSettings) -> bool {
    (name.starts_with('.') && name.len() > 1) || settings.ignored_dirs.iter().any(|d| d == name)
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_inline_record_counts_lines() {
        let record = FileRecord::inline("./src\\app.py", "import os\n\nprint(1)\n");
        assert_eq!(record.path, "src/app.py");
        assert_eq!(record.language, Language::Python);
        assert_eq!(record.line_count, 3);
    }

    #[test]
    fn test_from_directory_prunes_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main.py"), "print('hi')\n").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x()\n").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref\n").unwrap();

        let snapshot = CodebaseSnapshot::from_directory(dir.path(), &ExtractorSettings::default());

        let paths: Vec<_> = snapshot.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.py"]);
        assert!(snapshot.source_errors.is_empty());
    }

    #[test]
    fn test_from_directory_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.js"), "a".repeat(64)).unwrap();
        let settings = ExtractorSettings {
            max_file_bytes: 16,
            ..ExtractorSettings::default()
        };

        let snapshot = CodebaseSnapshot::from_directory(dir.path(), &settings);

        assert!(matches!(snapshot.files[0].content, FileContent::Skipped { .. }));
    }

    #[test]
    fn test_missing_root_is_recorded_not_raised() {
        let snapshot = CodebaseSnapshot::from_directory(
            Path::new("/definitely/not/here"),
            &ExtractorSettings::default(),
        );
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.source_errors.len(), 1);
    }
}
