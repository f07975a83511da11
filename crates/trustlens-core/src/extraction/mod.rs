//! Feature extraction
//!
//! Turns a [`CodebaseSnapshot`] into a [`FeatureSet`]. Extraction never
//! fails: unreadable input degrades the set and marks it incomplete.

pub mod language;
pub mod structure;
pub mod tagging;

use crate::features::{
    AggregateMetrics, FeatureSet, FileMetrics, LineRange, Snippet, SnippetPool,
};
use crate::error::TrustlensError;
use crate::snapshot::{CodebaseSnapshot, ExtractorSettings, FileContent, FileRecord};
use std::fs;
use structure::{BlockKind, FileStructure};

/// What a file record turned out to hold
enum Loaded {
    Text(String),
    Binary,
    Skipped(String),
    Unreadable(String),
}

/// Deterministic, LLM-free feature extractor
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    settings: ExtractorSettings,
}

impl FeatureExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Extract the feature set of a snapshot
    pub fn extract(&self, snapshot: &CodebaseSnapshot) -> FeatureSet {
        let mut hasher = blake3::Hasher::new();
        let mut metrics = AggregateMetrics {
            total_files: snapshot.files.len(),
            ..Default::default()
        };
        let mut files = Vec::new();
        let mut snippets = SnippetPool::new();
        let mut reasons: Vec<String> = snapshot
            .source_errors
            .iter()
            .map(|e| input_issue(format!("source error: {}", e)))
            .collect();

        if snapshot.is_empty() {
            reasons.push(input_issue("snapshot contains no files"));
        }

        for record in &snapshot.files {
            hasher.update(record.path.as_bytes());
            hasher.update(&[0]);

            match self.load(record) {
                Loaded::Text(text) => {
                    hasher.update(text.as_bytes());
                    let line_count = text.lines().count();
                    metrics.total_lines += line_count;
                    *metrics.files_by_language.entry(record.language).or_default() += 1;
                    *metrics.lines_by_language.entry(record.language).or_default() += line_count;

                    if record.language.is_supported() {
                        let structure = structure::scan(record.language, &text);
                        files.push(file_metrics(record, line_count, &structure));
                        collect_snippets(record, &text, &structure, &mut snippets);
                    }
                }
                Loaded::Binary => {
                    hasher.update(b"<binary>");
                    metrics.binary_files += 1;
                }
                Loaded::Skipped(reason) => {
                    hasher.update(b"<skipped>");
                    tracing::debug!(path = %record.path, %reason, "Skipping file");
                    metrics.skipped_files += 1;
                }
                Loaded::Unreadable(error) => {
                    hasher.update(b"<unreadable>");
                    tracing::warn!(path = %record.path, %error, "Could not read file");
                    metrics.unreadable_files += 1;
                    reasons.push(input_issue(format!("unreadable file {}: {}", record.path, error)));
                }
            }
            hasher.update(&[0]);
        }

        for reason in &reasons {
            hasher.update(reason.as_bytes());
        }
        let digest = hex::encode(hasher.finalize().as_bytes());
        let version = format!("fs-{}", &digest[..16]);

        files.sort_by(|a, b| a.path.cmp(&b.path));

        let extraction_incomplete = !reasons.is_empty();
        tracing::info!(
            version = %version,
            files = metrics.total_files,
            snippets = snippets.len(),
            incomplete = extraction_incomplete,
            "Extracted features"
        );

        FeatureSet {
            version,
            extraction_incomplete,
            incomplete_reasons: reasons,
            metrics,
            files,
            snippets,
        }
    }

    fn load(&self, record: &FileRecord) -> Loaded {
        match &record.content {
            FileContent::Inline(text) => Loaded::Text(text.clone()),
            FileContent::Skipped { reason } => Loaded::Skipped(reason.clone()),
            FileContent::Reference(location) => {
                let bytes = match fs::read(location) {
                    Ok(bytes) => bytes,
                    Err(e) => return Loaded::Unreadable(e.to_string()),
                };
                if bytes.len() as u64 > self.settings.max_file_bytes {
                    return Loaded::Skipped(format!(
                        "{} bytes exceeds limit of {}",
                        bytes.len(),
                        self.settings.max_file_bytes
                    ));
                }
                if bytes.contains(&0) {
                    return Loaded::Binary;
                }
                match String::from_utf8(bytes) {
                    Ok(text) => Loaded::Text(text),
                    Err(e) if record.language.is_supported() => {
                        Loaded::Text(String::from_utf8_lossy(e.as_bytes()).into_owned())
                    }
                    Err(_) => Loaded::Binary,
                }
            }
        }
    }
}

/// Incomplete-extraction reasons are rendered input errors
fn input_issue(reason: impl Into<String>) -> String {
    TrustlensError::Input(reason.into()).to_string()
}

fn file_metrics(record: &FileRecord, line_count: usize, structure: &FileStructure) -> FileMetrics {
    let function_lengths: Vec<usize> = structure.functions().map(|b| b.length()).collect();
    let complexities: Vec<u32> = structure
        .blocks
        .iter()
        .filter(|b| b.kind != BlockKind::Class)
        .map(|b| b.complexity)
        .collect();

    let commented = structure.code_lines + structure.comment_lines;
    let comment_ratio = if commented == 0 {
        0.0
    } else {
        structure.comment_lines as f64 / commented as f64
    };

    FileMetrics {
        path: record.path.clone(),
        language: Some(record.language),
        line_count,
        code_lines: structure.code_lines,
        comment_lines: structure.comment_lines,
        comment_ratio,
        function_count: function_lengths.len(),
        class_count: structure.classes().count(),
        max_nesting_depth: structure.max_nesting_depth,
        avg_function_length: mean(function_lengths.iter().map(|l| *l as f64)),
        max_function_length: function_lengths.iter().copied().max().unwrap_or(0),
        avg_complexity: mean(complexities.iter().map(|c| *c as f64)),
        max_complexity: complexities.iter().copied().max().unwrap_or(0),
        fan_out: structure.fan_out,
    }
}

fn collect_snippets(
    record: &FileRecord,
    text: &str,
    structure: &FileStructure,
    pool: &mut SnippetPool,
) {
    let lines: Vec<&str> = text.lines().collect();

    for block in structure
        .blocks
        .iter()
        .filter(|b| matches!(b.kind, BlockKind::Function | BlockKind::Module))
    {
        let body = lines[block.start_line - 1..block.end_line].join("\n");
        let decision = tagging::tag_block(&body, block);
        let mut snippet = Snippet::new(
            record.path.as_str(),
            LineRange::new(block.start_line, block.end_line),
            &body,
            decision.tag,
        )
        .with_signals(decision.signals);

        if pool.contains_key(&snippet.id) {
            let base = snippet.id.clone();
            let mut n = 2;
            while pool.contains_key(&format!("{}~{}", base, n)) {
                n += 1;
            }
            snippet.id = format!("{}~{}", base, n);
        }
        pool.insert(snippet.id.clone(), snippet);
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{TopicTag, MAX_SNIPPET_CHARS};
    use std::path::PathBuf;

    const APP: &str = r#"import sqlite3

def get_user(conn, name):
    return conn.execute("SELECT * FROM users WHERE name = '" + name + "'")

def pairs(items):
    out = []
    for a in items:
        for b in items:
            if a < b:
                out.append((a, b))
    return out

def add(a, b):
    return a + b
"#;

    fn extract(files: Vec<FileRecord>) -> FeatureSet {
        FeatureExtractor::default().extract(&CodebaseSnapshot::new(files))
    }

    #[test]
    fn test_tags_functions_by_topic() {
        let set = extract(vec![FileRecord::inline("app.py", APP)]);

        assert!(!set.extraction_incomplete);
        assert_eq!(set.snippets.len(), 3);
        assert!(set.snippets["app.py#L3-L4"].has_tag(TopicTag::Security));
        assert!(set.snippets["app.py#L6-L12"].has_tag(TopicTag::Logic));
        assert!(set.snippets["app.py#L14-L15"].has_tag(TopicTag::QualityIrrelevant));
        for snippet in set.snippets.values() {
            assert_eq!(snippet.topic_tags.len(), 1);
        }

        let file = set.file("app.py").unwrap();
        assert_eq!(file.function_count, 3);
        assert_eq!(file.max_nesting_depth, 3);
        assert_eq!(file.fan_out, 1);
    }

    #[test]
    fn test_version_is_content_addressed() {
        let a = extract(vec![FileRecord::inline("app.py", APP)]);
        let b = extract(vec![FileRecord::inline("app.py", APP)]);
        let c = extract(vec![FileRecord::inline("app.py", format!("{}\n# x\n", APP))]);
        assert_eq!(a.version, b.version);
        assert_ne!(a.version, c.version);
        assert!(a.version.starts_with("fs-"));
        assert_eq!(a.version.len(), 19);
    }

    #[test]
    fn test_empty_snapshot_is_incomplete() {
        let set = extract(vec![]);
        assert!(set.extraction_incomplete);
        assert!(set.snippets.is_empty());
        assert_eq!(set.metrics.total_files, 0);
        assert_eq!(
            set.incomplete_reasons,
            vec!["Input error: snapshot contains no files".to_string()]
        );
    }

    #[test]
    fn test_unreadable_reference_marks_incomplete() {
        let set = extract(vec![
            FileRecord::inline("ok.py", "x = 1\n"),
            FileRecord::reference("gone.py", PathBuf::from("/no/such/file.py")),
        ]);
        assert!(set.extraction_incomplete);
        assert_eq!(set.metrics.unreadable_files, 1);
        assert_eq!(set.incomplete_reasons.len(), 1);
        assert!(set.incomplete_reasons[0].starts_with("Input error: unreadable file gone.py"));
    }

    #[test]
    fn test_skipped_and_binary_files_do_not_mark_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let blob = dir.path().join("logo.png");
        fs::write(&blob, [0x89, b'P', b'N', b'G', 0, 0, 0xff]).unwrap();

        let set = extract(vec![
            FileRecord::reference("logo.png", blob),
            FileRecord::skipped("huge.js", "too big"),
        ]);
        assert!(!set.extraction_incomplete);
        assert_eq!(set.metrics.binary_files, 1);
        assert_eq!(set.metrics.skipped_files, 1);
    }

    #[test]
    fn test_long_blocks_are_truncated() {
        let body: String = (0..120).map(|i| format!("    v{} = {}\n", i, i)).collect();
        let source = format!("def big():\n{}", body);
        let set = extract(vec![FileRecord::inline("big.py", source)]);
        let snippet = set.snippets.values().next().unwrap();
        assert!(snippet.char_len() <= MAX_SNIPPET_CHARS);
        assert_eq!(snippet.line_range, LineRange::new(1, 121));
    }

    #[test]
    fn test_unsupported_languages_produce_no_snippets() {
        let set = extract(vec![FileRecord::inline("notes.txt", "password: hunter2\n")]);
        assert!(set.snippets.is_empty());
        assert!(set.files.is_empty());
        assert_eq!(set.metrics.total_lines, 1);
    }
}
