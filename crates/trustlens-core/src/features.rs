//! Feature set - the agent-agnostic representation of a codebase
//!
//! Produced once per run by the feature extractor and read-only afterwards.
//! Every downstream stage works from this value; nothing re-derives
//! snippets later, which keeps routing deterministic.

use crate::extraction::language::Language;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Upper bound on snippet text, in characters
pub const MAX_SNIPPET_CHARS: usize = 500;

/// Suffix appended to snippets cut at [`MAX_SNIPPET_CHARS`]
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Confidence attached to every extracted fact (no estimation happens here)
pub const EXTRACTION_CONFIDENCE: f64 = 1.0;

/// Closed topic tag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopicTag {
    Security,
    Logic,
    QualityIrrelevant,
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TopicTag::Security => "security",
            TopicTag::Logic => "logic",
            TopicTag::QualityIrrelevant => "quality-irrelevant",
        };
        f.write_str(label)
    }
}

/// Inclusive 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Whether the two ranges share at least one line
    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// The source lines an evidence reference points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceLocation {
    pub source_file: String,
    pub line_range: LineRange,
}

impl EvidenceLocation {
    /// Read a `path#Lstart-Lend` id (an optional `~n` suffix is ignored)
    pub fn parse(id: &str) -> Option<Self> {
        let (path, lines) = id.rsplit_once("#L")?;
        let lines = lines.split('~').next()?;
        let (start, end) = lines.split_once("-L")?;
        let (start, end) = (start.parse().ok()?, end.parse().ok()?);
        if path.is_empty() || start == 0 || end < start {
            return None;
        }
        Some(Self {
            source_file: path.to_string(),
            line_range: LineRange::new(start, end),
        })
    }

    /// Same file and intersecting line ranges
    pub fn overlaps(&self, other: &EvidenceLocation) -> bool {
        self.source_file == other.source_file && self.line_range.overlaps(&other.line_range)
    }
}

/// Snippet id -> location, for every snippet of a feature set
pub type EvidenceIndex = BTreeMap<String, EvidenceLocation>;

/// A bounded, tagged excerpt of source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    /// At most [`MAX_SNIPPET_CHARS`] characters
    pub text: String,
    pub topic_tags: BTreeSet<TopicTag>,
    pub source_file: String,
    pub line_range: LineRange,
    /// Names of the rules that produced the tag
    pub signals: Vec<String>,
}

impl Snippet {
    /// Build a snippet carrying exactly one topic tag, truncating the text
    pub fn new(
        source_file: impl Into<String>,
        line_range: LineRange,
        text: &str,
        topic: TopicTag,
    ) -> Self {
        let source_file = source_file.into();
        Self {
            id: snippet_id(&source_file, line_range),
            text: truncate_chars(text, MAX_SNIPPET_CHARS),
            topic_tags: BTreeSet::from([topic]),
            source_file,
            line_range,
            signals: Vec::new(),
        }
    }

    pub fn with_signals(mut self, signals: Vec<String>) -> Self {
        self.signals = signals;
        self
    }

    pub fn has_tag(&self, tag: TopicTag) -> bool {
        self.topic_tags.contains(&tag)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Evidence reference for a snippet: `path#Lstart-Lend`
pub fn snippet_id(source_file: &str, range: LineRange) -> String {
    format!("{}#L{}-L{}", source_file, range.start, range.end)
}

/// Cut `text` to at most `max` characters, marking the cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    let keep = max.saturating_sub(marker_len);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Snippet id -> snippet, ordered for deterministic iteration
pub type SnippetPool = BTreeMap<String, Snippet>;

/// Codebase-wide metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_files: usize,
    pub total_lines: usize,
    pub files_by_language: BTreeMap<Language, usize>,
    pub lines_by_language: BTreeMap<Language, usize>,
    pub skipped_files: usize,
    pub unreadable_files: usize,
    pub binary_files: usize,
}

/// Structural metrics for one parsed file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    pub path: String,
    pub language: Option<Language>,
    pub line_count: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub comment_ratio: f64,
    pub function_count: usize,
    pub class_count: usize,
    pub max_nesting_depth: u32,
    pub avg_function_length: f64,
    pub max_function_length: usize,
    pub avg_complexity: f64,
    pub max_complexity: u32,
    /// Import / include statements
    pub fan_out: usize,
}

impl FileMetrics {
    /// Ordering key for routing tie-breaks: deeper nesting first, then fan-out
    pub fn structural_risk(&self) -> (u32, usize) {
        (self.max_nesting_depth, self.fan_out)
    }
}

/// Summary the decision agent receives about the extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMeta {
    pub version: String,
    pub extraction_incomplete: bool,
    pub incomplete_reasons: Vec<String>,
    pub total_files: usize,
    pub total_lines: usize,
    pub snippet_count: usize,
    pub confidence: f64,
    /// Where each snippet id points, so agents citing different snippets
    /// can still be compared on the same code
    #[serde(default)]
    pub evidence: EvidenceIndex,
}

/// Immutable output of the feature extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    /// Content hash of the snapshot; stamped onto every payload
    pub version: String,
    pub extraction_incomplete: bool,
    pub incomplete_reasons: Vec<String>,
    pub metrics: AggregateMetrics,
    /// Per-file structure, ordered by path
    pub files: Vec<FileMetrics>,
    pub snippets: SnippetPool,
}

impl FeatureSet {
    /// Zeroed feature set flagged incomplete
    pub fn incomplete(version: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            version: version.into(),
            extraction_incomplete: true,
            incomplete_reasons: reasons,
            metrics: AggregateMetrics::default(),
            files: Vec::new(),
            snippets: SnippetPool::new(),
        }
    }

    pub fn meta(&self) -> FeatureMeta {
        FeatureMeta {
            version: self.version.clone(),
            extraction_incomplete: self.extraction_incomplete,
            incomplete_reasons: self.incomplete_reasons.clone(),
            total_files: self.metrics.total_files,
            total_lines: self.metrics.total_lines,
            snippet_count: self.snippets.len(),
            confidence: EXTRACTION_CONFIDENCE,
            evidence: self.evidence_index(),
        }
    }

    pub fn evidence_index(&self) -> EvidenceIndex {
        self.snippets
            .values()
            .map(|s| {
                let location = EvidenceLocation {
                    source_file: s.source_file.clone(),
                    line_range: s.line_range,
                };
                (s.id.clone(), location)
            })
            .collect()
    }

    pub fn file(&self, path: &str) -> Option<&FileMetrics> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    pub fn snippets_tagged(&self, tag: TopicTag) -> impl Iterator<Item = &Snippet> {
        self.snippets.values().filter(move |s| s.has_tag(tag))
    }
}
