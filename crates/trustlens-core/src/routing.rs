//! Routing policy
//!
//! Builds one payload per expert agent from a feature set. Security and
//! logic agents see only snippets carrying their own tag, capped at
//! [`MAX_SNIPPETS_PER_PAYLOAD`]; the quality agent sees metrics only and
//! never any source text. Every payload is checked before it leaves this
//! module: a payload that breaks a bound is a fatal error, not a warning.

use crate::error::{Result, TrustlensError};
use crate::features::{FeatureSet, FileMetrics, LineRange, Snippet, TopicTag, MAX_SNIPPET_CHARS};
use crate::types::{AgentRole, Provenance};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Upper bound on snippets in one payload
pub const MAX_SNIPPETS_PER_PAYLOAD: usize = 5;

/// Nesting depths at or above this share one histogram bucket
pub const NESTING_HISTOGRAM_CAP: u32 = 10;

/// Snippet as handed to an agent (tags and signals stripped)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedSnippet {
    pub id: String,
    pub text: String,
    pub source_file: String,
    pub line_range: LineRange,
}

impl From<&Snippet> for RoutedSnippet {
    fn from(snippet: &Snippet) -> Self {
        Self {
            id: snippet.id.clone(),
            text: snippet.text.clone(),
            source_file: snippet.source_file.clone(),
            line_range: snippet.line_range,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLengthStats {
    pub count: usize,
    pub mean: f64,
    pub max: usize,
}

/// Per-file slice of the quality metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQualityMetrics {
    pub path: String,
    pub line_count: usize,
    pub max_nesting_depth: u32,
    pub comment_ratio: f64,
    pub max_function_length: usize,
    pub avg_complexity: f64,
}

impl From<&FileMetrics> for FileQualityMetrics {
    fn from(file: &FileMetrics) -> Self {
        Self {
            path: file.path.clone(),
            line_count: file.line_count,
            max_nesting_depth: file.max_nesting_depth,
            comment_ratio: file.comment_ratio,
            max_function_length: file.max_function_length,
            avg_complexity: file.avg_complexity,
        }
    }
}

/// Metrics-only view of the codebase for the quality agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub line_count: usize,
    /// Max nesting depth per file -> number of files
    pub nesting_histogram: BTreeMap<u32, usize>,
    pub comment_ratio: f64,
    pub function_length: FunctionLengthStats,
    /// Mean cyclomatic complexity across parsed files
    pub complexity_score: f64,
    pub files: Vec<FileQualityMetrics>,
}

impl QualityMetrics {
    pub fn from_features(features: &FeatureSet) -> Self {
        let mut nesting_histogram = BTreeMap::new();
        let mut code = 0usize;
        let mut comments = 0usize;
        let mut function_count = 0usize;
        let mut function_lines = 0.0;
        let mut function_max = 0usize;
        let mut complexity_sum = 0.0;

        for file in &features.files {
            *nesting_histogram
                .entry(file.max_nesting_depth.min(NESTING_HISTOGRAM_CAP))
                .or_insert(0) += 1;
            code += file.code_lines;
            comments += file.comment_lines;
            function_count += file.function_count;
            function_lines += file.avg_function_length * file.function_count as f64;
            function_max = function_max.max(file.max_function_length);
            complexity_sum += file.avg_complexity;
        }

        let comment_ratio = if code + comments == 0 {
            0.0
        } else {
            comments as f64 / (code + comments) as f64
        };

        Self {
            line_count: features.metrics.total_lines,
            nesting_histogram,
            comment_ratio,
            function_length: FunctionLengthStats {
                count: function_count,
                mean: if function_count == 0 {
                    0.0
                } else {
                    function_lines / function_count as f64
                },
                max: function_max,
            },
            complexity_score: if features.files.is_empty() {
                0.0
            } else {
                complexity_sum / features.files.len() as f64
            },
            files: features.files.iter().map(FileQualityMetrics::from).collect(),
        }
    }

    /// Metric names usable as evidence references
    pub fn metric_ref(path: &str, metric: &str) -> String {
        format!("{}:{}", path, metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadBody {
    Snippets { snippets: Vec<RoutedSnippet> },
    Metrics { metrics: QualityMetrics },
}

/// Immutable, role-scoped view of a feature set
///
/// Only [`route`] constructs payloads, so any value of this type has passed
/// the routing checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedPayload {
    provenance: Provenance,
    extraction_incomplete: bool,
    body: PayloadBody,
}

impl RoutedPayload {
    pub fn role(&self) -> AgentRole {
        self.provenance.role
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn feature_set_version(&self) -> &str {
        &self.provenance.feature_set_version
    }

    pub fn extraction_incomplete(&self) -> bool {
        self.extraction_incomplete
    }

    /// Routed snippets; empty for the quality payload
    pub fn snippets(&self) -> &[RoutedSnippet] {
        match &self.body {
            PayloadBody::Snippets { snippets } => snippets,
            PayloadBody::Metrics { .. } => &[],
        }
    }

    pub fn metrics(&self) -> Option<&QualityMetrics> {
        match &self.body {
            PayloadBody::Metrics { metrics } => Some(metrics),
            PayloadBody::Snippets { .. } => None,
        }
    }

    /// Whether `id` names evidence contained in this payload
    pub fn has_evidence(&self, id: &str) -> bool {
        match &self.body {
            PayloadBody::Snippets { snippets } => snippets.iter().any(|s| s.id == id),
            PayloadBody::Metrics { metrics } => metrics
                .files
                .iter()
                .any(|f| id.strip_prefix(f.path.as_str()).map_or(false, |rest| rest.starts_with(':'))),
        }
    }
}

/// Topic tag an agent role consumes; `None` for metrics-only roles
pub fn role_tag(role: AgentRole) -> Option<TopicTag> {
    match role {
        AgentRole::Security => Some(TopicTag::Security),
        AgentRole::Logic => Some(TopicTag::Logic),
        AgentRole::Quality => None,
    }
}

/// Build the payload for `role`
pub fn route(features: &FeatureSet, role: AgentRole) -> Result<RoutedPayload> {
    let provenance = Provenance {
        feature_set_version: features.version.clone(),
        role,
    };

    let body = match role_tag(role) {
        Some(tag) => PayloadBody::Snippets {
            snippets: select_snippets(features, tag),
        },
        None => PayloadBody::Metrics {
            metrics: QualityMetrics::from_features(features),
        },
    };

    let payload = RoutedPayload {
        provenance,
        extraction_incomplete: features.extraction_incomplete,
        body,
    };

    if let Err(e) = enforce_invariants(features, &payload) {
        tracing::error!(role = %role, error = %e, "Routing produced an invalid payload");
        return Err(e);
    }

    tracing::debug!(
        role = %role,
        snippets = payload.snippets().len(),
        version = %payload.feature_set_version(),
        "Routed payload"
    );

    Ok(payload)
}

/// Route for every role, in orchestration order
pub fn route_all(features: &FeatureSet) -> Result<Vec<RoutedPayload>> {
    AgentRole::ALL.iter().map(|role| route(features, *role)).collect()
}

fn select_snippets(features: &FeatureSet, tag: TopicTag) -> Vec<RoutedSnippet> {
    let other = match tag {
        TopicTag::Security => Some(TopicTag::Logic),
        TopicTag::Logic => Some(TopicTag::Security),
        TopicTag::QualityIrrelevant => None,
    };

    let mut candidates: Vec<&Snippet> = features
        .snippets_tagged(tag)
        .filter(|snippet| match other {
            Some(other) if snippet.has_tag(other) => {
                tracing::warn!(id = %snippet.id, "Dropping snippet tagged for two agents");
                false
            }
            _ => true,
        })
        .collect();

    candidates.sort_by_key(|snippet| {
        let risk = features
            .file(&snippet.source_file)
            .map(FileMetrics::structural_risk)
            .unwrap_or_default();
        (
            Reverse(risk),
            snippet.source_file.clone(),
            snippet.line_range.start,
            snippet.id.clone(),
        )
    });

    candidates
        .into_iter()
        .take(MAX_SNIPPETS_PER_PAYLOAD)
        .map(RoutedSnippet::from)
        .collect()
}

/// Check a payload against the routing bounds
pub fn enforce_invariants(features: &FeatureSet, payload: &RoutedPayload) -> Result<()> {
    let role = payload.role();
    let violation = |reason: String| TrustlensError::RoutingViolation { role, reason };

    if payload.feature_set_version() != features.version {
        return Err(violation(format!(
            "payload version {} does not match feature set {}",
            payload.feature_set_version(),
            features.version
        )));
    }

    match (role_tag(role), &payload.body) {
        (None, PayloadBody::Metrics { .. }) => Ok(()),
        (None, PayloadBody::Snippets { snippets }) => Err(violation(format!(
            "metrics-only payload carries {} snippet(s)",
            snippets.len()
        ))),
        (Some(_), PayloadBody::Metrics { .. }) => {
            Err(violation("snippet payload carries metrics".to_string()))
        }
        (Some(tag), PayloadBody::Snippets { snippets }) => {
            if snippets.len() > MAX_SNIPPETS_PER_PAYLOAD {
                return Err(violation(format!(
                    "{} snippets exceeds limit of {}",
                    snippets.len(),
                    MAX_SNIPPETS_PER_PAYLOAD
                )));
            }
            for routed in snippets {
                let chars = routed.text.chars().count();
                if chars > MAX_SNIPPET_CHARS {
                    return Err(violation(format!(
                        "snippet {} has {} characters (limit {})",
                        routed.id, chars, MAX_SNIPPET_CHARS
                    )));
                }
                match features.snippets.get(&routed.id) {
                    Some(source) if source.has_tag(tag) => {}
                    Some(_) => {
                        return Err(violation(format!(
                            "snippet {} is not tagged {}",
                            routed.id, tag
                        )))
                    }
                    None => {
                        return Err(violation(format!(
                            "snippet {} is not in the feature set",
                            routed.id
                        )))
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureSet, FileMetrics, LineRange, Snippet};

    fn features_with(snippets: Vec<Snippet>, files: Vec<FileMetrics>) -> FeatureSet {
        let mut set = FeatureSet::incomplete("fs-test", vec![]);
        set.extraction_incomplete = false;
        set.files = files;
        for snippet in snippets {
            set.snippets.insert(snippet.id.clone(), snippet);
        }
        set
    }

    fn snippet(file: &str, start: usize, tag: TopicTag) -> Snippet {
        Snippet::new(file, LineRange::new(start, start + 2), "code", tag)
    }

    #[test]
    fn test_routes_only_matching_tags() {
        let set = features_with(
            vec![
                snippet("a.py", 1, TopicTag::Security),
                snippet("a.py", 10, TopicTag::Logic),
                snippet("a.py", 20, TopicTag::QualityIrrelevant),
            ],
            vec![],
        );

        let security = route(&set, AgentRole::Security).unwrap();
        assert_eq!(security.snippets().len(), 1);
        assert_eq!(security.snippets()[0].id, "a.py#L1-L3");

        let logic = route(&set, AgentRole::Logic).unwrap();
        assert_eq!(logic.snippets().len(), 1);
        assert_eq!(logic.snippets()[0].id, "a.py#L10-L12");
    }

    #[test]
    fn test_quality_payload_has_no_source_text() {
        let set = features_with(
            vec![snippet("a.py", 1, TopicTag::Security)],
            vec![FileMetrics {
                path: "a.py".into(),
                max_nesting_depth: 14,
                ..Default::default()
            }],
        );
        let payload = route(&set, AgentRole::Quality).unwrap();
        assert!(payload.snippets().is_empty());
        let metrics = payload.metrics().unwrap();
        assert_eq!(metrics.nesting_histogram.get(&NESTING_HISTOGRAM_CAP), Some(&1));
        assert!(payload.has_evidence("a.py:max_nesting_depth"));
        assert!(!payload.has_evidence("a.pyx:max_nesting_depth"));
    }

    #[test]
    fn test_cap_prefers_structurally_risky_files() {
        let mut snippets: Vec<Snippet> = (0..6)
            .map(|i| snippet("flat.py", i * 10 + 1, TopicTag::Logic))
            .collect();
        snippets.push(snippet("deep.py", 1, TopicTag::Logic));
        let files = vec![
            FileMetrics {
                path: "deep.py".into(),
                max_nesting_depth: 5,
                ..Default::default()
            },
            FileMetrics {
                path: "flat.py".into(),
                max_nesting_depth: 1,
                ..Default::default()
            },
        ];
        let set = features_with(snippets, files);

        let payload = route(&set, AgentRole::Logic).unwrap();
        let ids: Vec<_> = payload.snippets().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), MAX_SNIPPETS_PER_PAYLOAD);
        assert_eq!(ids[0], "deep.py#L1-L3");
        assert_eq!(ids[1], "flat.py#L1-L3");
    }

    #[test]
    fn test_dual_tagged_snippets_are_dropped() {
        let mut both = snippet("a.py", 1, TopicTag::Security);
        both.topic_tags.insert(TopicTag::Logic);
        let set = features_with(vec![both], vec![]);

        assert!(route(&set, AgentRole::Security).unwrap().snippets().is_empty());
        assert!(route(&set, AgentRole::Logic).unwrap().snippets().is_empty());
    }

    #[test]
    fn test_oversized_snippet_is_a_violation() {
        let mut big = snippet("a.py", 1, TopicTag::Security);
        big.text = "x".repeat(MAX_SNIPPET_CHARS + 1);
        let set = features_with(vec![big], vec![]);

        let err = route(&set, AgentRole::Security).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            TrustlensError::RoutingViolation {
                role: AgentRole::Security,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_carries_provenance() {
        let mut set = features_with(vec![], vec![]);
        set.extraction_incomplete = true;
        for payload in route_all(&set).unwrap() {
            assert_eq!(payload.feature_set_version(), "fs-test");
            assert!(payload.extraction_incomplete());
        }
    }
}
