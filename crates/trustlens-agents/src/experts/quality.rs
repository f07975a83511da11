//! Quality expert
//!
//! Deterministic threshold checks over the metrics payload. Never calls the
//! LLM, never suspends, and every finding it emits is advisory.

use super::ExpertAgent;
use async_trait::async_trait;
use tokio::time::Instant;
use trustlens_core::routing::{FileQualityMetrics, QualityMetrics, RoutedPayload};
use trustlens_core::types::{AgentOutcome, AgentRole, Finding, FindingSet, Severity};

/// Nesting depth above which a file is flagged
pub const MAX_NESTING_DEPTH: u32 = 4;

/// Comment ratio below which a file is flagged...
pub const MIN_COMMENT_RATIO: f64 = 0.05;

/// ...provided it has at least this many lines
pub const COMMENT_RATIO_MIN_LINES: usize = 50;

/// File length above which a file is flagged
pub const MAX_FILE_LINES: usize = 500;

/// Longest acceptable function, in lines
pub const MAX_FUNCTION_LINES: usize = 80;

/// Average cyclomatic complexity above which a file is flagged
pub const MAX_AVG_COMPLEXITY: f64 = 10.0;

/// Confidence of every quality finding
pub const QUALITY_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct QualityAgent;

impl QualityAgent {
    pub fn new() -> Self {
        Self
    }

    /// Threshold findings for the whole metrics payload
    pub fn evaluate(&self, metrics: &QualityMetrics) -> Vec<Finding> {
        metrics.files.iter().flat_map(check_file).collect()
    }
}

fn finding(file: &FileQualityMetrics, metric: &str, category: &str, description: String, severity: Severity) -> Finding {
    Finding::new(
        AgentRole::Quality.agent_name(),
        category,
        description,
        severity,
        QUALITY_CONFIDENCE,
    )
    .with_evidence([QualityMetrics::metric_ref(&file.path, metric)])
    .into_advisory()
}

fn check_file(file: &FileQualityMetrics) -> Vec<Finding> {
    let mut findings = Vec::new();

    if file.max_nesting_depth > MAX_NESTING_DEPTH {
        findings.push(finding(
            file,
            "max_nesting_depth",
            "deep-nesting",
            format!(
                "{} nests control flow {} levels deep (threshold {})",
                file.path, file.max_nesting_depth, MAX_NESTING_DEPTH
            ),
            Severity::Medium,
        ));
    }
    if file.line_count >= COMMENT_RATIO_MIN_LINES && file.comment_ratio < MIN_COMMENT_RATIO {
        findings.push(finding(
            file,
            "comment_ratio",
            "low-comment-ratio",
            format!(
                "{} has a comment ratio of {:.2} over {} lines",
                file.path, file.comment_ratio, file.line_count
            ),
            Severity::Low,
        ));
    }
    if file.line_count > MAX_FILE_LINES {
        findings.push(finding(
            file,
            "line_count",
            "large-file",
            format!("{} is {} lines long (threshold {})", file.path, file.line_count, MAX_FILE_LINES),
            Severity::Medium,
        ));
    }
    if file.max_function_length > MAX_FUNCTION_LINES {
        findings.push(finding(
            file,
            "max_function_length",
            "long-function",
            format!(
                "{} contains a {}-line function (threshold {})",
                file.path, file.max_function_length, MAX_FUNCTION_LINES
            ),
            Severity::Low,
        ));
    }
    if file.avg_complexity > MAX_AVG_COMPLEXITY {
        findings.push(finding(
            file,
            "avg_complexity",
            "high-complexity",
            format!(
                "{} averages a cyclomatic complexity of {:.1} (threshold {})",
                file.path, file.avg_complexity, MAX_AVG_COMPLEXITY
            ),
            Severity::Medium,
        ));
    }

    findings
}

#[async_trait]
impl ExpertAgent for QualityAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Quality
    }

    async fn analyze(&self, payload: &RoutedPayload) -> AgentOutcome {
        let started = Instant::now();
        if let Some(outcome) = super::misrouted(AgentRole::Quality, payload) {
            return outcome;
        }

        match payload.metrics() {
            Some(metrics) => {
                let findings = self.evaluate(metrics);
                let elapsed_ms = super::elapsed_ms(started);
                tracing::info!(
                    agent = "quality",
                    findings = findings.len(),
                    elapsed_ms,
                    "Agent finished"
                );
                AgentOutcome::succeeded(
                    FindingSet::new(AgentRole::Quality, findings, QUALITY_CONFIDENCE),
                    1,
                    elapsed_ms,
                )
            }
            None => AgentOutcome::failed(
                AgentRole::Quality,
                "payload carries no metrics",
                1,
                super::elapsed_ms(started),
            ),
        }
    }
}
