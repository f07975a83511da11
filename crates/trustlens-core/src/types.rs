//! Core types for TrustLens
//!
//! This module defines the values exchanged between pipeline stages:
//! - Agent roles
//! - Severities and risk levels
//! - Findings and finding sets
//! - Agent traces (explainability records)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Expert agent specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// LLM-backed, receives security-tagged snippets only
    Security,

    /// LLM-backed, receives logic-tagged snippets only
    Logic,

    /// Deterministic, receives metrics only
    Quality,
}

impl AgentRole {
    /// All roles in orchestration order
    pub const ALL: [AgentRole; 3] = [AgentRole::Security, AgentRole::Logic, AgentRole::Quality];

    /// Stable agent name used in traces and conflicts
    pub fn agent_name(self) -> &'static str {
        match self {
            AgentRole::Security => "security",
            AgentRole::Logic => "logic",
            AgentRole::Quality => "quality",
        }
    }

    /// Advisory agents never drive a blocking action
    pub fn is_advisory(self) -> bool {
        matches!(self, AgentRole::Quality)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "security" => Ok(AgentRole::Security),
            "logic" => Ok(AgentRole::Logic),
            "quality" => Ok(AgentRole::Quality),
            other => Err(format!("unknown agent role: {other}")),
        }
    }
}

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity label as emitted by an LLM ("HIGH", "Medium", ...)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" | "info" | "minor" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "major" => Some(Severity::High),
            "critical" | "blocker" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&RiskLevel::from(*self), f)
    }
}

/// Risk level on the shared severity scale
///
/// `None` sits one step below `Low` so that "no findings" participates in
/// severity-gap comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Position on the severity scale (none = 0 .. critical = 4)
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Number of scale steps between two levels
    pub fn distance(self, other: RiskLevel) -> u8 {
        self.rank().abs_diff(other.rank())
    }
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Whether a finding flags a problem or vouches for the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    #[default]
    Concern,
    Safe,
}

/// Category used for the synthetic finding emitted when analysis fails
pub const ANALYSIS_ERROR_CATEGORY: &str = "analysis-error";

/// A single reported issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub agent_name: String,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    /// Confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Always derived from `severity`
    pub risk_level: RiskLevel,
    /// Snippet ids or metric names
    pub evidence_refs: Vec<String>,
    /// Refs the agent cited that were not in its payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_evidence_refs: Vec<String>,
    #[serde(default)]
    pub stance: Stance,
    #[serde(default)]
    pub advisory: bool,
}

impl Finding {
    pub fn new(
        agent_name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            category: category.into(),
            description: description.into(),
            severity,
            confidence: clamp_unit(confidence),
            risk_level: severity.into(),
            evidence_refs: Vec::new(),
            dropped_evidence_refs: Vec::new(),
            stance: Stance::Concern,
            advisory: false,
        }
    }

    /// Synthetic finding standing in for a failed analysis
    pub fn analysis_error(agent_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            agent_name,
            ANALYSIS_ERROR_CATEGORY,
            reason,
            Severity::Low,
            0.0,
        )
    }

    pub fn with_evidence<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence_refs.extend(refs.into_iter().map(Into::into));
        self
    }

    pub fn with_dropped_evidence(mut self, refs: Vec<String>) -> Self {
        self.dropped_evidence_refs = refs;
        self
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    pub fn into_advisory(mut self) -> Self {
        self.advisory = true;
        self
    }

    pub fn is_analysis_error(&self) -> bool {
        self.category == ANALYSIS_ERROR_CATEGORY
    }
}

/// Findings produced atomically by one expert agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingSet {
    pub agent_name: String,
    pub role: AgentRole,
    pub findings: Vec<Finding>,
    /// Agent-level confidence in [0.0, 1.0]
    pub confidence: f64,
}

impl FindingSet {
    pub fn new(role: AgentRole, findings: Vec<Finding>, confidence: f64) -> Self {
        Self {
            agent_name: role.agent_name().to_string(),
            role,
            findings,
            confidence: clamp_unit(confidence),
        }
    }

    /// Empty set with zero confidence, used for failed or cancelled agents
    pub fn empty(role: AgentRole) -> Self {
        Self::new(role, Vec::new(), 0.0)
    }

    /// Maximum severity among concern findings; `None` when there are none
    pub fn risk_level(&self) -> RiskLevel {
        self.findings
            .iter()
            .filter(|f| f.stance == Stance::Concern && !f.is_analysis_error())
            .map(|f| f.risk_level)
            .max()
            .unwrap_or(RiskLevel::None)
    }
}

/// Execution outcome recorded for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentStatus {
    Succeeded,
    Failed { reason: String },
    TimedOut,
}

impl AgentStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentStatus::Succeeded)
    }
}

/// What an expert agent hands back to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub findings: FindingSet,
    pub status: AgentStatus,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl AgentOutcome {
    pub fn succeeded(findings: FindingSet, attempts: u32, elapsed_ms: u64) -> Self {
        Self {
            findings,
            status: AgentStatus::Succeeded,
            attempts,
            elapsed_ms,
        }
    }

    /// Failed run: zero confidence, a single analysis-error finding
    pub fn failed(role: AgentRole, reason: impl Into<String>, attempts: u32, elapsed_ms: u64) -> Self {
        let reason = reason.into();
        let findings = FindingSet::new(
            role,
            vec![Finding::analysis_error(role.agent_name(), reason.clone())],
            0.0,
        );
        Self {
            findings,
            status: AgentStatus::Failed { reason },
            attempts,
            elapsed_ms,
        }
    }

    /// Cancelled at the run deadline, nothing collected
    pub fn timed_out(role: AgentRole, elapsed_ms: u64) -> Self {
        Self {
            findings: FindingSet::empty(role),
            status: AgentStatus::TimedOut,
            attempts: 0,
            elapsed_ms,
        }
    }

    pub fn into_trace(self, provenance: Provenance) -> AgentTrace {
        AgentTrace {
            agent_name: self.findings.agent_name,
            provenance,
            findings: self.findings.findings,
            confidence: self.findings.confidence,
            elapsed_ms: self.elapsed_ms,
            attempts: self.attempts,
            status: self.status,
        }
    }
}

/// Which feature set a payload (and therefore a trace) derives from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub feature_set_version: String,
    pub role: AgentRole,
}

/// Explainability record for one agent, kept even on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTrace {
    pub agent_name: String,
    pub provenance: Provenance,
    pub findings: Vec<Finding>,
    pub confidence: f64,
    pub elapsed_ms: u64,
    pub attempts: u32,
    pub status: AgentStatus,
}

/// Append-only trace collection owned by a single run
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    traces: Vec<AgentTrace>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trace: AgentTrace) {
        self.traces.push(trace);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentTrace> {
        self.traces.iter()
    }

    pub fn into_traces(self) -> Vec<AgentTrace> {
        self.traces
    }
}

/// Clamp to [0.0, 1.0], mapping NaN to 0.0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_follows_severity() {
        let finding = Finding::new("security", "sql-injection", "concat", Severity::High, 0.9);
        assert_eq!(finding.risk_level, RiskLevel::High);
        assert_eq!(RiskLevel::from(Severity::Critical), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_distance() {
        assert_eq!(RiskLevel::None.distance(RiskLevel::High), 3);
        assert_eq!(RiskLevel::Medium.distance(RiskLevel::Low), 1);
        assert!(RiskLevel::Critical > RiskLevel::High);
    }

    #[test]
    fn test_finding_set_risk_ignores_safe_and_errors() {
        let set = FindingSet::new(
            AgentRole::Logic,
            vec![
                Finding::new("logic", "loop", "fine", Severity::Critical, 0.8)
                    .with_stance(Stance::Safe),
                Finding::analysis_error("logic", "bad json"),
                Finding::new("logic", "off-by-one", "bound", Severity::Medium, 0.7),
            ],
            0.7,
        );
        assert_eq!(set.risk_level(), RiskLevel::Medium);
        assert_eq!(FindingSet::empty(AgentRole::Logic).risk_level(), RiskLevel::None);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Finding::new("a", "b", "c", Severity::Low, 1.7).confidence, 1.0);
        assert_eq!(Finding::new("a", "b", "c", Severity::Low, f64::NAN).confidence, 0.0);
        assert_eq!(FindingSet::new(AgentRole::Security, vec![], -0.2).confidence, 0.0);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse(" HIGH "), Some(Severity::High));
        assert_eq!(Severity::parse("moderate"), Some(Severity::Medium));
        assert_eq!(Severity::parse("unknown"), None);
    }

    #[test]
    fn test_role_round_trip() {
        for role in AgentRole::ALL {
            assert_eq!(role.agent_name().parse::<AgentRole>().unwrap(), role);
        }
        assert!(AgentRole::Quality.is_advisory());
        assert!(!AgentRole::Security.is_advisory());
    }
}
