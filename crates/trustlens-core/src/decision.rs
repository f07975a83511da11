//! Decision agent
//!
//! Synthesizes the three finding sets into one [`Recommendation`]:
//! overall risk from the non-advisory agents, an action from a fixed
//! mapping, inter-agent conflicts, and a penalized confidence.

use crate::error::TrustlensError;
use crate::features::{EvidenceIndex, EvidenceLocation, FeatureMeta};
use crate::types::{clamp_unit, AgentRole, AgentTrace, Finding, FindingSet, RiskLevel, Stance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Confidence reduction per detected conflict
pub const CONFLICT_PENALTY_STEP: f64 = 0.2;

/// Upper bound on the total conflict reduction
pub const MAX_CONFLICT_PENALTY: f64 = 0.5;

/// Confidence multiplier applied when extraction was incomplete
pub const INCOMPLETE_EXTRACTION_FACTOR: f64 = 0.8;

/// Final action, in escalating order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Acceptable,
    ProceedWithCaution,
    ReviewRequired,
    ManualReviewRequired,
}

impl Action {
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Critical => Action::ManualReviewRequired,
            RiskLevel::High => Action::ReviewRequired,
            RiskLevel::Medium => Action::ProceedWithCaution,
            RiskLevel::Low | RiskLevel::None => Action::Acceptable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    SeverityGap,
    Contradiction,
    InsufficientAgentCoverage,
}

/// Recorded disagreement between two agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub agents: (String, String),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Degraded,
}

/// How many agents delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub total_agents: usize,
    pub succeeded_agents: usize,
    pub failed_agents: Vec<String>,
    pub health: Health,
}

/// Terminal artifact of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub run_id: Uuid,
    pub feature_set_version: String,
    pub action: Action,
    pub overall_risk: RiskLevel,
    pub overall_confidence: f64,
    pub conflicts: Vec<Conflict>,
    pub advisory_notes: Vec<String>,
    pub rationale: String,
    pub coverage: Coverage,
    pub traces: Vec<AgentTrace>,
    pub created_at: DateTime<Utc>,
}

/// One finding set per expert agent
#[derive(Debug, Clone, PartialEq)]
pub struct FindingSets {
    pub security: FindingSet,
    pub logic: FindingSet,
    pub quality: FindingSet,
}

impl FindingSets {
    pub fn get(&self, role: AgentRole) -> &FindingSet {
        match role {
            AgentRole::Security => &self.security,
            AgentRole::Logic => &self.logic,
            AgentRole::Quality => &self.quality,
        }
    }
}

/// `max(0.5, 1 - 0.2 * conflicts)`
pub fn conflict_factor(conflicts: usize) -> f64 {
    (1.0 - CONFLICT_PENALTY_STEP * conflicts as f64).max(1.0 - MAX_CONFLICT_PENALTY)
}

/// What one agent said about one piece of evidence
#[derive(Default)]
struct EvidenceView {
    concern: Option<RiskLevel>,
    safe: bool,
}

fn evidence_views(set: &FindingSet) -> BTreeMap<&str, EvidenceView> {
    let mut views: BTreeMap<&str, EvidenceView> = BTreeMap::new();
    for finding in set.findings.iter().filter(|f| !f.is_analysis_error()) {
        for evidence in &finding.evidence_refs {
            let view = views.entry(evidence.as_str()).or_default();
            match finding.stance {
                Stance::Concern => {
                    view.concern = view.concern.max(Some(finding.risk_level));
                }
                Stance::Safe => view.safe = true,
            }
        }
    }
    views
}

fn locate(evidence: &str, index: &EvidenceIndex) -> Option<EvidenceLocation> {
    index
        .get(evidence)
        .cloned()
        .or_else(|| EvidenceLocation::parse(evidence))
}

/// Identical refs, or refs into the same file whose line ranges intersect
pub fn evidence_overlaps(a: &str, b: &str, index: &EvidenceIndex) -> bool {
    if a == b {
        return true;
    }
    match (locate(a, index), locate(b, index)) {
        (Some(la), Some(lb)) => la.overlaps(&lb),
        _ => false,
    }
}

fn describe_evidence(a: &str, b: &str) -> String {
    if a == b {
        a.to_string()
    } else {
        format!("{} / {}", a, b)
    }
}

/// Pairwise conflicts over overlapping evidence, in (pair, evidence) order
pub fn detect_conflicts(sets: &[&FindingSet], index: &EvidenceIndex) -> Vec<Conflict> {
    let views: Vec<_> = sets.iter().map(|s| evidence_views(s)).collect();
    let mut conflicts = Vec::new();

    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let (a, b) = (sets[i], sets[j]);
            for (ev_a, view_a) in &views[i] {
                for (ev_b, view_b) in &views[j] {
                    if !evidence_overlaps(ev_a, ev_b, index) {
                        continue;
                    }
                    let agents = (a.agent_name.clone(), b.agent_name.clone());
                    let code = describe_evidence(ev_a, ev_b);

                    let contradiction = (view_a.concern.is_some() && view_b.safe)
                        || (view_b.concern.is_some() && view_a.safe);
                    if contradiction {
                        let (flagger, vouch) = if view_a.concern.is_some() && view_b.safe {
                            (&a.agent_name, &b.agent_name)
                        } else {
                            (&b.agent_name, &a.agent_name)
                        };
                        conflicts.push(Conflict {
                            kind: ConflictKind::Contradiction,
                            agents,
                            evidence_ref: Some(ev_a.to_string()),
                            description: format!(
                                "{} flags {} as unsafe while {} considers it safe",
                                flagger, code, vouch
                            ),
                        });
                        continue;
                    }

                    if let (Some(ra), Some(rb)) = (view_a.concern, view_b.concern) {
                        if ra.distance(rb) > 1 {
                            conflicts.push(Conflict {
                                kind: ConflictKind::SeverityGap,
                                agents,
                                evidence_ref: Some(ev_a.to_string()),
                                description: format!(
                                    "{} rates {} {} but {} rates it {}",
                                    a.agent_name, code, ra, b.agent_name, rb
                                ),
                            });
                        }
                    }
                }
            }
        }
    }

    conflicts
}

fn succeeded(traces: &[AgentTrace], role: AgentRole) -> bool {
    traces
        .iter()
        .any(|t| t.provenance.role == role && t.status.is_success())
}

fn advisory_note(finding: &Finding) -> String {
    if finding.evidence_refs.is_empty() {
        format!("[{}] {}", finding.severity, finding.description)
    } else {
        format!(
            "[{}] {} ({})",
            finding.severity,
            finding.description,
            finding.evidence_refs.join(", ")
        )
    }
}

/// Synthesize the recommendation of a run
pub fn decide(meta: &FeatureMeta, sets: &FindingSets, traces: Vec<AgentTrace>) -> Recommendation {
    let blocking = [AgentRole::Security, AgentRole::Logic];
    let healthy: Vec<&FindingSet> = blocking
        .iter()
        .filter(|role| succeeded(&traces, **role))
        .map(|role| sets.get(*role))
        .collect();
    let failed_blocking: Vec<&str> = blocking
        .iter()
        .filter(|role| !succeeded(&traces, **role))
        .map(|role| role.agent_name())
        .collect();

    let overall_risk = healthy
        .iter()
        .map(|s| s.risk_level())
        .max()
        .unwrap_or(RiskLevel::None);
    let mut action = Action::for_risk(overall_risk);

    let mut conflicts = detect_conflicts(&healthy, &meta.evidence);
    let conflict_count = conflicts.len();

    let base = healthy.iter().map(|s| s.confidence).sum::<f64>() / blocking.len() as f64;
    let mut confidence = base;
    if meta.extraction_incomplete {
        confidence *= INCOMPLETE_EXTRACTION_FACTOR;
    }
    confidence *= conflict_factor(conflict_count);

    let insufficient = healthy.is_empty();
    if insufficient {
        let err = TrustlensError::InsufficientCoverage(
            "security and logic agents both failed".to_string(),
        );
        tracing::warn!(error = %err, "Forcing manual review");
        action = Action::ManualReviewRequired;
        confidence = 0.0;
        conflicts.push(Conflict {
            kind: ConflictKind::InsufficientAgentCoverage,
            agents: (
                AgentRole::Security.agent_name().to_string(),
                AgentRole::Logic.agent_name().to_string(),
            ),
            evidence_ref: None,
            description: err.to_string(),
        });
    }

    let advisory_notes: Vec<String> = sets
        .quality
        .findings
        .iter()
        .filter(|f| !f.is_analysis_error())
        .map(advisory_note)
        .collect();

    let failed_agents: Vec<String> = AgentRole::ALL
        .iter()
        .filter(|role| !succeeded(&traces, **role))
        .map(|role| role.agent_name().to_string())
        .collect();
    let coverage = Coverage {
        total_agents: AgentRole::ALL.len(),
        succeeded_agents: AgentRole::ALL.len() - failed_agents.len(),
        health: if failed_agents.is_empty() {
            Health::Healthy
        } else {
            Health::Degraded
        },
        failed_agents,
    };

    let rationale = rationale(
        overall_risk,
        &failed_blocking,
        conflict_count,
        meta.extraction_incomplete,
        insufficient,
    );

    tracing::info!(
        action = ?action,
        risk = %overall_risk,
        confidence,
        conflicts = conflicts.len(),
        "Decision reached"
    );

    Recommendation {
        run_id: Uuid::new_v4(),
        feature_set_version: meta.version.clone(),
        action,
        overall_risk,
        overall_confidence: clamp_unit(confidence),
        conflicts,
        advisory_notes,
        rationale,
        coverage,
        traces,
        created_at: Utc::now(),
    }
}

fn rationale(
    risk: RiskLevel,
    failed: &[&str],
    conflicts: usize,
    incomplete: bool,
    insufficient: bool,
) -> String {
    if insufficient {
        return "Insufficient agent coverage: neither the security nor the logic agent \
                produced a result. Manual review is required."
            .to_string();
    }

    let mut parts = vec![format!("Highest detected risk: {}.", risk)];
    if !failed.is_empty() {
        parts.push(format!(
            "{} agent(s) failed ({}).",
            failed.len(),
            failed.join(", ")
        ));
    }
    if conflicts > 0 {
        parts.push(format!(
            "{} conflict(s) between agents reduced confidence.",
            conflicts
        ));
    }
    if incomplete {
        parts.push("Feature extraction was incomplete; confidence reduced.".to_string());
    }
    if parts.len() == 1 {
        parts.push("High trust integration with full agent consensus.".to_string());
    }
    parts.join(" ")
}
