//! Shared runner for the LLM-backed agents
//!
//! One call per attempt, each under its own timeout. Transient failures get
//! at most one retry; malformed responses are never retried.

use crate::llm::parse::unit_interval;
use crate::llm::{LlmCapability, LlmError, RawCompletion};
use crate::prompts;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trustlens_core::error::TrustlensError;
use trustlens_core::routing::RoutedPayload;
use trustlens_core::types::{AgentOutcome, AgentRole, Finding, FindingSet, Severity, Stance};

/// Hard ceiling on retries, whatever the configuration says
pub const MAX_RETRIES: u32 = 1;

/// Pause before the retry
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Confidence of an empty verdict when extraction may have missed code
pub const INCOMPLETE_EMPTY_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub attempt_timeout: Duration,
    pub max_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(45),
            max_retries: MAX_RETRIES,
        }
    }
}

impl CallPolicy {
    pub fn new(attempt_timeout: Duration, max_retries: u32) -> Self {
        Self {
            attempt_timeout,
            max_retries: max_retries.min(MAX_RETRIES),
        }
    }
}

/// LLM-backed analysis for one role
pub struct LlmExpert {
    role: AgentRole,
    system_prompt: &'static str,
    llm: Arc<dyn LlmCapability>,
    policy: CallPolicy,
}

impl std::fmt::Debug for LlmExpert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmExpert")
            .field("role", &self.role)
            .field("llm", &self.llm.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl LlmExpert {
    pub fn new(
        role: AgentRole,
        system_prompt: &'static str,
        llm: Arc<dyn LlmCapability>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            role,
            system_prompt,
            llm,
            policy: CallPolicy::new(policy.attempt_timeout, policy.max_retries),
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    pub async fn run(&self, payload: &RoutedPayload) -> AgentOutcome {
        let started = Instant::now();
        let agent = self.role.agent_name();

        if let Some(outcome) = super::misrouted(self.role, payload) {
            return outcome;
        }

        if payload.snippets().is_empty() {
            let confidence = if payload.extraction_incomplete() {
                INCOMPLETE_EMPTY_CONFIDENCE
            } else {
                1.0
            };
            tracing::debug!(agent, confidence, "No snippets routed, skipping LLM call");
            let findings = FindingSet::new(self.role, Vec::new(), confidence);
            return AgentOutcome::succeeded(findings, 0, super::elapsed_ms(started));
        }

        let bundle = prompts::build_prompt(self.system_prompt, payload);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(self.policy.attempt_timeout, self.llm.complete(&bundle)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(attempt_started.elapsed().as_millis() as u64)),
            };
            let result = result.and_then(|raw| normalize(self.role, payload, raw));

            let elapsed_ms = super::elapsed_ms(started);
            match result {
                Ok(findings) => {
                    tracing::info!(
                        agent,
                        findings = findings.findings.len(),
                        confidence = findings.confidence,
                        attempts,
                        elapsed_ms,
                        "Agent finished"
                    );
                    return AgentOutcome::succeeded(findings, attempts, elapsed_ms);
                }
                Err(e) if e.is_transient() && attempts <= self.policy.max_retries => {
                    tracing::warn!(agent, error = %e, attempts, "Transient LLM failure, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => {
                    let reason = match e {
                        LlmError::Malformed(reason) => TrustlensError::AgentParse {
                            agent: agent.to_string(),
                            reason,
                        }
                        .to_string(),
                        LlmError::Timeout(ms) => TrustlensError::AgentTimeout {
                            agent: agent.to_string(),
                            elapsed_ms: ms,
                        }
                        .to_string(),
                        other => format!("Agent {} failed: {}", agent, other),
                    };
                    tracing::warn!(agent, %reason, attempts, elapsed_ms, "Agent failed");
                    return AgentOutcome::failed(self.role, reason, attempts, elapsed_ms);
                }
            }
        }
    }
}

/// Turn a raw completion into a finding set scoped to the payload
pub fn normalize(
    role: AgentRole,
    payload: &RoutedPayload,
    raw: RawCompletion,
) -> Result<FindingSet, LlmError> {
    let agent = role.agent_name();
    let mut findings = Vec::with_capacity(raw.findings.len());

    for item in raw.findings {
        let severity = Severity::parse(&item.severity)
            .ok_or_else(|| LlmError::Malformed(format!("unknown severity '{}'", item.severity)))?;
        let stance = match item.stance.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("safe") => Stance::Safe,
            _ => Stance::Concern,
        };

        let (kept, dropped): (Vec<String>, Vec<String>) = item
            .evidence_refs
            .into_iter()
            .partition(|id| payload.has_evidence(id));
        if !dropped.is_empty() {
            tracing::warn!(agent, ?dropped, "Evidence outside the payload, keeping it out of the verdict");
        }

        let confidence = match item.confidence {
            Some(value) => unit_interval(value, "finding confidence")?,
            None => raw.raw_confidence,
        };

        let category = if item.category.trim().is_empty() {
            agent.to_string()
        } else {
            item.category
        };

        findings.push(
            Finding::new(
                agent,
                category,
                item.description,
                severity,
                confidence,
            )
            .with_evidence(kept)
            .with_dropped_evidence(dropped)
            .with_stance(stance),
        );
    }

    Ok(FindingSet::new(role, findings, raw.raw_confidence))
}
