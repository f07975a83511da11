//! Orchestrator - drives one analysis run
//!
//! ```text
//! CodebaseSnapshot
//!        │  extract (sync, once)
//!        v
//!    FeatureSet ──── route ×3 ────┬──────────────┬──────────────┐
//!                                 v              v              v
//!                          Security task   Logic task    Quality task
//!                                 │              │              │
//!                                 └──── global deadline ────────┘
//!                                               │
//!                                               v
//!                                   decide -> Recommendation
//! ```
//!
//! Each agent runs in its own task with its own payload copy. A task still
//! running at the deadline is aborted and recorded as timed out; the run
//! always proceeds to the decision step.

use crate::config::TrustlensConfig;
use crate::experts::{ExpertAgent, LogicAgent, QualityAgent, SecurityAgent};
use crate::llm::LlmCapability;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use trustlens_core::decision::{decide, FindingSets, Recommendation};
use trustlens_core::error::{Result, TrustlensError};
use trustlens_core::extraction::FeatureExtractor;
use trustlens_core::features::FeatureSet;
use trustlens_core::routing::route_all;
use trustlens_core::snapshot::CodebaseSnapshot;
use trustlens_core::types::{AgentOutcome, AgentRole, FindingSet, TraceLog};

pub struct Orchestrator {
    extractor: FeatureExtractor,
    security: Arc<dyn ExpertAgent>,
    logic: Arc<dyn ExpertAgent>,
    quality: Arc<dyn ExpertAgent>,
    run_deadline: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("extractor", &self.extractor)
            .field("agents", &[self.security.name(), self.logic.name(), self.quality.name()])
            .field("run_deadline", &self.run_deadline)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        extractor: FeatureExtractor,
        security: Arc<dyn ExpertAgent>,
        logic: Arc<dyn ExpertAgent>,
        quality: Arc<dyn ExpertAgent>,
        run_deadline: Duration,
    ) -> Self {
        Self {
            extractor,
            security,
            logic,
            quality,
            run_deadline,
        }
    }

    /// Standard agent set over one LLM capability
    pub fn from_config(config: &TrustlensConfig, llm: Arc<dyn LlmCapability>) -> Self {
        let policy = config.orchestrator.call_policy();
        Self::new(
            FeatureExtractor::new(config.extractor.clone()),
            Arc::new(SecurityAgent::new(llm.clone(), policy)),
            Arc::new(LogicAgent::new(llm, policy)),
            Arc::new(QualityAgent::new()),
            config.orchestrator.run_deadline(),
        )
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    fn agent(&self, role: AgentRole) -> Arc<dyn ExpertAgent> {
        match role {
            AgentRole::Security => self.security.clone(),
            AgentRole::Logic => self.logic.clone(),
            AgentRole::Quality => self.quality.clone(),
        }
    }

    /// Run the whole pipeline over a snapshot
    ///
    /// Only a routing violation is returned as an error; every other
    /// failure ends up inside the recommendation.
    pub async fn run(&self, snapshot: &CodebaseSnapshot) -> Result<Recommendation> {
        let features = self.extractor.extract(snapshot);
        self.run_features(&features).await
    }

    /// Run routing, agents and decision over an extracted feature set
    pub async fn run_features(&self, features: &FeatureSet) -> Result<Recommendation> {
        let payloads = route_all(features)?;
        let started = Instant::now();
        let deadline = started + self.run_deadline;

        tracing::info!(
            version = %features.version,
            deadline_secs = self.run_deadline.as_secs(),
            "Dispatching expert agents"
        );

        let handles: Vec<_> = payloads
            .into_iter()
            .map(|payload| {
                let agent = self.agent(payload.role());
                let provenance = payload.provenance().clone();
                let handle = tokio::spawn(async move { agent.analyze(&payload).await });
                (provenance, handle)
            })
            .collect();

        let mut traces = TraceLog::new();
        let mut sets: BTreeMap<AgentRole, FindingSet> = BTreeMap::new();

        for (provenance, mut handle) in handles {
            let role = provenance.role;
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    tracing::error!(agent = %role, error = %join_error, "Agent task aborted");
                    AgentOutcome::failed(role, format!("agent task aborted: {}", join_error), 0, elapsed_ms)
                }
                Err(_) => {
                    handle.abort();
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    let error = TrustlensError::AgentTimeout {
                        agent: role.agent_name().to_string(),
                        elapsed_ms,
                    };
                    tracing::warn!(agent = %role, error = %error, "Cancelled at run deadline");
                    AgentOutcome::timed_out(role, elapsed_ms)
                }
            };

            sets.insert(role, outcome.findings.clone());
            traces.push(outcome.into_trace(provenance));
        }

        let mut take = |role: AgentRole| sets.remove(&role).unwrap_or_else(|| FindingSet::empty(role));
        let finding_sets = FindingSets {
            security: take(AgentRole::Security),
            logic: take(AgentRole::Logic),
            quality: take(AgentRole::Quality),
        };

        Ok(decide(&features.meta(), &finding_sets, traces.into_traces()))
    }
}
