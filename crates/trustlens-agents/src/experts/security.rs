//! Security expert

use super::{CallPolicy, ExpertAgent, LlmExpert};
use crate::llm::LlmCapability;
use async_trait::async_trait;
use std::sync::Arc;
use trustlens_core::routing::RoutedPayload;
use trustlens_core::types::{AgentOutcome, AgentRole};

pub const SYSTEM_PROMPT: &str = "You are a senior application security reviewer. \
You receive short code snippets that a rule-based scanner flagged as security-relevant \
(SQL construction, credential handling, cryptography, dynamic execution, untrusted input). \
Report concrete vulnerabilities only: injection, broken authentication, weak or misused \
cryptography, secrets in code, unsafe deserialization, command execution on untrusted data. \
Rate severity by exploitability and impact. Do not report style or performance issues.";

/// LLM-backed agent over security-tagged snippets
#[derive(Debug)]
pub struct SecurityAgent {
    inner: LlmExpert,
}

impl SecurityAgent {
    pub fn new(llm: Arc<dyn LlmCapability>, policy: CallPolicy) -> Self {
        Self {
            inner: LlmExpert::new(AgentRole::Security, SYSTEM_PROMPT, llm, policy),
        }
    }
}

#[async_trait]
impl ExpertAgent for SecurityAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Security
    }

    async fn analyze(&self, payload: &RoutedPayload) -> AgentOutcome {
        self.inner.run(payload).await
    }
}
