//! Logic expert

use super::{CallPolicy, ExpertAgent, LlmExpert};
use crate::llm::LlmCapability;
use async_trait::async_trait;
use std::sync::Arc;
use trustlens_core::routing::RoutedPayload;
use trustlens_core::types::{AgentOutcome, AgentRole};

pub const SYSTEM_PROMPT: &str = "You are a meticulous reviewer of program logic. \
You receive short code snippets with branching, loops or recursion. \
Report correctness defects only: off-by-one errors, wrong loop bounds, unreachable or \
inverted conditions, missing base cases, unbounded recursion, accidental quadratic work \
on unbounded input, and unhandled edge cases such as empty or null input. \
Do not report security vulnerabilities or formatting.";

/// LLM-backed agent over logic-tagged snippets
#[derive(Debug)]
pub struct LogicAgent {
    inner: LlmExpert,
}

impl LogicAgent {
    pub fn new(llm: Arc<dyn LlmCapability>, policy: CallPolicy) -> Self {
        Self {
            inner: LlmExpert::new(AgentRole::Logic, SYSTEM_PROMPT, llm, policy),
        }
    }
}

#[async_trait]
impl ExpertAgent for LogicAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Logic
    }

    async fn analyze(&self, payload: &RoutedPayload) -> AgentOutcome {
        self.inner.run(payload).await
    }
}
