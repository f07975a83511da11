//! LLM capability
//!
//! The language model is an opaque collaborator: given a prompt bundle it
//! returns raw findings plus a confidence, or fails. Failures are
//! classified so the caller can tell a retryable hiccup from a response
//! that will never parse.

pub mod openai_compatible;
pub mod parse;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use trustlens_core::types::AgentRole;

pub use openai_compatible::OpenAiCompatibleClient;

/// Prompt handed to the LLM capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBundle {
    pub role: AgentRole,
    pub system: String,
    pub user: String,
    /// Snippet ids the model may cite
    pub evidence_ids: Vec<String>,
}

/// Finding as the model wrote it, before normalization
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
    #[serde(default)]
    pub category: String,
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "evidence_refs", alias = "evidence")]
    pub evidence_refs: Vec<String>,
    #[serde(default)]
    pub stance: Option<String>,
}

/// Parsed completion
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion {
    pub findings: Vec<RawFinding>,
    pub raw_confidence: f64,
}

/// LLM failure, classified for the retry policy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error: {0}")]
    Server(String),

    /// Response arrived but cannot be turned into findings
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl LlmError {
    /// Worth one more attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::Server(_)
        )
    }
}

/// Opaque language-model capability used by the LLM-backed agents
#[async_trait]
pub trait LlmCapability: Send + Sync {
    /// Provider name for logs and traces
    fn name(&self) -> &str;

    async fn complete(&self, bundle: &PromptBundle) -> Result<RawCompletion, LlmError>;
}

/// Stand-in capability when no backend is configured; every call fails
#[derive(Debug, Clone)]
pub struct UnavailableLlm {
    reason: String,
}

impl UnavailableLlm {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmCapability for UnavailableLlm {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _bundle: &PromptBundle) -> Result<RawCompletion, LlmError> {
        Err(LlmError::Unavailable(self.reason.clone()))
    }
}
