//! Error types for TrustLens Core
//!
//! This module defines the failure taxonomy shared by every stage of an
//! analysis run. We use `thiserror` for ergonomic error definitions with
//! automatic Display/Error implementations.
//!
//! Only [`TrustlensError::RoutingViolation`] is fatal to a run. Input,
//! timeout and parse failures are absorbed by the stage that observes them
//! and turned into reduced-confidence signals.

use crate::types::AgentRole;
use thiserror::Error;

/// Result type alias for TrustLens operations
pub type Result<T> = std::result::Result<T, TrustlensError>;

/// Main error type for TrustLens operations
#[derive(Error, Debug)]
pub enum TrustlensError {
    /// Source could not be read or was empty
    #[error("Input error: {0}")]
    Input(String),

    /// A routed payload broke a data-isolation invariant
    #[error("Routing violation for {role} payload: {reason}")]
    RoutingViolation { role: AgentRole, reason: String },

    /// An expert agent did not finish before its deadline
    #[error("Agent {agent} timed out after {elapsed_ms}ms")]
    AgentTimeout { agent: String, elapsed_ms: u64 },

    /// An LLM response could not be parsed into findings
    #[error("Agent {agent} returned a malformed response: {reason}")]
    AgentParse { agent: String, reason: String },

    /// Too many agents failed to reach a trustworthy verdict
    #[error("Insufficient agent coverage: {0}")]
    InsufficientCoverage(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<TrustlensError>,
    },
}

impl TrustlensError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error must halt the run instead of degrading it
    pub fn is_fatal(&self) -> bool {
        match self {
            TrustlensError::RoutingViolation { .. } => true,
            TrustlensError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = TrustlensError::Input("empty snapshot".to_string());
        let err = err.context("Failed to extract features");

        assert!(err.to_string().contains("Failed to extract features"));
        assert!(err.to_string().contains("empty snapshot"));
    }

    #[test]
    fn test_only_routing_violation_is_fatal() {
        let violation = TrustlensError::RoutingViolation {
            role: AgentRole::Security,
            reason: "6 snippets".to_string(),
        };
        assert!(violation.is_fatal());
        assert!(violation.context("routing").is_fatal());

        let timeout = TrustlensError::AgentTimeout {
            agent: "security".to_string(),
            elapsed_ms: 100,
        };
        assert!(!timeout.is_fatal());
        assert!(!TrustlensError::InsufficientCoverage("none".into()).is_fatal());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(TrustlensError::Config("zero deadline".into()));
        let result = result.context("Config validation failed");

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Config validation failed"));
    }
}
