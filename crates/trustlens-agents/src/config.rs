//! Run configuration

use crate::experts::llm_expert::{CallPolicy, MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use trustlens_core::error::{Result, ResultExt, TrustlensError};
use trustlens_core::snapshot::ExtractorSettings;

/// Main TrustLens configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustlensConfig {
    /// Deadlines and retries
    pub orchestrator: OrchestratorSettings,

    /// LLM backend
    pub llm: LlmSettings,

    /// Snapshot loading and extraction
    pub extractor: ExtractorSettings,
}

impl TrustlensConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global run deadline
    pub fn with_run_deadline(mut self, secs: u64) -> Self {
        self.orchestrator.run_deadline_secs = secs;
        self
    }

    /// Set the per-attempt LLM timeout
    pub fn with_agent_timeout(mut self, secs: u64) -> Self {
        self.orchestrator.agent_timeout_secs = secs;
        self
    }

    /// Set the retry budget (clamped to one retry)
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.orchestrator.max_retries = retries;
        self
    }

    /// Set the LLM model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// Set the LLM endpoint
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm.base_url = url.into();
        self
    }

    /// Load configuration from a TOML or JSON file (by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(TrustlensError::from)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed: Result<Self> = match extension(path).as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(TrustlensError::from),
            _ => toml::from_str(&content).map_err(|e| TrustlensError::Config(e.to_string())),
        };
        let config = parsed.with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML or JSON file (by extension)
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self).map_err(|e| TrustlensError::Config(e.to_string()))?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        let o = &self.orchestrator;
        if o.run_deadline_secs == 0 {
            return Err(TrustlensError::Config("run_deadline_secs must be positive".into()));
        }
        if o.agent_timeout_secs == 0 {
            return Err(TrustlensError::Config("agent_timeout_secs must be positive".into()));
        }
        if o.run_deadline_secs < o.agent_timeout_secs {
            return Err(TrustlensError::Config(format!(
                "run deadline ({}s) is shorter than the agent timeout ({}s)",
                o.run_deadline_secs, o.agent_timeout_secs
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(TrustlensError::Config("llm.model must not be empty".into()));
        }
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Global deadline for all agents, in seconds
    pub run_deadline_secs: u64,

    /// Timeout of a single LLM attempt, in seconds
    pub agent_timeout_secs: u64,

    /// Retries on transient LLM failure (at most 1)
    pub max_retries: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            run_deadline_secs: 120,
            agent_timeout_secs: 45,
            max_retries: 1,
        }
    }
}

impl OrchestratorSettings {
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy::new(
            Duration::from_secs(self.agent_timeout_secs),
            self.max_retries.min(MAX_RETRIES),
        )
    }
}

/// LLM backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model name
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Completion token limit
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "TRUSTLENS_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

impl LlmSettings {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrustlensConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.run_deadline(), Duration::from_secs(120));
        assert_eq!(config.llm.api_key_env, "TRUSTLENS_API_KEY");
    }

    #[test]
    fn test_retries_are_clamped() {
        let config = TrustlensConfig::new().with_max_retries(5);
        assert_eq!(config.orchestrator.call_policy().max_retries, 1);
    }

    #[test]
    fn test_validate_rejects_inconsistent_deadlines() {
        let config = TrustlensConfig::new().with_run_deadline(10).with_agent_timeout(30);
        assert!(matches!(config.validate(), Err(TrustlensError::Config(_))));
        assert!(TrustlensConfig::new().with_agent_timeout(0).validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trustlens.toml");
        let config = TrustlensConfig::new()
            .with_model("local-model")
            .with_base_url("http://localhost:11434/v1");
        config.to_file(&path).unwrap();
        assert_eq!(TrustlensConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trustlens.json");
        std::fs::write(&path, r#"{"orchestrator": {"run_deadline_secs": 300}}"#).unwrap();
        let config = TrustlensConfig::from_file(&path).unwrap();
        assert_eq!(config.orchestrator.run_deadline_secs, 300);
        assert_eq!(config.orchestrator.agent_timeout_secs, 45);
        assert_eq!(config.extractor.max_file_bytes, 1024 * 1024);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trustlens.toml");
        std::fs::write(&path, "[orchestrator]\nrun_deadline_secs = 0\n").unwrap();

        let err = TrustlensConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            &err,
            TrustlensError::WithContext { source, .. } if matches!(**source, TrustlensError::Config(_))
        ));
        assert!(err.to_string().starts_with("validating "));

        let missing = TrustlensConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.to_string().contains("absent.toml"));
        assert!(!missing.is_fatal());
    }
}
