//! TrustLens Agents - expert agents and run orchestration
//!
//! This crate holds the asynchronous half of TrustLens:
//!
//! - **LLM capability** (`llm`): opaque completion interface, an
//!   OpenAI-compatible client, and a stand-in for when no backend is set up
//! - **Expert agents** (`experts`): security and logic over the LLM, quality
//!   over deterministic metric thresholds
//! - **Orchestrator** (`orchestrator`): extraction, routing, parallel agents
//!   under a global deadline, decision
//! - **Configuration** (`config`): TOML/JSON run settings

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod experts;
pub mod llm;
pub mod orchestrator;
pub mod prompts;

pub use config::TrustlensConfig;
pub use experts::{CallPolicy, ExpertAgent, LogicAgent, QualityAgent, SecurityAgent};
pub use llm::{LlmCapability, LlmError, OpenAiCompatibleClient, PromptBundle, RawCompletion, UnavailableLlm};
pub use orchestrator::Orchestrator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
