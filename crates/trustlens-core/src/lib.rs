//! TrustLens Core - the deterministic half of the analysis pipeline
//!
//! TrustLens Core holds everything in a run that does not need a language
//! model: turning a codebase into features, slicing those features per
//! agent, and synthesizing agent output into one verdict.
//!
//! # Architecture
//!
//! Data flows strictly downstream:
//!
//! 1. **Snapshot** (`snapshot`): ordered file records, inline or on disk
//! 2. **Feature Extraction** (`extraction`): snippets, tags and metrics, computed once
//! 3. **Routing Policy** (`routing`): bounded, role-specific payloads
//! 4. **Decision Agent** (`decision`): risk, conflicts, confidence, action
//!
//! Expert agents and the orchestrator live in `trustlens-agents`.
//!
//! # Quick Start
//!
//! ```
//! use trustlens_core::extraction::FeatureExtractor;
//! use trustlens_core::routing::route;
//! use trustlens_core::snapshot::{CodebaseSnapshot, FileRecord};
//! use trustlens_core::types::AgentRole;
//!
//! let snapshot = CodebaseSnapshot::new(vec![FileRecord::inline(
//!     "app.py",
//!     "def find(db, name):\n    return db.execute(\"SELECT * FROM users WHERE name = '\" + name + \"'\")\n",
//! )]);
//!
//! let features = FeatureExtractor::default().extract(&snapshot);
//! let payload = route(&features, AgentRole::Security).unwrap();
//!
//! assert_eq!(payload.snippets().len(), 1);
//! assert!(route(&features, AgentRole::Quality).unwrap().snippets().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod decision;
pub mod error;
pub mod extraction;
pub mod features;
pub mod routing;
pub mod snapshot;
pub mod types;

// Re-export commonly used types for convenience
pub use decision::{decide, Action, Conflict, ConflictKind, FindingSets, Recommendation};
pub use error::{Result, TrustlensError};
pub use extraction::FeatureExtractor;
pub use features::{FeatureMeta, FeatureSet, Snippet, TopicTag};
pub use routing::{route, RoutedPayload};
pub use snapshot::{CodebaseSnapshot, ExtractorSettings, FileRecord};
pub use types::{
    AgentOutcome, AgentRole, AgentStatus, AgentTrace, Finding, FindingSet, RiskLevel, Severity,
    TraceLog,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
