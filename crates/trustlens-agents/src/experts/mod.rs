//! Expert agents
//!
//! Three variants share one contract: take a routed payload, return an
//! [`AgentOutcome`] holding a complete finding set. `analyze` never
//! returns an error; failures are folded into the outcome.

pub mod llm_expert;
pub mod logic;
pub mod quality;
pub mod security;

use async_trait::async_trait;
use tokio::time::Instant;
use trustlens_core::routing::RoutedPayload;
use trustlens_core::types::{AgentOutcome, AgentRole};

pub use llm_expert::{CallPolicy, LlmExpert};
pub use logic::LogicAgent;
pub use quality::QualityAgent;
pub use security::SecurityAgent;

#[async_trait]
pub trait ExpertAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    fn name(&self) -> &str {
        self.role().agent_name()
    }

    async fn analyze(&self, payload: &RoutedPayload) -> AgentOutcome;
}

/// Outcome for a payload handed to the wrong agent
pub(crate) fn misrouted(role: AgentRole, payload: &RoutedPayload) -> Option<AgentOutcome> {
    (payload.role() != role).then(|| {
        AgentOutcome::failed(
            role,
            format!("received a payload routed for {}", payload.role()),
            0,
            0,
        )
    })
}

/// Milliseconds since `started`, on the tokio clock
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_the_clock() {
        let started = Instant::now();
        assert_eq!(elapsed_ms(started), 0);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(elapsed_ms(started), 250);
    }
}
