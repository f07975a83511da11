//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use trustlens_agents::llm::{LlmCapability, LlmError, PromptBundle, RawCompletion, RawFinding};
use trustlens_core::types::AgentRole;

/// One scripted reply
pub enum Step {
    Reply(Result<RawCompletion, LlmError>),
    /// Sleep, then reply
    Delayed(Duration, Result<RawCompletion, LlmError>),
}

/// LLM double replaying a per-role script and recording every prompt
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<AgentRole, VecDeque<Step>>>,
    prompts: Mutex<Vec<PromptBundle>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, role: AgentRole, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(role, steps.into());
        self
    }

    pub fn prompts_for(&self, role: AgentRole) -> Vec<PromptBundle> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.role == role)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LlmCapability for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, bundle: &PromptBundle) -> Result<RawCompletion, LlmError> {
        self.prompts.lock().unwrap().push(bundle.clone());
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&bundle.role)
            .and_then(|steps| steps.pop_front());

        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(LlmError::Unavailable("script exhausted".into())),
        }
    }
}

pub fn raw_finding(category: &str, severity: &str, evidence: &[&str]) -> RawFinding {
    RawFinding {
        category: category.to_string(),
        description: format!("{} detected", category),
        severity: severity.to_string(),
        confidence: None,
        evidence_refs: evidence.iter().map(|e| e.to_string()).collect(),
        stance: None,
    }
}

pub fn completion(findings: Vec<RawFinding>, confidence: f64) -> Result<RawCompletion, LlmError> {
    Ok(RawCompletion {
        findings,
        raw_confidence: confidence,
    })
}

/// One file: a SQL concatenation and a deeply nested loop
pub const APP_PY: &str = r#"import sqlite3

def find_user(conn, name):
    query = "SELECT * FROM users WHERE name = '" + name + "'"
    return conn.execute(query)

def match_pairs(left, right):
    pairs = []
    for a in left:
        for b in right:
            for c in b.items:
                if a.key == c.key:
                    pairs.append((a, c))
    return pairs
"#;

pub const SECURITY_SNIPPET: &str = "app.py#L3-L5";
pub const LOGIC_SNIPPET: &str = "app.py#L7-L14";
