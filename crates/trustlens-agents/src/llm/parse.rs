//! Parsing model output into a [`RawCompletion`]
//!
//! Models wrap JSON in prose or markdown fences; we take the outermost
//! object and require `findings` plus a confidence. Every confidence, top
//! level or per finding, must lie in [0, 1] or the reply is malformed.

use super::{LlmError, RawCompletion, RawFinding};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionBody {
    findings: Vec<RawFinding>,
    #[serde(default)]
    confidence: Option<f64>,
    /// Older prompt wording; `confidence` wins when both are present
    #[serde(default, alias = "raw_confidence")]
    raw_confidence: Option<f64>,
}

pub(crate) fn unit_interval(value: f64, what: &str) -> Result<f64, LlmError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(LlmError::Malformed(format!("{} {} outside [0, 1]", what, value)))
    }
}

/// Extract the JSON object embedded in `content`
pub fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

pub fn parse_completion(content: &str) -> Result<RawCompletion, LlmError> {
    let json = extract_json(content)
        .ok_or_else(|| LlmError::Malformed("no JSON object in response".to_string()))?;

    let body: CompletionBody =
        serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))?;

    let raw_confidence = body
        .confidence
        .or(body.raw_confidence)
        .ok_or_else(|| LlmError::Malformed("missing confidence".to_string()))?;
    let raw_confidence = unit_interval(raw_confidence, "confidence")?;
    for finding in &body.findings {
        if let Some(value) = finding.confidence {
            unit_interval(value, "finding confidence")?;
        }
    }

    Ok(RawCompletion {
        findings: body.findings,
        raw_confidence,
    })
}
