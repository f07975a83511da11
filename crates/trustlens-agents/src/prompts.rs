//! Prompt construction for the LLM-backed agents

use crate::llm::PromptBundle;
use trustlens_core::routing::RoutedPayload;

/// Output contract appended to every system prompt
pub const RESPONSE_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{
  "findings": [
    {
      "category": "<short-kebab-case-name>",
      "description": "<one or two sentences>",
      "severity": "low" | "medium" | "high" | "critical",
      "confidence": <number between 0 and 1>,
      "evidenceRefs": ["<snippet id exactly as given>"],
      "stance": "concern" | "safe"
    }
  ],
  "confidence": <number between 0 and 1, your confidence in the whole assessment>
}
Cite only snippet ids listed in the request. Use "stance": "safe" only to state that a snippet was checked and is fine. Return an empty findings array when nothing is wrong."#;

/// Build the prompt for a snippet payload
pub fn build_prompt(system_prompt: &str, payload: &RoutedPayload) -> PromptBundle {
    let mut user = format!(
        "Feature set {} ({} snippet(s)){}:\n\n",
        payload.feature_set_version(),
        payload.snippets().len(),
        if payload.extraction_incomplete() {
            ", extraction incomplete"
        } else {
            ""
        }
    );

    for snippet in payload.snippets() {
        user.push_str(&format!(
            "### {} ({} lines {}-{})\n```\n{}\n```\n\n",
            snippet.id,
            snippet.source_file,
            snippet.line_range.start,
            snippet.line_range.end,
            snippet.text
        ));
    }

    PromptBundle {
        role: payload.role(),
        system: format!("{}\n\n{}", system_prompt, RESPONSE_CONTRACT),
        user,
        evidence_ids: payload.snippets().iter().map(|s| s.id.clone()).collect(),
    }
}
