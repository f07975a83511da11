//! Human-readable rendering

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use trustlens_core::decision::{Action, Recommendation};
use trustlens_core::features::{FeatureMeta, FeatureSet, FileMetrics, LineRange, TopicTag};
use trustlens_core::types::AgentStatus;

/// Feature set summary without snippet text
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureIndex<'a> {
    pub meta: FeatureMeta,
    pub files: &'a [FileMetrics],
    pub snippets: Vec<SnippetEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetEntry<'a> {
    pub id: &'a str,
    pub topic_tags: &'a BTreeSet<TopicTag>,
    pub line_range: LineRange,
    pub chars: usize,
    pub signals: &'a [String],
}

pub fn feature_index(features: &FeatureSet) -> FeatureIndex<'_> {
    FeatureIndex {
        meta: features.meta(),
        files: &features.files,
        snippets: features
            .snippets
            .values()
            .map(|s| SnippetEntry {
                id: &s.id,
                topic_tags: &s.topic_tags,
                line_range: s.line_range,
                chars: s.char_len(),
                signals: &s.signals,
            })
            .collect(),
    }
}

fn action_label(action: Action) -> colored::ColoredString {
    match action {
        Action::Acceptable => "ACCEPTABLE".green().bold(),
        Action::ProceedWithCaution => "PROCEED WITH CAUTION".yellow().bold(),
        Action::ReviewRequired => "REVIEW REQUIRED".red().bold(),
        Action::ManualReviewRequired => "MANUAL REVIEW REQUIRED".red().bold().reversed(),
    }
}

fn status_label(status: &AgentStatus) -> colored::ColoredString {
    match status {
        AgentStatus::Succeeded => "ok".green(),
        AgentStatus::Failed { .. } => "failed".red(),
        AgentStatus::TimedOut => "timed out".red(),
    }
}

pub fn print_recommendation(rec: &Recommendation) {
    println!();
    println!("{} {}", "TrustLens".bold(), rec.run_id.to_string().dimmed());
    println!("  Feature set  {}", rec.feature_set_version);
    println!("  Action       {}", action_label(rec.action));
    println!("  Risk         {}", rec.overall_risk);
    println!("  Confidence   {:.2}", rec.overall_confidence);
    println!();

    println!("{}", "Agents".bold());
    for trace in &rec.traces {
        println!(
            "  {:<9} {:<10} {} finding(s), {} attempt(s), {}ms",
            trace.agent_name,
            status_label(&trace.status),
            trace.findings.len(),
            trace.attempts,
            trace.elapsed_ms
        );
        if let AgentStatus::Failed { reason } = &trace.status {
            println!("            {}", reason.dimmed());
        }
        for finding in trace.findings.iter().filter(|f| !f.is_analysis_error() && !f.advisory) {
            println!(
                "    [{}] {} ({})",
                finding.severity,
                finding.description,
                finding.evidence_refs.join(", ")
            );
        }
    }

    if !rec.conflicts.is_empty() {
        println!();
        println!("{}", "Conflicts".bold());
        for conflict in &rec.conflicts {
            println!("  {}", conflict.description.yellow());
        }
    }

    if !rec.advisory_notes.is_empty() {
        println!();
        println!("{}", "Advisory".bold());
        for note in &rec.advisory_notes {
            println!("  {}", note);
        }
    }

    println!();
    println!("{}", rec.rationale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustlens_core::features::Snippet;

    #[test]
    fn test_index_omits_snippet_text() {
        let mut features = FeatureSet::incomplete("fs-1", vec![]);
        let snippet = Snippet::new("a.py", LineRange::new(2, 4), "eval(user_input)", TopicTag::Security)
            .with_signals(vec!["dynamic-execution".into()]);
        features.snippets.insert(snippet.id.clone(), snippet);

        let json = serde_json::to_value(feature_index(&features)).unwrap();
        let entry = &json["snippets"][0];
        assert_eq!(entry["id"], "a.py#L2-L4");
        assert_eq!(entry["chars"], 16);
        assert!(entry.get("text").is_none());
        assert_eq!(json["meta"]["snippetCount"], 1);
    }
}
