//! Topic tagging rules
//!
//! Each snippet ends up with exactly one tag. Security rules win over
//! logic rules; a block matching neither is quality-irrelevant.

use super::structure::CodeBlock;
use crate::features::TopicTag;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Named security patterns
    static ref SECURITY_RULES: Vec<(&'static str, Regex)> = vec![
        (
            "sql-statement",
            Regex::new(r"(?i)\b(?:select\s+.+?\s+from|insert\s+into|update\s+\w+\s+set|delete\s+from)\b").unwrap(),
        ),
        (
            "credential-handling",
            Regex::new(r"(?i)password|passwd|secret|api[_-]?key|access[_-]?token|auth[_-]?token|jwt|credential|\b(?:session|login)\b").unwrap(),
        ),
        (
            "cryptography",
            Regex::new(r"(?i)md5|sha1|bcrypt|hashlib|hmac|cipher|encrypt|decrypt").unwrap(),
        ),
        (
            "dynamic-execution",
            Regex::new(r"\b(?:eval|exec|system|popen|execSync|spawn)\s*\(|subprocess|child_process|innerHTML|pickle\.loads|yaml\.load\(|Runtime\.getRuntime|shell\s*=\s*True").unwrap(),
        ),
        (
            "untrusted-input",
            Regex::new(r"\brequest\.(?:args|form|json|GET|POST|params|query)\b|\breq\.(?:body|query|params)\b|\$_(?:GET|POST|REQUEST|COOKIE)\b").unwrap(),
        ),
    ];
}

/// Tagging verdict for one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDecision {
    pub tag: TopicTag,
    /// Rule names that fired
    pub signals: Vec<String>,
}

/// Names of the security rules matching `text`
pub fn security_signals(text: &str) -> Vec<String> {
    SECURITY_RULES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Tag a block from its text and scanned structure
pub fn tag_block(text: &str, block: &CodeBlock) -> TagDecision {
    let mut signals = security_signals(text);
    let security = !signals.is_empty();

    let mut logic = false;
    if block.complexity > 1 {
        signals.push("decision-points".to_string());
        logic = true;
    }
    if block.recursive {
        signals.push("recursion".to_string());
        logic = true;
    }

    let tag = if security {
        TopicTag::Security
    } else if logic {
        TopicTag::Logic
    } else {
        TopicTag::QualityIrrelevant
    };

    TagDecision { tag, signals }
}
