//! Static-analysis findings.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::severity::Severity;

/// Broad category of a static-analysis finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FindingCategory {
    Security,
    Performance,
    Correctness,
    Style,
}

const CATEGORY_KEYWORDS: &[(FindingCategory, &[&str])] = &[
    (
        FindingCategory::Security,
        &["security", "injection", "xss", "sqli", "auth", "crypto", "secrets"],
    ),
    (
        FindingCategory::Performance,
        &["performance", "complexity", "timeout", "memory"],
    ),
    (
        FindingCategory::Correctness,
        &["correctness", "bug", "error", "null", "undefined", "mutable", "falsy", "copy"],
    ),
    (FindingCategory::Style, &["style", "lint", "format", "naming"]),
];

impl FindingCategory {
    /// Classify by keyword over the rule id and message; `Security` when nothing matches.
    pub fn classify(rule_id: &str, message: &str) -> Self {
        let haystack = format!("{rule_id} {message}").to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| haystack.contains(w)))
            .map(|(category, _)| *category)
            .unwrap_or(FindingCategory::Security)
    }
}

/// A single issue reported by the static analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SastFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub category: FindingCategory,
    pub message: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owasp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl SastFinding {
    /// `file:line` or `file:line-end`.
    pub fn location(&self) -> String {
        match self.end_line {
            Some(end) => format!("{}:{}-{end}", self.file, self.line),
            None => format!("{}:{}", self.file, self.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_first_matching_category() {
        assert_eq!(
            FindingCategory::classify("python.lang.security.sqli", "raw query"),
            FindingCategory::Security
        );
        assert_eq!(
            FindingCategory::classify("regex-complexity", "catastrophic backtracking"),
            FindingCategory::Performance
        );
        assert_eq!(
            FindingCategory::classify("default-mutable-arg", "shared list"),
            FindingCategory::Correctness
        );
        assert_eq!(
            FindingCategory::classify("naming.snake", "rename this"),
            FindingCategory::Style
        );
        assert_eq!(
            FindingCategory::classify("generic", "something odd"),
            FindingCategory::Security
        );
    }
}
