//! The final review verdict produced by the synthesis loop.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::Display;

use super::severity::Severity;

/// Overall disposition of the review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    Approve,
    RequestChanges,
    #[default]
    Comment,
}

impl<'de> Deserialize<'de> for Assessment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "APPROVE" | "APPROVED" => Assessment::Approve,
            "REQUEST_CHANGES" | "CHANGES_REQUESTED" => Assessment::RequestChanges,
            _ => Assessment::Comment,
        })
    }
}

/// Category of a review issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
    Bug,
    Security,
    Performance,
    Style,
    #[default]
    BestPractice,
    Typo,
    StaticDefect,
    LogicDefect,
    Encapsulation,
}

impl<'de> Deserialize<'de> for IssueKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "bug" => IssueKind::Bug,
            "security" => IssueKind::Security,
            "performance" => IssueKind::Performance,
            "style" => IssueKind::Style,
            "typo" => IssueKind::Typo,
            "static_defect" => IssueKind::StaticDefect,
            "logic_defect" => IssueKind::LogicDefect,
            "encapsulation" => IssueKind::Encapsulation,
            _ => IssueKind::BestPractice,
        })
    }
}

/// One issue found by the review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawIssue")]
pub struct ReviewIssue {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Replacement text for the flagged lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_change: Option<String>,
}

/// Issue as the model writes it: line numbers may be numbers, strings or ranges.
#[derive(Deserialize)]
struct RawIssue {
    #[serde(default = "default_severity")]
    severity: Severity,
    #[serde(default, rename = "type")]
    kind: IssueKind,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Value,
    #[serde(default)]
    end_line: Value,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    suggested_change: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Low
}

impl From<RawIssue> for ReviewIssue {
    fn from(raw: RawIssue) -> Self {
        let (line, range_end) = parse_line_ref(&raw.line);
        let end_line = parse_line_ref(&raw.end_line).0.or(range_end);
        let file = raw
            .file
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            severity: raw.severity,
            kind: raw.kind,
            file,
            line,
            end_line,
            description: raw.description,
            suggestion: raw.suggestion.filter(|s| !s.is_empty()),
            suggested_change: raw.suggested_change.filter(|s| !s.is_empty()),
        }
    }
}

/// Parse `12`, `"12"` or `"12-20"` into a start line and optional range end.
fn parse_line_ref(value: &Value) -> (Option<u32>, Option<u32>) {
    match value {
        Value::Number(n) => (n.as_u64().and_then(|v| u32::try_from(v).ok()), None),
        Value::String(s) => {
            let s = s.trim();
            match s.split_once('-') {
                Some((start, end)) => (start.trim().parse().ok(), end.trim().parse().ok()),
                None => (s.parse().ok(), None),
            }
        }
        _ => (None, None),
    }
}

/// The structured output of one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub overall_assessment: Assessment,
    #[serde(default = "default_score", deserialize_with = "lenient_score")]
    pub score: u8,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub positive_feedback: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// The model's raw response text.
    #[serde(default, skip_deserializing)]
    pub raw_review: String,
}

impl Default for ReviewVerdict {
    fn default() -> Self {
        Self {
            summary: String::new(),
            overall_assessment: Assessment::default(),
            score: default_score(),
            issues: Vec::new(),
            positive_feedback: Vec::new(),
            suggestions: Vec::new(),
            raw_review: String::new(),
        }
    }
}

impl ReviewVerdict {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Highest severity among the issues.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

fn default_score() -> u8 {
    5
}

fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().split('/').next().and_then(|v| v.trim().parse().ok()),
        _ => None,
    };
    Ok(raw.map(|v| v.round().clamp(1.0, 10.0) as u8).unwrap_or_else(default_score))
}

/// Record of one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub issues_count: usize,
    pub score: u8,
    /// Set when the response could not be decoded into a verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}
