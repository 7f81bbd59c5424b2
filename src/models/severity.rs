//! Severity shared by static-analysis findings and review issues.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level of a finding or issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Lenient deserializer: models answer with all kinds of severity words.
///
/// Anything unrecognised becomes `Low` instead of failing the whole verdict.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&s))
    }
}

impl Severity {
    /// Map a free-form label onto a severity, defaulting to `Low`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "critical" | "error" | "severe" | "blocker" | "fatal" => Severity::High,
            "medium" | "moderate" | "warning" | "warn" | "major" => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Map a semgrep severity (`ERROR`, `WARNING`, `INFO`), defaulting to `Medium`.
    pub fn from_semgrep(label: &str) -> Self {
        match label.to_uppercase().as_str() {
            "ERROR" => Severity::High,
            "INFO" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Sort rank with the most severe first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High.rank() < Severity::Low.rank());
    }

    #[test]
    fn lenient_deserialize() {
        let cases = [
            ("\"HIGH\"", Severity::High),
            ("\"critical\"", Severity::High),
            ("\"Medium\"", Severity::Medium),
            ("\"warning\"", Severity::Medium),
            ("\"low\"", Severity::Low),
            ("\"nonsense\"", Severity::Low),
        ];
        for (json, expected) in cases {
            let parsed: Severity = serde_json::from_str(json).unwrap();
            assert_eq!(parsed, expected, "for {json}");
        }
    }

    #[test]
    fn semgrep_mapping() {
        assert_eq!(Severity::from_semgrep("ERROR"), Severity::High);
        assert_eq!(Severity::from_semgrep("WARNING"), Severity::Medium);
        assert_eq!(Severity::from_semgrep("INFO"), Severity::Low);
        assert_eq!(Severity::from_semgrep("EXPERIMENT"), Severity::Medium);
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"MEDIUM\"");
    }
}
