//! JSON output renderer.
//!
//! Outputs the whole review outcome: verdict, attempts, metrics, mode and
//! the stage results.

use crate::orchestrator::ReviewOutcome;
use crate::output::OutputRenderer;

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, outcome: &ReviewOutcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::outcome;

    #[test]
    fn render_json() {
        let output = JsonRenderer.render(&outcome(
            r#"{"issues": [{"severity": "HIGH", "type": "bug", "file": "a.rs", "line": 3, "description": "off by one"}]}"#,
        ));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["verdict"]["issues"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["verdict"]["issues"][0]["type"], "bug");
        assert_eq!(parsed["stop_reason"], "issues_found");
        assert_eq!(parsed["mode"], "full");
        assert_eq!(parsed["metrics"]["file_count"], 2);
        assert_eq!(parsed["attempts"][0]["issues_count"], 1);
        assert_eq!(parsed["intent_analysis"]["status"], "failure");
        assert!(parsed.get("static_analysis").is_none());
    }

    #[test]
    fn render_clean_json() {
        let output = JsonRenderer.render(&outcome("{}"));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["verdict"]["issues"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["stop_reason"], "exhausted");
    }
}
