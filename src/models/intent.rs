//! Structured result of the intent analysis stage.

use serde::{Deserialize, Deserializer, Serialize};

/// What the change is trying to do, as judged by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentAnalysis {
    /// The problem the change sets out to solve.
    pub purpose: String,
    /// Patterns and techniques the implementation relies on.
    pub implementation_approach: String,
    pub key_changes: Vec<String>,
    /// Places where the implementation drifts from the stated intent.
    pub potential_issues: Vec<String>,
    /// Things the change may have overlooked (tests, migrations, callers).
    pub missing_considerations: Vec<String>,
    /// Effect on the wider system; empty when the model saw none.
    pub architectural_impact: String,
    /// Between 0.0 and 1.0.
    #[serde(deserialize_with = "lenient_confidence")]
    pub confidence: f64,
}

impl IntentAnalysis {
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Accepts `0.8`, `"0.8"`, `80` and `"80%"`, normalising to a fraction.
fn lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    Ok(fraction.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default() {
        let intent: IntentAnalysis = serde_json::from_str(r#"{"purpose": "Add caching"}"#).unwrap();
        assert_eq!(intent.purpose, "Add caching");
        assert!(intent.key_changes.is_empty());
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn confidence_normalisation() {
        let cases = [
            (r#"{"confidence": 0.85}"#, 85),
            (r#"{"confidence": "0.5"}"#, 50),
            (r#"{"confidence": 90}"#, 90),
            (r#"{"confidence": "70%"}"#, 70),
            (r#"{"confidence": null}"#, 0),
        ];
        for (json, expected) in cases {
            let intent: IntentAnalysis = serde_json::from_str(json).unwrap();
            assert_eq!(intent.confidence_percent(), expected, "for {json}");
        }
    }

    #[test]
    fn serialized_fields_use_schema_names() {
        let value = serde_json::to_value(IntentAnalysis::default()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "architectural_impact",
                "confidence",
                "implementation_approach",
                "key_changes",
                "missing_considerations",
                "potential_issues",
                "purpose",
            ]
        );
    }
}
