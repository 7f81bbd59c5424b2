//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::orchestrator::ReviewOutcome;

/// Renders a finished review.
pub trait OutputRenderer {
    fn render(&self, outcome: &ReviewOutcome) -> String;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::verdict::{AttemptRecord, ReviewVerdict};
    use crate::models::{ChangeMetrics, ProcessingMode, StageResult};
    use crate::orchestrator::ReviewOutcome;
    use crate::synthesis::StopReason;

    pub fn outcome(verdict_json: &str) -> ReviewOutcome {
        let verdict: ReviewVerdict = serde_json::from_str(verdict_json).unwrap();
        ReviewOutcome {
            run_id: "run-1".into(),
            change_id: "main..feature".into(),
            title: "Add login".into(),
            metrics: ChangeMetrics {
                file_count: 2,
                total_changes: 40,
                ..ChangeMetrics::default()
            },
            mode: ProcessingMode::Full,
            attempts: vec![AttemptRecord {
                attempt: 1,
                issues_count: verdict.issues.len(),
                score: verdict.score,
                decode_error: None,
            }],
            stop_reason: if verdict.has_issues() {
                StopReason::IssuesFound
            } else {
                StopReason::Exhausted
            },
            verdict,
            static_analysis: None,
            intent_analysis: Some(StageResult::Failure {
                error: "LLM API error: 503".into(),
                duration_ms: 10,
            }),
            duration_ms: 1234,
        }
    }
}
