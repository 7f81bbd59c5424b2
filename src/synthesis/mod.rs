//! Synthesis Loop.
//!
//! Calls the model with the combined document until a verdict reports at
//! least one issue or the attempt ceiling is reached. Attempts are strictly
//! sequential; each verdict stands alone and only the last one is kept.

pub mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{info, warn};

use crate::decode::{DecodeError, decode};
use crate::models::verdict::{AttemptRecord, ReviewVerdict};
use crate::providers::{LlmCaller, ProviderError};

pub use prompt::{attempt_prompt, retry_hint, review_prompt, system_prompt};

/// Response budget for a review call.
pub const SYNTHESIS_MAX_TOKENS: u64 = 16_384;

#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("review call failed on attempt {attempt}: {source}")]
    Provider {
        attempt: u32,
        #[source]
        source: ProviderError,
    },

    #[error("could not decode the review on final attempt {attempt}: {source}")]
    Decode {
        attempt: u32,
        #[source]
        source: DecodeError,
    },
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// A verdict reported at least one issue.
    IssuesFound,
    /// The ceiling was reached without issues; the change is treated as clean.
    Exhausted,
}

/// Transition after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Stop(StopReason),
    Retry,
}

/// Decide what follows attempt `attempt` (1-based) that found `issues` issues.
pub fn next_step(issues: usize, attempt: u32, max_attempts: u32) -> Step {
    if issues > 0 {
        Step::Stop(StopReason::IssuesFound)
    } else if attempt >= max_attempts {
        Step::Stop(StopReason::Exhausted)
    } else {
        Step::Retry
    }
}

/// The kept verdict and the trail of attempts that led to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub verdict: ReviewVerdict,
    pub attempts: Vec<AttemptRecord>,
    pub stop_reason: StopReason,
}

/// Drives the review calls.
pub struct SynthesisLoop {
    llm: Arc<dyn LlmCaller>,
    max_attempts: u32,
}

impl SynthesisLoop {
    /// A ceiling of zero is treated as one.
    pub fn new(llm: Arc<dyn LlmCaller>, max_attempts: u32) -> Self {
        Self {
            llm,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run attempts against `base_prompt` until a stop state is reached.
    ///
    /// A failed call aborts immediately. A response that cannot be decoded
    /// counts as a clean attempt unless it is the last one.
    pub async fn run(
        &self,
        base_prompt: &str,
        system_prompt: &str,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let mut attempts = Vec::new();
        let mut attempt = 1;

        loop {
            let prompt = attempt_prompt(base_prompt, attempt);
            info!(attempt, max = self.max_attempts, "requesting review");

            let text = self
                .llm
                .call(&prompt, Some(system_prompt), SYNTHESIS_MAX_TOKENS)
                .await
                .map_err(|source| SynthesisError::Provider { attempt, source })?;

            let (verdict, record) = match decode::<ReviewVerdict>(&text) {
                Ok(mut verdict) => {
                    verdict.raw_review = text;
                    let record = AttemptRecord {
                        attempt,
                        issues_count: verdict.issues.len(),
                        score: verdict.score,
                        decode_error: None,
                    };
                    (verdict, record)
                }
                Err(source) if attempt >= self.max_attempts => {
                    return Err(SynthesisError::Decode { attempt, source });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "review response could not be decoded");
                    let verdict = ReviewVerdict {
                        raw_review: text,
                        ..ReviewVerdict::default()
                    };
                    let record = AttemptRecord {
                        attempt,
                        issues_count: 0,
                        score: verdict.score,
                        decode_error: Some(e.to_string()),
                    };
                    (verdict, record)
                }
            };

            info!(
                attempt,
                issues = record.issues_count,
                score = record.score,
                "review attempt finished"
            );
            let issues = record.issues_count;
            attempts.push(record);

            match next_step(issues, attempt, self.max_attempts) {
                Step::Stop(stop_reason) => {
                    if stop_reason == StopReason::Exhausted && self.max_attempts > 1 {
                        info!(
                            attempts = attempts.len(),
                            "no issues found after all attempts, treating change as clean"
                        );
                    }
                    return Ok(SynthesisOutcome {
                        verdict,
                        attempts,
                        stop_reason,
                    });
                }
                Step::Retry => attempt += 1,
            }
        }
    }
}
