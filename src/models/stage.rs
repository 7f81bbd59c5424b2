//! Write-once stage outcomes.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::language::Language;
use super::sast::SastFinding;
use super::symbols::FileSymbols;

/// Outcome of one analysis stage, owned by exactly one writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult<T> {
    Success { value: T, duration_ms: u64 },
    Failure { error: String, duration_ms: u64 },
}

impl<T> StageResult<T> {
    pub fn from_result<E: Display>(result: Result<T, E>, duration_ms: u64) -> Self {
        match result {
            Ok(value) => StageResult::Success { value, duration_ms },
            Err(e) => StageResult::Failure {
                error: e.to_string(),
                duration_ms,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            StageResult::Success { value, .. } => Some(value),
            StageResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StageResult::Success { .. } => None,
            StageResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            StageResult::Success { duration_ms, .. } | StageResult::Failure { duration_ms, .. } => {
                *duration_ms
            }
        }
    }
}

/// Await `fut` and wrap its result with the elapsed wall-clock time.
pub async fn timed<T, E, F>(fut: F) -> StageResult<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = fut.await;
    StageResult::from_result(result, elapsed_ms(started))
}

pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Result of the symbol-extraction sub-task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Extracted {
        files: IndexMap<String, FileSymbols>,
        duration_ms: u64,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
        duration_ms: u64,
    },
}

/// Everything the static analysis stage produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAnalysisReport {
    pub analyzer: StageResult<Vec<SastFinding>>,
    pub symbols: SymbolOutcome,
    pub languages: Vec<Language>,
    pub rulesets: Vec<String>,
}

impl StaticAnalysisReport {
    pub fn findings(&self) -> &[SastFinding] {
        self.analyzer.value().map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timed_records_failure_message() {
        let result: StageResult<()> = timed(async { Err::<(), _>("analysis timed out") }).await;
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("analysis timed out"));
    }

    #[tokio::test]
    async fn timed_records_success_value() {
        let result = timed(async { Ok::<_, String>(7) }).await;
        assert_eq!(result.value(), Some(&7));
        assert!(result.error().is_none());
    }
}
