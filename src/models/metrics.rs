//! Size metrics and processing modes for a change set.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse size measurements of a change set, computed once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetrics {
    pub file_count: usize,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub total_changes: usize,
    pub diff_size: usize,
    pub largest_file_lines: usize,
    pub estimated_tokens: usize,
}

/// Truncation aggressiveness, ordered from least to most aggressive.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingMode {
    /// Everything is processed.
    #[default]
    Full,
    /// All files are processed but the diff text is capped.
    Truncated,
    /// Only a priority-ranked subset of files is processed.
    Summary,
    /// No file content is fetched; the diff alone is reviewed.
    DiffOnly,
}

impl ProcessingMode {
    /// Whether import resolution (related and newly-imported files) runs.
    pub fn resolves_imports(self) -> bool {
        self == ProcessingMode::Full
    }

    pub fn fetches_content(self) -> bool {
        self != ProcessingMode::DiffOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_ordered_by_aggressiveness() {
        assert!(ProcessingMode::Full < ProcessingMode::Truncated);
        assert!(ProcessingMode::Truncated < ProcessingMode::Summary);
        assert!(ProcessingMode::Summary < ProcessingMode::DiffOnly);
    }

    #[test]
    fn mode_display_is_snake_case() {
        assert_eq!(ProcessingMode::DiffOnly.to_string(), "diff_only");
        assert_eq!("summary".parse::<ProcessingMode>().unwrap(), ProcessingMode::Summary);
    }
}
