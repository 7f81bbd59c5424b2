//! Size estimation: metrics, processing-mode selection and right-sizing of
//! the change set before any content is fetched.

pub mod limits;
pub mod priority;
pub mod truncate;

use crate::models::change::{ChangeMetadata, FileChange};
use crate::models::metrics::{ChangeMetrics, ProcessingMode};

pub use limits::SizeLimits;
pub use priority::prioritize_files;
pub use truncate::{DEFAULT_SUFFIX, clip, smart_diff_truncate, truncate_content};

/// Files given context in `Summary` mode.
const SUMMARY_CONTEXT_FILES: usize = 10;

/// Measure a change set.
pub fn measure(files: &[FileChange], diff_text: &str) -> ChangeMetrics {
    let total_additions = files.iter().map(|f| f.additions).sum();
    let total_deletions = files.iter().map(|f| f.deletions).sum();
    let diff_size = diff_text.len();
    ChangeMetrics {
        file_count: files.len(),
        total_additions,
        total_deletions,
        total_changes: total_additions + total_deletions,
        diff_size,
        largest_file_lines: files.iter().map(FileChange::changes).max().unwrap_or(0),
        estimated_tokens: diff_size / 4,
    }
}

/// Pick the processing mode. Most restrictive ceiling is checked first.
pub fn select_mode(metrics: &ChangeMetrics, limits: &SizeLimits) -> ProcessingMode {
    let files = metrics.file_count;
    let changes = metrics.total_changes;
    let diff = metrics.diff_size;

    if files > limits.max_files_for_file_content {
        ProcessingMode::DiffOnly
    } else if files > limits.max_files_absolute
        || changes > limits.max_lines_changed * 2
        || diff > limits.max_diff_size * 2
    {
        ProcessingMode::Summary
    } else if files > limits.max_files_for_full_analysis
        || changes > limits.max_lines_changed
        || diff > limits.max_diff_size
    {
        ProcessingMode::Truncated
    } else {
        ProcessingMode::Full
    }
}

/// The file list and diff text a review actually works with.
#[derive(Debug, Clone)]
pub struct SizedChange {
    pub mode: ProcessingMode,
    pub files: Vec<FileChange>,
    pub diff_text: String,
    /// Upper bound on changed files whose content is fetched.
    pub max_context_files: usize,
}

/// Apply the mode's truncation to a change set.
pub fn right_size(change: &ChangeMetadata, mode: ProcessingMode, limits: &SizeLimits) -> SizedChange {
    let (files, diff_text) = match mode {
        ProcessingMode::DiffOnly => (
            change.files.clone(),
            smart_diff_truncate(&change.diff_text, limits.max_diff_size * 2, &change.files),
        ),
        ProcessingMode::Summary => (
            prioritize_files(&change.files, limits.max_files_for_full_analysis)
                .into_iter()
                .cloned()
                .collect(),
            smart_diff_truncate(&change.diff_text, limits.max_diff_size, &change.files),
        ),
        ProcessingMode::Truncated => (
            change.files.clone(),
            truncate_content(
                &change.diff_text,
                limits.max_diff_size,
                "\n... [diff truncated due to size]",
            ),
        ),
        ProcessingMode::Full => (change.files.clone(), change.diff_text.clone()),
    };

    let max_context_files = match mode {
        ProcessingMode::DiffOnly => 0,
        ProcessingMode::Summary => SUMMARY_CONTEXT_FILES,
        _ => limits.max_files_for_full_analysis,
    };

    SizedChange {
        mode,
        files,
        diff_text,
        max_context_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change::FileStatus;

    fn metrics(files: usize, changes: usize, diff: usize) -> ChangeMetrics {
        ChangeMetrics {
            file_count: files,
            total_additions: changes,
            total_changes: changes,
            diff_size: diff,
            ..ChangeMetrics::default()
        }
    }

    fn files(n: usize) -> Vec<FileChange> {
        (0..n)
            .map(|i| FileChange {
                path: format!("src/f{i}.py"),
                status: FileStatus::Modified,
                additions: 3,
                deletions: 1,
                patch: String::new(),
            })
            .collect()
    }

    #[test]
    fn measure_counts_lines_and_tokens() {
        let m = measure(&files(3), &"x".repeat(400));
        assert_eq!(m.file_count, 3);
        assert_eq!(m.total_additions, 9);
        assert_eq!(m.total_deletions, 3);
        assert_eq!(m.total_changes, 12);
        assert_eq!(m.largest_file_lines, 4);
        assert_eq!(m.estimated_tokens, 100);
    }

    #[test]
    fn small_change_is_full() {
        let limits = SizeLimits::default();
        assert_eq!(select_mode(&metrics(5, 40, 2000), &limits), ProcessingMode::Full);
    }

    #[test]
    fn too_many_files_is_diff_only() {
        let limits = SizeLimits::default();
        assert_eq!(select_mode(&metrics(260, 40, 2000), &limits), ProcessingMode::DiffOnly);
        assert_eq!(select_mode(&metrics(201, 40, 2000), &limits), ProcessingMode::DiffOnly);
    }

    #[test]
    fn very_large_is_summary() {
        let limits = SizeLimits::default();
        assert_eq!(select_mode(&metrics(10, 4001, 2000), &limits), ProcessingMode::Summary);
        assert_eq!(select_mode(&metrics(10, 40, 100_001), &limits), ProcessingMode::Summary);
    }

    #[test]
    fn large_is_truncated() {
        let limits = SizeLimits::default();
        assert_eq!(select_mode(&metrics(151, 40, 2000), &limits), ProcessingMode::Truncated);
        assert_eq!(select_mode(&metrics(10, 2001, 2000), &limits), ProcessingMode::Truncated);
        assert_eq!(select_mode(&metrics(10, 40, 50_001), &limits), ProcessingMode::Truncated);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let limits = SizeLimits::default();
        assert_eq!(select_mode(&metrics(150, 2000, 50_000), &limits), ProcessingMode::Full);
        assert_eq!(select_mode(&metrics(200, 40, 2000), &limits), ProcessingMode::Truncated);
    }

    #[test]
    fn mode_is_deterministic() {
        let limits = SizeLimits::default();
        for m in [metrics(0, 0, 0), metrics(180, 3000, 70_000), metrics(999, 1, 1)] {
            assert_eq!(select_mode(&m, &limits), select_mode(&m, &limits));
        }
    }

    #[test]
    fn right_size_truncated_caps_diff() {
        let limits = SizeLimits {
            max_diff_size: 100,
            ..SizeLimits::default()
        };
        let change = ChangeMetadata {
            files: files(2),
            diff_text: "y".repeat(1000),
            ..ChangeMetadata::default()
        };
        let sized = right_size(&change, ProcessingMode::Truncated, &limits);
        assert!(sized.diff_text.len() <= 100);
        assert!(sized.diff_text.ends_with("[diff truncated due to size]"));
        assert_eq!(sized.files.len(), 2);
    }

    #[test]
    fn right_size_summary_limits_files_and_context() {
        let limits = SizeLimits {
            max_files_for_full_analysis: 3,
            ..SizeLimits::default()
        };
        let change = ChangeMetadata {
            files: files(8),
            ..ChangeMetadata::default()
        };
        let sized = right_size(&change, ProcessingMode::Summary, &limits);
        assert_eq!(sized.files.len(), 3);
        assert_eq!(sized.max_context_files, 10);
    }

    #[test]
    fn right_size_diff_only_fetches_nothing() {
        let change = ChangeMetadata {
            files: files(4),
            diff_text: "diff".into(),
            ..ChangeMetadata::default()
        };
        let sized = right_size(&change, ProcessingMode::DiffOnly, &SizeLimits::default());
        assert_eq!(sized.max_context_files, 0);
        assert_eq!(sized.diff_text, "diff");
    }
}
