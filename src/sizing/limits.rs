//! Size ceilings that drive mode selection and truncation.

use serde::{Deserialize, Serialize};

/// Configurable size limits (the `[limits]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeLimits {
    /// Above this many files a change is `Truncated`.
    pub max_files_for_full_analysis: usize,
    /// Above this many files symbol extraction is skipped.
    pub max_files_for_symbol_extraction: usize,
    /// Above this many files no file content is fetched (`DiffOnly`).
    pub max_files_for_file_content: usize,
    /// Above this many files a change is `Summary`.
    pub max_files_absolute: usize,

    pub max_diff_size: usize,
    pub max_file_content_size: usize,
    pub max_total_content_size: usize,
    pub max_context_prompt_size: usize,
    pub max_symbol_table_size: usize,

    pub max_lines_changed: usize,
    pub max_lines_per_file: usize,

    pub max_related_files: usize,
    pub max_related_file_size: usize,
    pub max_diff_imported_files: usize,
    pub max_diff_imported_file_size: usize,

    pub semgrep_timeout_secs: u64,
    pub symbol_extraction_timeout_secs: u64,
    pub llm_timeout_secs: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_files_for_full_analysis: 150,
            max_files_for_symbol_extraction: 200,
            max_files_for_file_content: 200,
            max_files_absolute: 250,
            max_diff_size: 50_000,
            max_file_content_size: 10_000,
            max_total_content_size: 80_000,
            max_context_prompt_size: 100_000,
            max_symbol_table_size: 15_000,
            max_lines_changed: 2_000,
            max_lines_per_file: 500,
            max_related_files: 5,
            max_related_file_size: 5_000,
            max_diff_imported_files: 10,
            max_diff_imported_file_size: 10_000,
            semgrep_timeout_secs: 120,
            symbol_extraction_timeout_secs: 60,
            llm_timeout_secs: 180,
        }
    }
}
