//! The assembled review context shared read-only by both analysis stages.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::language::Language;
use super::metrics::ProcessingMode;

/// A fetched file with its exact content and a prompt-sized view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub language: Option<Language>,
    /// Exact text, used by static analysis and symbol extraction.
    pub content: String,
    /// Capped text, used when building model prompts.
    pub content_for_prompt: String,
}

impl FileSnapshot {
    /// Fence tag for markdown code blocks.
    pub fn fence_tag(&self) -> String {
        self.language.map(|l| l.to_string()).unwrap_or_default()
    }
}

/// Shallow summary of the repository layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSummary {
    /// Rendered directory tree.
    pub tree: String,
    /// Languages detected across the listing, sorted by name.
    pub languages: Vec<Language>,
    pub file_count: usize,
}

/// Everything fetched for one review run.
///
/// Built once by the context assembler and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssembledContext {
    pub mode: ProcessingMode,
    pub changed_files: Vec<FileSnapshot>,
    /// Files reached through imports of the changed files.
    pub related_files: Vec<FileSnapshot>,
    /// Files reached through imports on added diff lines only.
    pub imported_files: Vec<FileSnapshot>,
    pub structure: Option<RepoSummary>,
    pub import_graph: IndexMap<String, Vec<String>>,
    /// Explanation when content was deliberately not fetched.
    pub note: Option<String>,
}

impl AssembledContext {
    /// A context with no fetched content, carrying an explanatory note.
    pub fn degraded(mode: ProcessingMode, note: impl Into<String>) -> Self {
        Self {
            mode,
            note: Some(note.into()),
            ..Self::default()
        }
    }

    /// Full content of every changed file, keyed by path.
    pub fn full_contents(&self) -> IndexMap<String, String> {
        self.changed_files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect()
    }

    pub fn has_content(&self) -> bool {
        !self.changed_files.is_empty()
    }
}
