//! Change-set types: the metadata, file list and tree listing returned by a
//! change source.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a file was touched by the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// One entry of the change's file list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root (new side for renames).
    pub path: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
    /// Unified diff text for this file only, starting at the first `@@`.
    #[serde(default)]
    pub patch: String,
}

impl FileChange {
    /// Total changed lines (additions plus deletions).
    pub fn changes(&self) -> usize {
        self.additions + self.deletions
    }

    pub fn is_removed(&self) -> bool {
        self.status == FileStatus::Removed
    }
}

/// Core metadata of a change request.
///
/// Fetching this is the only fatal step of a review: without it there is
/// nothing to review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeMetadata {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub base_branch: String,
    pub head_branch: String,
    /// Revision used when fetching file content and the tree listing.
    pub head_ref: String,
    pub files: Vec<FileChange>,
    pub diff_text: String,
}

/// Kind of an entry in a repository tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    Blob,
    Tree,
}

/// One path in a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: TreeEntryKind,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: TreeEntryKind::Blob,
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: TreeEntryKind::Tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_sums_additions_and_deletions() {
        let file = FileChange {
            path: "src/lib.rs".into(),
            status: FileStatus::Modified,
            additions: 12,
            deletions: 3,
            patch: String::new(),
        };
        assert_eq!(file.changes(), 15);
        assert!(!file.is_removed());
    }

    #[test]
    fn file_status_parses_lowercase() {
        assert_eq!("removed".parse::<FileStatus>().unwrap(), FileStatus::Removed);
        assert_eq!(FileStatus::Renamed.to_string(), "renamed");
    }
}
