//! Parsed unified diff: files, hunks and lines.

use serde::{Deserialize, Serialize};

use super::change::FileStatus;

/// Side of a diff a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffLineType {
    /// `+` line, new side only.
    Added,
    /// `-` line, old side only.
    Removed,
    /// Unchanged line present on both sides.
    Context,
}

/// A single line in a hunk, without its `+`/`-`/space prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    /// Line text without the prefix or trailing newline.
    pub content: String,
    /// Line number in the old file (None for added lines).
    pub old_line_no: Option<u32>,
    /// Line number in the new file (None for removed lines).
    pub new_line_no: Option<u32>,
}

/// One `@@ -a,b +c,d @@` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    /// First old-side line covered (`a`).
    pub old_start: u32,
    /// Old-side lines covered (`b`, 1 when omitted).
    pub old_count: u32,
    /// First new-side line covered (`c`).
    pub new_start: u32,
    /// New-side lines covered (`d`, 1 when omitted).
    pub new_count: u32,
    /// Text after the closing `@@`, usually the enclosing function.
    pub header: Option<String>,
    /// Body lines in diff order. `\ No newline at end of file` markers are kept in `raw` only.
    pub lines: Vec<DiffLine>,
    /// The hunk exactly as it appeared in the diff, header included.
    pub raw: String,
}

/// The diff of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path on the old side, from the `diff --git` header.
    pub old_path: String,
    /// Path on the new side, from the `diff --git` header.
    pub new_path: String,
    /// Marked `new file mode`.
    pub is_new: bool,
    /// Marked `deleted file mode`.
    pub is_deleted: bool,
    /// Carries `rename from`/`rename to` lines.
    pub is_rename: bool,
    /// `Binary files ... differ`; such files have no hunks.
    pub is_binary: bool,
    /// Hunks in file order.
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// The new path, or the old one for deletions.
    pub fn path(&self) -> &str {
        if self.is_deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    pub fn status(&self) -> FileStatus {
        if self.is_new {
            FileStatus::Added
        } else if self.is_deleted {
            FileStatus::Removed
        } else if self.is_rename {
            FileStatus::Renamed
        } else {
            FileStatus::Modified
        }
    }

    pub fn added_lines(&self) -> usize {
        self.count(DiffLineType::Added)
    }

    pub fn removed_lines(&self) -> usize {
        self.count(DiffLineType::Removed)
    }

    fn count(&self, kind: DiffLineType) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.line_type == kind)
            .count()
    }

    /// Hunks concatenated back into patch text.
    pub fn patch(&self) -> String {
        self.hunks
            .iter()
            .map(|h| h.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Content of the given line on the new side, if the diff shows it.
    pub fn new_line(&self, line_no: u32) -> Option<&str> {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .find(|l| l.new_line_no == Some(line_no))
            .map(|l| l.content.as_str())
    }
}
