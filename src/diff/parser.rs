//! Unified diff parsing.
//!
//! Turns `git diff` output into [`FileDiff`]s and derives the change file
//! list (status, line counts, per-file patch) from them.

use std::iter::Peekable;
use std::str::Lines;

use crate::models::change::FileChange;
use crate::models::diff::{DiffLine, DiffLineType, FileDiff, Hunk};

const FILE_MARKER: &str = "diff --git ";

/// Parse a unified diff into per-file diffs.
pub fn parse_unified_diff(input: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with(FILE_MARKER) {
            continue;
        }

        let (old_path, new_path) = parse_diff_header(line);
        let mut file = FileDiff {
            old_path,
            new_path,
            is_new: false,
            is_deleted: false,
            is_rename: false,
            is_binary: false,
            hunks: Vec::new(),
        };

        while let Some(&next) = lines.peek() {
            if next.starts_with(FILE_MARKER) {
                break;
            }
            if next.starts_with("@@") {
                if let Some(hunk) = parse_hunk(&mut lines) {
                    file.hunks.push(hunk);
                }
                continue;
            }
            if next.starts_with("new file mode") {
                file.is_new = true;
            } else if next.starts_with("deleted file mode") {
                file.is_deleted = true;
            } else if next.starts_with("rename from") || next.starts_with("rename to") {
                file.is_rename = true;
            } else if next.starts_with("Binary files") {
                file.is_binary = true;
            }
            lines.next();
        }

        files.push(file);
    }

    files
}

/// Derive the change file list from parsed diffs. Binary files count zero lines.
pub fn to_file_changes(diffs: &[FileDiff]) -> Vec<FileChange> {
    diffs
        .iter()
        .map(|d| FileChange {
            path: d.path().to_string(),
            status: d.status(),
            additions: d.added_lines(),
            deletions: d.removed_lines(),
            patch: d.patch(),
        })
        .collect()
}

/// Split raw diff text into per-file sections, keyed by new-side path.
///
/// Sections keep their `diff --git` line; joining them with `\n` restores the
/// input (minus a trailing newline).
pub fn split_file_sections(diff: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in diff.lines() {
        if line.starts_with(FILE_MARKER) {
            let path = line
                .rsplit_once(" b/")
                .map(|(_, p)| p.to_string())
                .unwrap_or_else(|| parse_diff_header(line).1);
            sections.push((path, vec![line]));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(line);
        }
    }
    sections
        .into_iter()
        .map(|(path, body)| (path, body.join("\n")))
        .collect()
}

/// Parse the `diff --git a/path b/path` header line.
fn parse_diff_header(line: &str) -> (String, String) {
    let rest = line.strip_prefix(FILE_MARKER).unwrap_or(line);

    // Paths may contain spaces, so find the second ` X/` prefix rather than
    // splitting on the first space.
    match find_second_prefix(rest) {
        Some(idx) => (
            strip_diff_prefix(&rest[..idx]).to_string(),
            strip_diff_prefix(&rest[idx + 1..]).to_string(),
        ),
        None => {
            let mut parts = rest.splitn(2, ' ');
            let old = strip_diff_prefix(parts.next().unwrap_or_default()).to_string();
            let new = strip_diff_prefix(parts.next().unwrap_or_default()).to_string();
            (old, new)
        }
    }
}

/// Strip a git path prefix: `a/`, `b/`, or the mnemonic `c/`, `w/`, `i/`, `o/`.
fn strip_diff_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b'/' && is_prefix_letter(bytes[0]) {
        &path[2..]
    } else {
        path
    }
}

fn is_prefix_letter(b: u8) -> bool {
    matches!(b, b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
}

fn find_second_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(2)).find(|&i| {
        bytes[i] == b' ' && is_prefix_letter(bytes[i + 1]) && bytes[i + 2] == b'/'
    })
}

/// Parse one hunk, starting at its `@@` line.
fn parse_hunk(lines: &mut Peekable<Lines<'_>>) -> Option<Hunk> {
    let header_line = lines.next()?;
    let (old_start, old_count, new_start, new_count, header) = parse_hunk_header(header_line)?;

    let mut raw = vec![header_line];
    let mut hunk_lines = Vec::new();
    let mut old_line = old_start;
    let mut new_line = new_start;

    while let Some(&line) = lines.peek() {
        if line.starts_with(FILE_MARKER) || line.starts_with("@@") {
            break;
        }

        let (line_type, content) = if let Some(c) = line.strip_prefix('+') {
            (DiffLineType::Added, c)
        } else if let Some(c) = line.strip_prefix('-') {
            (DiffLineType::Removed, c)
        } else if line.is_empty() || line.starts_with(' ') {
            (DiffLineType::Context, line.get(1..).unwrap_or_default())
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            raw.push(line);
            lines.next();
            continue;
        } else {
            break;
        };
        raw.push(line);
        lines.next();

        let (old_no, new_no) = match line_type {
            DiffLineType::Added => (None, Some(new_line)),
            DiffLineType::Removed => (Some(old_line), None),
            DiffLineType::Context => (Some(old_line), Some(new_line)),
        };
        if old_no.is_some() {
            old_line += 1;
        }
        if new_no.is_some() {
            new_line += 1;
        }
        hunk_lines.push(DiffLine {
            line_type,
            content: content.to_string(),
            old_line_no: old_no,
            new_line_no: new_no,
        });
    }

    Some(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        header,
        lines: hunk_lines,
        raw: raw.join("\n"),
    })
}

/// Parse `@@ -a,b +c,d @@ header`.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32, Option<String>)> {
    let line = line.strip_prefix("@@ ")?;
    let end = line.find(" @@")?;
    let (old_range, new_range) = line[..end].split_once(' ')?;
    let header = Some(line[end + 3..].trim())
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let (old_start, old_count) = parse_range(old_range.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(new_range.strip_prefix('+')?)?;
    Some((old_start, old_count, new_start, new_count, header))
}

/// `start,count` or `start` (count 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change::FileStatus;

    const TWO_FILES: &str = "diff --git a/app/models.py b/app/models.py
index 1234567..abcdefg 100644
--- a/app/models.py
+++ b/app/models.py
@@ -1,4 +1,5 @@
 class User:
-    name = None
+    name = \"\"
+    email = \"\"
     age = 0
 
diff --git a/app/old.py b/app/old.py
deleted file mode 100644
index 1234567..0000000
--- a/app/old.py
+++ /dev/null
@@ -1,2 +0,0 @@
-def old():
-    pass
";

    #[test]
    fn parses_files_and_hunks() {
        let files = parse_unified_diff(TWO_FILES);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path(), "app/models.py");
        assert_eq!(files[0].hunks.len(), 1);
        assert_eq!(files[0].added_lines(), 2);
        assert_eq!(files[0].removed_lines(), 1);
        assert!(files[1].is_deleted);
        assert_eq!(files[1].path(), "app/old.py");
    }

    #[test]
    fn new_side_line_numbers() {
        let files = parse_unified_diff(TWO_FILES);
        let file = &files[0];
        assert_eq!(file.new_line(2), Some("    name = \"\""));
        assert_eq!(file.new_line(3), Some("    email = \"\""));
        assert_eq!(file.new_line(4), Some("    age = 0"));
        assert_eq!(file.new_line(40), None);
    }

    #[test]
    fn file_changes_carry_status_counts_and_patch() {
        let changes = to_file_changes(&parse_unified_diff(TWO_FILES));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].status, FileStatus::Modified);
        assert_eq!(changes[0].additions, 2);
        assert_eq!(changes[0].deletions, 1);
        assert!(changes[0].patch.starts_with("@@ -1,4 +1,5 @@"));
        assert!(changes[0].patch.contains("+    email = \"\""));
        assert_eq!(changes[1].status, FileStatus::Removed);
        assert_eq!(changes[1].deletions, 2);
    }

    #[test]
    fn new_and_renamed_files() {
        let diff = "diff --git a/old_name.rs b/new_name.rs
similarity index 95%
rename from old_name.rs
rename to new_name.rs
--- a/old_name.rs
+++ b/new_name.rs
@@ -1 +1 @@
-old()
+new()
diff --git a/fresh.go b/fresh.go
new file mode 100644
--- /dev/null
+++ b/fresh.go
@@ -0,0 +1,2 @@
+package main
+func main() {}
";
        let changes = to_file_changes(&parse_unified_diff(diff));
        assert_eq!(changes[0].path, "new_name.rs");
        assert_eq!(changes[0].status, FileStatus::Renamed);
        assert_eq!(changes[1].status, FileStatus::Added);
        assert_eq!(changes[1].additions, 2);
    }

    #[test]
    fn omitted_hunk_counts_mean_one_line() {
        let diff = "diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -7 +7,2 @@
-x
+y
+z
";
        let hunk = &parse_unified_diff(diff)[0].hunks[0];
        assert_eq!((hunk.old_start, hunk.old_count), (7, 1));
        assert_eq!((hunk.new_start, hunk.new_count), (7, 2));
        assert_eq!(hunk.header, None);
    }

    #[test]
    fn binary_file_has_no_hunks() {
        let diff = "diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..1234567
Binary files /dev/null and b/logo.png differ
";
        let files = parse_unified_diff(diff);
        assert!(files[0].is_binary);
        assert!(files[0].hunks.is_empty());
    }

    #[test]
    fn no_newline_marker_is_kept_in_patch_only() {
        let diff = "diff --git a/t.rs b/t.rs
--- a/t.rs
+++ b/t.rs
@@ -1 +1 @@
-old line
+new line
\\ No newline at end of file
";
        let files = parse_unified_diff(diff);
        assert_eq!(files[0].hunks[0].lines.len(), 2);
        assert!(files[0].patch().ends_with("\\ No newline at end of file"));
    }

    #[test]
    fn hunk_header_function_context() {
        let diff = "diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -10,3 +10,4 @@ fn some_function() {
     let x = 1;
+    let y = 2;
";
        let hunk = &parse_unified_diff(diff)[0].hunks[0];
        assert_eq!(hunk.header.as_deref(), Some("fn some_function() {"));
        assert_eq!(hunk.new_start, 10);
    }

    #[test]
    fn mnemonic_prefixes_are_stripped() {
        let diff = "diff --git c/auth.rs w/auth.rs\n--- c/auth.rs\n+++ w/auth.rs\n@@ -1 +1,2 @@\n fn main() {\n+    todo!();\n";
        let files = parse_unified_diff(diff);
        assert_eq!(files[0].old_path, "auth.rs");
        assert_eq!(files[0].new_path, "auth.rs");
    }

    #[test]
    fn split_sections_by_file() {
        let sections = split_file_sections(TWO_FILES);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "app/models.py");
        assert!(sections[0].1.starts_with("diff --git a/app/models.py"));
        assert!(!sections[0].1.contains("app/old.py"));
        assert_eq!(sections[1].0, "app/old.py");
    }

    #[test]
    fn empty_input() {
        assert!(parse_unified_diff("").is_empty());
        assert!(split_file_sections("").is_empty());
    }
}
