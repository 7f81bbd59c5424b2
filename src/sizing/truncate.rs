//! Size-aware text truncation.

use super::priority::prioritize_files;
use crate::diff::split_file_sections;
use crate::models::change::FileChange;

pub const DEFAULT_SUFFIX: &str = "\n... [truncated]";

/// Number of top-priority files whose diff sections are placed first.
const PRIORITY_WINDOW: usize = 20;

/// Bytes kept free per included diff section.
const SECTION_SLACK: usize = 100;

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
pub fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `content` to at most `max` bytes including `suffix`.
///
/// Prefers to cut at a line break when one exists in the last fifth of the
/// kept text. When `max` cannot hold the suffix, the content is cut bare.
pub fn truncate_content(content: &str, max: usize, suffix: &str) -> String {
    if content.len() <= max {
        return content.to_string();
    }
    if suffix.len() >= max {
        return clip(content, max).to_string();
    }
    let keep = max.saturating_sub(suffix.len());
    let mut kept = clip(content, keep);
    if let Some(nl) = kept.rfind('\n') {
        if nl * 5 > keep * 4 {
            kept = &kept[..nl];
        }
    }
    format!("{kept}{suffix}")
}

/// Truncate a multi-file diff by keeping whole per-file sections.
///
/// Sections of high-priority files go first, then shorter sections. One
/// more section is cut to fit when less than 90% of the room is used, and
/// a trailer names how many files were left out.
pub fn smart_diff_truncate(diff: &str, max: usize, files: &[FileChange]) -> String {
    if diff.len() <= max {
        return diff.to_string();
    }

    let priority: Vec<&str> = prioritize_files(files, PRIORITY_WINDOW)
        .into_iter()
        .map(|f| f.path.as_str())
        .collect();

    let mut sections = split_file_sections(diff);
    sections.sort_by_key(|(path, body)| (!priority.contains(&path.as_str()), body.len()));

    let total = sections.len();
    let mut kept: Vec<String> = Vec::new();
    let mut size = 0;
    for (_, body) in &sections {
        if size + body.len() + SECTION_SLACK <= max {
            kept.push(body.clone());
            size += body.len() + 1;
        } else {
            if size * 10 < max * 9 {
                let room = max.saturating_sub(size + SECTION_SLACK);
                kept.push(truncate_content(body, room, DEFAULT_SUFFIX));
            }
            break;
        }
    }

    let omitted = total.saturating_sub(kept.len());
    if omitted > 0 {
        kept.push(format!("\n... [{omitted} more files not shown]"));
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change::FileStatus;

    fn change(path: &str, lines: usize) -> FileChange {
        FileChange {
            path: path.into(),
            status: FileStatus::Modified,
            additions: lines,
            deletions: 0,
            patch: String::new(),
        }
    }

    fn section(path: &str, body_lines: usize) -> String {
        let mut s = format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1,{body_lines} @@");
        for i in 0..body_lines {
            s.push_str(&format!("\n+line {i} of {path}"));
        }
        s
    }

    #[test]
    fn short_content_untouched() {
        assert_eq!(truncate_content("abc", 10, DEFAULT_SUFFIX), "abc");
    }

    #[test]
    fn truncation_respects_max_and_adds_suffix() {
        let content = "x".repeat(500);
        let out = truncate_content(&content, 100, DEFAULT_SUFFIX);
        assert!(out.len() <= 100);
        assert!(out.ends_with(DEFAULT_SUFFIX));
    }

    #[test]
    fn budget_smaller_than_suffix_is_still_honored() {
        let content = "é".repeat(50);
        for max in [0, 1, 5, DEFAULT_SUFFIX.len()] {
            let out = truncate_content(&content, max, DEFAULT_SUFFIX);
            assert!(out.len() <= max, "max {max} produced {} bytes", out.len());
            assert!(content.starts_with(&out));
        }
        assert_eq!(truncate_content(&content, 5, DEFAULT_SUFFIX), "éé");
    }

    #[test]
    fn truncation_prefers_late_line_break() {
        let content = format!("{}\n{}", "a".repeat(100), "b".repeat(200));
        let out = truncate_content(&content, 120, "|");
        assert_eq!(out, format!("{}|", "a".repeat(100)));

        // A line break early in the kept text is ignored.
        let content = format!("{}\n{}", "a".repeat(10), "b".repeat(200));
        let out = truncate_content(&content, 120, "|");
        assert_eq!(out.len(), 120);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let s = "héllo";
        assert_eq!(clip(s, 2), "h");
        assert_eq!(clip(s, 3), "hé");
        assert_eq!(clip(s, 100), s);
    }

    #[test]
    fn smart_truncate_keeps_diff_within_budget() {
        let diff = [section("a.rs", 50), section("b.md", 50), section("c.py", 50)].join("\n");
        let files = [change("a.rs", 50), change("b.md", 50), change("c.py", 50)];
        let max = diff.len() / 2;
        let out = smart_diff_truncate(&diff, max, &files);
        assert!(out.len() <= max + 64, "got {} > {max}", out.len());
        assert!(out.contains("more files not shown"));
    }

    #[test]
    fn smart_truncate_puts_priority_files_first() {
        let diff = [section("docs/readme.md", 2), section("src/core.rs", 40)].join("\n");
        // readme.md falls outside the top-20 priority window.
        let mut files = vec![change("src/core.rs", 100)];
        files.extend((0..20).map(|i| change(&format!("src/m{i}.rs"), 100)));
        files.push(change("docs/readme.md", 2));

        let max = section("src/core.rs", 40).len() + 150;
        let out = smart_diff_truncate(&diff, max, &files);
        assert!(out.starts_with("diff --git a/src/core.rs"));
    }

    #[test]
    fn smart_truncate_passthrough_when_small() {
        let diff = section("a.rs", 3);
        assert_eq!(smart_diff_truncate(&diff, 10_000, &[]), diff);
    }
}
