//! Repository structure summary built from a tree listing.

use std::collections::BTreeMap;

use crate::models::change::{TreeEntry, TreeEntryKind};
use crate::models::context::RepoSummary;
use crate::models::language::Language;

/// Entries of the listing considered for the summary.
pub const MAX_TREE_ENTRIES: usize = 500;

/// Directory levels rendered before collapsing into a count.
pub const MAX_TREE_DEPTH: usize = 3;

#[derive(Debug, Default)]
struct Dir {
    children: BTreeMap<String, Option<Dir>>,
}

impl Dir {
    fn dir_mut(&mut self, name: &str) -> &mut Dir {
        let slot = self.children.entry(name.to_string()).or_insert(None);
        slot.get_or_insert_with(Dir::default)
    }
}

/// Summarise the first [`MAX_TREE_ENTRIES`] entries of a listing.
pub fn summarize(entries: &[TreeEntry]) -> RepoSummary {
    let mut root = Dir::default();
    let mut file_count = 0;
    let mut languages: Vec<Language> = Vec::new();

    for entry in entries.iter().take(MAX_TREE_ENTRIES) {
        let mut parts: Vec<&str> = entry.path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(leaf) = parts.pop() else {
            continue;
        };
        let parent = parts.into_iter().fold(&mut root, |dir, part| dir.dir_mut(part));
        match entry.kind {
            TreeEntryKind::Blob => {
                parent.children.entry(leaf.to_string()).or_insert(None);
                file_count += 1;
                if let Some(lang) = Language::from_path(&entry.path) {
                    if !languages.contains(&lang) {
                        languages.push(lang);
                    }
                }
            }
            TreeEntryKind::Tree => {
                parent.dir_mut(leaf);
            }
        }
    }

    languages.sort_by_key(|l| l.to_string());
    let mut lines = Vec::new();
    render(&root, "", 0, &mut lines);

    RepoSummary {
        tree: lines.join("\n"),
        languages,
        file_count,
    }
}

fn render(dir: &Dir, prefix: &str, depth: usize, lines: &mut Vec<String>) {
    if depth >= MAX_TREE_DEPTH {
        if !dir.children.is_empty() {
            lines.push(format!("{prefix}... ({} more items)", dir.children.len()));
        }
        return;
    }

    let count = dir.children.len();
    for (i, (name, child)) in dir.children.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        match child {
            Some(sub) => {
                lines.push(format!("{prefix}{branch}{name}/"));
                render(sub, &format!("{prefix}{indent}"), depth + 1, lines);
            }
            None => lines.push(format!("{prefix}{branch}{name}")),
        }
    }
}
