//! File ranking for partial processing.

use crate::models::change::FileChange;
use crate::models::language::extension;

/// Changed lines beyond this do not raise a file's rank further.
const CHANGE_WEIGHT_CAP: usize = 500;

/// Review priority of a file extension; source code outranks config and docs.
pub fn extension_priority(path: &str) -> usize {
    match extension(path).as_deref() {
        Some("py" | "go" | "java" | "ts" | "tsx" | "rs") => 10,
        Some("js" | "jsx" | "rb" | "php" | "cs") => 9,
        Some("c" | "cpp" | "h" | "hpp") => 8,
        Some("sql" | "graphql") => 7,
        Some("yaml" | "yml") => 5,
        Some("json" | "toml") => 4,
        Some("css" | "scss" | "html") => 3,
        Some("md" | "rst") => 2,
        Some("txt") => 1,
        _ => 0,
    }
}

fn score(file: &FileChange) -> usize {
    extension_priority(&file.path) * 1000 + file.changes().min(CHANGE_WEIGHT_CAP)
}

/// The `max` most important files, highest score first.
///
/// Returns the input order untouched when it already fits.
pub fn prioritize_files(files: &[FileChange], max: usize) -> Vec<&FileChange> {
    let mut ranked: Vec<&FileChange> = files.iter().collect();
    if ranked.len() <= max {
        return ranked;
    }
    ranked.sort_by_key(|f| std::cmp::Reverse(score(f)));
    ranked.truncate(max);
    ranked
}
