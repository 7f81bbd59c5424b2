//! Rendering the assembled context as a budgeted prompt section.

use crate::budget::Budget;
use crate::models::context::{AssembledContext, FileSnapshot, RepoSummary};
use crate::sizing::{SizeLimits, clip};

/// Rendered tree is cut at this many bytes.
pub const MAX_TREE_CHARS: usize = 2000;
const MAX_LANGUAGES: usize = 10;

const CHANGED_SHARE: f64 = 0.60;
const IMPORTED_SHARE: f64 = 0.25;
const RELATED_SHARE: f64 = 0.15;

const MAX_CHANGED_SHOWN: usize = 10;
const MAX_IMPORTED_SHOWN: usize = 5;
const MAX_IMPORTED_FILE: usize = 8000;
const MAX_RELATED_SHOWN: usize = 3;
const MAX_RELATED_FILE: usize = 5000;
/// Size of the first changed file when nothing else fits.
const FORCED_FILE_CHARS: usize = 3000;
/// Optional sections are only started with at least this much room.
const MIN_SECTION_ROOM: usize = 1000;

const CHANGED_HEADER: &str = "\n## Changed Files (Context Reference)\n\
**IMPORTANT: This section provides the FULL file content for CONTEXT ONLY.**\n\
**Only review the changes shown in the diff, NOT the entire file.**\n\
**Use this content to understand surrounding code and validate the changes; do not report issues in unchanged code.**\n\n";

const IMPORTED_HEADER: &str = "\n## Newly Imported Files (Cross-File Analysis)\n\
**IMPORTANT: These files are NEWLY IMPORTED by this change.**\n\
**Check that the imported components and functions are used correctly.**\n\
**Pay attention to required arguments, function signatures and expected types.**\n\n";

const RELATED_HEADER: &str =
    "\n## Related Context Files\n*These files are referenced by the changed files.*\n";

/// Render `ctx` within `limits.max_context_prompt_size` bytes.
///
/// The structure summary is written first; what is left is split 60/25/15
/// between changed, newly-imported and related files, each section capped
/// at its own share.
pub fn render_context_section(ctx: &AssembledContext, limits: &SizeLimits) -> String {
    let mut total = Budget::new(limits.max_context_prompt_size);
    let mut out = String::new();

    if let Some(note) = &ctx.note {
        total.append(&mut out, &format!("## Analysis Mode\n{note}\n"));
    }
    if let Some(structure) = &ctx.structure {
        total.append(&mut out, &structure_section(structure));
    }

    let mut changed = total.take(CHANGED_SHARE);
    let mut imported = total.take(IMPORTED_SHARE);
    let mut related = total.take(RELATED_SHARE);

    out.push_str(&changed_section(&ctx.changed_files, &mut changed, limits));
    out.push_str(&linked_section(
        IMPORTED_HEADER,
        &ctx.imported_files,
        &mut imported,
        MAX_IMPORTED_SHOWN,
        MAX_IMPORTED_FILE,
    ));
    out.push_str(&linked_section(
        RELATED_HEADER,
        &ctx.related_files,
        &mut related,
        MAX_RELATED_SHOWN,
        MAX_RELATED_FILE,
    ));

    total.absorb(changed);
    total.absorb(imported);
    total.absorb(related);
    out
}

pub fn structure_section(structure: &RepoSummary) -> String {
    let languages: Vec<String> = structure
        .languages
        .iter()
        .take(MAX_LANGUAGES)
        .map(|l| l.to_string())
        .collect();
    format!(
        "## Repository Structure\n```\n{}\n```\nLanguages: {}\n",
        clip(&structure.tree, MAX_TREE_CHARS),
        languages.join(", ")
    )
}

/// A markdown block holding one file.
pub fn file_block(file: &FileSnapshot, content: &str) -> String {
    format!("### {}\n```{}\n{content}\n```\n", file.path, file.fence_tag())
}

fn changed_section(files: &[FileSnapshot], budget: &mut Budget, limits: &SizeLimits) -> String {
    let mut out = String::new();
    if files.is_empty() || !budget.append(&mut out, CHANGED_HEADER) {
        return out;
    }

    let shown = files.len().min(MAX_CHANGED_SHOWN);
    let per_file = (budget.remaining() / shown).min(limits.max_file_content_size);

    let mut included = 0;
    for file in &files[..shown] {
        let block = file_block(file, clip(&file.content_for_prompt, per_file));
        if budget.append(&mut out, &block) {
            included += 1;
            continue;
        }
        if included == 0 {
            // Always show at least part of the first file.
            let overhead = file_block(file, "\n... [truncated]").len();
            let room = budget.remaining().saturating_sub(overhead).min(FORCED_FILE_CHARS);
            let content = format!("{}\n... [truncated]", clip(&file.content, room));
            if budget.append(&mut out, &file_block(file, &content)) {
                included += 1;
            }
        }
        break;
    }

    if included < files.len() {
        budget.append(
            &mut out,
            &format!("\n*... and {} more changed files*\n", files.len() - included),
        );
    }
    out
}

fn linked_section(
    header: &str,
    files: &[FileSnapshot],
    budget: &mut Budget,
    max_shown: usize,
    max_per_file: usize,
) -> String {
    let mut out = String::new();
    if files.is_empty() || budget.remaining() <= MIN_SECTION_ROOM {
        return out;
    }
    if !budget.append(&mut out, header) {
        return out;
    }

    let shown = files.len().min(max_shown);
    let per_file = (budget.remaining() / shown).min(max_per_file);
    for file in &files[..shown] {
        let block = file_block(file, clip(&file.content_for_prompt, per_file));
        if !budget.append(&mut out, &block) {
            break;
        }
    }
    out
}
