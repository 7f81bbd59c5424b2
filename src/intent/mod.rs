//! Intent Analysis Stage.
//!
//! Builds a size-budgeted prompt from the assembled context and asks a model
//! what the change is trying to achieve and where the implementation falls
//! short of that goal.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::budget::Budget;
use crate::context::prompt::file_block;
use crate::decode::{DecodeError, decode};
use crate::models::change::ChangeMetadata;
use crate::models::context::{AssembledContext, FileSnapshot};
use crate::models::intent::IntentAnalysis;
use crate::models::stage::{StageResult, timed};
use crate::providers::{LlmCaller, ProviderError};
use crate::sizing::clip;

/// Total prompt budget in bytes.
pub const INTENT_PROMPT_BUDGET: usize = 60_000;
pub const INTENT_MAX_TOKENS: u64 = 4096;

const MAX_STRUCTURE_CHARS: usize = 1500;

const CHANGED_SHARE: f64 = 0.40;
const MAX_CHANGED_FILES: usize = 5;
const MAX_CHANGED_FILE: usize = 8000;

/// Kept free for the diff when deciding whether related files fit.
const RELATED_DIFF_RESERVE: usize = 20_000;
const MIN_RELATED_ROOM: usize = 2000;
const MAX_RELATED_FILES: usize = 2;
const MAX_RELATED_FILE: usize = 3000;

const IMPORTED_DIFF_RESERVE: usize = 15_000;
const MIN_IMPORTED_ROOM: usize = 3000;
const MAX_IMPORTED_FILES: usize = 5;
const MAX_IMPORTED_FILE: usize = 6000;

const DIFF_SLACK: usize = 2000;
const MIN_DIFF_BUDGET: usize = 10_000;
const MAX_DESCRIPTION: usize = 1000;

pub const INTENT_SYSTEM_PROMPT: &str = "\
You are an expert software architect analyzing code changes to understand their intent and purpose.

Your task is to:
1. Understand WHAT the code change is trying to achieve (the goal/purpose)
2. Analyze HOW it's being implemented (the approach)
3. Identify any gaps between intent and implementation
4. Consider architectural implications

Focus on understanding the \"why\" behind the changes, not just the \"what\".
Provide your analysis in structured JSON format.";

const RESPONSE_FORMAT: &str = r#"Analyze this change and provide your assessment in the following JSON format:
{
  "purpose": "What is this change trying to achieve? What problem is it solving?",
  "implementation_approach": "How is the solution being implemented? What patterns/techniques are used?",
  "key_changes": [
    "List of main changes being made"
  ],
  "potential_issues": [
    "Issues identified from analyzing the intent vs implementation"
  ],
  "missing_considerations": [
    "Things that might be missing or overlooked"
  ],
  "architectural_impact": "How does this change affect the overall system architecture?",
  "confidence": 0.85
}

Focus on:
1. Understanding the developer's intent from the title, description, and code
2. Evaluating if the implementation matches the stated intent
3. Identifying gaps or inconsistencies
4. Considering broader architectural implications
5. Suggesting improvements based on intent understanding

Respond with ONLY the JSON object, no additional text."#;

const IMPORTED_HEADER: &str = "\n## Newly Imported Files (Cross-File Analysis)\n\
**IMPORTANT: These files are NEWLY IMPORTED by this change.**\n\
**Check if the usage of these components/functions is correct (props, signatures, types).**\n\n";

#[derive(Error, Debug)]
pub enum IntentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to parse intent analysis response: {0}")]
    Decode(#[from] DecodeError),
}

/// Runs the intent analysis call.
pub struct IntentStage {
    llm: Arc<dyn LlmCaller>,
}

impl IntentStage {
    pub fn new(llm: Arc<dyn LlmCaller>) -> Self {
        Self { llm }
    }

    /// One model call, decoded. Failures are recorded, never raised.
    pub async fn run(
        &self,
        change: &ChangeMetadata,
        ctx: &AssembledContext,
        diff_text: &str,
    ) -> StageResult<IntentAnalysis> {
        let prompt = build_intent_prompt(change, ctx, diff_text);
        info!(prompt_chars = prompt.len(), "running intent analysis");

        let result = timed(async {
            let text = self
                .llm
                .call(&prompt, Some(INTENT_SYSTEM_PROMPT), INTENT_MAX_TOKENS)
                .await?;
            Ok::<_, IntentError>(decode::<IntentAnalysis>(&text)?)
        })
        .await;

        match &result {
            StageResult::Success { duration_ms, .. } => {
                info!(duration_ms, "intent analysis completed");
            }
            StageResult::Failure { error, duration_ms } => {
                warn!(error = %error, duration_ms, "intent analysis failed");
            }
        }
        result
    }
}

/// Build the intent prompt within [`INTENT_PROMPT_BUDGET`].
///
/// Sections are filled in a fixed order (structure, changed files, related
/// files, newly-imported files) and each draws only on what the earlier ones
/// left, so later sections can never crowd out earlier ones. The diff gets
/// whatever remains, with a floor.
pub fn build_intent_prompt(change: &ChangeMetadata, ctx: &AssembledContext, diff_text: &str) -> String {
    let mut total = Budget::new(INTENT_PROMPT_BUDGET);
    let mut sections = String::new();

    if let Some(structure) = &ctx.structure {
        let text = format!(
            "\n## Repository Structure\n```\n{}\n```\n",
            clip(&structure.tree, MAX_STRUCTURE_CHARS)
        );
        total.append(&mut sections, &text);
    }

    if !ctx.changed_files.is_empty() {
        let mut budget = total.take(CHANGED_SHARE);
        sections.push_str(&files_section(
            "\n## Changed Files (Full Content)\n",
            &ctx.changed_files,
            &mut budget,
            MAX_CHANGED_FILES,
            MAX_CHANGED_FILE,
            |f| &f.content_for_prompt,
        ));
        total.absorb(budget);
    }

    let mut budget = total.take_leaving(RELATED_DIFF_RESERVE);
    if !ctx.related_files.is_empty() && budget.remaining() > MIN_RELATED_ROOM {
        sections.push_str(&files_section(
            "\n## Related Context Files\n",
            &ctx.related_files,
            &mut budget,
            MAX_RELATED_FILES,
            MAX_RELATED_FILE,
            |f| &f.content,
        ));
        total.absorb(budget);
    }

    let mut budget = total.take_leaving(IMPORTED_DIFF_RESERVE);
    if !ctx.imported_files.is_empty() && budget.remaining() > MIN_IMPORTED_ROOM {
        sections.push_str(&files_section(
            IMPORTED_HEADER,
            &ctx.imported_files,
            &mut budget,
            MAX_IMPORTED_FILES,
            MAX_IMPORTED_FILE,
            |f| &f.content,
        ));
        total.absorb(budget);
    }

    let diff_budget = total
        .remaining()
        .saturating_sub(DIFF_SLACK)
        .max(MIN_DIFF_BUDGET);
    let diff = if diff_text.len() > diff_budget {
        format!("{}\n... [diff truncated]", clip(diff_text, diff_budget))
    } else {
        diff_text.to_string()
    };

    let description = if change.description.trim().is_empty() {
        "No description provided".to_string()
    } else if change.description.len() > MAX_DESCRIPTION {
        format!("{}... [truncated]", clip(&change.description, MAX_DESCRIPTION))
    } else {
        change.description.clone()
    };

    format!(
        "Analyze the following change to understand its intent and implementation quality.

## Change Information
- Change: {id}
- Title: {title}
- Author: {author}
- Description: {description}
- Branch: {head} → {base}
{sections}
## Code Changes (Diff)
```diff
{diff}
```

{RESPONSE_FORMAT}",
        id = change.id,
        title = change.title,
        author = change.author,
        head = change.head_branch,
        base = change.base_branch,
    )
}

/// A headed list of file blocks, each cut so the section fits `budget`.
fn files_section(
    header: &str,
    files: &[FileSnapshot],
    budget: &mut Budget,
    max_files: usize,
    max_per_file: usize,
    content: impl Fn(&FileSnapshot) -> &str,
) -> String {
    let mut out = String::new();
    if !budget.append(&mut out, header) {
        return out;
    }

    let shown = files.len().min(max_files);
    let per_file = budget.remaining() / shown.max(1);
    for file in &files[..shown] {
        let overhead = file_block(file, "").len() + 1;
        let room = per_file.saturating_sub(overhead).min(max_per_file);
        let block = format!("\n{}", file_block(file, clip(content(file), room)));
        if !budget.append(&mut out, &block) {
            break;
        }
    }
    out
}
