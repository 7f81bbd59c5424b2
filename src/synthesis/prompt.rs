//! Prompts for the final review call.

use crate::models::change::ChangeMetadata;
use crate::sizing::clip;

const MAX_DESCRIPTION: usize = 500;

const BASE_SYSTEM_PROMPT: &str = "\
You are an expert code reviewer with deep knowledge of software engineering best practices.
Your task is to review code changes (git diff) and provide constructive feedback.

**CRITICAL: You must ONLY review the changes shown in the Git Diff. Do NOT review or comment on code that wasn't modified in this change.**
- Lines starting with + are additions (new code) - these should be reviewed
- Lines starting with - are deletions (removed code) - you may comment on if the removal is problematic
- Lines without +/- are context lines - do NOT report issues in these lines unless they are directly affected by the changes

The full file content provided is for CONTEXT ONLY - to help you understand the surrounding code.
Do NOT report issues in code that exists outside the diff changes.

Focus on:
1. Code quality and maintainability of the CHANGED code
2. Potential bugs and logic errors INTRODUCED by the changes
3. Security vulnerabilities INTRODUCED by the changes
4. Performance considerations of the NEW code
5. Best practices and design patterns
6. **Static defects**: Missing imports, undefined variables, type mismatches, API contract violations - ONLY in changed code
7. **Logic defects**: Intent vs implementation mismatch, incomplete implementation - ONLY in changed code
8. **Naming and typos** - ONLY in identifiers that were added or modified in this change

IMPORTANT: For each issue you find, if you can provide a concrete code fix, include it in the \"suggested_change\" field.
The suggested_change should contain the EXACT code that should replace the problematic code.

Provide your review in a structured JSON format with clear, actionable feedback.";

const SAST_VALIDATION: &str = "

When SAST (Static Application Security Testing) findings are provided:
1. Validate each SAST finding - determine if it's a true positive or false positive
2. Include confirmed issues in your review with appropriate severity
3. Add context and explanation for each confirmed SAST issue
4. Filter out obvious false positives and explain why they're false positives";

/// Issue categories the model is pointed at again after a clean attempt.
pub const RETRY_CHECKLIST: &[&str] = &[
    "Subtle bugs or logic errors",
    "Missing error handling",
    "Security vulnerabilities",
    "Performance issues",
    "Code style/best practice violations",
    "Missing edge case handling",
    "Incorrect API usage",
    "Type mismatches or missing type checks",
    "Resource leaks or cleanup issues",
    "Concurrency/race condition issues",
];

const RESPONSE_FORMAT: &str = r#"Provide your review in the following JSON format:
{
  "summary": "Brief summary of the changes",
  "overall_assessment": "APPROVE | REQUEST_CHANGES | COMMENT",
  "score": 8,
  "issues": [
    {
      "severity": "HIGH | MEDIUM | LOW",
      "type": "bug | security | performance | style | best_practice | typo | static_defect | logic_defect | encapsulation",
      "file": "path/to/filename.py",
      "line": 42,
      "end_line": 45,
      "description": "Description of the issue",
      "suggestion": "Explanation of how to fix this issue",
      "suggested_change": "The exact replacement code"
    }
  ],
  "positive_feedback": [
    "Good aspects of the code"
  ],
  "suggestions": [
    "General improvement suggestions"
  ]
}

IMPORTANT NOTES:
1. **CRITICAL: ONLY review code that was CHANGED (lines with + or - in the diff).**
   - Do NOT report issues in unchanged context lines
   - The full file content is for CONTEXT ONLY to help you understand the changes
2. The "file" field MUST be the full file path as shown in the diff
3. The "line" field is the starting line number in the NEW version of the file
4. The "end_line" field is optional, use it for multi-line code suggestions
5. The "suggested_change" field should contain the EXACT replacement code (not a diff, just the new code)
6. If SAST findings are provided, validate them and include confirmed issues
7. Check for typos ONLY in newly added code; use type "typo"
8. Check for static defects (missing imports, undefined variables, type mismatches) ONLY in changed code; use type "static_defect"
9. **USE THE SYMBOL TABLE** (if provided) to validate imports and method calls in the changed code
10. Check for logic defects (intent vs implementation mismatch, incomplete implementations) ONLY in changed code; use type "logic_defect"

Respond with ONLY the JSON object, no additional text or markdown formatting."#;

/// System prompt for the review call.
pub fn system_prompt(sast_succeeded: bool) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if sast_succeeded {
        prompt.push_str(SAST_VALIDATION);
    }
    prompt
}

/// User prompt shared by every attempt: change details, the combined
/// analysis document and the diff capped at `max_diff`.
pub fn review_prompt(change: &ChangeMetadata, combined: &str, diff_text: &str, max_diff: usize) -> String {
    let description = if change.description.trim().is_empty() {
        "No description"
    } else {
        clip(&change.description, MAX_DESCRIPTION)
    };

    format!(
        "Please review the following code changes and provide detailed feedback.

Change Information:
- Change: {id}
- Title: {title}
- Author: {author}
- Description: {description}
- Base Branch: {base}
- Head Branch: {head}

{combined}

---

Code Changes (Git Diff):
```diff
{diff}
```

{RESPONSE_FORMAT}",
        id = change.id,
        title = change.title,
        author = change.author,
        base = change.base_branch,
        head = change.head_branch,
        diff = clip(diff_text, max_diff),
    )
}

/// Instruction block prepended to every attempt after the first.
pub fn retry_hint(attempt: u32) -> String {
    let mut hint = format!(
        "\n\n**IMPORTANT (Attempt {attempt})**: Previous analysis found no issues. \
         Since this change is known to have problems, please analyze MORE CAREFULLY. Look for:\n"
    );
    for item in RETRY_CHECKLIST {
        hint.push_str(&format!("- {item}\n"));
    }
    hint.push_str("\nYou MUST find at least one issue. Do not say the code is perfect.\n");
    hint
}

/// The prompt for attempt `attempt` (1-based).
pub fn attempt_prompt(base: &str, attempt: u32) -> String {
    if attempt > 1 {
        format!("{}{base}", retry_hint(attempt))
    } else {
        base.to_string()
    }
}
