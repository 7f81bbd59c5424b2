//! Terminal renderer: styled flowing text grouped by file.

use colored::Colorize;

use crate::models::Severity;
use crate::models::verdict::{Assessment, ReviewIssue};
use crate::orchestrator::ReviewOutcome;
use crate::output::OutputRenderer;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, outcome: &ReviewOutcome) -> String {
        let verdict = &outcome.verdict;
        let mut output = format!(
            " {} {}\n {}\n\n",
            outcome.change_id.bold(),
            outcome.title,
            format!(
                "{} files, {} changed lines, {} mode, {} attempt(s)",
                outcome.metrics.file_count,
                outcome.metrics.total_changes,
                outcome.mode,
                outcome.attempts.len()
            )
            .dimmed()
        );

        for warning in stage_warnings(outcome) {
            output.push_str(&format!(" {} {}\n", "⚠".yellow(), warning.yellow()));
        }

        if !verdict.summary.is_empty() {
            output.push_str(&format!("\n {}\n\n", verdict.summary));
        }

        if verdict.issues.is_empty() {
            output.push_str(&format!("{}", "  ✔ No issues found.\n".green()));
        } else {
            let mut sorted: Vec<&ReviewIssue> = verdict.issues.iter().collect();
            sorted.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

            let mut current_file = "";
            for issue in sorted {
                if issue.file != current_file {
                    if !current_file.is_empty() {
                        output.push('\n');
                    }
                    current_file = &issue.file;
                }
                output.push_str(&render_issue(issue));
            }
        }

        for (title, items) in [
            ("Positive feedback", &verdict.positive_feedback),
            ("Suggestions", &verdict.suggestions),
        ] {
            if items.is_empty() {
                continue;
            }
            output.push_str(&format!("\n {}\n", title.bold()));
            for item in items {
                output.push_str(&format!("   • {item}\n"));
            }
        }

        let count = |s: Severity| verdict.issues.iter().filter(|i| i.severity == s).count();
        let assessment = match verdict.overall_assessment {
            Assessment::Approve => "APPROVE".green().bold(),
            Assessment::RequestChanges => "REQUEST_CHANGES".red().bold(),
            Assessment::Comment => "COMMENT".yellow().bold(),
        };
        output.push_str(&format!("\n{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} issues: {} high, {} medium, {} low\n",
            verdict.issues.len().to_string().bold(),
            count(Severity::High).to_string().red().bold(),
            count(Severity::Medium).to_string().yellow().bold(),
            count(Severity::Low).to_string().blue().bold(),
        ));
        output.push_str(&format!(
            " {} · score {}/10 · {:.1}s\n",
            assessment,
            verdict.score,
            outcome.duration_ms as f64 / 1000.0
        ));
        output
    }
}

fn render_issue(issue: &ReviewIssue) -> String {
    let (icon, severity) = match issue.severity {
        Severity::High => ("✖".red().bold(), "high".red().bold()),
        Severity::Medium => ("⚠".yellow().bold(), "medium".yellow().bold()),
        Severity::Low => ("ℹ".blue().bold(), "low".blue().bold()),
    };

    let location = match (issue.line, issue.end_line) {
        (Some(line), Some(end)) if end != line => format!("{}:{line}-{end}", issue.file),
        (Some(line), _) => format!("{}:{line}", issue.file),
        (None, _) => issue.file.clone(),
    };

    let mut out = format!(" {icon} {severity} in {}\n", location.bold());
    out.push_str(&format!(
        "   [{}] {}\n",
        issue.kind.to_string().cyan(),
        issue.description
    ));
    if let Some(suggestion) = &issue.suggestion {
        out.push_str(&format!("   {} {suggestion}\n", "→".cyan()));
    }
    if let Some(change) = &issue.suggested_change {
        for line in change.lines() {
            out.push_str(&format!("   {} {}\n", "+".green(), line.green()));
        }
    }
    out.push('\n');
    out
}

/// Degraded stages, one line each.
fn stage_warnings(outcome: &ReviewOutcome) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(report) = &outcome.static_analysis {
        if let Some(error) = report.analyzer.error() {
            warnings.push(format!("static analysis failed: {error}"));
        }
    }
    if let Some(error) = outcome.intent_analysis.as_ref().and_then(|r| r.error()) {
        warnings.push(format!("intent analysis failed: {error}"));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::outcome;

    #[test]
    fn render_clean_review() {
        let output = TerminalRenderer.render(&outcome(r#"{"summary": "Fine", "score": 9}"#));
        assert!(output.contains("No issues found"));
        assert!(output.contains("intent analysis failed: LLM API error: 503"));
        assert!(output.contains("1 attempt(s)"));
    }

    #[test]
    fn render_issues_grouped_by_file() {
        let output = TerminalRenderer.render(&outcome(
            r#"{
                "overall_assessment": "REQUEST_CHANGES",
                "score": 3,
                "issues": [
                    {"severity": "LOW", "type": "typo", "file": "src/b.py", "line": 9, "description": "recieve"},
                    {"severity": "HIGH", "type": "security", "file": "src/a.py", "line": "12-14",
                     "description": "SQL injection", "suggestion": "Use parameters",
                     "suggested_change": "cur.execute(q, (x,))"}
                ],
                "suggestions": ["Add tests"]
            }"#,
        ));
        let a = output.find("src/a.py:12-14").unwrap();
        let b = output.find("src/b.py:9").unwrap();
        assert!(a < b);
        assert!(output.contains("SQL injection"));
        assert!(output.contains("Use parameters"));
        assert!(output.contains("cur.execute(q, (x,))"));
        assert!(output.contains("Add tests"));
        assert!(output.contains("issues:"));
    }
}
