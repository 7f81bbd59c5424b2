//! Result Combiner: merges the context section and both analysis stages into
//! the document the synthesis loop reviews.

use tracing::info;

use crate::analysis::{format_findings, format_symbol_table};
use crate::models::intent::IntentAnalysis;
use crate::models::sast::SastFinding;
use crate::models::stage::{StageResult, StaticAnalysisReport, SymbolOutcome};
use crate::sizing::SizeLimits;

/// Findings shown in the combined document, most severe first.
pub const MAX_PROMPT_FINDINGS: usize = 20;

const SEPARATOR: &str = "\n---\n";

/// Concatenate context, static analysis, symbol table and intent sections in
/// that order.
///
/// `None` means the stage was disabled. A failed stage is replaced by a
/// warning line so every enabled analysis maps to exactly one section.
pub fn combine(
    context_section: &str,
    static_analysis: Option<&StaticAnalysisReport>,
    intent: Option<&StageResult<IntentAnalysis>>,
    limits: &SizeLimits,
) -> String {
    let mut out = String::from(context_section);

    match static_analysis {
        Some(report) => {
            out.push_str(&static_analysis_section(&report.analyzer));
            out.push_str(&symbol_section(&report.symbols, limits));
        }
        None => out.push_str(&format!("{SEPARATOR}*Static analysis disabled for this review.*\n")),
    }

    match intent {
        Some(result) => out.push_str(&intent_section(result)),
        None => out.push_str(&format!("{SEPARATOR}*Intent analysis disabled for this review.*\n")),
    }

    info!(chars = out.len(), "combined analysis document");
    out
}

fn static_analysis_section(result: &StageResult<Vec<SastFinding>>) -> String {
    match result {
        StageResult::Success { value, duration_ms } => format!(
            "{SEPARATOR}## Static Analysis (SAST) Findings\n{}\n*SAST completed in {duration_ms}ms*\n",
            format_findings(value, MAX_PROMPT_FINDINGS)
        ),
        StageResult::Failure { error, .. } => {
            format!("{SEPARATOR}## SAST Analysis\n⚠️ SAST analysis failed: {error}\n")
        }
    }
}

fn symbol_section(outcome: &SymbolOutcome, limits: &SizeLimits) -> String {
    match outcome {
        SymbolOutcome::Extracted { files, .. } => {
            let table = format_symbol_table(files, limits.max_symbol_table_size);
            if table.is_empty() {
                String::new()
            } else {
                format!("{SEPARATOR}{table}")
            }
        }
        SymbolOutcome::Skipped { reason } => {
            format!("{SEPARATOR}⚠️ Symbol table unavailable: {reason}\n")
        }
        SymbolOutcome::Failed { error, .. } => {
            format!("{SEPARATOR}⚠️ Symbol extraction failed: {error}\n")
        }
    }
}

fn intent_section(result: &StageResult<IntentAnalysis>) -> String {
    let (intent, duration_ms) = match result {
        StageResult::Success { value, duration_ms } => (value, duration_ms),
        StageResult::Failure { error, .. } => {
            return format!("{SEPARATOR}## Intent Analysis\n⚠️ Intent analysis failed: {error}\n");
        }
    };

    let or = |s: &str, fallback: &str| {
        if s.trim().is_empty() {
            fallback.to_string()
        } else {
            s.to_string()
        }
    };

    let mut out = format!("{SEPARATOR}## Intent Analysis\n");
    out.push_str(&format!(
        "\n### Purpose\n{}\n",
        or(&intent.purpose, "Not determined")
    ));
    out.push_str(&format!(
        "\n### Implementation Approach\n{}\n",
        or(&intent.implementation_approach, "Not analyzed")
    ));
    bullet_list(&mut out, "Key Changes", "", &intent.key_changes);
    bullet_list(
        &mut out,
        "Potential Issues (from Intent Analysis)",
        "⚠️ ",
        &intent.potential_issues,
    );
    bullet_list(
        &mut out,
        "Missing Considerations",
        "💡 ",
        &intent.missing_considerations,
    );
    if !intent.architectural_impact.trim().is_empty() {
        out.push_str(&format!(
            "\n### Architectural Impact\n{}\n",
            intent.architectural_impact
        ));
    }
    out.push_str(&format!(
        "\n*Intent Analysis Confidence: {}%*\n*Intent Analysis completed in {duration_ms}ms*\n",
        intent.confidence_percent()
    ));
    out
}

fn bullet_list(out: &mut String, title: &str, marker: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n### {title}\n"));
    for item in items {
        out.push_str(&format!("- {marker}{item}\n"));
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::sast::FindingCategory;
    use crate::models::severity::Severity;
    use crate::models::symbols::{FileSymbols, SymbolInfo, SymbolKind};

    fn finding(rule: &str) -> SastFinding {
        SastFinding {
            rule_id: rule.to_string(),
            severity: Severity::High,
            category: FindingCategory::Security,
            message: "tainted input".to_string(),
            file: "app.py".to_string(),
            line: 4,
            end_line: None,
            column: None,
            cwe: None,
            owasp: None,
            code: None,
            fix: None,
        }
    }

    fn report(analyzer: StageResult<Vec<SastFinding>>, symbols: SymbolOutcome) -> StaticAnalysisReport {
        StaticAnalysisReport {
            analyzer,
            symbols,
            languages: Vec::new(),
            rulesets: Vec::new(),
        }
    }

    fn extracted() -> SymbolOutcome {
        let mut files = IndexMap::new();
        files.insert(
            "app.py".to_string(),
            FileSymbols {
                path: "app.py".to_string(),
                language: Some(crate::models::Language::Python),
                errors: Vec::new(),
                symbols: vec![SymbolInfo {
                    name: "handler".to_string(),
                    kind: SymbolKind::Function,
                    line: 3,
                    exported: true,
                    parent: None,
                    parameters: vec!["request".to_string()],
                }],
            },
        );
        SymbolOutcome::Extracted {
            files,
            duration_ms: 12,
        }
    }

    fn intent() -> StageResult<IntentAnalysis> {
        StageResult::Success {
            value: IntentAnalysis {
                purpose: "Add a login handler".into(),
                key_changes: vec!["new route".into()],
                potential_issues: vec!["no rate limiting".into()],
                missing_considerations: vec!["tests".into()],
                confidence: 0.8,
                ..IntentAnalysis::default()
            },
            duration_ms: 950,
        }
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn successful_stages_in_fixed_order() {
        let report = report(
            StageResult::Success {
                value: vec![finding("python.sqli")],
                duration_ms: 340,
            },
            extracted(),
        );
        let doc = combine("## Context\n", Some(&report), Some(&intent()), &SizeLimits::default());

        let order = [
            "## Context",
            "## Static Analysis (SAST) Findings",
            "### Issue 1: python.sqli",
            "*SAST completed in 340ms*",
            "## Symbol Table",
            "## Intent Analysis",
            "### Purpose\nAdd a login handler",
            "### Implementation Approach\nNot analyzed",
            "- new route",
            "- ⚠️ no rate limiting",
            "- 💡 tests",
            "*Intent Analysis Confidence: 80%*",
            "*Intent Analysis completed in 950ms*",
        ];
        let positions: Vec<usize> = order.iter().map(|s| doc.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(!doc.contains("### Architectural Impact"));
    }

    #[test]
    fn analyzer_timeout_keeps_symbol_table() {
        let report = report(
            StageResult::Failure {
                error: "Semgrep analysis timed out after 120 seconds".into(),
                duration_ms: 150_000,
            },
            extracted(),
        );
        let doc = combine("", Some(&report), Some(&intent()), &SizeLimits::default());
        assert!(doc.contains(
            "## SAST Analysis\n⚠️ SAST analysis failed: Semgrep analysis timed out after 120 seconds\n"
        ));
        assert!(doc.contains("## Symbol Table (for cross-file validation)"));
        assert!(doc.contains("handler"));
        assert!(!doc.contains("## Static Analysis (SAST) Findings"));
    }

    #[test]
    fn one_section_per_enabled_analysis_whatever_fails() {
        let failing = report(
            StageResult::Failure {
                error: "boom".into(),
                duration_ms: 1,
            },
            SymbolOutcome::Failed {
                error: "parser crashed".into(),
                duration_ms: 1,
            },
        );
        let intent_failed: StageResult<IntentAnalysis> = StageResult::Failure {
            error: "Failed to parse intent analysis response: no JSON object found in response"
                .into(),
            duration_ms: 2,
        };

        let intent_ok = intent();
        for outcome in [&intent_failed, &intent_ok] {
            let doc = combine("", Some(&failing), Some(outcome), &SizeLimits::default());
            assert_eq!(
                count(&doc, "## SAST Analysis") + count(&doc, "## Static Analysis (SAST)"),
                1
            );
            assert_eq!(count(&doc, "## Intent Analysis"), 1);
            assert!(doc.contains("⚠️ Symbol extraction failed: parser crashed"));
        }
    }

    #[test]
    fn disabled_stages_leave_a_note() {
        let doc = combine("ctx", None, None, &SizeLimits::default());
        assert_eq!(
            doc,
            "ctx\n---\n*Static analysis disabled for this review.*\n\
             \n---\n*Intent analysis disabled for this review.*\n"
        );
    }

    #[test]
    fn skipped_symbols_explain_why() {
        let report = report(
            StageResult::Success {
                value: Vec::new(),
                duration_ms: 0,
            },
            SymbolOutcome::Skipped {
                reason: "diff-only mode has no file content to parse".into(),
            },
        );
        let doc = combine("", Some(&report), None, &SizeLimits::default());
        assert!(doc.contains("No SAST issues detected."));
        assert!(doc.contains(
            "⚠️ Symbol table unavailable: diff-only mode has no file content to parse"
        ));
    }
}
