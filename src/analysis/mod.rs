//! Static Analysis Stage: semgrep over materialized files alongside symbol
//! extraction, both non-fatal.

pub mod semgrep;
pub mod symbols;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::diff::parse_unified_diff;
use crate::models::context::AssembledContext;
use crate::models::diff::FileDiff;
use crate::models::language::Language;
use crate::models::sast::SastFinding;
use crate::models::stage::{StageResult, StaticAnalysisReport, SymbolOutcome, elapsed_ms, timed};
use crate::sizing::{SizeLimits, SizedChange};

pub use semgrep::{AnalyzerError, SemgrepAnalyzer, StaticAnalyzer, format_findings};
pub use symbols::{SymbolExtractor, TreeSitterExtractor, extract_from_files, format_symbol_table};

/// Rule sets applied to every analysis.
const BASE_RULESETS: &[&str] = &["p/security-audit", "p/ci"];

/// Placeholder semgrep prints instead of code for unauthenticated registry rules.
const REDACTED_SNIPPET: &str = "requires login";

/// Per-language semgrep registry rule sets.
pub fn language_rulesets(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &["p/python", "p/bandit"],
        Language::JavaScript => &["p/javascript", "p/nodejs"],
        Language::TypeScript => &["p/typescript", "p/react"],
        Language::Java => &["p/java"],
        Language::Go => &["p/golang"],
        Language::Ruby => &["p/ruby"],
        Language::Php => &["p/php"],
        Language::Rust => &["p/rust"],
        _ => &[],
    }
}

/// Base rule sets, per-language sets, configured extras, then custom rule
/// files; no duplicates.
pub fn rulesets_for(
    languages: &[Language],
    extra: &[String],
    custom_rules: &[PathBuf],
) -> Vec<String> {
    let mut out: IndexSet<String> = BASE_RULESETS.iter().map(|r| r.to_string()).collect();
    for lang in languages {
        out.extend(language_rulesets(*lang).iter().map(|r| r.to_string()));
    }
    out.extend(extra.iter().cloned());
    out.extend(custom_rules.iter().map(|p| p.display().to_string()));
    out.into_iter().collect()
}

/// Every `*.yml`/`*.yaml` file under `dir`, sorted. A missing directory yields none.
pub fn discover_custom_rules(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut rules: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "yml" | "yaml"))
        })
        .collect();
    rules.sort();
    rules
}

/// Rebuild a file's new-side text from its patch: added and context lines,
/// without removed lines or headers. `None` when nothing survives.
pub fn reconstruct_from_patch(patch: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_hunk = false;
    for line in patch.lines() {
        if ["diff ", "index ", "--- ", "+++ ", "\\ No newline"]
            .iter()
            .any(|p| line.starts_with(p))
        {
            continue;
        }
        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }
        if !in_hunk || line.starts_with('-') {
            continue;
        }
        let text = line
            .strip_prefix('+')
            .or_else(|| line.strip_prefix(' '))
            .unwrap_or(line);
        lines.push(text);
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Relative path inside the scan directory, or `None` when it would escape it.
fn safe_relative(path: &str) -> Option<&Path> {
    let p = Path::new(path);
    p.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(p)
}

/// Write files under `root`, skipping unsafe paths. Returns how many were written.
pub fn materialize(root: &Path, files: &[(String, String)]) -> std::io::Result<usize> {
    let mut written = 0;
    for (path, content) in files {
        let Some(rel) = safe_relative(path) else {
            warn!(path, "skipping path outside the scan directory");
            continue;
        };
        let dest = root.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, content)?;
        written += 1;
    }
    Ok(written)
}

/// Runs the static analyzer and symbol extraction concurrently.
pub struct StaticAnalysisStage {
    analyzer: Arc<dyn StaticAnalyzer>,
    symbols: Option<Arc<dyn SymbolExtractor>>,
    limits: SizeLimits,
    extra_rulesets: Vec<String>,
    custom_rules: Vec<PathBuf>,
}

impl StaticAnalysisStage {
    pub fn new(
        analyzer: Arc<dyn StaticAnalyzer>,
        symbols: Option<Arc<dyn SymbolExtractor>>,
        limits: SizeLimits,
    ) -> Self {
        Self {
            analyzer,
            symbols,
            limits,
            extra_rulesets: Vec::new(),
            custom_rules: Vec::new(),
        }
    }

    pub fn with_extra_rulesets(mut self, rulesets: Vec<String>) -> Self {
        self.extra_rulesets = rulesets;
        self
    }

    pub fn with_custom_rules(mut self, rules: Vec<PathBuf>) -> Self {
        self.custom_rules = rules;
        self
    }

    /// Run both sub-tasks. Always returns a report; failures are recorded in it.
    pub async fn run(&self, ctx: &AssembledContext, sized: &SizedChange) -> StaticAnalysisReport {
        let files = self.files_to_scan(ctx, sized);
        let languages: Vec<Language> = files
            .iter()
            .filter_map(|(path, _)| Language::from_path(path))
            .filter(|l| l.is_analyzable())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        let rulesets = rulesets_for(&languages, &self.extra_rulesets, &self.custom_rules);

        let (analyzer, symbols) = tokio::join!(
            self.scan(&files, &languages, &rulesets, &sized.diff_text),
            self.extract_symbols(ctx, sized)
        );

        StaticAnalysisReport {
            analyzer,
            symbols,
            languages,
            rulesets,
        }
    }

    /// Full content where fetched, otherwise the patch replayed; removed files never.
    fn files_to_scan(&self, ctx: &AssembledContext, sized: &SizedChange) -> Vec<(String, String)> {
        let contents: HashMap<&str, &str> = ctx
            .changed_files
            .iter()
            .map(|f| (f.path.as_str(), f.content.as_str()))
            .collect();

        sized
            .files
            .iter()
            .filter(|f| !f.is_removed())
            .filter_map(|f| {
                let content = match contents.get(f.path.as_str()) {
                    Some(c) => Some(c.to_string()),
                    None => reconstruct_from_patch(&f.patch),
                }?;
                Some((f.path.clone(), content))
            })
            .collect()
    }

    async fn scan(
        &self,
        files: &[(String, String)],
        languages: &[Language],
        rulesets: &[String],
        diff_text: &str,
    ) -> StageResult<Vec<SastFinding>> {
        if files.is_empty() || languages.is_empty() {
            info!("no analyzable files, skipping semgrep");
            return StageResult::Success {
                value: Vec::new(),
                duration_ms: 0,
            };
        }

        let result = timed(async {
            let dir = tempfile::Builder::new().prefix("diffsieve-scan-").tempdir()?;
            let root = dir.path().to_path_buf();
            let owned = files.to_vec();
            let written = tokio::task::spawn_blocking(move || materialize(&root, &owned))
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))??;
            debug!(written, "materialized files for static analysis");
            if written == 0 {
                return Ok(Vec::new());
            }
            self.analyzer.analyze(dir.path(), rulesets).await
        })
        .await;

        match result {
            StageResult::Success { mut value, duration_ms } => {
                fill_snippets(&mut value, diff_text);
                info!(findings = value.len(), duration_ms, "static analysis complete");
                StageResult::Success { value, duration_ms }
            }
            StageResult::Failure { error, duration_ms } => {
                warn!(%error, duration_ms, "static analysis failed");
                StageResult::Failure { error, duration_ms }
            }
        }
    }

    async fn extract_symbols(&self, ctx: &AssembledContext, sized: &SizedChange) -> SymbolOutcome {
        let skipped = |reason: String| {
            debug!(%reason, "symbol extraction skipped");
            SymbolOutcome::Skipped { reason }
        };

        if !sized.mode.fetches_content() {
            return skipped("diff-only mode has no file content to parse".to_string());
        }
        let Some(extractor) = self.symbols.clone() else {
            return skipped("symbol extraction disabled".to_string());
        };
        if !extractor.is_available() {
            return skipped("symbol extractor unavailable".to_string());
        }
        let file_count = sized.files.len();
        if file_count > self.limits.max_files_for_symbol_extraction {
            return skipped(format!(
                "too many files ({file_count} > {})",
                self.limits.max_files_for_symbol_extraction
            ));
        }
        let contents = ctx.full_contents();
        if contents.is_empty() {
            return skipped("no file content available".to_string());
        }

        let started = Instant::now();
        let timeout_secs = self.limits.symbol_extraction_timeout_secs;
        let task = tokio::task::spawn_blocking(move || extract_from_files(&*extractor, &contents));
        let outcome = match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(Ok(files)) => SymbolOutcome::Extracted {
                files,
                duration_ms: elapsed_ms(started),
            },
            Ok(Err(e)) => SymbolOutcome::Failed {
                error: format!("symbol extraction task failed: {e}"),
                duration_ms: elapsed_ms(started),
            },
            Err(_) => SymbolOutcome::Failed {
                error: format!("Symbol extraction timed out after {timeout_secs} seconds"),
                duration_ms: elapsed_ms(started),
            },
        };

        match &outcome {
            SymbolOutcome::Extracted { files, duration_ms } => {
                let symbols: usize = files.values().map(|f| f.symbols.len()).sum();
                info!(files = files.len(), symbols, duration_ms, "symbol extraction complete");
            }
            SymbolOutcome::Failed { error, .. } => warn!(%error, "symbol extraction failed"),
            SymbolOutcome::Skipped { .. } => {}
        }
        outcome
    }
}

/// Replace missing or redacted snippets with the new-side diff line.
fn fill_snippets(findings: &mut [SastFinding], diff_text: &str) {
    let needs_fill = |f: &SastFinding| {
        f.code
            .as_deref()
            .is_none_or(|c| c.trim().is_empty() || c.contains(REDACTED_SNIPPET))
    };
    if !findings.iter().any(needs_fill) {
        return;
    }

    let diffs: IndexMap<String, FileDiff> = parse_unified_diff(diff_text)
        .into_iter()
        .map(|d| (d.path().to_string(), d))
        .collect();
    for finding in findings.iter_mut().filter(|f| needs_fill(f)) {
        finding.code = diffs
            .get(&finding.file)
            .and_then(|d| d.new_line(finding.line))
            .map(str::to_string);
    }
}
