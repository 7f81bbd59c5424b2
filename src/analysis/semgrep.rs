//! Semgrep-backed static analyzer and findings formatting.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::sast::{FindingCategory, SastFinding};
use crate::models::severity::Severity;
use crate::sizing::clip;

/// Extra wall-clock allowance on top of semgrep's own per-rule timeout.
const WALL_CLOCK_SLACK_SECS: u64 = 30;
/// Stderr excerpt kept in error messages.
const MAX_STDERR_CHARS: usize = 500;

/// Errors from a static analyzer run.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Semgrep analysis timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to run Semgrep: {0}")]
    Spawn(String),

    #[error("Failed to parse Semgrep output: {0}")]
    InvalidOutput(String),

    #[error("Semgrep error: {0}")]
    Reported(String),

    #[error("failed to prepare analysis files: {0}")]
    Materialize(#[from] std::io::Error),
}

/// Runs rules over a directory of materialized files.
#[async_trait]
pub trait StaticAnalyzer: Send + Sync {
    /// Findings for every file under `target`, with paths relative to it.
    async fn analyze(
        &self,
        target: &Path,
        rulesets: &[String],
    ) -> Result<Vec<SastFinding>, AnalyzerError>;
}

/// Invokes the `semgrep` binary.
#[derive(Debug, Clone)]
pub struct SemgrepAnalyzer {
    binary: PathBuf,
    timeout_secs: u64,
}

impl SemgrepAnalyzer {
    pub fn new(binary: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs,
        }
    }
}

impl Default for SemgrepAnalyzer {
    fn default() -> Self {
        Self::new("semgrep", 120)
    }
}

#[async_trait]
impl StaticAnalyzer for SemgrepAnalyzer {
    async fn analyze(
        &self,
        target: &Path,
        rulesets: &[String],
    ) -> Result<Vec<SastFinding>, AnalyzerError> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["--json", "--quiet", "--no-git-ignore", "--timeout"])
            .arg(self.timeout_secs.to_string());
        for ruleset in rulesets {
            cmd.arg("--config").arg(ruleset);
        }
        cmd.arg(target)
            .current_dir(target)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        info!(rulesets = rulesets.len(), "running semgrep");
        let wall_clock = Duration::from_secs(self.timeout_secs + WALL_CLOCK_SLACK_SECS);
        let output = tokio::time::timeout(wall_clock, cmd.output())
            .await
            .map_err(|_| AnalyzerError::Timeout(self.timeout_secs))?
            .map_err(|e| AnalyzerError::Spawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let findings = interpret_output(output.status.success(), &stdout, &stderr, target)?;
        info!(findings = findings.len(), "semgrep finished");
        Ok(findings)
    }
}

/// Turn a finished semgrep process into findings or an error.
pub fn interpret_output(
    exit_ok: bool,
    stdout: &str,
    stderr: &str,
    target: &Path,
) -> Result<Vec<SastFinding>, AnalyzerError> {
    if !stdout.trim().is_empty() {
        return parse_output(stdout, target);
    }
    if exit_ok {
        debug!("semgrep produced no output");
        return Ok(Vec::new());
    }

    let excerpt = clip(stderr, MAX_STDERR_CHARS);
    if !excerpt.is_empty() {
        warn!(stderr = excerpt, "semgrep reported on stderr");
    }
    if excerpt.to_lowercase().contains("error") {
        return Err(AnalyzerError::Reported(excerpt.to_string()));
    }
    Ok(Vec::new())
}

#[derive(Debug, Deserialize)]
struct SemgrepOutput {
    #[serde(default)]
    results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
    #[serde(default = "unknown")]
    check_id: String,
    #[serde(default = "unknown")]
    path: String,
    #[serde(default)]
    start: Position,
    end: Option<Position>,
    #[serde(default)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
struct Position {
    #[serde(default)]
    line: u32,
    col: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Extra {
    severity: Option<String>,
    message: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
    lines: Option<String>,
    fix: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Parse semgrep's `--json` output.
pub fn parse_output(stdout: &str, target: &Path) -> Result<Vec<SastFinding>, AnalyzerError> {
    let output: SemgrepOutput =
        serde_json::from_str(stdout).map_err(|e| AnalyzerError::InvalidOutput(e.to_string()))?;
    let prefix = format!("{}/", target.display());

    Ok(output
        .results
        .into_iter()
        .map(|r| {
            let message = r.extra.message.unwrap_or_else(|| "No description".to_string());
            let line = r.start.line;
            let end_line = r.end.map(|e| e.line).filter(|&end| end != line);
            SastFinding {
                category: FindingCategory::classify(&r.check_id, &message),
                severity: Severity::from_semgrep(r.extra.severity.as_deref().unwrap_or("WARNING")),
                file: r.path.strip_prefix(&prefix).unwrap_or(&r.path).to_string(),
                cwe: joined(&r.extra.metadata["cwe"]),
                owasp: joined(&r.extra.metadata["owasp"]),
                code: r.extra.lines.filter(|l| !l.trim().is_empty()),
                fix: r.extra.fix,
                rule_id: r.check_id,
                message,
                line,
                end_line,
                column: r.start.col,
            }
        })
        .collect())
}

/// A metadata entry that is either a string or a list of strings.
fn joined(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Render findings for a prompt: most severe first, at most `max` of them.
pub fn format_findings(findings: &[SastFinding], max: usize) -> String {
    if findings.is_empty() {
        return "No SAST issues detected.".to_string();
    }

    let mut sorted: Vec<&SastFinding> = findings.iter().collect();
    sorted.sort_by_key(|f| f.severity.rank());

    let mut header = format!("## SAST Analysis Results ({} issues found)", findings.len());
    if sorted.len() > max {
        sorted.truncate(max);
        header.push_str(&format!("\n(Showing top {max} of {} findings)", findings.len()));
    }
    header.push('\n');

    let mut parts = vec![header];
    for (i, f) in sorted.iter().enumerate() {
        let mut lines = vec![
            format!("### Issue {}: {}", i + 1, f.rule_id),
            format!("- **Severity**: {}", f.severity),
            format!("- **Category**: {}", f.category),
            format!("- **File**: {}", f.location()),
            format!("- **Message**: {}", f.message),
        ];
        if let Some(cwe) = &f.cwe {
            lines.push(format!("- **CWE**: {cwe}"));
        }
        if let Some(owasp) = &f.owasp {
            lines.push(format!("- **OWASP**: {owasp}"));
        }
        if let Some(code) = &f.code {
            lines.push(format!("- **Code**:\n```\n{code}\n```"));
        }
        if let Some(fix) = &f.fix {
            lines.push(format!("- **Suggested Fix**: {fix}"));
        }
        parts.push(lines.join("\n"));
    }
    parts.join("\n\n")
}
