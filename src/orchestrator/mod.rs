//! Review orchestrator: sizing, context assembly, the concurrent analysis
//! fan-out, result combination and the synthesis loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::analysis::{
    SemgrepAnalyzer, StaticAnalysisStage, StaticAnalyzer, SymbolExtractor, TreeSitterExtractor,
    discover_custom_rules,
};
use crate::combiner::combine;
use crate::config::{Config, ReviewConfig};
use crate::context::{ContextAssembler, DEFAULT_FETCH_CONCURRENCY, render_context_section};
use crate::env::Env;
use crate::intent::IntentStage;
use crate::models::stage::elapsed_ms;
use crate::models::verdict::{AttemptRecord, ReviewVerdict};
use crate::models::{
    AssembledContext, ChangeMetadata, ChangeMetrics, IntentAnalysis, ProcessingMode, ProviderName,
    StageResult, StaticAnalysisReport,
};
use crate::providers::{LlmCaller, ProviderError, Retrying, RigCaller};
use crate::sizing::{SizeLimits, SizedChange, measure, right_size, select_mode};
use crate::source::{ChangeSource, GitChangeSource, SourceError};
use crate::synthesis::{
    StopReason, SynthesisError, SynthesisLoop, review_prompt, system_prompt,
};

/// Errors that end a review without a verdict.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("failed to fetch change '{change_id}': {source}")]
    Fetch {
        change_id: String,
        #[source]
        source: SourceError,
    },

    #[error("change '{0}' has no file changes to review")]
    EmptyChange(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Which stages run and how hard the synthesis loop tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOptions {
    pub static_analysis: bool,
    pub intent_analysis: bool,
    pub context_extraction: bool,
    pub retry_until_issues_found: bool,
    pub max_retries: u32,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self::from(&ReviewConfig::default())
    }
}

impl From<&ReviewConfig> for ReviewOptions {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            static_analysis: config.static_analysis,
            intent_analysis: config.intent_analysis,
            context_extraction: config.context_extraction,
            retry_until_issues_found: config.retry_until_issues_found,
            max_retries: u32::try_from(config.max_retries).unwrap_or(u32::MAX),
        }
    }
}

impl ReviewOptions {
    /// The synthesis ceiling: `max_retries` when retrying, otherwise one.
    pub fn max_attempts(&self) -> u32 {
        if self.retry_until_issues_found {
            self.max_retries.max(1)
        } else {
            1
        }
    }
}

/// Size classification of a change, computed without any model call.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPlan {
    pub change_id: String,
    pub title: String,
    pub metrics: ChangeMetrics,
    pub mode: ProcessingMode,
    /// Files kept after right-sizing.
    pub files_considered: usize,
    /// Diff bytes kept after right-sizing.
    pub diff_size: usize,
}

/// A finished review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub run_id: String,
    pub change_id: String,
    pub title: String,
    pub metrics: ChangeMetrics,
    pub mode: ProcessingMode,
    pub verdict: ReviewVerdict,
    pub attempts: Vec<AttemptRecord>,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_analysis: Option<StaticAnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_analysis: Option<StageResult<IntentAnalysis>>,
    pub duration_ms: u64,
}

/// Runs the review pipeline against pluggable collaborators.
pub struct ReviewOrchestrator {
    source: Arc<dyn ChangeSource>,
    analyzer: Arc<dyn StaticAnalyzer>,
    symbols: Option<Arc<dyn SymbolExtractor>>,
    llm: Arc<dyn LlmCaller>,
    limits: SizeLimits,
    fetch_concurrency: usize,
    extra_rulesets: Vec<String>,
    custom_rules: Vec<PathBuf>,
}

impl ReviewOrchestrator {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        analyzer: Arc<dyn StaticAnalyzer>,
        symbols: Option<Arc<dyn SymbolExtractor>>,
        llm: Arc<dyn LlmCaller>,
        limits: SizeLimits,
    ) -> Self {
        Self {
            source,
            analyzer,
            symbols,
            llm,
            limits,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            extra_rulesets: Vec::new(),
            custom_rules: Vec::new(),
        }
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    pub fn with_rules(mut self, extra_rulesets: Vec<String>, custom_rules: Vec<PathBuf>) -> Self {
        self.extra_rulesets = extra_rulesets;
        self.custom_rules = custom_rules;
        self
    }

    /// Fetch a change and classify its size.
    pub async fn plan(&self, change_id: &str) -> Result<ReviewPlan, OrchestrationError> {
        plan_change(self.source.as_ref(), change_id, &self.limits).await
    }

    /// Review `change_id` end to end.
    pub async fn run(
        &self,
        change_id: &str,
        options: &ReviewOptions,
    ) -> Result<ReviewOutcome, OrchestrationError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("review", run_id = %run_id, change = %change_id);
        self.run_inner(change_id, options, run_id)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        change_id: &str,
        options: &ReviewOptions,
        run_id: String,
    ) -> Result<ReviewOutcome, OrchestrationError> {
        let started = Instant::now();
        let change = self.fetch(change_id).await?;
        let (metrics, sized) = self.size(&change);
        info!(
            files = metrics.file_count,
            changes = metrics.total_changes,
            diff_size = metrics.diff_size,
            mode = %sized.mode,
            "sized change"
        );

        let ctx = if options.context_extraction {
            ContextAssembler::new(Arc::clone(&self.source), self.limits.clone())
                .with_concurrency(self.fetch_concurrency)
                .assemble(&change, &sized)
                .await
        } else {
            AssembledContext::degraded(
                sized.mode,
                "Context extraction disabled; reviewing from the diff alone",
            )
        };

        let static_stage = StaticAnalysisStage::new(
            Arc::clone(&self.analyzer),
            self.symbols.clone(),
            self.limits.clone(),
        )
        .with_extra_rulesets(self.extra_rulesets.clone())
        .with_custom_rules(self.custom_rules.clone());
        let intent_stage = IntentStage::new(Arc::clone(&self.llm));

        // Both branches always run to completion; neither cancels the other.
        let (static_analysis, intent_analysis) = tokio::join!(
            async {
                if options.static_analysis {
                    Some(static_stage.run(&ctx, &sized).await)
                } else {
                    None
                }
            },
            async {
                if options.intent_analysis {
                    Some(intent_stage.run(&change, &ctx, &sized.diff_text).await)
                } else {
                    None
                }
            }
        );

        let context_section = render_context_section(&ctx, &self.limits);
        let combined = combine(
            &context_section,
            static_analysis.as_ref(),
            intent_analysis.as_ref(),
            &self.limits,
        );

        let sast_succeeded = static_analysis
            .as_ref()
            .is_some_and(|r| r.analyzer.is_success());
        let base_prompt = review_prompt(&change, &combined, &sized.diff_text, self.limits.max_diff_size);
        let synthesis = SynthesisLoop::new(Arc::clone(&self.llm), options.max_attempts())
            .run(&base_prompt, &system_prompt(sast_succeeded))
            .await?;

        let duration_ms = elapsed_ms(started);
        info!(
            issues = synthesis.verdict.issues.len(),
            attempts = synthesis.attempts.len(),
            stop_reason = %synthesis.stop_reason,
            duration_ms,
            "review complete"
        );

        Ok(ReviewOutcome {
            run_id,
            change_id: change.id,
            title: change.title,
            metrics,
            mode: sized.mode,
            verdict: synthesis.verdict,
            attempts: synthesis.attempts,
            stop_reason: synthesis.stop_reason,
            static_analysis,
            intent_analysis,
            duration_ms,
        })
    }

    async fn fetch(&self, change_id: &str) -> Result<ChangeMetadata, OrchestrationError> {
        fetch_change(self.source.as_ref(), change_id).await
    }

    fn size(&self, change: &ChangeMetadata) -> (ChangeMetrics, SizedChange) {
        size_change(change, &self.limits)
    }
}

/// The only fatal fetch: without the change itself there is nothing to review.
async fn fetch_change(
    source: &dyn ChangeSource,
    change_id: &str,
) -> Result<ChangeMetadata, OrchestrationError> {
    let change = source.change_metadata(change_id).await.map_err(|source| {
        warn!(error = %source, "failed to fetch change");
        OrchestrationError::Fetch {
            change_id: change_id.to_string(),
            source,
        }
    })?;
    if change.files.is_empty() {
        return Err(OrchestrationError::EmptyChange(change_id.to_string()));
    }
    Ok(change)
}

fn size_change(change: &ChangeMetadata, limits: &SizeLimits) -> (ChangeMetrics, SizedChange) {
    let metrics = measure(&change.files, &change.diff_text);
    let mode = select_mode(&metrics, limits);
    (metrics, right_size(change, mode, limits))
}

/// Fetch a change and classify its size without any model involved.
pub async fn plan_change(
    source: &dyn ChangeSource,
    change_id: &str,
    limits: &SizeLimits,
) -> Result<ReviewPlan, OrchestrationError> {
    let change = fetch_change(source, change_id).await?;
    let (metrics, sized) = size_change(&change, limits);
    Ok(ReviewPlan {
        change_id: change.id,
        title: change.title,
        metrics,
        mode: sized.mode,
        files_considered: sized.files.len(),
        diff_size: sized.diff_text.len(),
    })
}

/// Build an orchestrator over a local git repository with the real
/// collaborators: semgrep, tree-sitter and a rig-core model caller.
pub fn local_orchestrator(
    repo_root: &Path,
    config: &Config,
    provider: ProviderName,
    model: &str,
) -> Result<ReviewOrchestrator, OrchestrationError> {
    let limits = config.limits.clone();
    let provider_config = config
        .provider
        .clone()
        .with_provider(provider, model, &Env::real());
    let llm = Retrying::new(RigCaller::new(provider_config, limits.llm_timeout_secs)?);

    let analyzer = SemgrepAnalyzer::new(&config.analysis.semgrep_binary, limits.semgrep_timeout_secs);
    let symbols: Option<Arc<dyn SymbolExtractor>> = config
        .analysis
        .symbols
        .then(|| Arc::new(TreeSitterExtractor) as Arc<dyn SymbolExtractor>);
    let custom_rules = config
        .analysis
        .custom_rules_dir
        .as_ref()
        .map(|dir| discover_custom_rules(&repo_root.join(dir)))
        .unwrap_or_default();

    Ok(ReviewOrchestrator::new(
        Arc::new(GitChangeSource::new(repo_root)),
        Arc::new(analyzer),
        symbols,
        Arc::new(llm),
        limits,
    )
    .with_fetch_concurrency(config.analysis.fetch_concurrency)
    .with_rules(config.analysis.rulesets.clone(), custom_rules))
}

/// Review `change_id` in the git repository at `repo_root`.
pub async fn run_review(
    change_id: &str,
    provider: ProviderName,
    model: &str,
    options: &ReviewOptions,
    config: &Config,
    repo_root: &Path,
) -> Result<ReviewOutcome, OrchestrationError> {
    local_orchestrator(repo_root, config, provider, model)?
        .run(change_id, options)
        .await
}
