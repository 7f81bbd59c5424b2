//! Clap argument types and option resolution.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use diffsieve::config::Config;
use diffsieve::models::{ProviderName, Severity};
use diffsieve::orchestrator::{ReviewOptions, ReviewOutcome};

/// Multi-stage LLM code review for git changes.
#[derive(Parser, Debug)]
#[command(name = "diffsieve", version)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review a change.
    Review(Box<ReviewArgs>),

    /// Print size metrics and the processing mode without calling a model.
    Plan(PlanArgs),
}

/// Arguments for the `plan` subcommand.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Git range `base..head`, or a single ref meaning `ref..HEAD`.
    pub change: String,

    /// Path to the repository (default: current directory).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Git range `base..head`, or a single ref meaning `ref..HEAD`.
    pub change: String,

    /// Path to the repository (default: current directory).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    // --- Model ---
    /// Provider: anthropic, openai, cohere, gemini, perplexity, deepseek, xai,
    /// groq or openai-compatible.
    #[arg(long)]
    pub provider: Option<ProviderName>,

    /// Model name for the chosen provider.
    #[arg(long)]
    pub model: Option<String>,

    // --- Stages ---
    /// Skip semgrep and symbol extraction.
    #[arg(long, default_value_t = false)]
    pub no_static_analysis: bool,

    /// Skip the intent analysis call.
    #[arg(long, default_value_t = false)]
    pub no_intent_analysis: bool,

    /// Review the diff alone without fetching file contents.
    #[arg(long, default_value_t = false)]
    pub no_context: bool,

    // --- Synthesis loop ---
    /// Attempt ceiling for the synthesis loop.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Make a single synthesis attempt.
    #[arg(long, default_value_t = false, conflicts_with = "max_retries")]
    pub no_retry: bool,

    // --- Output ---
    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Exit non-zero if an issue meets this severity.
    #[arg(long)]
    pub fail_on: Option<Severity>,
}

impl ReviewArgs {
    /// Stage options from config with the CLI flags applied on top.
    pub fn options(&self, config: &Config) -> ReviewOptions {
        let mut options = ReviewOptions::from(&config.review);
        if self.no_static_analysis {
            options.static_analysis = false;
        }
        if self.no_intent_analysis {
            options.intent_analysis = false;
        }
        if self.no_context {
            options.context_extraction = false;
        }
        if let Some(max) = self.max_retries {
            options.max_retries = max;
        }
        if self.no_retry {
            options.retry_until_issues_found = false;
        }
        options
    }

    /// Provider and model, falling back to config. A provider switch without
    /// `--model` keeps the configured model name.
    pub fn model(&self, config: &Config) -> (ProviderName, String) {
        let provider = self.provider.unwrap_or(config.provider.name);
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| config.provider.model.clone());
        (provider, model)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render a finished review using the renderer for this format.
    pub fn render(&self, outcome: &ReviewOutcome) -> String {
        use diffsieve::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => diffsieve::output::terminal::TerminalRenderer.render(outcome),
            OutputFormat::Json => diffsieve::output::json::JsonRenderer.render(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(args: &[&str]) -> ReviewArgs {
        let argv = ["diffsieve", "review"].iter().chain(args).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Review(args) => *args,
            _ => panic!("expected Review command"),
        }
    }

    #[test]
    fn review_defaults() {
        let args = review(&["main..feature"]);
        assert_eq!(args.change, "main..feature");
        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.format, OutputFormat::Terminal);
        assert!(args.provider.is_none());

        let options = args.options(&Config::default());
        assert_eq!(options, ReviewOptions::default());
    }

    #[test]
    fn stage_flags_disable_stages() {
        let args = review(&[
            "main",
            "--no-static-analysis",
            "--no-intent-analysis",
            "--no-context",
            "--max-retries",
            "2",
        ]);
        let options = args.options(&Config::default());
        assert!(!options.static_analysis);
        assert!(!options.intent_analysis);
        assert!(!options.context_extraction);
        assert_eq!(options.max_attempts(), 2);
    }

    #[test]
    fn no_retry_means_one_attempt() {
        let options = review(&["main", "--no-retry"]).options(&Config::default());
        assert_eq!(options.max_attempts(), 1);
    }

    #[test]
    fn no_retry_conflicts_with_max_retries() {
        let result = Cli::try_parse_from([
            "diffsieve",
            "review",
            "main",
            "--no-retry",
            "--max-retries",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn provider_and_model_override_config() {
        let args = review(&["main", "--provider", "openai", "--model", "gpt-4o"]);
        let (provider, model) = args.model(&Config::default());
        assert_eq!(provider, ProviderName::OpenAI);
        assert_eq!(model, "gpt-4o");

        let (provider, model) = review(&["main"]).model(&Config::default());
        assert_eq!(provider, ProviderName::Anthropic);
        assert_eq!(model, Config::default().provider.model);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["diffsieve", "review", "main", "--provider", "glm"]).is_err());
    }

    #[test]
    fn fail_on_and_json_format() {
        let args = review(&["main", "--fail-on", "medium", "--format", "json"]);
        assert_eq!(args.fail_on, Some(Severity::Medium));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["diffsieve", "plan", "main", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Plan(_)));
    }

    #[test]
    fn change_is_required() {
        assert!(Cli::try_parse_from(["diffsieve", "review"]).is_err());
    }
}
