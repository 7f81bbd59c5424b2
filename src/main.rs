//! diffsieve: multi-stage LLM code review for git changes.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! error propagation and user-facing messages.

mod cli;

use std::path::Path;
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use cli::args::{Cli, Command, OutputFormat, PlanArgs, ReviewArgs};
use diffsieve::config::Config;
use diffsieve::env::Env;
use diffsieve::models::Severity;
use diffsieve::orchestrator::{ReviewPlan, plan_change, run_review};
use diffsieve::source::GitChangeSource;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    match cli.command {
        Command::Review(args) => run_review_command(*args).await,
        Command::Plan(args) => run_plan(args).await,
    }
}

fn load_config(path: &Path) -> Result<(Config, std::path::PathBuf)> {
    let repo_root = path
        .canonicalize()
        .with_context(|| format!("repository path {} not found", path.display()))?;
    let config = Config::load(Some(&repo_root), &Env::real()).context("failed to load config")?;
    Ok((config, repo_root))
}

/// Review a change and print the verdict.
async fn run_review_command(args: ReviewArgs) -> Result<()> {
    let (config, repo_root) = load_config(&args.path)?;
    let options = args.options(&config);
    let (provider, model) = args.model(&config);
    info!(%provider, %model, max_attempts = options.max_attempts(), "starting review");

    let outcome = run_review(&args.change, provider, &model, &options, &config, &repo_root)
        .await
        .with_context(|| format!("review of '{}' failed", args.change))?;

    println!("{}", args.format.render(&outcome));

    // CLI flag takes priority over config
    let fail_on: Option<Severity> = args.fail_on.or(config.review.fail_on);
    if let Some(threshold) = fail_on {
        let failing = outcome
            .verdict
            .issues
            .iter()
            .filter(|i| i.severity >= threshold)
            .count();
        if failing > 0 {
            bail!("found {failing} issue(s) at or above {threshold} severity");
        }
    }

    Ok(())
}

/// Print size metrics and the processing mode for a change.
async fn run_plan(args: PlanArgs) -> Result<()> {
    let (config, repo_root) = load_config(&args.path)?;
    let source = GitChangeSource::new(&repo_root);
    let plan = plan_change(&source, &args.change, &config.limits)
        .await
        .with_context(|| format!("failed to plan '{}'", args.change))?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan).unwrap_or_else(|_| "{}".into()));
        }
        OutputFormat::Terminal => print_plan(&plan),
    }
    Ok(())
}

fn print_plan(plan: &ReviewPlan) {
    let m = &plan.metrics;
    println!(" {} {}", plan.change_id.bold(), plan.title);
    println!("   {}  {}", "mode:".cyan(), plan.mode.to_string().bold());
    println!(
        "   {}  {} (+{} -{}) in {} files",
        "lines:".cyan(),
        m.total_changes,
        m.total_additions,
        m.total_deletions,
        m.file_count
    );
    println!(
        "   {}  {} bytes, ~{} tokens",
        "diff:".cyan(),
        m.diff_size,
        m.estimated_tokens
    );
    println!("   {}  {} lines", "largest file:".cyan(), m.largest_file_lines);
    println!(
        "   {}  {} files, {} diff bytes",
        "kept:".cyan(),
        plan.files_considered,
        plan.diff_size
    );
}
