mod config;
mod repo;
mod review;
mod source;

use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use repo::ApplyStrategy;
use source::SourceError;

/// patch-review — download a patch from a GitHub PR/commit or Phabricator
/// differential URL, apply it to a local clone on an isolated branch, and
/// review it with Claude Code.
#[derive(Parser, Debug)]
#[command(name = "patch-review", version, about)]
struct Cli {
    /// GitHub PR/commit URL or Phabricator differential URL
    url: String,

    /// Programming language for the review context
    #[arg(short, long, default_value = "Rust")]
    language: String,

    /// Base directory for repositories (defaults to ~/repos)
    #[arg(short = 'd', long)]
    base_dir: Option<PathBuf>,

    /// Additional questions to ask about the patch
    #[arg(short, long)]
    questions: Option<String>,

    /// Don't checkout/clone the repository, only analyze the patch text
    #[arg(long)]
    no_checkout: bool,

    /// Don't apply the patch to the repository, only analyze the diff
    #[arg(long)]
    no_apply: bool,

    /// If stashing a dirty working tree fails, fall back to reset --hard +
    /// clean -fd (discards uncommitted work)
    #[arg(long)]
    allow_destructive_reset: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load()?;

    // One token per invocation; isolation-branch naming is a pure function of it.
    let run_token = std::process::id().to_string();

    let _main_span = info_span!("patch_review", url = %cli.url).entered();

    let locator = source::resolve(&cli.url)
        .ok_or_else(|| SourceError::UnsupportedUrl(cli.url.clone()))?;
    let patch_source = source::classify(&cli.url)
        .ok_or_else(|| SourceError::UnsupportedUrl(cli.url.clone()))?;
    println!("Repository: {}/{}", locator.owner, locator.repo);
    debug!(remote = %locator.remote_url, source = ?patch_source, "resolved patch source");

    let client = reqwest::Client::new();

    println!("Downloading patch from: {}", patch_source.patch_url());
    let patch_text = source::download::download(&client, &patch_source).await?;
    info!(patch_bytes = patch_text.len(), "patch downloaded");

    println!("Fetching existing comments and reviews...");
    let existing_comments =
        source::comments::fetch(&client, config.github_token().as_deref(), &patch_source).await;
    if existing_comments.is_some() {
        println!("Successfully fetched existing comments/reviews");
    } else {
        println!("No existing comments found or unable to fetch");
    }

    if cli.no_checkout {
        println!("Analyzing patch without repository checkout...");
        review::analyze(
            &config,
            &review::Analysis {
                source: &patch_source,
                url: &cli.url,
                language: &cli.language,
                repo: None,
                patch_text: Some(&patch_text),
                existing_comments: existing_comments.as_deref(),
                custom_questions: cli.questions.as_deref(),
                run_token: &run_token,
            },
        )
        .await?;
        return Ok(());
    }

    let vcs = repo::GitCli::new(config.command_timeout());
    let base_dir = cli.base_dir.clone().unwrap_or_else(|| config.base_dir());
    let local = repo::provision::ensure(&vcs, &locator, &base_dir).await?;

    let mut applied = false;
    if !cli.no_apply {
        let allow_reset = cli.allow_destructive_reset || config.allow_destructive_reset();
        let branch = repo::isolate::isolate(&vcs, &local, &run_token, allow_reset).await?;
        println!("Created branch: {} from {}", branch.name, branch.base_branch);

        let outcome = repo::apply::apply(&vcs, &local, &patch_text).await?;
        applied = outcome.succeeded;
        report_apply_outcome(&outcome);
    }

    // Applied cleanly: the analyzer reads the diff from the working tree.
    // Otherwise it gets the raw patch text and the tree is untouched.
    let patch_for_prompt = if applied { None } else { Some(patch_text.as_str()) };

    review::analyze(
        &config,
        &review::Analysis {
            source: &patch_source,
            url: &cli.url,
            language: &cli.language,
            repo: Some(&local),
            patch_text: patch_for_prompt,
            existing_comments: existing_comments.as_deref(),
            custom_questions: cli.questions.as_deref(),
            run_token: &run_token,
        },
    )
    .await?;

    Ok(())
}

fn report_apply_outcome(outcome: &repo::ApplyOutcome) {
    if outcome.succeeded {
        match outcome.strategy {
            ApplyStrategy::ThreeWay => println!("Patch applied successfully with 3-way merge"),
            ApplyStrategy::Plain => println!("Patch applied successfully"),
            ApplyStrategy::WhitespaceFix => {
                println!("Patch applied successfully with whitespace fixes");
                println!(
                    "{} whitespace normalization can mask semantic differences; treat this apply as lower confidence",
                    "Warning:".yellow()
                );
            }
            ApplyStrategy::None => {}
        }
        return;
    }

    if let Some(diagnostics) = &outcome.diagnostics {
        println!("{diagnostics}");
    }
    warn!("patch did not apply cleanly; the working tree does not reflect the patch");
    println!(
        "{} Failed to apply patch, continuing with analysis using the original patch content...",
        "Warning:".yellow()
    );
}
