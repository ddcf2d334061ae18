//! Analysis handoff: build the review prompt, stream the analyzer's output,
//! persist the result, and run the interactive follow-up loop.
//!
//! The analyzer is an external collaborator; this module's contract is to
//! hand it the patch context and report its outcome, with a literal manual
//! command the operator can fall back to whenever the invocation fails.

pub mod prompt;
pub mod store;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;
use crate::repo::LocalRepository;
use crate::source::PatchSource;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(
        "'{command}' was not found on PATH. Install Claude Code (https://claude.ai/code), \
         then run manually: {fallback}"
    )]
    AnalyzerNotFound { command: String, fallback: String },

    #[error("Analyzer timed out after {seconds}s. Run manually: {fallback}")]
    AnalyzerTimeout { seconds: u64, fallback: String },

    #[error("Analyzer exited with code {code}. Run manually: {fallback}")]
    AnalyzerFailed { code: i32, fallback: String },

    #[error("Failed to run '{command}': {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed to save the analysis prompt: {0}")]
    PromptFile(#[from] std::io::Error),
}

/// Inputs for one analysis run: the `(patch text, apply outcome, repository)`
/// handoff from the pipeline, plus the surrounding review context.
pub struct Analysis<'a> {
    pub source: &'a PatchSource,
    pub url: &'a str,
    pub language: &'a str,
    pub repo: Option<&'a LocalRepository>,
    /// Raw patch text to embed in the prompt. `None` when the patch was
    /// applied cleanly and the analyzer should read the working tree.
    pub patch_text: Option<&'a str>,
    pub existing_comments: Option<&'a str>,
    pub custom_questions: Option<&'a str>,
    pub run_token: &'a str,
}

pub async fn analyze(config: &Config, analysis: &Analysis<'_>) -> Result<(), ReviewError> {
    let previous_review = store::load_previous(analysis.source);

    let prompt_text = prompt::build(&prompt::PromptInputs {
        language: analysis.language,
        url: analysis.url,
        patch_text: analysis.patch_text,
        previous_review: previous_review.as_deref(),
        existing_comments: analysis.existing_comments,
        custom_questions: analysis.custom_questions,
    });

    let work_dir = analysis
        .repo
        .map(|r| r.path.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    // Kept on disk for manual fallback and follow-up questions.
    let prompt_path = work_dir.join(format!("claude-review-prompt-{}.txt", analysis.run_token));
    std::fs::write(&prompt_path, &prompt_text)?;
    let command = config.analyzer_command();
    let fallback = fallback_command(&command, &work_dir, &prompt_path);

    println!(
        "Analyzing patch with Claude Code ({} context)...",
        analysis.language
    );
    println!("Working directory: {}", work_dir.display());

    let banner = "=".repeat(80);
    println!("\n{banner}");
    println!("CLAUDE ANALYSIS OUTPUT:");
    println!("{banner}\n");

    let run = run_analyzer(
        &command,
        &work_dir,
        &prompt_text,
        config.analyzer_timeout(),
        &fallback,
    )
    .await?;

    if run.code != Some(0) {
        return Err(ReviewError::AnalyzerFailed {
            code: run.code.unwrap_or(-1),
            fallback,
        });
    }

    print_completion(analysis.url);
    if !run.output.is_empty() {
        store::save(analysis.source, analysis.url, &run.output);
    }
    println!("\nPrompt saved to: {}", prompt_path.display());

    interactive_followup(config, &work_dir, analysis.url).await;
    Ok(())
}

pub fn print_completion(url: &str) {
    let banner = "=".repeat(80);
    println!("\n{banner}");
    println!("{}", "Analysis complete".green().bold());
    println!("\nReviewed patch: {url}");
    println!("{banner}");
}

fn fallback_command(command: &str, work_dir: &Path, prompt_path: &Path) -> String {
    format!(
        "cd {} && {command} --print < {}",
        work_dir.display(),
        prompt_path.display()
    )
}

struct AnalyzerRun {
    output: String,
    code: Option<i32>,
}

/// Run the analyzer with the prompt on stdin, streaming stdout to the
/// terminal while capturing it, bounded by the configured timeout.
async fn run_analyzer(
    command: &str,
    dir: &Path,
    input: &str,
    timeout: Duration,
    fallback: &str,
) -> Result<AnalyzerRun, ReviewError> {
    debug!(%command, dir = %dir.display(), prompt_chars = input.len(), "invoking analyzer");

    let mut child = Command::new(command)
        .arg("--print")
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReviewError::AnalyzerNotFound {
                    command: command.to_string(),
                    fallback: fallback.to_string(),
                }
            } else {
                ReviewError::Io {
                    command: command.to_string(),
                    source: e,
                }
            }
        })?;

    // Feed stdin from a separate task so a large prompt cannot deadlock
    // against a full stdout pipe.
    if let Some(mut stdin) = child.stdin.take() {
        let input = input.to_string();
        tokio::spawn(async move {
            let _ = stdin.write_all(input.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }

    let stdout = child.stdout.take();
    let streamed = tokio::time::timeout(timeout, async {
        let mut captured = String::new();
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("{line}");
                captured.push_str(&line);
                captured.push('\n');
            }
        }
        let status = child.wait().await;
        (captured, status)
    })
    .await;

    match streamed {
        Ok((output, Ok(status))) => Ok(AnalyzerRun {
            output,
            code: status.code(),
        }),
        Ok((_, Err(e))) => Err(ReviewError::Io {
            command: command.to_string(),
            source: e,
        }),
        Err(_) => {
            let _ = child.kill().await;
            Err(ReviewError::AnalyzerTimeout {
                seconds: timeout.as_secs(),
                fallback: fallback.to_string(),
            })
        }
    }
}

/// Read follow-up questions from stdin and forward each to the analyzer.
/// Exits on `exit`/`quit`/`q`/`done` or EOF. Failures here never abort the
/// session; the operator can always retry or leave.
async fn interactive_followup(config: &Config, dir: &Path, url: &str) {
    let banner = "=".repeat(80);
    println!("\n{banner}");
    println!("INTERACTIVE FOLLOW-UP MODE");
    println!("{banner}");
    println!("You can now ask follow-up questions about the patch.");
    println!("Type your question and press Enter. Type 'exit' or 'quit' to finish.");
    println!("{banner}\n");

    let command = config.analyzer_command();
    let fallback = format!("cd {} && {command} --print", dir.display());

    loop {
        print!("\nYour question (or 'exit' to quit): ");
        let _ = std::io::Write::flush(&mut std::io::stdout());

        let line = match read_stdin_line().await {
            Some(line) => line,
            None => break,
        };
        let question = line.trim().to_string();
        if question.is_empty() {
            continue;
        }
        if ["exit", "quit", "q", "done"].contains(&question.to_lowercase().as_str()) {
            println!("\nExiting interactive mode...");
            break;
        }

        println!("\n{banner}");
        println!("CLAUDE RESPONSE:");
        println!("{banner}\n");

        match run_analyzer(&command, dir, &question, config.analyzer_timeout(), &fallback).await {
            Ok(run) if run.code == Some(0) => {}
            Ok(run) => println!(
                "\n{} Claude returned with code {}",
                "Warning:".yellow(),
                run.code.unwrap_or(-1)
            ),
            Err(e) => println!("\nError running Claude: {e}\nYou can try again or type 'exit' to quit."),
        }
    }

    print_completion(url);
}

async fn read_stdin_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_command_is_copy_pasteable() {
        let fallback = fallback_command(
            "claude",
            Path::new("/home/dev/repos/acme/widget"),
            Path::new("/home/dev/repos/acme/widget/claude-review-prompt-1234.txt"),
        );
        assert_eq!(
            fallback,
            "cd /home/dev/repos/acme/widget && claude --print < /home/dev/repos/acme/widget/claude-review-prompt-1234.txt"
        );
    }
}
