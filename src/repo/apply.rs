//! Multi-strategy patch application.
//!
//! The strategies are ordered from most to least context-tolerant in a
//! specific sense: a 3-way merge reconstructs intent from the blobs the patch
//! references, a plain apply demands exact line context, and the whitespace
//! pass normalizes only whitespace mismatches. A whitespace-fix success is
//! lower confidence, so callers get the strategy back and can flag it.

use std::fmt;
use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::provision::LocalRepository;
use super::vcs::{Vcs, VcsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStrategy {
    ThreeWay,
    Plain,
    WhitespaceFix,
    None,
}

impl fmt::Display for ApplyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyStrategy::ThreeWay => write!(f, "3-way merge"),
            ApplyStrategy::Plain => write!(f, "plain"),
            ApplyStrategy::WhitespaceFix => write!(f, "whitespace-fix"),
            ApplyStrategy::None => write!(f, "none"),
        }
    }
}

/// Produced exactly once per apply attempt. `succeeded = false` is an
/// expected outcome and always comes with diagnostics.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub succeeded: bool,
    pub strategy: ApplyStrategy,
    pub diagnostics: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Failed to stage the patch in a temporary file: {0}")]
    PatchFile(#[from] std::io::Error),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Try each application strategy in order, stopping at the first success.
///
/// "Patch does not apply" is not an error: when every strategy is exhausted,
/// a non-mutating dry run collects conflict detail and a diffstat into
/// `diagnostics` and the outcome reports `succeeded = false`. Only
/// environment failures (tool missing, timeout, unwritable filesystem)
/// propagate as `Err`.
#[instrument(skip_all, fields(path = %repo.path.display(), patch_bytes = patch_text.len()))]
pub async fn apply(
    vcs: &dyn Vcs,
    repo: &LocalRepository,
    patch_text: &str,
) -> Result<ApplyOutcome, ApplyError> {
    // Stable on-disk input for git; the guard removes it on every exit path.
    let mut patch_file = tempfile::Builder::new()
        .prefix("patch-review-")
        .suffix(".patch")
        .tempfile()?;
    patch_file.write_all(patch_text.as_bytes())?;
    patch_file.flush()?;
    let patch = patch_file.path();

    info!("applying patch with 3-way merge");
    let three_way = vcs.apply_three_way(&repo.path, patch).await?;
    if three_way.success() {
        return Ok(applied(ApplyStrategy::ThreeWay));
    }
    debug!(detail = %three_way.combined(), "3-way merge apply failed");

    info!("3-way merge failed, trying plain apply");
    let plain = vcs.apply_plain(&repo.path, patch).await?;
    if plain.success() {
        return Ok(applied(ApplyStrategy::Plain));
    }
    debug!(detail = %plain.combined(), "plain apply failed");

    info!("plain apply failed, trying whitespace-tolerant apply");
    let whitespace = vcs.apply_whitespace(&repo.path, patch).await?;
    if whitespace.success() {
        return Ok(applied(ApplyStrategy::WhitespaceFix));
    }
    debug!(detail = %whitespace.combined(), "whitespace-tolerant apply failed");

    info!("all apply strategies failed, collecting diagnostics");
    let check = vcs.apply_check(&repo.path, patch).await?;
    let stat = vcs.apply_stat(&repo.path, patch).await?;

    let mut diagnostics = String::new();
    let conflicts = check.combined();
    if !conflicts.is_empty() {
        diagnostics.push_str("Conflict details:\n");
        diagnostics.push_str(&conflicts);
    }
    let touched = stat.stdout.trim_end();
    if !touched.is_empty() {
        if !diagnostics.is_empty() {
            diagnostics.push_str("\n\n");
        }
        diagnostics.push_str("A clean apply would touch:\n");
        diagnostics.push_str(touched);
    }
    if diagnostics.is_empty() {
        diagnostics.push_str("git apply produced no diagnostic output");
    }

    Ok(ApplyOutcome {
        succeeded: false,
        strategy: ApplyStrategy::None,
        diagnostics: Some(diagnostics),
    })
}

fn applied(strategy: ApplyStrategy) -> ApplyOutcome {
    info!(%strategy, "patch applied");
    ApplyOutcome {
        succeeded: true,
        strategy,
        diagnostics: None,
    }
}
