//! Branch isolation: bring the shared working tree to a known-clean state,
//! sync the default branch, and create a uniquely named branch to contain a
//! single patch-application attempt. The branch is never deleted here; it is
//! the durable artifact of a review run.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::provision::LocalRepository;
use super::vcs::{Vcs, VcsError};

pub const STASH_LABEL: &str = "Automated stash before patch review";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationBranch {
    pub name: String,
    /// Default branch the isolation branch was cut from.
    pub base_branch: String,
}

#[derive(Debug, Error)]
pub enum IsolateError {
    #[error(
        "Working tree at {path} has uncommitted changes that could not be stashed. \
         Re-run with --allow-destructive-reset to discard them, or clean the tree manually."
    )]
    DirtyWorkingTree { path: PathBuf },

    #[error("Failed to create branch '{name}': {detail}")]
    BranchCreateFailed { name: String, detail: String },

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Isolation branch name for a run token. Pure, so concurrent invocations
/// sharing one clone get distinct, predictable branches.
pub fn branch_name(run_token: &str) -> String {
    format!("patch-review-{run_token}")
}

/// Step policy, in order:
/// 1. recover working tree    — stash if dirty; destructive reset only when
///    opted in, otherwise fatal
/// 2. detect default branch   — best-effort, falls back to `main`
/// 3. sync default branch     — best-effort, a stale base is still informative
/// 4. create isolation branch — fatal on failure; applying on the default
///    branch is disallowed
#[instrument(skip(vcs, repo), fields(path = %repo.path.display()))]
pub async fn isolate(
    vcs: &dyn Vcs,
    repo: &LocalRepository,
    run_token: &str,
    allow_destructive_reset: bool,
) -> Result<IsolationBranch, IsolateError> {
    recover_working_tree(vcs, repo, allow_destructive_reset).await?;

    let base_branch = detect_default_branch(vcs, repo).await?;

    let checkout = vcs.checkout(&repo.path, &base_branch).await?;
    if !checkout.success() {
        warn!(
            branch = %base_branch,
            detail = %checkout.combined(),
            "failed to check out default branch, continuing from current HEAD"
        );
    }
    let pull = vcs.pull(&repo.path, &base_branch).await?;
    if !pull.success() {
        warn!(
            branch = %base_branch,
            detail = %pull.combined(),
            "failed to fast-forward default branch, applying against a possibly-stale base"
        );
    }

    let name = branch_name(run_token);
    info!(branch = %name, base = %base_branch, "creating isolation branch");
    let created = vcs.create_branch(&repo.path, &name).await?;
    if !created.success() {
        return Err(IsolateError::BranchCreateFailed {
            name,
            detail: created.combined(),
        });
    }

    Ok(IsolationBranch { name, base_branch })
}

async fn recover_working_tree(
    vcs: &dyn Vcs,
    repo: &LocalRepository,
    allow_destructive_reset: bool,
) -> Result<(), IsolateError> {
    let status = vcs.status_porcelain(&repo.path).await?;
    if !status.success() {
        warn!(detail = %status.combined(), "could not query working-tree status, continuing");
        return Ok(());
    }
    if status.stdout.trim().is_empty() {
        return Ok(());
    }

    info!("working tree has uncommitted changes, stashing them");
    let stash = vcs.stash_push(&repo.path, STASH_LABEL).await?;
    if stash.success() {
        return Ok(());
    }

    if !allow_destructive_reset {
        warn!(detail = %stash.combined(), "stash failed");
        return Err(IsolateError::DirtyWorkingTree {
            path: repo.path.clone(),
        });
    }

    warn!("stash failed; DISCARDING uncommitted changes with reset --hard and clean -fd");
    let reset = vcs.reset_hard(&repo.path).await?;
    if !reset.success() {
        warn!(detail = %reset.combined(), "reset failed");
    }
    let clean = vcs.clean_untracked(&repo.path).await?;
    if !clean.success() {
        warn!(detail = %clean.combined(), "clean failed");
    }
    Ok(())
}

/// Prefer the remote's recorded default branch; otherwise scan the remote
/// branch listing for `main` then `master`; otherwise assume `main` and let a
/// later checkout failure surface the problem.
async fn detect_default_branch(
    vcs: &dyn Vcs,
    repo: &LocalRepository,
) -> Result<String, VcsError> {
    let sym = vcs.default_branch_ref(&repo.path).await?;
    if sym.success() {
        if let Some(name) = sym.stdout.trim().rsplit('/').next() {
            if !name.is_empty() {
                debug!(branch = %name, "default branch from origin/HEAD");
                return Ok(name.to_string());
            }
        }
    }

    let branches = vcs.remote_branches(&repo.path).await?;
    if branches.success() {
        for candidate in ["main", "master"] {
            if branches.stdout.contains(&format!("origin/{candidate}")) {
                debug!(branch = %candidate, "default branch from remote listing");
                return Ok(candidate.to_string());
            }
        }
    }

    debug!("no default branch detected, assuming 'main'");
    Ok("main".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testing::{failed, ok, MockVcs};

    fn repo() -> LocalRepository {
        LocalRepository {
            path: PathBuf::from("/tmp/repos/acme/widget"),
        }
    }

    #[tokio::test]
    async fn test_isolate_clean_tree() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", ok("refs/remotes/origin/main\n"));

        let branch = isolate(&vcs, &repo(), "1234", false).await.unwrap();

        assert_eq!(branch.name, "patch-review-1234");
        assert_eq!(branch.base_branch, "main");
        assert!(!vcs.called("stash_push"));
        assert_eq!(
            vcs.calls(),
            vec![
                "status_porcelain",
                "default_branch_ref",
                "checkout main",
                "pull main",
                "create_branch patch-review-1234",
            ]
        );
    }

    #[tokio::test]
    async fn test_isolate_stashes_dirty_tree() {
        let vcs = MockVcs::new()
            .script("status_porcelain", ok(" M src/lib.rs\n?? notes.txt\n"))
            .script("default_branch_ref", ok("refs/remotes/origin/main\n"));

        isolate(&vcs, &repo(), "1234", false).await.unwrap();

        assert!(vcs.called("stash_push"));
        assert!(!vcs.called("reset_hard"));
    }

    #[tokio::test]
    async fn test_isolate_stash_failure_is_fatal_without_opt_in() {
        let vcs = MockVcs::new()
            .script("status_porcelain", ok(" M src/lib.rs\n"))
            .script("stash_push", failed("fatal: unable to write stash"));

        let err = isolate(&vcs, &repo(), "1234", false).await.unwrap_err();
        assert!(matches!(err, IsolateError::DirtyWorkingTree { .. }));
        assert!(!vcs.called("reset_hard"));
        assert!(!vcs.called("create_branch"));
    }

    #[tokio::test]
    async fn test_isolate_stash_failure_falls_back_to_reset_when_opted_in() {
        let vcs = MockVcs::new()
            .script("status_porcelain", ok(" M src/lib.rs\n"))
            .script("stash_push", failed("fatal: unable to write stash"))
            .script("default_branch_ref", ok("refs/remotes/origin/main\n"));

        let branch = isolate(&vcs, &repo(), "1234", true).await.unwrap();

        assert!(vcs.called("reset_hard"));
        assert!(vcs.called("clean_untracked"));
        assert_eq!(branch.name, "patch-review-1234");
    }

    #[tokio::test]
    async fn test_isolate_survives_checkout_and_pull_failures() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", ok("refs/remotes/origin/main\n"))
            .script("checkout", failed("error: pathspec 'main' did not match"))
            .script("pull", failed("fatal: unable to access remote"));

        let branch = isolate(&vcs, &repo(), "1234", false).await.unwrap();
        assert_eq!(branch.name, "patch-review-1234");
    }

    #[tokio::test]
    async fn test_isolate_branch_create_failure_is_fatal() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", ok("refs/remotes/origin/main\n"))
            .script(
                "create_branch",
                failed("fatal: a branch named 'patch-review-1234' already exists"),
            );

        let err = isolate(&vcs, &repo(), "1234", false).await.unwrap_err();
        match err {
            IsolateError::BranchCreateFailed { name, detail } => {
                assert_eq!(name, "patch-review-1234");
                assert!(detail.contains("already exists"));
            }
            other => panic!("expected BranchCreateFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_branch_from_symbolic_ref() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", ok("refs/remotes/origin/trunk\n"));
        let branch = detect_default_branch(&vcs, &repo()).await.unwrap();
        assert_eq!(branch, "trunk");
        assert!(!vcs.called("remote_branches"));
    }

    #[tokio::test]
    async fn test_default_branch_scans_remote_listing() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", failed("fatal: ref refs/remotes/origin/HEAD is not a symbolic ref"))
            .script("remote_branches", ok("  origin/develop\n  origin/master\n"));
        let branch = detect_default_branch(&vcs, &repo()).await.unwrap();
        assert_eq!(branch, "master");
    }

    #[tokio::test]
    async fn test_default_branch_prefers_main_over_master() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", failed(""))
            .script("remote_branches", ok("  origin/master\n  origin/main\n"));
        let branch = detect_default_branch(&vcs, &repo()).await.unwrap();
        assert_eq!(branch, "main");
    }

    #[tokio::test]
    async fn test_default_branch_falls_back_to_main() {
        let vcs = MockVcs::new()
            .script("default_branch_ref", failed(""))
            .script("remote_branches", failed(""));
        let branch = detect_default_branch(&vcs, &repo()).await.unwrap();
        assert_eq!(branch, "main");
    }

    #[test]
    fn test_branch_name_embeds_run_token() {
        assert_eq!(branch_name("9876"), "patch-review-9876");
    }
}
