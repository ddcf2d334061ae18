//! Version-control capability seam.
//!
//! Every git interaction goes through the [`Vcs`] trait so the isolation and
//! apply state machines can be exercised against a scripted implementation.
//! [`GitCli`] is the real implementation: it spawns `git` with argument
//! vectors (never a shell line) under a bounded timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one external command invocation. The exit status is
/// the only control-flow signal; stdout/stderr are kept for diagnostics and
/// branch-name scans.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr joined, for error reporting.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// Environment-level failures only. A tool that runs and exits non-zero is
/// reported through [`CmdOutput`], not through this enum.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("'{tool}' was not found on PATH. Install it, then run manually: {command}")]
    ToolNotFound { tool: String, command: String },

    #[error("Command timed out after {seconds}s. Run manually to investigate: {command}")]
    Timeout { seconds: u64, command: String },

    #[error("Failed to run '{command}': {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },
}

/// Explicit capability interface over the version-control tool.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn status_porcelain(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    async fn stash_push(&self, repo: &Path, label: &str) -> Result<CmdOutput, VcsError>;
    async fn reset_hard(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    async fn clean_untracked(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    /// `symbolic-ref refs/remotes/origin/HEAD` — the remote's recorded default branch.
    async fn default_branch_ref(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    async fn remote_branches(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    async fn checkout(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError>;
    /// `checkout -b` — create a branch from the current HEAD and switch to it.
    async fn create_branch(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError>;
    async fn pull(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError>;
    async fn fetch(&self, repo: &Path) -> Result<CmdOutput, VcsError>;
    async fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<CmdOutput, VcsError>;
    async fn apply_three_way(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError>;
    async fn apply_plain(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError>;
    async fn apply_whitespace(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError>;
    /// Dry-run check; exit status and stderr describe why the patch fails.
    async fn apply_check(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError>;
    /// Diffstat of what an apply would touch; never mutates the tree.
    async fn apply_stat(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError>;
}

/// `git` on PATH, with a per-invocation timeout.
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<CmdOutput, VcsError> {
        let rendered = render(args);
        debug!(command = %rendered, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VcsError::ToolNotFound {
                    tool: "git".to_string(),
                    command: rendered.clone(),
                }
            } else {
                VcsError::Io {
                    command: rendered.clone(),
                    source: e,
                }
            }
        })?;

        // The dropped future kills the child via kill_on_drop.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VcsError::Timeout {
                seconds: self.timeout.as_secs(),
                command: rendered.clone(),
            })?
            .map_err(|e| VcsError::Io {
                command: rendered,
                source: e,
            })?;

        Ok(CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn render(args: &[&str]) -> String {
    let mut rendered = String::from("git");
    for arg in args {
        rendered.push(' ');
        if arg.contains(' ') {
            rendered.push('\'');
            rendered.push_str(arg);
            rendered.push('\'');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

#[async_trait]
impl Vcs for GitCli {
    async fn status_porcelain(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["status", "--porcelain"]).await
    }

    async fn stash_push(&self, repo: &Path, label: &str) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["stash", "push", "-u", "-m", label])
            .await
    }

    async fn reset_hard(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["reset", "--hard", "HEAD"]).await
    }

    async fn clean_untracked(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["clean", "-fd"]).await
    }

    async fn default_branch_ref(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["symbolic-ref", "refs/remotes/origin/HEAD"])
            .await
    }

    async fn remote_branches(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["branch", "-r"]).await
    }

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["checkout", branch]).await
    }

    async fn create_branch(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["checkout", "-b", branch]).await
    }

    async fn pull(&self, repo: &Path, branch: &str) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["pull", "origin", branch]).await
    }

    async fn fetch(&self, repo: &Path) -> Result<CmdOutput, VcsError> {
        self.run(Some(repo), &["fetch", "origin"]).await
    }

    async fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<CmdOutput, VcsError> {
        let dest = dest.to_string_lossy();
        self.run(None, &["clone", remote_url, dest.as_ref()]).await
    }

    async fn apply_three_way(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError> {
        let patch = patch.to_string_lossy();
        self.run(Some(repo), &["apply", "--3way", patch.as_ref()])
            .await
    }

    async fn apply_plain(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError> {
        let patch = patch.to_string_lossy();
        self.run(Some(repo), &["apply", patch.as_ref()]).await
    }

    async fn apply_whitespace(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError> {
        let patch = patch.to_string_lossy();
        self.run(Some(repo), &["apply", "--whitespace=fix", patch.as_ref()])
            .await
    }

    async fn apply_check(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError> {
        let patch = patch.to_string_lossy();
        self.run(Some(repo), &["apply", "--check", patch.as_ref()])
            .await
    }

    async fn apply_stat(&self, repo: &Path, patch: &Path) -> Result<CmdOutput, VcsError> {
        let patch = patch.to_string_lossy();
        self.run(Some(repo), &["apply", "--stat", patch.as_ref()])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_args_with_spaces() {
        assert_eq!(
            render(&["stash", "push", "-u", "-m", "patch-review auto-stash"]),
            "git stash push -u -m 'patch-review auto-stash'"
        );
    }

    #[test]
    fn test_cmd_output_success() {
        let ok = CmdOutput {
            code: Some(0),
            ..Default::default()
        };
        assert!(ok.success());
        let failed = CmdOutput {
            code: Some(1),
            ..Default::default()
        };
        assert!(!failed.success());
        let killed = CmdOutput {
            code: None,
            ..Default::default()
        };
        assert!(!killed.success());
    }

    #[test]
    fn test_cmd_output_combined() {
        let out = CmdOutput {
            code: Some(1),
            stdout: "partial\n".to_string(),
            stderr: "error: failed\n".to_string(),
        };
        assert_eq!(out.combined(), "partial\nerror: failed");
    }
}
