use std::path::PathBuf;

/// Canonical identification of a repository: remote address plus owner/name.
/// Derived once from the input URL and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    /// URL suitable for `git clone`
    pub remote_url: String,
    /// Repository owner (organization or user)
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl RepoLocator {
    /// Local checkout location for this repository under `base_dir`.
    pub fn local_path(&self, base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(&self.owner).join(&self.repo)
    }
}

/// Where the patch comes from, and therefore where to download it.
/// Exactly one variant matches a well-formed supported URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    /// GitHub pull request (`/{owner}/{repo}/pull/{number}`)
    PullRequest {
        owner: String,
        repo: String,
        number: u64,
    },
    /// GitHub commit (`/{owner}/{repo}/commit/{sha}`)
    Commit {
        owner: String,
        repo: String,
        sha: String,
    },
    /// Phabricator differential (`/D{id}`)
    PhabricatorDiff { base_url: String, id: u64 },
}

impl PatchSource {
    /// Endpoint serving the raw unified diff for this source.
    pub fn patch_url(&self) -> String {
        match self {
            PatchSource::PullRequest {
                owner,
                repo,
                number,
            } => format!("https://github.com/{owner}/{repo}/pull/{number}.diff"),
            PatchSource::Commit { owner, repo, sha } => {
                format!("https://github.com/{owner}/{repo}/commit/{sha}.diff")
            }
            PatchSource::PhabricatorDiff { base_url, id } => {
                format!("{base_url}/D{id}?download=true")
            }
        }
    }

    /// Stable identifier used for persisted review filenames.
    pub fn identifier(&self) -> String {
        match self {
            PatchSource::PullRequest {
                owner,
                repo,
                number,
            } => format!("{owner}-{repo}-pr-{number}"),
            PatchSource::Commit { owner, repo, sha } => {
                let short = &sha[..8.min(sha.len())];
                format!("{owner}-{repo}-commit-{short}")
            }
            PatchSource::PhabricatorDiff { id, .. } => format!("mozilla-firefox-phab-D{id}"),
        }
    }
}
