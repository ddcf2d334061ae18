use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument, warn};

use super::vcs::{Vcs, VcsError};
use crate::source::RepoLocator;

/// A provisioned local clone. Components operate on it by path only and
/// re-query branch state per operation, since the working directory is shared
/// with whatever else the operator runs against it.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    // The partial clone directory is left in place for inspection.
    #[error("Failed to clone {url} into {path}: {detail}")]
    CloneFailed {
        url: String,
        path: PathBuf,
        detail: String,
    },

    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Ensure a usable local clone of the repository exists under `base_dir`.
///
/// Idempotent: an existing clone is refreshed with a fetch (tracking refs
/// only, never touching the working tree) and a fetch failure is survivable —
/// stale refs still allow a meaningful apply attempt. A missing clone is
/// created from scratch, and that failure is fatal.
#[instrument(skip(vcs, locator), fields(owner = %locator.owner, repo = %locator.repo))]
pub async fn ensure(
    vcs: &dyn Vcs,
    locator: &RepoLocator,
    base_dir: &Path,
) -> Result<LocalRepository, ProvisionError> {
    let path = locator.local_path(base_dir);

    if path.join(".git").exists() {
        info!(path = %path.display(), "repository already cloned, updating");
        let fetch = vcs.fetch(&path).await?;
        if fetch.success() {
            info!("repository updated");
        } else {
            warn!(detail = %fetch.combined(), "failed to update repository, continuing with possibly-stale refs");
        }
        return Ok(LocalRepository { path });
    }

    info!(url = %locator.remote_url, path = %path.display(), "cloning repository");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ProvisionError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let clone = vcs.clone_repo(&locator.remote_url, &path).await?;
    if !clone.success() {
        return Err(ProvisionError::CloneFailed {
            url: locator.remote_url.clone(),
            path,
            detail: clone.combined(),
        });
    }

    info!(path = %path.display(), "repository cloned");
    Ok(LocalRepository { path })
}
