use std::path::{Path, PathBuf};

use tokio::fs as async_fs;

use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::GitRunner;

/// Make sure the local artifact repository clone exists and is current.
pub async fn sync_repository<G: GitRunner>(
    git: &G,
    config: &ReleaseConfig,
) -> ReleaseResult<PathBuf> {
    let path = &config.repo_path;
    let url = config.remote_url()?;

    if path.exists() {
        ensure_clone_origin(git, path, &url).await?;
        tracing::info!("sync: pulling {}", path.display());
        git.git(path, &["pull"])
            .await?
            .ensure_success(|output| ReleaseError::SyncFailure {
                path: path.clone(),
                output,
            })?;
        return Ok(path.clone());
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    async_fs::create_dir_all(parent).await?;

    tracing::info!("sync: cloning {} into {}", url, path.display());
    let target = path.to_string_lossy();
    git.git(parent, &["clone", &url, &target])
        .await?
        .ensure_success(|output| ReleaseError::CloneFailure {
            url: url.clone(),
            output,
        })?;
    Ok(path.clone())
}

/// The existing clone's `origin` must be the remote selected by `public_repo`.
async fn ensure_clone_origin<G: GitRunner>(
    git: &G,
    path: &Path,
    url: &str,
) -> ReleaseResult<()> {
    let output = git
        .git(path, &["remote", "get-url", "origin"])
        .await?
        .ensure_success(|output| ReleaseError::SyncFailure {
            path: path.to_path_buf(),
            output,
        })?;
    let origin = output.stdout.trim();
    if origin.trim_end_matches('/') != url.trim_end_matches('/') {
        return Err(ReleaseError::Config(format!(
            "{} tracks {} but this release targets {}",
            path.display(),
            origin,
            url
        )));
    }
    Ok(())
}
