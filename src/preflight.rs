use std::path::Path;
use std::sync::LazyLock;

use git2::Repository;
use regex::Regex;

use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::GitRunner;
use crate::project::Project;

static AHEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ahead (\d+)").expect("ahead pattern is valid"));

#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub tag: String,
    pub dirty: bool,
}

/// Refuse to release unless the working copy is current, clean, untagged and free
/// of unreleased versions. Only `git pull` changes local state.
pub async fn run_preflight<G: GitRunner>(
    git: &G,
    config: &ReleaseConfig,
    project: &Project,
) -> ReleaseResult<PreflightReport> {
    tracing::debug!("preflight: start");
    let root = &config.project_root;

    ensure_release_version(config, project)?;
    ensure_working_copy(root).await?;

    git.git(root, &["pull"])
        .await?
        .ensure_success(|output| ReleaseError::SyncFailure {
            path: root.clone(),
            output,
        })?;

    let status = git
        .git(root, &["status", "--short", "--branch"])
        .await?
        .ensure_success(|output| ReleaseError::GitCommand {
            command: String::from("status --short --branch"),
            output,
        })?;
    let header = status.stdout.lines().next().unwrap_or_default();
    if let Some(ahead) = commits_ahead(header) {
        tracing::debug!("preflight: {} unpushed commits", ahead);
        return Err(ReleaseError::UnpushedCommits {
            status: header.trim_start_matches("## ").to_string(),
        });
    }

    let porcelain = git
        .git(root, &["status", "--porcelain"])
        .await?
        .ensure_success(|output| ReleaseError::GitCommand {
            command: String::from("status --porcelain"),
            output,
        })?;
    let changes = porcelain.stdout.trim_end();
    let dirty = !changes.is_empty();
    if dirty {
        if !config.release_dirty {
            return Err(ReleaseError::DirtyWorkingCopy {
                changes: changes.to_string(),
            });
        }
        tracing::warn!("preflight: working copy is dirty, releasing anyway");
    }

    let tag = config.tag_for(&project.version);
    git.git(root, &["fetch", "--tags", &config.remote])
        .await?
        .ensure_success(|output| ReleaseError::SyncFailure {
            path: root.clone(),
            output,
        })?;
    let listed = git
        .git(root, &["tag", "--list", &tag])
        .await?
        .ensure_success(|output| ReleaseError::GitCommand {
            command: format!("tag --list {}", tag),
            output,
        })?;
    if listed.stdout.lines().any(|line| line.trim() == tag) {
        return Err(ReleaseError::TagAlreadyExists { tag });
    }

    ensure_released_dependencies(config, project)?;

    tracing::info!(
        "preflight: ok project={} version={} tag={}",
        project.name,
        project.version,
        tag
    );
    Ok(PreflightReport { tag, dirty })
}

fn ensure_release_version(config: &ReleaseConfig, project: &Project) -> ReleaseResult<()> {
    let version = project.version.to_string();
    if version.contains(&config.unreleased_marker) {
        return Err(ReleaseError::UnreleasedVersion {
            version,
            marker: config.unreleased_marker.clone(),
        });
    }
    Ok(())
}

fn ensure_released_dependencies(config: &ReleaseConfig, project: &Project) -> ReleaseResult<()> {
    let marker = config.unreleased_marker.as_str();
    let offending: Vec<String> = config
        .dependency_scopes
        .iter()
        .flat_map(|scope| {
            project
                .dependencies(*scope)
                .iter()
                .filter(|dep| dep.version.contains(marker))
                .map(move |dep| format!("{} {} ({})", dep.name, dep.version, scope))
        })
        .collect();
    if !offending.is_empty() {
        return Err(ReleaseError::UnreleasedDependency {
            dependencies: offending,
        });
    }
    Ok(())
}

async fn ensure_working_copy(root: &Path) -> ReleaseResult<()> {
    let path = root.to_path_buf();
    let found = tokio::task::spawn_blocking(move || Repository::discover(&path).is_ok())
        .await
        .map_err(std::io::Error::other)?;
    if !found {
        return Err(ReleaseError::NotAGitRepository {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

fn commits_ahead(header: &str) -> Option<u32> {
    if !header.starts_with("##") {
        return None;
    }
    AHEAD_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|n| *n > 0)
}
