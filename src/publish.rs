use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::GitRunner;
use crate::project::Project;

/// Stage, commit and push the artifact repository clone. Returns false on a dry run.
pub async fn publish<G: GitRunner>(
    git: &G,
    config: &ReleaseConfig,
    project: &Project,
) -> ReleaseResult<bool> {
    if config.test_release {
        tracing::info!("publish: dry-run, skipping stage/commit/push");
        return Ok(false);
    }

    let repo = &config.repo_path;
    let message = format!("Release {} {}", project.name, project.version);

    git.git(repo, &["add", "-A"])
        .await?
        .ensure_success(|output| ReleaseError::PublishFailure {
            action: "add",
            output,
        })?;
    git.git(repo, &["commit", "-m", &message])
        .await?
        .ensure_success(|output| ReleaseError::PublishFailure {
            action: "commit",
            output,
        })?;
    let branch = config.artifact_branch.as_deref().unwrap_or("HEAD");
    tracing::info!("publish: pushing {} to origin {}", repo.display(), branch);
    git.git(repo, &["push", "origin", branch])
        .await?
        .ensure_success(|output| ReleaseError::PublishFailure {
            action: "push",
            output,
        })?;
    Ok(true)
}
