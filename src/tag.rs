use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::GitRunner;
use crate::project::Project;

/// Create the annotated release tag and push it. Does nothing on a dry run.
pub async fn create_tag<G: GitRunner>(
    git: &G,
    config: &ReleaseConfig,
    project: &Project,
) -> ReleaseResult<Option<String>> {
    if config.test_release {
        tracing::info!("tag: dry-run, skipping tag creation");
        return Ok(None);
    }

    let root = &config.project_root;
    let tag = config.tag_for(&project.version);
    let message = format!("Release {}", project.version);

    git.git(root, &["tag", "-a", &tag, "-m", &message])
        .await?
        .ensure_success(|output| ReleaseError::TagFailure {
            tag: tag.clone(),
            action: "tag",
            output,
        })?;
    tracing::info!("tag: created {} (annotated)", tag);

    let tag_ref = format!("refs/tags/{}", tag);
    git.git(root, &["push", &config.remote, &tag_ref])
        .await?
        .ensure_success(|output| ReleaseError::TagFailure {
            tag: tag.clone(),
            action: "push",
            output,
        })?;
    tracing::info!("tag: pushed {} to {}", tag, config.remote);
    Ok(Some(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Overrides};
    use crate::git::fake::{FakeGit, failed};
    use std::path::Path;

    fn setup(test_release: bool) -> (ReleaseConfig, Project) {
        let cfg = ReleaseConfig::resolve(
            Path::new("/work/demo"),
            FileConfig {
                test_release: Some(test_release),
                ..FileConfig::default()
            },
            Overrides::default(),
        );
        let project = Project {
            root: cfg.project_root.clone(),
            name: "demo".into(),
            version: semver::Version::new(1, 2, 3),
            dependencies: Default::default(),
        };
        (cfg, project)
    }

    #[tokio::test]
    async fn tags_and_pushes() {
        let (cfg, project) = setup(false);
        let git = FakeGit::new();
        let tag = create_tag(&git, &cfg, &project).await.unwrap();
        assert_eq!(tag.as_deref(), Some("1.2.3"));
        assert_eq!(
            git.calls(),
            vec!["tag -a 1.2.3 -m Release 1.2.3", "push origin refs/tags/1.2.3"]
        );
    }

    #[tokio::test]
    async fn dry_run_skips_everything() {
        let (cfg, project) = setup(true);
        let git = FakeGit::new();
        assert_eq!(create_tag(&git, &cfg, &project).await.unwrap(), None);
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_push_is_fatal() {
        let (cfg, project) = setup(false);
        let git = FakeGit::new().reply("push", failed(1, "rejected"));
        let err = create_tag(&git, &cfg, &project).await.unwrap_err();
        match err {
            ReleaseError::TagFailure { tag, action, .. } => {
                assert_eq!(tag, "1.2.3");
                assert_eq!(action, "push");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
