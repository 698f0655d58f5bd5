use tokio::fs as async_fs;

use crate::artifact::{ARCHIVES, ArtifactRegistry, DIGESTS, SOURCES};
use crate::config::ReleaseConfig;
use crate::error::ReleaseResult;
use crate::project::Project;

const UPLOAD_GROUPS: [&str; 3] = [ARCHIVES, SOURCES, DIGESTS];

/// Copy every publishable artifact into `<clone>/<name>/<version>/`.
pub async fn upload_artifacts(
    config: &ReleaseConfig,
    project: &Project,
    registry: &ArtifactRegistry,
) -> ReleaseResult<usize> {
    let dest = config
        .repo_path
        .join(&project.name)
        .join(project.version.to_string());
    async_fs::create_dir_all(&dest).await?;

    let mut count = 0;
    for group in UPLOAD_GROUPS {
        for artifact in registry.group(group) {
            let target = dest.join(artifact.file_name()?);
            async_fs::copy(&artifact.path, &target).await?;
            tracing::debug!("upload: {} -> {}", artifact.path.display(), target.display());
            count += 1;
        }
    }
    tracing::info!("upload: copied {} artifacts to {}", count, dest.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::config::{FileConfig, Overrides};
    use std::fs;

    #[tokio::test]
    async fn copies_all_groups_into_version_dir() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path();
        let cfg = ReleaseConfig::resolve(root, FileConfig::default(), Overrides::default());
        let project = Project {
            root: root.to_path_buf(),
            name: "demo".into(),
            version: semver::Version::new(1, 2, 3),
            dependencies: Default::default(),
        };

        let mut registry = ArtifactRegistry::default();
        for (group, name) in [
            (ARCHIVES, "demo-1.2.3.crate"),
            (SOURCES, "demo-1.2.3-sources.zip"),
            (DIGESTS, "demo-1.2.3.crate.sha1"),
            ("unrelated", "notes.txt"),
        ] {
            let path = root.join(name);
            fs::write(&path, name).unwrap();
            registry.register(group, Artifact::from_path(&path, None).unwrap());
        }

        let count = upload_artifacts(&cfg, &project, &registry).await.unwrap();
        assert_eq!(count, 3);
        let dest = cfg.repo_path.join("demo").join("1.2.3");
        assert_eq!(
            fs::read_to_string(dest.join("demo-1.2.3.crate")).unwrap(),
            "demo-1.2.3.crate"
        );
        assert!(dest.join("demo-1.2.3-sources.zip").is_file());
        assert!(dest.join("demo-1.2.3.crate.sha1").is_file());
        assert!(!dest.join("notes.txt").exists());
    }
}
