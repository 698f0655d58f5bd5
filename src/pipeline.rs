use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::artifact::ArtifactRegistry;
use crate::build::ArtifactBuilder;
use crate::checksum::generate_checksums;
use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::GitRunner;
use crate::preflight::run_preflight;
use crate::project::Project;
use crate::publish::publish;
use crate::sync::sync_repository;
use crate::tag::create_tag;
use crate::upload::upload_artifacts;

/// One stage of a release. `Step::ALL` is the order they run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preflight,
    Build,
    Sync,
    Checksums,
    Upload,
    Publish,
    Tag,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Preflight,
        Step::Build,
        Step::Sync,
        Step::Checksums,
        Step::Upload,
        Step::Publish,
        Step::Tag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Step::Preflight => "preflight",
            Step::Build => "build",
            Step::Sync => "sync",
            Step::Checksums => "checksums",
            Step::Upload => "upload",
            Step::Publish => "publish",
            Step::Tag => "tag",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub project: String,
    pub version: String,
    pub tag: String,
    pub uploaded: usize,
    pub digests: usize,
    pub published: bool,
    pub dry_run: bool,
}

/// Exclusive lock on `<repo_path>.lock`, released on drop.
struct RepoLock {
    file: File,
}

impl RepoLock {
    fn acquire(path: &Path) -> ReleaseResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(ReleaseError::RepositoryLocked {
                    path: path.to_path_buf(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Default)]
struct ReleaseRun {
    registry: ArtifactRegistry,
    tag: String,
    digests: usize,
    uploaded: usize,
    published: bool,
    lock: Option<RepoLock>,
}

impl ReleaseRun {
    async fn execute<G, B>(
        &mut self,
        step: Step,
        git: &G,
        config: &ReleaseConfig,
        project: &Project,
        builder: &B,
    ) -> ReleaseResult<()>
    where
        G: GitRunner,
        B: ArtifactBuilder,
    {
        match step {
            Step::Preflight => {
                self.tag = run_preflight(git, config, project).await?.tag;
            }
            Step::Build => builder.build(config, project, &mut self.registry).await?,
            Step::Sync => {
                self.lock = Some(RepoLock::acquire(&config.lock_path())?);
                sync_repository(git, config).await?;
            }
            Step::Checksums => {
                self.digests = generate_checksums(config, &mut self.registry).await?;
            }
            Step::Upload => {
                self.uploaded = upload_artifacts(config, project, &self.registry).await?;
            }
            Step::Publish => self.published = publish(git, config, project).await?,
            Step::Tag => {
                create_tag(git, config, project).await?;
            }
        }
        Ok(())
    }
}

/// Run every step in `Step::ALL` order, stopping at the first failure.
/// Nothing already done is rolled back.
pub async fn run_release<G, B>(
    git: &G,
    config: &ReleaseConfig,
    project: &Project,
    builder: &B,
) -> ReleaseResult<ReleaseReport>
where
    G: GitRunner,
    B: ArtifactBuilder,
{
    let mut run = ReleaseRun::default();
    for step in Step::ALL {
        tracing::info!("release: step {}", step);
        run.execute(step, git, config, project, builder)
            .await
            .inspect_err(|err| tracing::error!("release: step {} failed: {}", step, err))?;
    }
    drop(run.lock.take());
    tracing::info!(
        "release: finished tag={} artifacts={}",
        run.tag,
        run.registry.len()
    );

    Ok(ReleaseReport {
        project: project.name.clone(),
        version: project.version.to_string(),
        tag: run.tag,
        uploaded: run.uploaded,
        digests: run.digests,
        published: run.published,
        dry_run: config.test_release,
    })
}

/// Sync the artifact repository on its own, under the same lock as a release.
pub async fn run_sync<G: GitRunner>(git: &G, config: &ReleaseConfig) -> ReleaseResult<PathBuf> {
    let _lock = RepoLock::acquire(&config.lock_path())?;
    sync_repository(git, config).await
}
