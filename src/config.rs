use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{ReleaseError, ReleaseResult};
use crate::project::{Project, Scope};

pub const CONFIG_FILE: &str = ".tagship.toml";

const DEFAULT_GIT_TIMEOUT_SECS: u64 = 20;

/// Settings as written in `.tagship.toml`; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    #[serde(alias = "repoPath")]
    pub repo_path: Option<PathBuf>,
    pub remote_base: Option<String>,
    #[serde(alias = "publicRepo")]
    pub public_repo: Option<bool>,
    #[serde(alias = "releaseDirty")]
    pub release_dirty: Option<bool>,
    #[serde(alias = "testRelease")]
    pub test_release: Option<bool>,
    #[serde(alias = "addChecksums")]
    pub add_checksums: Option<bool>,
    pub remote: Option<String>,
    pub artifact_branch: Option<String>,
    pub tag_prefix: Option<String>,
    pub unreleased_marker: Option<String>,
    pub dependency_scopes: Option<Vec<Scope>>,
    pub build_command: Option<Vec<String>>,
    pub archives: Option<Vec<String>>,
    pub git_timeout_secs: Option<u64>,
}

/// Command-line switches; each one can only turn its setting on.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repo_path: Option<PathBuf>,
    pub public_repo: bool,
    pub release_dirty: bool,
    pub test_release: bool,
    pub no_checksums: bool,
}

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub project_root: PathBuf,
    pub repo_path: PathBuf,
    pub remote_base: Option<String>,
    pub public_repo: bool,
    pub release_dirty: bool,
    pub test_release: bool,
    pub add_checksums: bool,
    pub remote: String,
    /// Branch pushed in the artifact clone; `None` pushes whatever the clone checked out.
    pub artifact_branch: Option<String>,
    pub tag_prefix: String,
    pub unreleased_marker: String,
    pub dependency_scopes: Vec<Scope>,
    pub build_command: Vec<String>,
    pub archives: Vec<String>,
    pub git_timeout: Duration,
}

impl ReleaseConfig {
    pub fn resolve(project_root: &Path, file: FileConfig, overrides: Overrides) -> Self {
        let repo_path = overrides
            .repo_path
            .or(file.repo_path)
            .unwrap_or_else(|| work_dir(project_root).join("artifact-repo"));
        let repo_path = if repo_path.is_absolute() {
            repo_path
        } else {
            project_root.join(repo_path)
        };

        Self {
            project_root: project_root.to_path_buf(),
            repo_path,
            remote_base: file.remote_base,
            public_repo: overrides.public_repo || file.public_repo.unwrap_or(false),
            release_dirty: overrides.release_dirty || file.release_dirty.unwrap_or(false),
            test_release: overrides.test_release || file.test_release.unwrap_or(false),
            add_checksums: !overrides.no_checksums && file.add_checksums.unwrap_or(true),
            remote: file.remote.unwrap_or_else(|| String::from("origin")),
            artifact_branch: file.artifact_branch,
            tag_prefix: file.tag_prefix.unwrap_or_default(),
            unreleased_marker: file
                .unreleased_marker
                .unwrap_or_else(|| String::from("SNAPSHOT")),
            dependency_scopes: file
                .dependency_scopes
                .unwrap_or_else(|| vec![Scope::Normal, Scope::Build]),
            build_command: file.build_command.unwrap_or_else(|| {
                vec![
                    String::from("cargo"),
                    String::from("package"),
                    String::from("--no-verify"),
                ]
            }),
            archives: file
                .archives
                .unwrap_or_else(|| vec![String::from("target/package/{name}-{version}.crate")]),
            git_timeout: Duration::from_secs(
                file.git_timeout_secs.unwrap_or(DEFAULT_GIT_TIMEOUT_SECS),
            ),
        }
    }

    /// Path segment selecting the public or private artifact remote.
    pub fn segment(&self) -> &'static str {
        if self.public_repo { "public" } else { "private" }
    }

    pub fn remote_url(&self) -> ReleaseResult<String> {
        let base = self.remote_base.as_deref().ok_or_else(|| {
            ReleaseError::Config(format!("remote_base is not set in {}", CONFIG_FILE))
        })?;
        Ok(format!(
            "{}/{}.git",
            base.trim_end_matches('/'),
            self.segment()
        ))
    }

    pub fn tag_for(&self, version: &semver::Version) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    pub fn digest_dir(&self) -> PathBuf {
        work_dir(&self.project_root).join("digests")
    }

    pub fn sources_dir(&self) -> PathBuf {
        work_dir(&self.project_root).join("sources")
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .repo_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.repo_path.with_file_name(name)
    }

    pub fn archive_paths(&self, project: &Project) -> Vec<PathBuf> {
        let version = project.version.to_string();
        self.archives
            .iter()
            .map(|pattern| {
                let path = pattern
                    .replace("{name}", &project.name)
                    .replace("{version}", &version);
                self.project_root.join(path)
            })
            .collect()
    }
}

fn work_dir(project_root: &Path) -> PathBuf {
    project_root.join("target").join("tagship")
}

/// Read `.tagship.toml` (or `explicit`) and apply command-line overrides.
pub async fn load(
    project_root: &Path,
    explicit: Option<&Path>,
    overrides: Overrides,
) -> Result<ReleaseConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.join(CONFIG_FILE));
    let file = if path.exists() {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?
    } else if explicit.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    } else {
        FileConfig::default()
    };
    let config = ReleaseConfig::resolve(project_root, file, overrides);
    tracing::debug!(
        "config: repo_path={} segment={} dry_run={} checksums={}",
        config.repo_path.display(),
        config.segment(),
        config.test_release,
        config.add_checksums
    );
    Ok(config)
}
