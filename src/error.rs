use std::path::PathBuf;

use thiserror::Error;

use crate::git::CommandOutput;

/// Every way a release run can stop. None of them are retried.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("{} is not inside a git working copy", .path.display())]
    NotAGitRepository { path: PathBuf },

    #[error("failed to sync {} with its remote\n{output}", .path.display())]
    SyncFailure { path: PathBuf, output: CommandOutput },

    #[error("local commits have not been pushed to the remote ({status})")]
    UnpushedCommits { status: String },

    #[error("working copy has uncommitted changes (pass --release-dirty to release anyway)\n{changes}")]
    DirtyWorkingCopy { changes: String },

    #[error("tag {tag} already exists")]
    TagAlreadyExists { tag: String },

    #[error("project version {version} is not a release version (contains {marker})")]
    UnreleasedVersion { version: String, marker: String },

    #[error("unreleased dependencies: {}", .dependencies.join(", "))]
    UnreleasedDependency { dependencies: Vec<String> },

    #[error("failed to clone {url}\n{output}")]
    CloneFailure { url: String, output: CommandOutput },

    #[error("git {action} failed in the artifact repository\n{output}")]
    PublishFailure {
        action: &'static str,
        output: CommandOutput,
    },

    #[error("git {action} failed for tag {tag}\n{output}")]
    TagFailure {
        tag: String,
        action: &'static str,
        output: CommandOutput,
    },

    #[error("git {command} failed\n{output}")]
    GitCommand {
        command: String,
        output: CommandOutput,
    },

    #[error("build command `{command}` failed\n{output}")]
    BuildFailure {
        command: String,
        output: CommandOutput,
    },

    #[error("artifact {} does not exist", .path.display())]
    MissingArtifact { path: PathBuf },

    #[error("artifact repository is locked by another release ({})", .path.display())]
    RepositoryLocked { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read cargo metadata: {0}")]
    Metadata(#[from] cargo_metadata::Error),

    #[error("failed to package sources: {0}")]
    Packaging(String),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ReleaseResult<T> = std::result::Result<T, ReleaseError>;
