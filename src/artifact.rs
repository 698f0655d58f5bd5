use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ReleaseError, ReleaseResult};

pub const ARCHIVES: &str = "archives";
pub const SOURCES: &str = "sources";
pub const DIGESTS: &str = "digests";

/// A publishable file: `name`, `extension` and `kind` describe it, `path` points at it on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub extension: String,
    pub kind: String,
    pub path: PathBuf,
}

impl Artifact {
    /// Derive name and extension from the file name; `kind` defaults to the extension.
    pub fn from_path(path: &Path, kind: Option<&str>) -> ReleaseResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ReleaseError::MissingArtifact {
                path: path.to_path_buf(),
            })?;
        let (name, extension) = split_extension(file_name);
        Ok(Self {
            name: name.to_string(),
            extension: extension.to_string(),
            kind: kind.unwrap_or(extension).to_string(),
            path: path.to_path_buf(),
        })
    }

    pub fn file_name(&self) -> ReleaseResult<&str> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ReleaseError::MissingArtifact {
                path: self.path.clone(),
            })
    }
}

fn split_extension(file_name: &str) -> (&str, &str) {
    if let Some(stem) = file_name.strip_suffix(".tar.gz") {
        return (stem, "tar.gz");
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    }
}

/// Artifacts grouped by name, each group kept in registration order.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    groups: BTreeMap<String, Vec<Artifact>>,
}

impl ArtifactRegistry {
    pub fn register(&mut self, group: &str, artifact: Artifact) {
        tracing::debug!(
            "artifact: register group={} name={} ext={} type={} file={}",
            group,
            artifact.name,
            artifact.extension,
            artifact.kind,
            artifact.path.display()
        );
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(artifact);
    }

    pub fn group(&self, name: &str) -> &[Artifact] {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}
