use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use cargo_metadata::{DependencyKind, Metadata, MetadataCommand};
use serde::Deserialize;

use crate::error::{ReleaseError, ReleaseResult};

/// Cargo dependency tables, named the way they appear in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Scope {
    #[serde(rename = "dependencies")]
    Normal,
    #[serde(rename = "dev-dependencies")]
    Dev,
    #[serde(rename = "build-dependencies")]
    Build,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Normal => "dependencies",
            Scope::Dev => "dev-dependencies",
            Scope::Build => "build-dependencies",
        }
    }

    fn from_kind(kind: DependencyKind) -> Option<Self> {
        match kind {
            DependencyKind::Normal => Some(Scope::Normal),
            DependencyKind::Development => Some(Scope::Dev),
            DependencyKind::Build => Some(Scope::Build),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Version requirement as written in the manifest.
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub name: String,
    pub version: semver::Version,
    pub dependencies: BTreeMap<Scope, Vec<Dependency>>,
}

impl Project {
    pub fn dependencies(&self, scope: Scope) -> &[Dependency] {
        self.dependencies
            .get(&scope)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Read the package that owns `dir` through `cargo metadata --no-deps`.
pub async fn load_project(dir: &Path) -> ReleaseResult<Project> {
    let dir = dir.to_path_buf();
    let meta = tokio::task::spawn_blocking(move || {
        let mut cmd = MetadataCommand::new();
        cmd.current_dir(&dir).no_deps();
        cmd.exec()
    })
    .await
    .map_err(std::io::Error::other)??;
    project_from_metadata(&meta)
}

fn project_from_metadata(meta: &Metadata) -> ReleaseResult<Project> {
    let pkg = meta.root_package().ok_or_else(|| {
        ReleaseError::Config(format!(
            "no root package in workspace {}; run from a package directory",
            meta.workspace_root
        ))
    })?;

    let mut dependencies: BTreeMap<Scope, Vec<Dependency>> = BTreeMap::new();
    for dep in &pkg.dependencies {
        let Some(scope) = Scope::from_kind(dep.kind) else {
            continue;
        };
        dependencies.entry(scope).or_default().push(Dependency {
            name: dep.name.clone(),
            version: dep.req.to_string(),
        });
    }

    let root = pkg
        .manifest_path
        .parent()
        .map(|p| p.as_std_path().to_path_buf())
        .unwrap_or_else(|| meta.workspace_root.as_std_path().to_path_buf());

    tracing::debug!(
        "project: loaded name={} version={} root={}",
        pkg.name,
        pkg.version,
        root.display()
    );
    Ok(Project {
        root,
        name: pkg.name.clone(),
        version: pkg.version.clone(),
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn load_project_groups_dependencies_by_scope() {
        let td = tempfile::tempdir().unwrap();
        fs::write(
            td.path().join("Cargo.toml"),
            r#"[package]
name = "demo"
version = "1.2.3"
edition = "2021"

[dependencies]
serde = "1"

[dev-dependencies]
insta = "1"

[build-dependencies]
cc = "=1.0.0-SNAPSHOT"
"#,
        )
        .unwrap();
        fs::create_dir_all(td.path().join("src")).unwrap();
        fs::write(td.path().join("src/lib.rs"), "").unwrap();

        let project = load_project(td.path()).await.unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.version.to_string(), "1.2.3");
        assert_eq!(project.dependencies(Scope::Normal)[0].name, "serde");
        assert_eq!(project.dependencies(Scope::Dev)[0].name, "insta");
        let build = project.dependencies(Scope::Build);
        assert_eq!(build.len(), 1);
        assert!(build[0].version.contains("SNAPSHOT"));
    }

    #[test]
    fn scope_names_match_manifest_tables() {
        #[derive(Deserialize)]
        struct Scopes {
            scopes: Vec<Scope>,
        }
        let parsed: Scopes = toml::from_str(
            r#"scopes = ["dependencies", "dev-dependencies", "build-dependencies"]"#,
        )
        .unwrap();
        assert_eq!(parsed.scopes, vec![Scope::Normal, Scope::Dev, Scope::Build]);
        assert_eq!(Scope::Build.to_string(), "build-dependencies");
    }
}
