use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use git2::Repository;
use tar::Builder as TarBuilder;
use tokio::process::Command;
use zip::CompressionMethod as ZipCompression;
use zip::write::FileOptions as ZipOptions;

use crate::artifact::{ARCHIVES, Artifact, ArtifactRegistry, SOURCES};
use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::CommandOutput;
use crate::project::Project;

/// Produces the artifacts a release publishes.
pub trait ArtifactBuilder {
    async fn build(
        &self,
        config: &ReleaseConfig,
        project: &Project,
        registry: &mut ArtifactRegistry,
    ) -> ReleaseResult<()>;
}

/// Runs the configured build command, collects the archives it leaves behind
/// and packages the committed tree as source archives.
pub struct CargoBuilder;

impl ArtifactBuilder for CargoBuilder {
    async fn build(
        &self,
        config: &ReleaseConfig,
        project: &Project,
        registry: &mut ArtifactRegistry,
    ) -> ReleaseResult<()> {
        run_build_command(config).await?;

        for path in config.archive_paths(project) {
            if !path.is_file() {
                return Err(ReleaseError::MissingArtifact { path });
            }
            registry.register(ARCHIVES, Artifact::from_path(&path, None)?);
        }

        for path in package_sources(config, project).await? {
            registry.register(SOURCES, Artifact::from_path(&path, Some("src"))?);
        }

        tracing::info!(
            "build: archives={} sources={}",
            registry.group(ARCHIVES).len(),
            registry.group(SOURCES).len()
        );
        Ok(())
    }
}

async fn run_build_command(config: &ReleaseConfig) -> ReleaseResult<()> {
    let Some((program, args)) = config.build_command.split_first() else {
        tracing::debug!("build: no build command configured");
        return Ok(());
    };
    let command = config.build_command.join(" ");
    tracing::info!("build: running {}", command);
    let output = Command::new(program)
        .args(args)
        .current_dir(&config.project_root)
        .output()
        .await?;
    CommandOutput::from(output)
        .ensure_success(|output| ReleaseError::BuildFailure { command, output })?;
    Ok(())
}

/// Write `<name>-<version>-sources.tar.gz` and `.zip` from the HEAD tree.
async fn package_sources(config: &ReleaseConfig, project: &Project) -> ReleaseResult<Vec<PathBuf>> {
    let root = config.project_root.clone();
    let out_dir = config.sources_dir();
    let base = format!("{}-{}", project.name, project.version);

    tokio::task::spawn_blocking(move || {
        fs::create_dir_all(&out_dir)?;
        let repo = Repository::discover(&root)?;
        let tree = repo.head()?.peel_to_tree()?;
        let crate_rel = crate_relative_path(&repo, &root);

        let tar_gz = out_dir.join(format!("{}-sources.tar.gz", base));
        let zip = out_dir.join(format!("{}-sources.zip", base));
        package_from_tree(&repo, &tree, &crate_rel, Path::new(&base), &tar_gz, &zip)?;
        Ok::<_, ReleaseError>(vec![tar_gz, zip])
    })
    .await
    .map_err(std::io::Error::other)?
}

fn crate_relative_path(repo: &Repository, root: &Path) -> PathBuf {
    let Some(workdir) = repo.workdir() else {
        return PathBuf::new();
    };
    let workdir = fs::canonicalize(workdir).unwrap_or_else(|_| workdir.to_path_buf());
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    root.strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn package_from_tree(
    repo: &Repository,
    tree: &git2::Tree,
    crate_rel: &Path,
    prefix: &Path,
    tar_gz: &Path,
    zip_path: &Path,
) -> ReleaseResult<()> {
    let tar_file = fs::File::create(tar_gz)?;
    let enc = GzEncoder::new(tar_file, Compression::default());
    let mut tar = TarBuilder::new(enc);

    let zip_file = fs::File::create(zip_path)?;
    let mut zip = zip::ZipWriter::new(zip_file);
    let zopt = ZipOptions::default()
        .compression_method(ZipCompression::Deflated)
        .unix_permissions(0o644);

    let mut error: Option<ReleaseError> = None;

    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        let Some(name) = entry.name() else {
            return git2::TreeWalkResult::Ok;
        };
        let mut full_path = PathBuf::from(root);
        full_path.push(name);

        let Ok(rel) = full_path.strip_prefix(crate_rel) else {
            return git2::TreeWalkResult::Ok;
        };
        if should_skip(rel) {
            return git2::TreeWalkResult::Skip;
        }

        if let Some(git2::ObjectType::Blob) = entry.kind()
            && let Ok(obj) = entry.to_object(repo)
            && let Ok(blob) = obj.into_blob()
        {
            let archive_path = prefix.join(rel);
            if let Err(err) = append_entry(&mut tar, &mut zip, zopt, &archive_path, blob.content())
            {
                tracing::warn!(path=%archive_path.display(), error=%err, "build: archive write failed");
                error = Some(err);
                return git2::TreeWalkResult::Abort;
            }
        }
        git2::TreeWalkResult::Ok
    })
    .or_else(|err| if error.is_some() { Ok(()) } else { Err(err) })?;

    if let Some(err) = error {
        return Err(err);
    }

    tar.into_inner()?.finish()?;
    zip.finish()
        .map_err(|err| ReleaseError::Packaging(err.to_string()))?;
    Ok(())
}

fn should_skip(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some(".git") | Some(".github") | Some("target")
        )
    })
}

fn append_entry(
    tar: &mut TarBuilder<GzEncoder<fs::File>>,
    zip: &mut zip::ZipWriter<fs::File>,
    zopt: ZipOptions,
    path: &Path,
    data: &[u8],
) -> ReleaseResult<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(path)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append(&header, &mut Cursor::new(data))?;

    zip.start_file(to_unix_path(path), zopt)
        .map_err(|err| ReleaseError::Packaging(err.to_string()))?;
    zip.write_all(data)?;
    Ok(())
}

fn to_unix_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
