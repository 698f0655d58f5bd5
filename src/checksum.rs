use std::path::Path;

use md5::Md5;
use sha1::{Digest, Sha1};
use tokio::fs as async_fs;
use tokio::io::AsyncReadExt;

use crate::artifact::{ARCHIVES, Artifact, ArtifactRegistry, DIGESTS, SOURCES};
use crate::config::ReleaseConfig;
use crate::error::ReleaseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Md5,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Sha1, Algorithm::Md5];

    pub fn extension(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Md5 => "md5",
        }
    }

    async fn digest_file(self, path: &Path) -> ReleaseResult<String> {
        match self {
            Algorithm::Sha1 => compute_digest::<Sha1>(path).await,
            Algorithm::Md5 => compute_digest::<Md5>(path).await,
        }
    }
}

/// Write a sha1 and md5 file next to every archive and source artifact and register
/// them under `digests`. Returns the number of digest files written.
pub async fn generate_checksums(
    config: &ReleaseConfig,
    registry: &mut ArtifactRegistry,
) -> ReleaseResult<usize> {
    if !config.add_checksums {
        tracing::info!("checksums: disabled, skipping");
        return Ok(0);
    }

    let out_dir = config.digest_dir();
    async_fs::create_dir_all(&out_dir).await?;

    let mut digests = Vec::new();
    for group in [ARCHIVES, SOURCES] {
        for artifact in registry.group(group) {
            let file_name = artifact.file_name()?;
            for alg in Algorithm::ALL {
                let hex = alg.digest_file(&artifact.path).await?;
                let path = out_dir.join(format!("{}.{}", file_name, alg.extension()));
                async_fs::write(&path, format!("{}\n", hex)).await?;
                digests.push(Artifact {
                    name: artifact.name.clone(),
                    extension: format!("{}.{}", artifact.extension, alg.extension()),
                    kind: alg.extension().to_string(),
                    path,
                });
            }
        }
    }

    let count = digests.len();
    for digest in digests {
        registry.register(DIGESTS, digest);
    }
    tracing::info!(
        "checksums: wrote {} digests to {}",
        count,
        out_dir.display()
    );
    Ok(count)
}

async fn compute_digest<D: Digest>(path: &Path) -> ReleaseResult<String> {
    let mut file = async_fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Overrides};
    use std::fs;

    fn config(root: &Path, add_checksums: bool) -> ReleaseConfig {
        ReleaseConfig::resolve(
            root,
            FileConfig {
                add_checksums: Some(add_checksums),
                ..FileConfig::default()
            },
            Overrides::default(),
        )
    }

    #[tokio::test]
    async fn two_digests_per_artifact() {
        let td = tempfile::tempdir().unwrap();
        let file = td.path().join("demo-1.2.3.crate");
        fs::write(&file, "hello").unwrap();

        let cfg = config(td.path(), true);
        let mut registry = ArtifactRegistry::default();
        registry.register(ARCHIVES, Artifact::from_path(&file, None).unwrap());

        let written = generate_checksums(&cfg, &mut registry).await.unwrap();
        assert_eq!(written, 2);

        let digests = registry.group(DIGESTS);
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].kind, "sha1");
        assert_eq!(digests[0].extension, "crate.sha1");
        assert_eq!(digests[0].file_name().unwrap(), "demo-1.2.3.crate.sha1");
        assert_eq!(digests[1].kind, "md5");
        assert_eq!(digests[1].file_name().unwrap(), "demo-1.2.3.crate.md5");

        assert_eq!(
            fs::read_to_string(&digests[0].path).unwrap(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\n"
        );
        assert_eq!(
            fs::read_to_string(&digests[1].path).unwrap(),
            "5d41402abc4b2a76b9719d911017c592\n"
        );
    }

    #[tokio::test]
    async fn archives_come_before_sources() {
        let td = tempfile::tempdir().unwrap();
        let archive = td.path().join("a.crate");
        let source = td.path().join("a-sources.zip");
        fs::write(&archive, "a").unwrap();
        fs::write(&source, "b").unwrap();

        let cfg = config(td.path(), true);
        let mut registry = ArtifactRegistry::default();
        registry.register(SOURCES, Artifact::from_path(&source, Some("src")).unwrap());
        registry.register(ARCHIVES, Artifact::from_path(&archive, None).unwrap());

        generate_checksums(&cfg, &mut registry).await.unwrap();
        let names: Vec<&str> = registry
            .group(DIGESTS)
            .iter()
            .map(|d| d.file_name().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "a.crate.sha1",
                "a.crate.md5",
                "a-sources.zip.sha1",
                "a-sources.zip.md5"
            ]
        );
    }

    #[tokio::test]
    async fn disabled_writes_nothing() {
        let td = tempfile::tempdir().unwrap();
        let file = td.path().join("a.crate");
        fs::write(&file, "a").unwrap();

        let cfg = config(td.path(), false);
        let mut registry = ArtifactRegistry::default();
        registry.register(ARCHIVES, Artifact::from_path(&file, None).unwrap());

        assert_eq!(generate_checksums(&cfg, &mut registry).await.unwrap(), 0);
        assert!(registry.group(DIGESTS).is_empty());
        assert!(!cfg.digest_dir().exists());
    }
}
