mod artifact;
mod build;
mod checksum;
mod config;
mod error;
mod git;
mod pipeline;
mod preflight;
mod project;
mod publish;
mod sync;
mod tag;
mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::build::CargoBuilder;
use crate::config::Overrides;
use crate::git::SystemGit;

#[derive(Parser, Debug)]
#[command(
    name = "tagship",
    version,
    about = "Tag a release and publish its artifacts to a git-backed repository",
    long_about = None
)]
struct Cli {
    /// Read settings from this file instead of .tagship.toml
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Local clone of the artifact repository
    #[arg(global = true, long = "repo-path")]
    repo_path: Option<PathBuf>,

    /// Publish to the public artifact repository
    #[arg(global = true, long = "public-repo", default_value_t = false)]
    public_repo: bool,

    /// Release even if the working copy has uncommitted changes
    #[arg(global = true, long = "release-dirty", default_value_t = false)]
    release_dirty: bool,

    /// Validate and sync, but skip publishing and tagging
    #[arg(
        global = true,
        long = "test-release",
        visible_alias = "dry-run",
        default_value_t = false
    )]
    test_release: bool,

    /// Do not generate sha1/md5 digests
    #[arg(global = true, long = "no-checksums", default_value_t = false)]
    no_checksums: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the whole release: preflight, build, sync, checksums, upload, publish, tag
    Release,
    /// Only run the preflight checks
    Preflight,
    /// Only clone or pull the artifact repository
    Sync,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGSHIP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let project = project::load_project(&cwd)
        .await
        .context("failed to load cargo project")?;
    let overrides = Overrides {
        repo_path: cli.repo_path,
        public_repo: cli.public_repo,
        release_dirty: cli.release_dirty,
        test_release: cli.test_release,
        no_checksums: cli.no_checksums,
    };
    let config = config::load(&project.root, cli.config.as_deref(), overrides)
        .await
        .context("failed to load configuration")?;
    let git = SystemGit::new(config.git_timeout);

    match cli.command {
        Commands::Release => {
            let report = pipeline::run_release(&git, &config, &project, &CargoBuilder)
                .await
                .context("release failed")?;
            let mode = if report.dry_run { "dry-run" } else { "completed" };
            println!(
                "release: {} (project={} version={} tag={} uploaded={} digests={} published={})",
                mode,
                report.project,
                report.version,
                report.tag,
                report.uploaded,
                report.digests,
                report.published
            );
        }
        Commands::Preflight => {
            let report = preflight::run_preflight(&git, &config, &project)
                .await
                .context("preflight checks failed")?;
            println!(
                "preflight: ok (project={} version={} tag={} dirty={})",
                project.name, project.version, report.tag, report.dirty
            );
        }
        Commands::Sync => {
            let path = pipeline::run_sync(&git, &config)
                .await
                .context("artifact repository sync failed")?;
            println!("sync: ready (path={})", path.display());
        }
    }

    Ok(())
}
