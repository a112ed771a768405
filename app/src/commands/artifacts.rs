// `autobuild artifacts` and `autobuild download`

use std::path::PathBuf;

use clap::Args;

use autobuild_lib::models::ArtifactOutcome;
use autobuild_lib::services::GithubApi;
use autobuild_lib::utils::format_bytes;
use autobuild_lib::AutobuildResult;

use super::Context;
use crate::render::render_artifacts;

#[derive(Debug, Args)]
pub struct ArtifactsArgs {
    /// Workflow run id
    pub run_id: u64,
}

/// Print the artifacts of a run.
///
/// An empty list succeeds; a failed listing is printed and returned as an
/// error so the exit status tells the two apart.
pub async fn list(ctx: &Context, args: ArtifactsArgs) -> AutobuildResult<()> {
    let repo = ctx.authorized_repo()?;
    let github = ctx.github()?;

    match github.list_artifacts(&repo, args.run_id).await {
        Ok(list) => {
            println!("{}", render_artifacts(&ArtifactOutcome::from_list(list)));
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{}",
                render_artifacts(&ArtifactOutcome::Unavailable(e.to_string()))
            );
            Err(e)
        }
    }
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Artifact id, as listed by `autobuild artifacts`
    pub artifact_id: u64,
    /// Artifact name; the file is saved as `{name}.zip`
    #[arg(long)]
    pub name: String,
    /// Target directory (default: current directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Target path of a downloaded artifact
pub fn download_path(out: Option<PathBuf>, name: &str) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from("."))
        .join(format!("{}.zip", name))
}

pub async fn download(ctx: &Context, args: DownloadArgs) -> AutobuildResult<()> {
    let repo = ctx.authorized_repo()?;
    let github = ctx.github()?;

    let bytes = github.download_artifact(&repo, args.artifact_id).await?;
    let path = download_path(args.out, &args.name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &bytes)?;

    println!("Saved {} ({})", path.display(), format_bytes(bytes.len() as u64));
    Ok(())
}
