// `autobuild run` and `autobuild status`

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Args;

use autobuild_lib::services::archive;
use autobuild_lib::services::{
    default_task_name, ProxyClient, ReleasePublisher, RunMonitor, Session, TaskSubmission,
    TaskUploader,
};
use autobuild_lib::AutobuildResult;

use super::{follow, Context};
use crate::render::render_run;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Task ZIP archive
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Task name (default: task-{epoch millis})
    #[arg(long)]
    pub name: Option<String>,
    /// Workflow execution mode
    #[arg(long, default_value = "full")]
    pub mode: String,
    /// Ask the workflow to keep intermediate artifacts
    #[arg(long)]
    pub keep_artifacts: bool,
    /// Publish straight to GitHub instead of going through the upload proxy
    #[arg(long)]
    pub direct: bool,
    /// Return once the run is located instead of following it
    #[arg(long)]
    pub no_wait: bool,
}

fn read_archive(file: Option<&PathBuf>) -> AutobuildResult<Vec<u8>> {
    let Some(path) = file else {
        return Ok(Vec::new());
    };
    let bytes = std::fs::read(path)?;
    match archive::inspect(&bytes) {
        Ok(summary) => log::info!(
            "[run] {}: {} files, {} directories, {} paths to rewrite",
            path.display(),
            summary.files(),
            summary.directories,
            summary.backslash_paths
        ),
        Err(e) => log::warn!("[run] {} will be uploaded as-is: {}", path.display(), e),
    }
    Ok(bytes)
}

pub async fn execute(ctx: &Context, args: RunArgs) -> AutobuildResult<()> {
    let repo = ctx.repo()?;
    let github = ctx.github()?;

    let uploader: Arc<dyn TaskUploader> = if args.direct {
        Arc::new(ReleasePublisher::new(github.clone()))
    } else {
        Arc::new(ProxyClient::new(ctx.config.upload_api_base()?)?)
    };
    let monitor = RunMonitor::new(
        github,
        repo.clone(),
        ctx.config.git_ref.clone(),
        ctx.config.monitor_config(),
    );
    let session = Session::new(repo.clone(), uploader, monitor);

    let submission = TaskSubmission {
        file_name: args
            .file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned()),
        archive: read_archive(args.file.as_ref())?,
        task_name: args
            .name
            .unwrap_or_else(|| default_task_name(Utc::now())),
        mode: args.mode,
        keep_artifacts: args.keep_artifacts,
    };

    let outcome = session.submit(submission).await?;
    println!("Release: {}", outcome.publish.release_url);
    println!("Asset:   {}", outcome.publish.asset_url);
    println!("Run:     {}\n", outcome.run.html_url);

    if args.no_wait {
        session.monitor().stop_polling();
        println!("Check later with `autobuild status {}`", outcome.run.id);
        return Ok(());
    }

    follow(session.monitor()).await;
    println!(
        "Workflow secrets are configured at {}",
        session.repo().secrets_url()
    );
    Ok(())
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Workflow run id
    pub run_id: u64,
    /// Keep polling until the run completes
    #[arg(long)]
    pub watch: bool,
}

pub async fn status(ctx: &Context, args: StatusArgs) -> AutobuildResult<()> {
    let repo = ctx.authorized_repo()?;
    let monitor = RunMonitor::new(
        ctx.github()?,
        repo,
        ctx.config.git_ref.clone(),
        ctx.config.monitor_config(),
    );

    let run = monitor.attach(args.run_id).await?;
    if !args.watch {
        println!("{}", render_run(&run));
        return Ok(());
    }

    monitor.start_polling()?;
    follow(&monitor).await;
    Ok(())
}
