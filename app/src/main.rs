// autobuild CLI
// Upload a task ZIP, trigger the autobuild workflow and collect its artifacts

mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use autobuild_lib::utils::{AppConfig, CredentialStore};

use commands::artifacts::{ArtifactsArgs, DownloadArgs};
use commands::run::{RunArgs, StatusArgs};
use commands::token::TokenAction;
use commands::Context;

#[derive(Debug, Parser)]
#[command(name = "autobuild", version, about = "Run autobuild tasks on GitHub Actions")]
struct Cli {
    /// Config file (default: ./autobuild.toml, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the stored GitHub token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Upload a task, trigger the workflow and follow the run
    Run(RunArgs),
    /// Show the status of a workflow run
    Status(StatusArgs),
    /// List the artifacts of a workflow run
    Artifacts(ArtifactsArgs),
    /// Download one artifact as {name}.zip
    Download(DownloadArgs),
    /// Serve the upload proxy
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env from the workspace root first, then the current directory
    let _ = dotenvy::from_filename("../.env").or_else(|_| dotenvy::dotenv());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ctx = Context {
        config: AppConfig::load(cli.config.as_deref())?,
        store: CredentialStore::default_location()?,
    };

    match cli.command {
        Command::Token { action } => commands::token::execute(&ctx, action)?,
        Command::Run(args) => commands::run::execute(&ctx, args).await?,
        Command::Status(args) => commands::run::status(&ctx, args).await?,
        Command::Artifacts(args) => commands::artifacts::list(&ctx, args).await?,
        Command::Download(args) => commands::artifacts::download(&ctx, args).await?,
        Command::Serve => commands::serve::execute(&ctx).await?,
    }

    Ok(())
}
