// CLI commands

pub mod artifacts;
pub mod run;
pub mod serve;
pub mod token;

use std::sync::Arc;

use autobuild_lib::models::RepoCredentials;
use autobuild_lib::services::{GithubApi, GithubClient, MonitorState, RunMonitor};
use autobuild_lib::utils::{AppConfig, CredentialStore};
use autobuild_lib::{AutobuildError, AutobuildResult};

use crate::render::render_state;

/// Everything a command needs, built once in main
pub struct Context {
    pub config: AppConfig,
    pub store: CredentialStore,
}

impl Context {
    /// Configured repository with the stored token (empty when none is stored)
    pub fn repo(&self) -> AutobuildResult<RepoCredentials> {
        let token = self.store.token()?.unwrap_or_default();
        Ok(RepoCredentials::new(
            self.config.owner.clone(),
            self.config.repo.clone(),
            token,
        ))
    }

    /// Like [`Context::repo`] but fails when no token is stored
    pub fn authorized_repo(&self) -> AutobuildResult<RepoCredentials> {
        let repo = self.repo()?;
        if repo.token.is_empty() {
            return Err(AutobuildError::validation(
                "GitHub token not configured. Run `autobuild token set` first",
            ));
        }
        Ok(repo)
    }

    pub fn github(&self) -> AutobuildResult<Arc<GithubClient>> {
        Ok(Arc::new(GithubClient::new(
            self.config.github_api_url.clone(),
            self.config.workflow_file.clone(),
        )?))
    }
}

/// Print every distinct state until the run completes or Ctrl-C is pressed
pub async fn follow<A: GithubApi + ?Sized + 'static>(monitor: &RunMonitor<A>) -> MonitorState {
    let mut rx = monitor.subscribe();
    let mut last_printed = String::new();

    loop {
        let state = rx.borrow_and_update().clone();
        let text = render_state(&state);
        if text != last_printed {
            println!("{}\n", text);
            last_printed = text;
        }
        if state.is_terminal() {
            return state;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return monitor.state();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                monitor.stop_polling();
                println!("Stopped watching. The workflow keeps running on GitHub.");
                return monitor.state();
            }
        }
    }
}
