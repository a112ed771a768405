// Session Controller
// One user's submit pipeline: pre-flight checks -> publish -> dispatch -> poll
//
// A session owns the run monitor (and with it the poll task) plus a busy flag
// held while a publish/dispatch is in flight. Dropping the session drops the
// monitor, which aborts the poll task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{DispatchRequest, PublishOutcome, PublishRequest, RepoCredentials, WorkflowRun};
use crate::services::github::GithubApi;
use crate::services::publisher::TaskUploader;
use crate::services::run_monitor::RunMonitor;
use crate::utils::flag_guard::FlagGuard;

/// Task name used when the user gives none
pub fn default_task_name(now: DateTime<Utc>) -> String {
    format!("task-{}", now.timestamp_millis())
}

/// A task the user wants built
#[derive(Clone, Default)]
pub struct TaskSubmission {
    /// Name of the selected file, `None` when nothing was selected
    pub file_name: Option<String>,
    pub archive: Vec<u8>,
    pub task_name: String,
    /// Workflow execution mode, passed through untouched
    pub mode: String,
    pub keep_artifacts: bool,
}

impl TaskSubmission {
    /// Checks done before anything leaves the machine
    pub fn validate(&self) -> AutobuildResult<()> {
        let file_name = match self.file_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(AutobuildError::validation("Please select a task ZIP file")),
        };
        if self.task_name.trim().is_empty() {
            return Err(AutobuildError::validation("Please enter a task name"));
        }
        if !file_name.ends_with(".zip") {
            return Err(AutobuildError::validation("Task file must be a ZIP archive"));
        }
        Ok(())
    }
}

/// Result of a successful submit
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub publish: PublishOutcome,
    pub run: WorkflowRun,
}

pub struct Session<A: GithubApi + ?Sized> {
    repo: RepoCredentials,
    uploader: Arc<dyn TaskUploader>,
    monitor: RunMonitor<A>,
    busy: AtomicBool,
}

impl<A: GithubApi + ?Sized + 'static> Session<A> {
    pub fn new(repo: RepoCredentials, uploader: Arc<dyn TaskUploader>, monitor: RunMonitor<A>) -> Self {
        Self {
            repo,
            uploader,
            monitor,
            busy: AtomicBool::new(false),
        }
    }

    pub fn monitor(&self) -> &RunMonitor<A> {
        &self.monitor
    }

    pub fn repo(&self) -> &RepoCredentials {
        &self.repo
    }

    /// True while a publish/dispatch is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Publish the archive, dispatch the workflow and start polling.
    ///
    /// Fails with `Busy` if another submit is in flight. The busy flag is
    /// released once the run is located, whether or not the steps succeed;
    /// polling continues in the background.
    pub async fn submit(&self, submission: TaskSubmission) -> AutobuildResult<SubmitOutcome> {
        if self.repo.token.trim().is_empty() {
            return Err(AutobuildError::validation(
                "GitHub token not configured. Run `autobuild token set` first",
            ));
        }
        submission.validate()?;

        let Some(_busy) = FlagGuard::try_acquire(&self.busy) else {
            return Err(AutobuildError::Busy);
        };

        log::info!("[session] Step 1/3: uploading task '{}'", submission.task_name.trim());
        let publish = self
            .uploader
            .upload(PublishRequest {
                archive: submission.archive,
                task_name: submission.task_name.trim().to_string(),
                token: self.repo.token.clone(),
                owner: self.repo.owner.clone(),
                repo: self.repo.repo.clone(),
            })
            .await?;

        log::info!("[session] Step 2/3: triggering workflow for {}", publish.release_tag);
        let run = self
            .monitor
            .dispatch(&DispatchRequest {
                mode: submission.mode,
                release_tag: publish.release_tag.clone(),
                keep_artifacts: submission.keep_artifacts,
            })
            .await?;

        log::info!("[session] Step 3/3: monitoring run #{}", run.run_number);
        self.monitor.start_polling()?;

        Ok(SubmitOutcome { publish, run })
    }
}
