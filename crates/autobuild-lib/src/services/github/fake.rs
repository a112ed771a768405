// In-memory GithubApi used by service tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use super::GithubApi;
use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{
    Artifact, CreateReleasePayload, DispatchPayload, Release, ReleaseAsset, RepoCredentials,
    RunConclusion, RunStatus, WorkflowRun,
};

pub(crate) fn run(id: u64, status: RunStatus, conclusion: Option<RunConclusion>) -> WorkflowRun {
    WorkflowRun {
        id,
        run_number: id,
        status,
        conclusion,
        html_url: format!("https://github.com/o/r/actions/runs/{}", id),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap(),
    }
}

pub(crate) fn artifact(id: u64, name: &str) -> Artifact {
    Artifact {
        id,
        name: name.to_string(),
        size_in_bytes: 2048,
        expires_at: None,
        archive_download_url: String::new(),
        expired: false,
    }
}

/// Scripted GitHub double. Every call is recorded by name.
pub(crate) struct FakeGithub {
    calls: Mutex<Vec<&'static str>>,
    pub release_error: Mutex<Option<String>>,
    pub upload_status: Mutex<Option<u16>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub dispatch_error: Mutex<Option<String>>,
    pub dispatches: Mutex<Vec<DispatchPayload>>,
    pub latest_run: Mutex<Option<WorkflowRun>>,
    /// Responses for successive `get_workflow_run` calls; the last run
    /// returned is repeated once the script is exhausted
    pub run_script: Mutex<VecDeque<Result<WorkflowRun, String>>>,
    last_run: Mutex<Option<WorkflowRun>>,
    pub artifacts: Mutex<Result<Vec<Artifact>, String>>,
    /// When set, `get_workflow_run` waits for a permit before answering
    pub run_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for FakeGithub {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            release_error: Mutex::new(None),
            upload_status: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
            dispatch_error: Mutex::new(None),
            dispatches: Mutex::new(Vec::new()),
            latest_run: Mutex::new(Some(run(1, RunStatus::Queued, None))),
            run_script: Mutex::new(VecDeque::new()),
            last_run: Mutex::new(None),
            artifacts: Mutex::new(Ok(Vec::new())),
            run_gate: Mutex::new(None),
        }
    }
}

impl FakeGithub {
    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn script_runs(&self, runs: Vec<Result<WorkflowRun, String>>) {
        *self.run_script.lock().unwrap() = runs.into();
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn create_release(
        &self,
        repo: &RepoCredentials,
        payload: &CreateReleasePayload,
    ) -> AutobuildResult<Release> {
        self.record("create_release");
        if let Some(message) = self.release_error.lock().unwrap().clone() {
            return Err(AutobuildError::ReleaseCreation { message });
        }
        Ok(Release {
            id: 1,
            tag_name: payload.tag_name.clone(),
            html_url: format!(
                "https://github.com/{}/releases/tag/{}",
                repo.slug(),
                payload.tag_name
            ),
            upload_url: "https://uploads.github.com/assets{?name,label}".to_string(),
        })
    }

    async fn upload_asset(
        &self,
        repo: &RepoCredentials,
        release: &Release,
        name: &str,
        bytes: Vec<u8>,
    ) -> AutobuildResult<ReleaseAsset> {
        self.record("upload_asset");
        if let Some(status) = *self.upload_status.lock().unwrap() {
            return Err(AutobuildError::AssetUpload {
                status,
                reason: "Bad Gateway".to_string(),
                body: "upstream".to_string(),
            });
        }
        let size = bytes.len() as u64;
        self.uploads.lock().unwrap().push((name.to_string(), bytes));
        Ok(ReleaseAsset {
            id: 2,
            name: name.to_string(),
            size,
            browser_download_url: format!(
                "https://github.com/{}/releases/download/{}/{}",
                repo.slug(),
                release.tag_name,
                name
            ),
        })
    }

    async fn dispatch_workflow(
        &self,
        _repo: &RepoCredentials,
        payload: &DispatchPayload,
    ) -> AutobuildResult<()> {
        self.record("dispatch_workflow");
        if let Some(message) = self.dispatch_error.lock().unwrap().clone() {
            return Err(AutobuildError::Dispatch { message });
        }
        self.dispatches.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn latest_workflow_run(
        &self,
        _repo: &RepoCredentials,
    ) -> AutobuildResult<Option<WorkflowRun>> {
        self.record("latest_workflow_run");
        Ok(self.latest_run.lock().unwrap().clone())
    }

    async fn get_workflow_run(
        &self,
        _repo: &RepoCredentials,
        run_id: u64,
    ) -> AutobuildResult<WorkflowRun> {
        self.record("get_workflow_run");

        let gate = self.run_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let next = self.run_script.lock().unwrap().pop_front();
        match next {
            Some(Ok(run)) => {
                *self.last_run.lock().unwrap() = Some(run.clone());
                Ok(run)
            }
            Some(Err(message)) => Err(AutobuildError::RunLookup { message }),
            None => self
                .last_run
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AutobuildError::RunLookup {
                    message: format!("run {} not scripted", run_id),
                }),
        }
    }

    async fn list_artifacts(
        &self,
        _repo: &RepoCredentials,
        _run_id: u64,
    ) -> AutobuildResult<Vec<Artifact>> {
        self.record("list_artifacts");
        self.artifacts
            .lock()
            .unwrap()
            .clone()
            .map_err(|message| AutobuildError::ArtifactList { message })
    }

    async fn download_artifact(
        &self,
        _repo: &RepoCredentials,
        _artifact_id: u64,
    ) -> AutobuildResult<Vec<u8>> {
        self.record("download_artifact");
        Ok(b"PK\x05\x06".to_vec())
    }
}
