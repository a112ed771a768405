// GitHub API Operations
// reqwest implementation of GithubApi

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::GithubApi;
use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{
    Artifact, ArtifactList, CreateReleasePayload, DispatchPayload, Release, ReleaseAsset,
    RepoCredentials, WorkflowRun, WorkflowRunList,
};

/// GitHub API base URL
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Media type requested on every call
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Content type of uploaded task archives
pub const ASSET_CONTENT_TYPE: &str = "application/zip";

/// Upper bound for a single request, uploads included
const REQUEST_TIMEOUT_SECS: u64 = 300;

const USER_AGENT: &str = concat!("autobuild/", env!("CARGO_PKG_VERSION"));

/// Build the asset upload URL from a release's `upload_url` template.
///
/// GitHub returns `https://uploads.github.com/.../assets{?name,label}`; the
/// template part is replaced with `?name={name}`.
pub fn asset_upload_url(upload_url_template: &str, name: &str) -> String {
    let base = upload_url_template
        .split('{')
        .next()
        .unwrap_or(upload_url_template);
    format!("{}?name={}", base, urlencoding::encode(name))
}

fn connection_error(e: reqwest::Error) -> AutobuildError {
    AutobuildError::ConnectionFailed {
        host: "GitHub".to_string(),
        message: e.to_string(),
    }
}

/// Status and message of a failed response.
///
/// Uses GitHub's JSON `message` when present, otherwise the raw body, and
/// falls back to the reason phrase for empty bodies.
async fn host_error(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or(text);

    if message.trim().is_empty() {
        let reason = status.canonical_reason().unwrap_or("Unknown error");
        (status, reason.to_string())
    } else {
        (status, message)
    }
}

/// GitHub REST client bound to one workflow definition
#[derive(Clone)]
pub struct GithubClient {
    /// HTTP client
    client: Client,
    /// API root, e.g. `https://api.github.com`
    api_base: String,
    /// Workflow file name, e.g. `autobuild-v2.yml`
    workflow_file: String,
}

impl GithubClient {
    pub fn new(
        api_base: impl Into<String>,
        workflow_file: impl Into<String>,
    ) -> AutobuildResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            workflow_file: workflow_file.into(),
        })
    }

    pub fn workflow_file(&self) -> &str {
        &self.workflow_file
    }

    fn repo_url(&self, repo: &RepoCredentials, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, repo.owner, repo.repo, path)
    }

    fn workflow_url(&self, repo: &RepoCredentials, path: &str) -> String {
        self.repo_url(
            repo,
            &format!("/actions/workflows/{}{}", self.workflow_file, path),
        )
    }

    fn authorized(&self, builder: RequestBuilder, repo: &RepoCredentials) -> RequestBuilder {
        builder
            .bearer_auth(&repo.token)
            .header(ACCEPT, GITHUB_ACCEPT)
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn create_release(
        &self,
        repo: &RepoCredentials,
        payload: &CreateReleasePayload,
    ) -> AutobuildResult<Release> {
        let url = self.repo_url(repo, "/releases");

        let response = self
            .authorized(self.client.post(&url), repo)
            .json(payload)
            .send()
            .await
            .map_err(connection_error)?;

        if !response.status().is_success() {
            let (_, message) = host_error(response).await;
            return Err(AutobuildError::ReleaseCreation { message });
        }

        response
            .json::<Release>()
            .await
            .map_err(|e| AutobuildError::ReleaseCreation {
                message: format!("Failed to parse release response: {}", e),
            })
    }

    async fn upload_asset(
        &self,
        repo: &RepoCredentials,
        release: &Release,
        name: &str,
        bytes: Vec<u8>,
    ) -> AutobuildResult<ReleaseAsset> {
        let url = asset_upload_url(&release.upload_url, name);
        log::info!("[github] Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .authorized(self.client.post(&url), repo)
            .header(CONTENT_TYPE, ASSET_CONTENT_TYPE)
            .body(bytes)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutobuildError::AssetUpload {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        response
            .json::<ReleaseAsset>()
            .await
            .map_err(|e| AutobuildError::AssetUpload {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: format!("Failed to parse asset response: {}", e),
            })
    }

    async fn dispatch_workflow(
        &self,
        repo: &RepoCredentials,
        payload: &DispatchPayload,
    ) -> AutobuildResult<()> {
        let url = self.workflow_url(repo, "/dispatches");

        let response = self
            .authorized(self.client.post(&url), repo)
            .json(payload)
            .send()
            .await
            .map_err(connection_error)?;

        if !response.status().is_success() {
            let (_, message) = host_error(response).await;
            return Err(AutobuildError::Dispatch { message });
        }

        Ok(())
    }

    async fn latest_workflow_run(
        &self,
        repo: &RepoCredentials,
    ) -> AutobuildResult<Option<WorkflowRun>> {
        let url = self.workflow_url(repo, "/runs");

        let response = self
            .authorized(self.client.get(&url), repo)
            .query(&[("per_page", "1")])
            .send()
            .await
            .map_err(connection_error)?;

        if !response.status().is_success() {
            let (_, message) = host_error(response).await;
            return Err(AutobuildError::RunLookup { message });
        }

        let list: WorkflowRunList =
            response
                .json()
                .await
                .map_err(|e| AutobuildError::RunLookup {
                    message: format!("Failed to parse workflow runs: {}", e),
                })?;

        Ok(list.workflow_runs.into_iter().next())
    }

    async fn get_workflow_run(
        &self,
        repo: &RepoCredentials,
        run_id: u64,
    ) -> AutobuildResult<WorkflowRun> {
        let url = self.repo_url(repo, &format!("/actions/runs/{}", run_id));

        let response = self
            .authorized(self.client.get(&url), repo)
            .send()
            .await
            .map_err(connection_error)?;

        if !response.status().is_success() {
            let (_, message) = host_error(response).await;
            return Err(AutobuildError::RunLookup { message });
        }

        response
            .json::<WorkflowRun>()
            .await
            .map_err(|e| AutobuildError::RunLookup {
                message: format!("Failed to parse workflow run: {}", e),
            })
    }

    async fn list_artifacts(
        &self,
        repo: &RepoCredentials,
        run_id: u64,
    ) -> AutobuildResult<Vec<Artifact>> {
        let url = self.repo_url(repo, &format!("/actions/runs/{}/artifacts", run_id));

        let response = self
            .authorized(self.client.get(&url), repo)
            .send()
            .await
            .map_err(|e| AutobuildError::ArtifactList {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let (_, message) = host_error(response).await;
            return Err(AutobuildError::ArtifactList { message });
        }

        let list: ArtifactList =
            response
                .json()
                .await
                .map_err(|e| AutobuildError::ArtifactList {
                    message: format!("Failed to parse artifacts: {}", e),
                })?;

        Ok(list.artifacts)
    }

    async fn download_artifact(
        &self,
        repo: &RepoCredentials,
        artifact_id: u64,
    ) -> AutobuildResult<Vec<u8>> {
        let url = self.repo_url(repo, &format!("/actions/artifacts/{}/zip", artifact_id));

        let response = self
            .authorized(self.client.get(&url), repo)
            .send()
            .await
            .map_err(connection_error)?;

        if !response.status().is_success() {
            return Err(AutobuildError::ArtifactDownload {
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
