// GitHub Service Module
//
// This module provides:
// - GithubApi trait: the slice of the GitHub REST API autobuild consumes
// - GithubClient: reqwest implementation of that trait

pub mod api;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

pub use api::{asset_upload_url, GithubClient, DEFAULT_API_BASE};

use crate::error::AutobuildResult;
use crate::models::{
    Artifact, CreateReleasePayload, DispatchPayload, Release, ReleaseAsset, RepoCredentials,
    WorkflowRun,
};

/// Remote operations used by the publisher and the run monitor.
///
/// Every call is a single attempt; errors carry the host's message.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Create a release; fails with `ReleaseCreation`
    async fn create_release(
        &self,
        repo: &RepoCredentials,
        payload: &CreateReleasePayload,
    ) -> AutobuildResult<Release>;

    /// Upload `bytes` as asset `name` of `release`; fails with `AssetUpload`
    async fn upload_asset(
        &self,
        repo: &RepoCredentials,
        release: &Release,
        name: &str,
        bytes: Vec<u8>,
    ) -> AutobuildResult<ReleaseAsset>;

    /// Trigger the configured workflow; fails with `Dispatch`
    async fn dispatch_workflow(
        &self,
        repo: &RepoCredentials,
        payload: &DispatchPayload,
    ) -> AutobuildResult<()>;

    /// Most recent run of the configured workflow, if any; fails with `RunLookup`
    async fn latest_workflow_run(&self, repo: &RepoCredentials)
        -> AutobuildResult<Option<WorkflowRun>>;

    /// Fetch one run by id; fails with `RunLookup`
    async fn get_workflow_run(
        &self,
        repo: &RepoCredentials,
        run_id: u64,
    ) -> AutobuildResult<WorkflowRun>;

    /// Artifacts of a run; an empty list is not an error. Fails with `ArtifactList`
    async fn list_artifacts(
        &self,
        repo: &RepoCredentials,
        run_id: u64,
    ) -> AutobuildResult<Vec<Artifact>>;

    /// ZIP bytes of one artifact; fails with `ArtifactDownload`
    async fn download_artifact(
        &self,
        repo: &RepoCredentials,
        artifact_id: u64,
    ) -> AutobuildResult<Vec<u8>>;
}
