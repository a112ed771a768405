// Release publishing models
// Request/outcome of a publish call and the GitHub release payloads it uses

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::repo::RepoCredentials;
use crate::error::{AutobuildError, AutobuildResult};

/// Generate the release tag for a task.
///
/// Literal concatenation `task-{task_name}-{epoch_millis}`; uniqueness relies
/// on the millisecond timestamp and is not checked against GitHub.
pub fn release_tag(task_name: &str, epoch_millis: i64) -> String {
    format!("task-{}-{}", task_name, epoch_millis)
}

/// Asset file name for a task archive
pub fn asset_name(task_name: &str) -> String {
    format!("{}.zip", task_name)
}

/// Everything needed to publish one task archive
#[derive(Clone, Default)]
pub struct PublishRequest {
    /// Raw ZIP bytes as uploaded by the client
    pub archive: Vec<u8>,
    pub task_name: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
}

impl PublishRequest {
    /// Check that every required field is present.
    ///
    /// Blank strings count as missing, matching the proxy's
    /// "Missing required fields" contract.
    pub fn validate(&self) -> AutobuildResult<RepoCredentials> {
        let missing = self.archive.is_empty()
            || self.task_name.trim().is_empty()
            || self.token.trim().is_empty()
            || self.owner.trim().is_empty()
            || self.repo.trim().is_empty();

        if missing {
            return Err(AutobuildError::validation("Missing required fields"));
        }

        Ok(RepoCredentials::new(
            self.owner.trim(),
            self.repo.trim(),
            self.token.trim(),
        ))
    }
}

impl std::fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishRequest")
            .field("archive_len", &self.archive.len())
            .field("task_name", &self.task_name)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub release_tag: String,
    pub release_url: String,
    pub asset_url: String,
}

/// Body of `POST /repos/{owner}/{repo}/releases`
#[derive(Debug, Clone, Serialize)]
pub struct CreateReleasePayload {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl CreateReleasePayload {
    /// Prerelease record for a task upload created at `created_at`
    pub fn for_task(tag: &str, task_name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            tag_name: tag.to_string(),
            name: format!("Task: {}", task_name),
            body: format!(
                "Autobuild task upload - {}",
                created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            draft: false,
            prerelease: true,
        }
    }
}

/// Release as returned by GitHub
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub html_url: String,
    /// URI template, e.g. `https://uploads.github.com/.../assets{?name,label}`
    pub upload_url: String,
}

/// Release asset as returned by GitHub
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
}
