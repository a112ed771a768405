// Release Publisher
// Turns an uploaded task archive into a GitHub prerelease with one asset
//
// Steps: validate -> create release -> normalize archive -> upload asset.
// Each remote step is attempted once. A release whose asset upload fails is
// left in place.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AutobuildResult;
use crate::models::{asset_name, release_tag, CreateReleasePayload, PublishOutcome, PublishRequest};
use crate::services::archive;
use crate::services::github::GithubApi;

/// Anything that can take a task archive and return the published release.
///
/// Implemented by [`ReleasePublisher`] (talks to GitHub directly) and by the
/// upload proxy client.
#[async_trait]
pub trait TaskUploader: Send + Sync {
    async fn upload(&self, request: PublishRequest) -> AutobuildResult<PublishOutcome>;
}

/// Publishes task archives as release assets
pub struct ReleasePublisher<A: GithubApi + ?Sized> {
    api: Arc<A>,
}

impl<A: GithubApi + ?Sized> ReleasePublisher<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Publish `request` using the current time for the tag
    pub async fn publish(&self, request: &PublishRequest) -> AutobuildResult<PublishOutcome> {
        self.publish_at(request, Utc::now()).await
    }

    /// Publish `request` as if it happened at `now`.
    ///
    /// Validation happens before any network call. The tag is generated
    /// locally and returned unchanged.
    pub async fn publish_at(
        &self,
        request: &PublishRequest,
        now: DateTime<Utc>,
    ) -> AutobuildResult<PublishOutcome> {
        let repo = request.validate()?;
        let task_name = request.task_name.trim();
        let tag = release_tag(task_name, now.timestamp_millis());

        log::info!(
            "[publisher] Creating release {} on {} ({} bytes)",
            tag,
            repo.slug(),
            request.archive.len()
        );

        let payload = CreateReleasePayload::for_task(&tag, task_name, now);
        let release = self.api.create_release(&repo, &payload).await?;

        let bytes = match archive::normalize(&request.archive) {
            Ok(normalized) => normalized,
            Err(e) => {
                log::warn!(
                    "[publisher] Archive normalization failed, uploading original bytes: {}",
                    e
                );
                request.archive.clone()
            }
        };

        let asset = self
            .api
            .upload_asset(&repo, &release, &asset_name(task_name), bytes)
            .await
            .inspect_err(|e| {
                log::error!(
                    "[publisher] Asset upload failed, release {} left without asset: {}",
                    tag,
                    e
                )
            })?;

        log::info!("[publisher] Published {} as {}", asset.name, tag);

        Ok(PublishOutcome {
            release_tag: tag,
            release_url: release.html_url,
            asset_url: asset.browser_download_url,
        })
    }
}

#[async_trait]
impl<A: GithubApi + ?Sized> TaskUploader for ReleasePublisher<A> {
    async fn upload(&self, request: PublishRequest) -> AutobuildResult<PublishOutcome> {
        self.publish(&request).await
    }
}
