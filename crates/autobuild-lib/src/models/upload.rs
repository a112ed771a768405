// Upload proxy wire models
// JSON bodies exchanged between the CLI and the upload proxy

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use super::release::{PublishOutcome, PublishRequest};
use crate::error::{AutobuildError, AutobuildResult};

/// `POST {base}/upload` request body.
///
/// Every field is optional on the wire so that a missing field yields the
/// proxy's own 400 response instead of a deserializer rejection.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequestBody {
    /// Base64 encoded ZIP archive
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
}

impl UploadRequestBody {
    /// Encode a publish request for the proxy
    pub fn from_request(request: &PublishRequest) -> Self {
        Self {
            file: Some(BASE64.encode(&request.archive)),
            task_name: Some(request.task_name.clone()),
            token: Some(request.token.clone()),
            owner: Some(request.owner.clone()),
            repo: Some(request.repo.clone()),
        }
    }

    /// Decode into a publish request. Missing fields become empty values and
    /// are rejected later by [`PublishRequest::validate`].
    pub fn into_request(self) -> AutobuildResult<PublishRequest> {
        let archive = match self.file.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => BASE64
                .decode(encoded)
                .map_err(|e| AutobuildError::validation(format!("Invalid base64 file: {}", e)))?,
            _ => Vec::new(),
        };

        Ok(PublishRequest {
            archive,
            task_name: self.task_name.unwrap_or_default(),
            token: self.token.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            repo: self.repo.unwrap_or_default(),
        })
    }
}

/// Successful proxy response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadSuccessBody {
    pub success: bool,
    pub release_tag: String,
    pub release_url: String,
    pub asset_url: String,
}

impl From<PublishOutcome> for UploadSuccessBody {
    fn from(outcome: PublishOutcome) -> Self {
        Self {
            success: true,
            release_tag: outcome.release_tag,
            release_url: outcome.release_url,
            asset_url: outcome.asset_url,
        }
    }
}

impl From<UploadSuccessBody> for PublishOutcome {
    fn from(body: UploadSuccessBody) -> Self {
        Self {
            release_tag: body.release_tag,
            release_url: body.release_url,
            asset_url: body.asset_url,
        }
    }
}

/// Error body returned by the proxy for any failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadErrorBody {
    pub error: String,
}
