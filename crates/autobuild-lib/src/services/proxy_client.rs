// Upload Proxy Client
// Sends task archives through the upload proxy instead of calling GitHub

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{PublishOutcome, PublishRequest, UploadRequestBody, UploadSuccessBody};
use crate::services::publisher::TaskUploader;

const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Characters of a non-JSON error body kept in the message
const ERROR_SNIPPET_CHARS: usize = 200;

/// Client for `POST {api_base}/upload`
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    api_base: String,
}

impl ProxyClient {
    pub fn new(api_base: impl Into<String>) -> AutobuildResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.api_base)
    }
}

/// Turn a failed proxy response into a message.
///
/// JSON bodies contribute their `error` (or `message`) field; anything else
/// becomes `Upload failed: {status} - {first 200 chars}`.
pub fn proxy_error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .or_else(|| v.get("message").and_then(|m| m.as_str()))
                .map(String::from)
        });

    match from_json {
        Some(message) => message,
        None => {
            let snippet: String = body.chars().take(ERROR_SNIPPET_CHARS).collect();
            format!("Upload failed: {} - {}", status, snippet)
        }
    }
}

#[async_trait]
impl TaskUploader for ProxyClient {
    async fn upload(&self, request: PublishRequest) -> AutobuildResult<PublishOutcome> {
        let url = self.upload_url();
        let body = UploadRequestBody::from_request(&request);

        log::info!(
            "[proxy-client] Uploading task '{}' ({} bytes) via {}",
            request.task_name,
            request.archive.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AutobuildError::ConnectionFailed {
                host: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("[proxy-client] Proxy answered {}: {}", status, text);
            return Err(AutobuildError::Proxy {
                message: proxy_error_message(status.as_u16(), &text),
            });
        }

        let success: UploadSuccessBody = response.json().await?;
        Ok(success.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn test_error_message_prefers_json_error() {
        assert_eq!(
            proxy_error_message(400, r#"{"error":"Missing required fields"}"#),
            "Missing required fields"
        );
        assert_eq!(
            proxy_error_message(500, r#"{"message":"Internal"}"#),
            "Internal"
        );
    }

    #[test]
    fn test_error_message_truncates_plain_text() {
        let body = "x".repeat(500);
        let message = proxy_error_message(502, &body);
        assert_eq!(message, format!("Upload failed: 502 - {}", "x".repeat(200)));
    }

    #[test]
    fn test_error_message_for_json_without_known_fields() {
        assert_eq!(
            proxy_error_message(500, r#"{"detail":"?"}"#),
            r#"Upload failed: 500 - {"detail":"?"}"#
        );
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}/api", addr)
    }

    fn request() -> PublishRequest {
        PublishRequest {
            archive: vec![1, 2, 3],
            task_name: "a".to_string(),
            token: "t".to_string(),
            owner: "o".to_string(),
            repo: "r".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_returns_outcome() {
        let router = Router::new().route(
            "/api/upload",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["file"], "AQID");
                assert_eq!(body["taskName"], "a");
                Json(serde_json::json!({
                    "success": true,
                    "releaseTag": "task-a-1",
                    "releaseUrl": "https://github.com/o/r/releases/tag/task-a-1",
                    "assetUrl": "https://github.com/o/r/releases/download/task-a-1/a.zip"
                }))
            }),
        );
        let client = ProxyClient::new(serve(router).await).unwrap();

        let outcome = client.upload(request()).await.unwrap();
        assert_eq!(outcome.release_tag, "task-a-1");
    }

    #[tokio::test]
    async fn test_upload_error_uses_proxy_message() {
        let router = Router::new().route(
            "/api/upload",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Failed to create release: Bad credentials" })),
                )
            }),
        );
        let client = ProxyClient::new(serve(router).await).unwrap();

        let err = client.upload(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create release: Bad credentials");
    }
}
