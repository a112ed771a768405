// Upload Proxy Server
// HTTP endpoint that publishes task archives on behalf of browser clients
//
// POST {base}/upload   JSON body, see UploadRequestBody
// OPTIONS              200, empty body (CORS preflight)
// anything else        405
//
// CORS allows any origin. Credentials are not advertised: a wildcard origin
// with credentials is rejected by browsers and by tower-http.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::any,
    Router,
};
use tokio::sync::{oneshot, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{UploadErrorBody, UploadRequestBody, UploadSuccessBody};
use crate::services::publisher::TaskUploader;

/// Default path prefix of the proxy routes
pub const DEFAULT_BASE_PATH: &str = "/api";

/// Default request body limit (base64 inflates archives by a third)
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Proxy server shared state
pub struct ProxyState {
    pub uploader: Arc<dyn TaskUploader>,
}

/// Router options
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub base_path: String,
    pub max_body_bytes: usize,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            HeaderName::from_static("accept-version"),
            header::CONTENT_LENGTH,
            HeaderName::from_static("content-md5"),
            header::CONTENT_TYPE,
            header::DATE,
            HeaderName::from_static("x-api-version"),
            header::AUTHORIZATION,
        ])
}

/// Build the proxy router
pub fn build_router(uploader: Arc<dyn TaskUploader>, options: &ProxyOptions) -> Router {
    let state = Arc::new(ProxyState { uploader });

    let api = Router::new()
        .route("/upload", any(handle_upload))
        .with_state(state);

    let base = options.base_path.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router.layer(
        ServiceBuilder::new()
            .layer(cors_layer())
            .layer(DefaultBodyLimit::max(options.max_body_bytes)),
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(UploadErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Handle `{base}/upload` for every method
async fn handle_upload(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    body: Result<Json<UploadRequestBody>, JsonRejection>,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            log::warn!("[upload-proxy] Rejected body: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    let request = match body.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    log::info!(
        "[upload-proxy] Upload for task '{}' ({} bytes) to {}/{}",
        request.task_name,
        request.archive.len(),
        request.owner,
        request.repo
    );

    match state.uploader.upload(request).await {
        Ok(outcome) => (StatusCode::OK, Json(UploadSuccessBody::from(outcome))).into_response(),
        Err(e @ AutobuildError::Validation { .. }) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            log::error!("[upload-proxy] Upload failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Upload Proxy Server Manager
/// Manages the lifecycle of the HTTP server
pub struct ProxyServerManager {
    /// Shutdown signal sender
    shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
    /// Bound address while running
    local_addr: RwLock<Option<SocketAddr>>,
}

impl Default for ProxyServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyServerManager {
    pub fn new() -> Self {
        Self {
            shutdown_tx: RwLock::new(None),
            local_addr: RwLock::new(None),
        }
    }

    /// Bind `addr` and serve `router` in the background.
    ///
    /// Returns the bound address, which differs from `addr` when port 0 was
    /// requested. A running server is stopped first.
    pub async fn start(&self, router: Router, addr: SocketAddr) -> AutobuildResult<SocketAddr> {
        if self.is_running().await {
            self.stop().await;
        }

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            log::error!("[upload-proxy] Failed to bind to {}: {}", addr, e);
            AutobuildError::IoError(e)
        })?;
        let bound = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        *self.shutdown_tx.write().await = Some(shutdown_tx);
        *self.local_addr.write().await = Some(bound);

        tokio::spawn(async move {
            log::info!("[upload-proxy] Server started on http://{}", bound);

            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();

            log::info!("[upload-proxy] Server stopped");
        });

        Ok(bound)
    }

    /// Stop the HTTP server
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
            log::info!("[upload-proxy] Server shutdown requested");
        }
        *self.local_addr.write().await = None;
    }

    pub async fn is_running(&self) -> bool {
        self.local_addr.read().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }
}
