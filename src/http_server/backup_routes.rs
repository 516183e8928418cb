//! Backup HTTP Routes
//!
//! Endpoints for backup configuration, creation, listing, verification and
//! restore. Mounted under `/api` by the server.
//!
//! | Method | Path                           | Handler                  |
//! |--------|--------------------------------|--------------------------|
//! | GET    | `/backup/config`               | [`get_config_handler`]   |
//! | PUT    | `/backup/config`               | [`update_config_handler`]|
//! | POST   | `/backup/:backend`             | [`create_backup_handler`]|
//! | GET    | `/backup/list/:backend`        | [`list_backups_handler`] |
//! | POST   | `/backup/verify/:backend`      | [`verify_backup_handler`]|
//! | POST   | `/restore/:backend`            | [`restore_backup_handler`]|

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::backup::{BackupEngine, BackupError, BackupFileInfo, VerificationResult};
use crate::config::{BackupConfig, BackupConfigUpdate};
use crate::remote::BackendKind;

// ==================
// Shared State
// ==================

/// Backup state shared across handlers
#[derive(Debug, Clone)]
pub struct BackupState {
    engine: Arc<BackupEngine>,
}

impl BackupState {
    pub fn new(engine: Arc<BackupEngine>) -> Self {
        Self { engine }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct FilenameRequest {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub message: String,
    pub file: String,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub message: String,
    pub warning: String,
    pub restart_required: bool,
    pub safety_snapshot: String,
}

#[derive(Debug, Serialize)]
pub struct BackupsListResponse {
    pub backups: Vec<BackupFileInfo>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: u16, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse {
            error: message.into(),
            code: status,
        }),
    )
}

impl From<BackupError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: BackupError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!(code = err.code(), error = %err, "backup request failed");
        } else {
            warn!(code = err.code(), error = %err, "backup request rejected");
        }
        error_response(status, err.to_string())
    }
}

fn parse_backend(raw: &str) -> Result<BackendKind, (StatusCode, Json<ErrorResponse>)> {
    raw.parse::<BackendKind>().map_err(Into::into)
}

fn invalid_body(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %rejection.body_text(), "malformed request body");
    error_response(400, "invalid request")
}

// ==================
// Routes
// ==================

/// Create backup routes
pub fn backup_routes(state: Arc<BackupState>) -> Router {
    Router::new()
        .route(
            "/backup/config",
            get(get_config_handler).put(update_config_handler),
        )
        .route("/backup/list/:backend", get(list_backups_handler))
        .route("/backup/verify/:backend", post(verify_backup_handler))
        .route("/backup/:backend", post(create_backup_handler))
        .route("/restore/:backend", post(restore_backup_handler))
        .with_state(state)
}

// ==================
// Handlers
// ==================

/// GET /backup/config
pub async fn get_config_handler(State(state): State<Arc<BackupState>>) -> ApiResult<BackupConfig> {
    Ok(Json(state.engine.config().await?))
}

/// PUT /backup/config
///
/// Partial update: absent fields keep their stored value.
pub async fn update_config_handler(
    State(state): State<Arc<BackupState>>,
    body: Result<Json<BackupConfigUpdate>, JsonRejection>,
) -> ApiResult<BackupConfig> {
    let Json(update) = body.map_err(invalid_body)?;
    Ok(Json(state.engine.update_config(update).await?))
}

/// POST /backup/:backend
pub async fn create_backup_handler(
    State(state): State<Arc<BackupState>>,
    Path(backend): Path<String>,
) -> ApiResult<BackupResponse> {
    let kind = parse_backend(&backend)?;
    let outcome = state.engine.backup(kind).await?;

    Ok(Json(BackupResponse {
        message: "backup successful".to_string(),
        file: outcome.file,
    }))
}

/// GET /backup/list/:backend
pub async fn list_backups_handler(
    State(state): State<Arc<BackupState>>,
    Path(backend): Path<String>,
) -> ApiResult<BackupsListResponse> {
    let kind = parse_backend(&backend)?;
    let backups = state.engine.list(kind).await?;
    Ok(Json(BackupsListResponse { backups }))
}

/// POST /backup/verify/:backend
pub async fn verify_backup_handler(
    State(state): State<Arc<BackupState>>,
    Path(backend): Path<String>,
    body: Result<Json<FilenameRequest>, JsonRejection>,
) -> ApiResult<VerificationResult> {
    let kind = parse_backend(&backend)?;
    let Json(request) = body.map_err(invalid_body)?;
    Ok(Json(state.engine.verify(kind, &request.filename).await?))
}

/// POST /restore/:backend
pub async fn restore_backup_handler(
    State(state): State<Arc<BackupState>>,
    Path(backend): Path<String>,
    body: Result<Json<FilenameRequest>, JsonRejection>,
) -> ApiResult<RestoreResponse> {
    let kind = parse_backend(&backend)?;
    let Json(request) = body.map_err(invalid_body)?;
    let outcome = state.engine.restore(kind, &request.filename).await?;

    Ok(Json(RestoreResponse {
        message: "restore successful".to_string(),
        warning: outcome.warning,
        restart_required: outcome.restart_required,
        safety_snapshot: outcome.safety_snapshot,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, CheckpointResult};
    use crate::config::MemoryConfigStore;
    use crate::file_store::{FileStore, MemoryFileStore};
    use crate::remote::RemoteBackends;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct NoopCheckpoint;

    impl Checkpoint for NoopCheckpoint {
        fn checkpoint(&self) -> CheckpointResult<()> {
            Ok(())
        }
    }

    fn router(config: BackupConfig) -> Router {
        let store = MemoryFileStore::new();
        store
            .write(std::path::Path::new("smarticky.db"), b"db")
            .unwrap();
        let engine = BackupEngine::new(
            Arc::new(store),
            Arc::new(NoopCheckpoint),
            Arc::new(MemoryConfigStore::with(config)),
            Arc::new(RemoteBackends::new(Duration::from_secs(5)).unwrap()),
        );
        backup_routes(Arc::new(BackupState::new(Arc::new(engine))))
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_get_config_returns_defaults() {
        let (status, json) = send(router(BackupConfig::default()), "GET", "/backup/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["backup_schedule"], "daily");
        assert_eq!(json["auto_backup_enabled"], false);
    }

    #[tokio::test]
    async fn test_update_config_merges_fields() {
        let router = router(BackupConfig::default());
        let (status, json) = send(
            router.clone(),
            "PUT",
            "/backup/config",
            Some(r#"{"webdav_url":"https://dav.example.com","backup_schedule":"weekly"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["webdav_url"], "https://dav.example.com");
        assert_eq!(json["backup_schedule"], "weekly");

        let (_, json) = send(router, "GET", "/backup/config", None).await;
        assert_eq!(json["webdav_url"], "https://dav.example.com");
    }

    #[tokio::test]
    async fn test_update_config_rejects_bad_schedule() {
        let (status, json) = send(
            router(BackupConfig::default()),
            "PUT",
            "/backup/config",
            Some(r#"{"backup_schedule":"hourly"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], 400);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (status, json) =
            send(router(BackupConfig::default()), "PUT", "/backup/config", Some("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid request");
    }

    #[tokio::test]
    async fn test_unknown_backend_rejected() {
        let (status, json) = send(router(BackupConfig::default()), "POST", "/backup/ftp", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "unsupported backend: ftp");
    }

    #[tokio::test]
    async fn test_unconfigured_backup_rejected() {
        let (status, json) =
            send(router(BackupConfig::default()), "POST", "/backup/webdav", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "WebDAV URL not configured");

        let (status, json) = send(router(BackupConfig::default()), "POST", "/backup/s3", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "S3 configuration incomplete");
    }

    #[tokio::test]
    async fn test_restore_requires_filename() {
        let (status, json) = send(
            router(BackupConfig::default()),
            "POST",
            "/restore/webdav",
            Some(r#"{"filename":""}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "filename is required");
    }

    #[tokio::test]
    async fn test_list_unconfigured_backend() {
        let (status, json) =
            send(router(BackupConfig::default()), "GET", "/backup/list/s3", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "S3 not configured");
    }

    #[tokio::test]
    async fn test_backup_to_webdav_returns_file_name() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("PUT", mockito::Matcher::Regex(r"^/smarticky_backup_\d{8}_\d{6}\.tar\.gz$".into()))
            .with_status(201)
            .create_async()
            .await;

        let config = BackupConfig {
            webdav_url: server.url(),
            ..Default::default()
        };
        let (status, json) = send(router(config), "POST", "/backup/webdav", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "backup successful");
        assert!(json["file"]
            .as_str()
            .unwrap()
            .starts_with("smarticky_backup_"));
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_missing_remote_file_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/smarticky_backup_20260314_020000.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let config = BackupConfig {
            webdav_url: server.url(),
            ..Default::default()
        };
        let (status, json) = send(
            router(config),
            "POST",
            "/backup/verify/webdav",
            Some(r#"{"filename":"smarticky_backup_20260314_020000.tar.gz"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], 404);
    }
}
