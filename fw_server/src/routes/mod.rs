//! HTTP routes — webhook, OTA check, coredump upload, artifact serving.

pub mod webhook;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::AsyncPgConnection;

use crate::config::FwConfig;
use crate::error::ApiError;
use crate::services::ingest::IngestionTask;
use crate::services::manifest;
use crate::services::ota_service::{self, OtaOutcome, DEFAULT_VARIANT};
use crate::services::queue::WorkQueue;
use crate::services::storage::{self, ArtifactStore};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<AsyncPgConnection>,
    pub config: FwConfig,
    pub store: Arc<dyn ArtifactStore>,
    pub queue: WorkQueue<IngestionTask>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ota_check_handler))
        .route("/webhook/github", post(webhook_handler))
        .route("/coredump", post(coredump_handler))
        .route(
            "/firmware/{project}/{variant}/{version}/{filename}",
            get(artifact_handler),
        )
        .with_state(state)
}

// ── Webhook ──

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<webhook::WebhookSummary>, ApiError> {
    webhook::handle_webhook(&state, &headers, body).await.map(Json)
}

// ── OTA check ──

/// Response envelope for the device update check.
#[derive(Debug, Serialize)]
pub struct OtaCheckResponse {
    pub error: bool,
    pub update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ota_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

async fn ota_check_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<OtaCheckResponse>) {
    match ota_check(&state, &headers).await {
        Ok(OtaOutcome::UpToDate) => {
            crate::metrics::ota_check("up_to_date");
            (
                StatusCode::OK,
                Json(OtaCheckResponse {
                    error: false,
                    update_available: false,
                    ota_url: None,
                    error_message: None,
                }),
            )
        }
        Ok(OtaOutcome::UpdateAvailable { ota_url }) => {
            crate::metrics::ota_check("update_available");
            (
                StatusCode::OK,
                Json(OtaCheckResponse {
                    error: false,
                    update_available: true,
                    ota_url: Some(ota_url),
                    error_message: None,
                }),
            )
        }
        Err(err) => {
            crate::metrics::ota_check("error");
            (
                err.status(),
                Json(OtaCheckResponse {
                    error: true,
                    update_available: false,
                    ota_url: None,
                    error_message: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn ota_check(state: &AppState, headers: &HeaderMap) -> Result<OtaOutcome, ApiError> {
    let project = required_header(headers, "x-firmware-project")?;
    let version = required_header(headers, "x-firmware-version")?;
    let variant = headers
        .get("x-firmware-variant")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VARIANT)
        .to_string();

    let mut conn = state
        .pool
        .get()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    ota_service::resolve(
        &mut conn,
        state.store.as_ref(),
        &state.config,
        &project,
        &version,
        &variant,
    )
    .await
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| ApiError::Validation(format!("missing {name} header")))
}

// ── Coredump ──

#[derive(Debug, Deserialize)]
pub struct CoredumpRequest {
    pub project: String,
    pub variant: String,
    pub version: String,
    pub coredump: String,
}

#[derive(Debug, Serialize)]
pub struct CrashInfoJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pc: Option<String>,
    pub registers: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CoredumpResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_info: Option<CrashInfoJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elf_download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decode an uploaded crash dump. Decode failures answer
/// `success: false` with a message; they are data problems, not request
/// problems.
async fn coredump_handler(
    State(state): State<AppState>,
    Json(req): Json<CoredumpRequest>,
) -> Json<CoredumpResponse> {
    match coredump::decode_base64(&req.coredump) {
        Ok(report) => {
            crate::metrics::coredump_decoded("ok");

            let registers = report
                .registers
                .iter()
                .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
                .collect();

            let elf_name = format!("{}.elf", req.variant);
            let elf_key =
                storage::object_key(&req.project, &req.variant, &req.version, &elf_name);
            let elf_download_url = match state.store.exists(&elf_key).await {
                Ok(true) => Some(format!(
                    "{}{elf_name}",
                    state
                        .config
                        .release_base_url(&req.project, &req.variant, &req.version)
                )),
                _ => None,
            };

            Json(CoredumpResponse {
                success: true,
                crash_info: Some(CrashInfoJson {
                    exception_cause: report.exception_cause,
                    pc: report.pc,
                    registers,
                }),
                backtrace: Some(report.backtrace),
                elf_download_url,
                error: None,
            })
        }
        Err(e) => {
            crate::metrics::coredump_decoded("error");
            Json(CoredumpResponse {
                success: false,
                crash_info: None,
                backtrace: None,
                elf_download_url: None,
                error: Some(e.to_string()),
            })
        }
    }
}

// ── Firmware artifacts ──

async fn artifact_handler(
    State(state): State<AppState>,
    Path((project, variant, version, filename)): Path<(String, String, String, String)>,
) -> Result<Response, ApiError> {
    for segment in [&project, &variant, &version, &filename] {
        if segment.contains("..") || segment.contains('/') || segment.contains('\\') {
            return Err(ApiError::Validation("invalid path segment".to_string()));
        }
    }

    let key = storage::object_key(&project, &variant, &version, &filename);
    let bytes = state
        .store
        .get(&key)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("no such artifact: {key}")))?;

    // The canonical manifest stores relative part paths; serving rewrites
    // them against the public base URL without touching the stored copy.
    if filename == "manifest.json" {
        let document = manifest::parse(&bytes).map_err(|e| ApiError::Internal(e.to_string()))?;
        let base = state.config.release_base_url(&project, &variant, &version);
        let served = manifest::rewrite_download_urls(&document, &base);
        return Ok(Json(served).into_response());
    }

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
