/**
 * API REST WAKEHUB - Serveur HTTP du registre d'appareils
 *
 * RÔLE :
 * Adaptateur mince entre le monde HTTP et le store / moteur WOL / journal.
 * Aucune règle métier ici : validation et invariants vivent dans le store.
 *
 * FONCTIONNEMENT :
 * - Routes : /health, /api/devices (CRUD + reorder), /api/wake, /api/ping, /api/logs
 * - Erreurs du store traduites en status via StoreError::kind()
 *   (400 validation, 409 conflit, 404 absent, 500 persistance)
 * - Tout ce qui touche le disque ou le réseau en bloquant (store, journal, réveil
 *   ~400 ms) tourne dans spawn_blocking
 * - Ajout / modif / suppression / réveil tracés dans le journal
 */

use crate::models::Device;
use crate::ping;
use crate::state::AppState;
use crate::store::{ErrorKind, StoreError};
use crate::wol::{DeviceWake, WolError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LOG_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Wake(#[from] WolError),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Wake(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "[http] request failed");
        }
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/devices", get(list_devices).post(add_device))
        .route("/api/devices/reorder", post(reorder_devices))
        .route("/api/devices/{name}", get(get_device).put(update_device).delete(delete_device))
        .route("/api/wake/{name}", post(wake))
        .route("/api/ping/{name}", get(ping_device))
        .route("/api/logs", get(get_logs))
        .with_state(app_state)
}

// GET /api/devices
async fn list_devices(State(app): State<AppState>) -> Json<Vec<Device>> {
    Json(app.store.get_all())
}

// GET /api/devices/{name}
async fn get_device(State(app): State<AppState>, Path(name): Path<String>) -> Result<Json<Device>, ApiError> {
    app.store.get_device(&name).map(Json).ok_or(ApiError::NotFound(name))
}

/// Store et journal font de l'I/O disque synchrone (fsync) : hors du runtime async.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}

// POST /api/devices
async fn add_device(
    State(app): State<AppState>,
    payload: Result<Json<Device>, JsonRejection>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let Json(device) = payload?;
    let stored = blocking(move || {
        let stored = app.store.add_device(device)?;
        app.journal.info(&stored.name, "Device added");
        Ok(stored)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// PUT /api/devices/{name}
async fn update_device(
    State(app): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<Device>, JsonRejection>,
) -> Result<Json<Device>, ApiError> {
    let Json(device) = payload?;
    let stored = blocking(move || {
        let stored = app.store.update_device(&name, device)?;
        if stored.name == name {
            app.journal.info(&stored.name, "Device updated");
        } else {
            app.journal.info(&stored.name, format!("Device updated (renamed from {name})"));
        }
        Ok(stored)
    })
    .await?;
    Ok(Json(stored))
}

// DELETE /api/devices/{name}
async fn delete_device(State(app): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    blocking(move || {
        app.store.delete_device(&name)?;
        app.journal.info(&name, "Device deleted");
        Ok(())
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/devices/reorder  (corps : liste complète des noms)
async fn reorder_devices(
    State(app): State<AppState>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(names) = payload?;
    blocking(move || Ok(app.store.reorder_devices(&names)?)).await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/wake/{name}  (envoi bloquant ~400 ms)
async fn wake(State(app): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    let device = app.store.get_device(&name).ok_or_else(|| ApiError::NotFound(name.clone()))?;
    let body = blocking(move || wake_and_journal(&app, &name, &device)).await?;
    Ok(Json(body))
}

fn wake_and_journal(app: &AppState, name: &str, device: &Device) -> Result<Value, ApiError> {
    match app.engine.wake_device(device) {
        DeviceWake::Single(Ok(report)) => {
            app.journal.info(name, "Wake-on-LAN packet sent");
            Ok(json!({
                "ok": true,
                "msg": format!("magic packet sent to {name}"),
                "delivered": report.delivered(),
                "failed": report.failed(),
            }))
        }
        DeviceWake::Single(Err(e)) => {
            app.journal.error(name, format!("Failed to send WOL packet: {e}"));
            Err(ApiError::Wake(e))
        }
        DeviceWake::Group(group) => {
            for (member, err) in group.errors() {
                app.journal.error(name, format!("Sub-device {} ({}) wake failed: {err}", member.index + 1, member.mac));
            }
            let (succeeded, failed) = (group.succeeded(), group.failed());
            let msg = format!("group {name}: {succeeded} succeeded, {failed} failed");
            if failed == 0 {
                app.journal.info(name, format!("Group wake sent to {succeeded} sub-devices"));
            } else {
                app.journal.error(name, format!("Group wake partially failed: {succeeded} succeeded, {failed} failed"));
            }
            Ok(json!({ "ok": failed == 0, "msg": msg, "succeeded": succeeded, "failed": failed }))
        }
    }
}

// GET /api/ping/{name}
async fn ping_device(State(app): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>, ApiError> {
    let device = app.store.get_device(&name).ok_or_else(|| ApiError::NotFound(name.clone()))?;
    if !device.is_group() && device.ip.is_empty() {
        return Err(ApiError::BadRequest(format!("device {name} has no IP address")));
    }
    let online = ping::device_online(&device).await;
    Ok(Json(json!({ "online": online })))
}

#[derive(Debug, Deserialize)]
struct LogParams {
    device: Option<String>,
    limit: Option<usize>,
}

// GET /api/logs?device=&limit=
async fn get_logs(State(app): State<AppState>, Query(params): Query<LogParams>) -> Result<Json<Value>, ApiError> {
    let device = params.device.filter(|d| !d.is_empty());
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let entries = blocking(move || {
        app.journal
            .query(device.as_deref(), limit)
            .map_err(|e| ApiError::Internal(e.to_string()))
    })
    .await?;
    Ok(Json(json!(entries)))
}
