use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tasksync_core::db::{Database, SqliteDeviceRegistry, SqliteTaskStore};
use tasksync_core::export::{self, RestoreSummary, TaskSnapshot};
use tasksync_core::{
    ConflictRecord, Device, DeviceRegistry, SyncRequest, SyncResponse, SyncService, SyncStrategy,
    Task, TaskId,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::identity::{extract_caller, Caller};

pub type TaskSyncService = SyncService<SqliteTaskStore, SqliteDeviceRegistry>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    service: Arc<TaskSyncService>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> tasksync_core::Result<Self> {
        let db = Arc::new(Database::open(&config.database_path)?);
        let service = SyncService::new(
            SqliteTaskStore::new(Arc::clone(&db)),
            SqliteDeviceRegistry::new(db),
            config.sync,
        );
        Ok(Self::new(config, service))
    }

    pub fn new(config: Arc<AppConfig>, service: TaskSyncService) -> Self {
        Self {
            config,
            service: Arc::new(service),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync", post(sync_tasks))
        .route("/todos", get(list_tasks))
        .route("/todos/batch", post(batch_update))
        .route("/todos/{id}", delete(delete_task))
        .route("/conflicts/resolve", post(resolve_conflicts))
        .route("/conflicts/history", get(resolution_history))
        .route("/devices", get(list_devices).post(register_device))
        .route(
            "/devices/{device_id}",
            delete(remove_device).patch(rename_device),
        )
        .route("/export", get(export_snapshot))
        .route("/import", post(import_snapshot))
        .route_layer(middleware::from_fn(require_identity));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

/// Run a store-bound operation on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> tasksync_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|error| AppError::internal(format!("Worker task failed: {error}")))?
        .map_err(AppError::from)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    strategy: SyncStrategy,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        strategy: state.service.strategy(),
    })
}

async fn require_identity(mut request: Request, next: Next) -> Result<Response, AppError> {
    let caller = extract_caller(request.headers())?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

async fn sync_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(mut request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    request.user_id = caller.user_id;
    if let Some(device_id) = caller.device_id {
        request.device_id = device_id;
    }

    let service = Arc::clone(&state.service);
    let response = blocking(move || service.sync(request)).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    status: &'static str,
    todos: Vec<Task>,
}

async fn batch_update(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(tasks): Json<Vec<Task>>,
) -> Result<Json<WriteResponse>, AppError> {
    let service = Arc::clone(&state.service);
    let todos = blocking(move || service.batch_update(&caller.user_id, caller.device_id(), tasks))
        .await?;
    Ok(Json(WriteResponse {
        status: "success",
        todos,
    }))
}

async fn resolve_conflicts(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(tasks): Json<Vec<Task>>,
) -> Result<Json<WriteResponse>, AppError> {
    let service = Arc::clone(&state.service);
    let todos =
        blocking(move || service.resolve_conflicts(&caller.user_id, caller.device_id(), tasks))
            .await?;
    Ok(Json(WriteResponse {
        status: "success",
        todos,
    }))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Task>>, AppError> {
    let service = Arc::clone(&state.service);
    let tasks = blocking(move || service.list_tasks(&caller.user_id)).await?;
    Ok(Json(tasks))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let service = Arc::clone(&state.service);
    let tombstone = blocking(move || {
        service.delete_task(&caller.user_id, caller.device_id(), &TaskId::new(id))
    })
    .await?;
    Ok(Json(tombstone))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn resolution_history(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConflictRecord>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(state.config.resolution_history_limit)
        .clamp(1, state.config.resolution_history_limit);
    let service = Arc::clone(&state.service);
    let records = blocking(move || service.list_resolutions(&caller.user_id, limit)).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct RegisterDeviceRequest {
    #[serde(default)]
    name: String,
    device_id: String,
}

async fn register_device(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<Device>, AppError> {
    let service = Arc::clone(&state.service);
    let device = blocking(move || {
        service
            .registry()
            .register(&caller.user_id, &request.name, &request.device_id)
    })
    .await?;
    Ok(Json(device))
}

async fn list_devices(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Device>>, AppError> {
    let limit = state.config.recent_device_limit;
    let service = Arc::clone(&state.service);
    let devices =
        blocking(move || service.registry().list_recent(&caller.user_id, limit)).await?;
    Ok(Json(devices))
}

#[derive(Debug, Deserialize)]
struct RenameDeviceRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn rename_device(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(device_id): Path<String>,
    Json(request): Json<RenameDeviceRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let service = Arc::clone(&state.service);
    blocking(move || {
        service
            .registry()
            .rename(&caller.user_id, &device_id, &request.name)
    })
    .await?;
    Ok(Json(StatusResponse { status: "success" }))
}

async fn remove_device(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(device_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let service = Arc::clone(&state.service);
    blocking(move || service.registry().remove(&caller.user_id, &device_id)).await?;
    Ok(Json(StatusResponse { status: "success" }))
}

async fn export_snapshot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TaskSnapshot>, AppError> {
    let service = Arc::clone(&state.service);
    let snapshot = blocking(move || export::snapshot(service.store(), &caller.user_id)).await?;
    Ok(Json(snapshot))
}

async fn import_snapshot(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(snapshot): Json<TaskSnapshot>,
) -> Result<Json<RestoreSummary>, AppError> {
    let service = Arc::clone(&state.service);
    let summary = blocking(move || {
        export::restore_snapshot(
            service.store(),
            &caller.user_id,
            caller.device_id.as_deref(),
            &snapshot,
        )
    })
    .await?;
    Ok(Json(summary))
}
