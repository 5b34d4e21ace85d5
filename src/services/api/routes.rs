use std::any::Any;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::error::RegistryApiError;
use super::query::QueryApi;
use super::registration::RegistrationApi;
use super::types::{
    ByNameParams, ErrorResponse, HealthResponse, HeartbeatResponse, IndexResponse,
    ListServicesParams, MessageResponse, RegisterRequest,
};
use crate::services::registry::{RegistryStats, ServiceInstance, ServiceRegistry};

const ENDPOINTS: &[&str] = &[
    "GET / - API status",
    "GET /health - Registry liveness",
    "GET /healthcheck - Registry liveness (alias)",
    "POST /api/services - Register a service instance",
    "PUT /api/services/:id/heartbeat - Refresh a service instance",
    "DELETE /api/services/:id - Unregister a service instance",
    "GET /api/services?name=&status= - List service instances",
    "GET /api/services/name/:name?healthy= - Instances by service name",
    "GET /api/services/id/:id - Instance by ID",
    "GET /api/stats - Registry statistics",
];

// 处理器共享的状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub registration: RegistrationApi,
    pub query: QueryApi,
}

impl AppState {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self {
            registration: RegistrationApi::new(registry.clone()),
            query: QueryApi::new(registry),
        }
    }
}

pub fn create_router(registry: ServiceRegistry) -> Router {
    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/healthcheck", get(health_handler))
        .route("/api/services", get(list_handler).post(register_handler))
        .route("/api/services/:id", axum::routing::delete(unregister_handler))
        .route("/api/services/:id/heartbeat", put(heartbeat_handler))
        .route("/api/services/name/:name", get(by_name_handler))
        .route("/api/services/id/:id", get(by_id_handler))
        .route("/api/stats", get(stats_handler))
        .fallback(not_found_handler)
        .with_state(AppState::new(registry));

    with_middleware(router)
}

/// 为路由加上请求追踪与 panic 捕获，处理器 panic 时返回 500
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    RegistryApiError::Internal("unexpected failure while handling request".to_string())
        .into_response()
}

async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceInstance>), RegistryApiError> {
    let Json(request) = payload.map_err(|e| RegistryApiError::BadRequest(e.body_text()))?;
    let instance = state.registration.register(request)?;
    Ok((StatusCode::CREATED, Json(instance)))
}

async fn heartbeat_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HeartbeatResponse>, RegistryApiError> {
    let timestamp = state.registration.heartbeat(&id)?;
    Ok(Json(HeartbeatResponse {
        message: "Heartbeat received".to_string(),
        timestamp,
    }))
}

async fn unregister_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RegistryApiError> {
    state.registration.unregister(&id)?;
    Ok(Json(MessageResponse {
        message: format!("Service with ID {id} unregistered successfully"),
    }))
}

async fn list_handler(
    State(state): State<AppState>,
    params: Result<Query<ListServicesParams>, QueryRejection>,
) -> Result<Json<Vec<ServiceInstance>>, RegistryApiError> {
    let Query(params) = params.map_err(|e| RegistryApiError::BadRequest(e.body_text()))?;
    let instances = state
        .query
        .list(params.name.as_deref(), params.status.as_deref())?;
    Ok(Json(instances))
}

async fn by_name_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    params: Result<Query<ByNameParams>, QueryRejection>,
) -> Result<Json<Vec<ServiceInstance>>, RegistryApiError> {
    let Query(params) = params.map_err(|e| RegistryApiError::BadRequest(e.body_text()))?;
    let healthy_only = params.healthy.unwrap_or(false);
    Ok(Json(state.query.by_name(&name, healthy_only)))
}

async fn by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceInstance>, RegistryApiError> {
    Ok(Json(state.query.by_id(&id)?))
}

async fn stats_handler(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.query.stats())
}

// 注册表进程自身的存活检查
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        overall: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

async fn index_handler() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Service registry is running".to_string(),
        timestamp: Utc::now(),
        endpoints: ENDPOINTS.iter().map(|endpoint| endpoint.to_string()).collect(),
    })
}

async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    let path = uri.path().to_string();
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not Found".to_string(),
            message: format!("Route {path} not found"),
            timestamp: Utc::now(),
            path: Some(path),
            details: None,
        }),
    )
}
