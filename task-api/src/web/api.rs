use crate::seed::SeedSummary;
use crate::task::api::{
    CreateTaskRequest, TaskJson, TaskState, TasksResponse, UpdateTaskRequest, create_task_router,
};
use crate::web::{AppState, ENDPOINTS};
use axum::{Json, Router, extract::State, http::StatusCode, routing::get, routing::post};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimeResponse {
    /// ISO-8601 timestamp
    current_time: String,
    timezone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    status: String,
    /// `connected`, or the reason the store could not be reached
    database: String,
    tasks_count: Option<u64>,
    timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetupResponse {
    message: String,
    #[serde(flatten)]
    summary: SeedSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiIndexResponse {
    message: String,
    /// Route (`VERB /path`) to description
    endpoints: BTreeMap<String, String>,
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Handler for GET /api/time.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/api/time",
    responses((status = 200, description = "Current server time", body = TimeResponse)),
    tag = "System"
)]
pub async fn time_handler() -> Json<TimeResponse> {
    Json(TimeResponse {
        current_time: now_iso8601(),
        timezone: "UTC".to_string(),
    })
}

/// Handler for GET /api/health - pings the store and reports the task count.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health_check_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let tasks_count = match state.tasks.ping().await {
        Ok(()) => state.tasks.count().await,
        Err(err) => Err(err),
    };

    match tasks_count {
        Ok(count) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                database: "connected".to_string(),
                tasks_count: Some(count),
                timestamp: now_iso8601(),
            }),
        ),
        Err(err) => {
            tracing::warn!("Health check failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: err.to_string(),
                    tasks_count: None,
                    timestamp: now_iso8601(),
                }),
            )
        }
    }
}

/// Handler for POST /api/setup - clears both collections and reseeds them.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/setup",
    responses(
        (status = 200, description = "Store reset with sample data", body = SetupResponse),
        (status = 500, description = "Reset failed", body = ErrorResponse)
    ),
    tag = "System"
)]
pub async fn setup_handler(
    State(state): State<AppState>,
) -> Result<Json<SetupResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.seeder.reset().await {
        Ok(summary) => {
            tracing::info!("Store reset with sample data");
            Ok(Json(SetupResponse {
                message: "Database reset and seeded successfully".to_string(),
                summary,
            }))
        }
        Err(err) => {
            tracing::error!("Failed to reset store: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to setup database").with_details(err.to_string())),
            ))
        }
    }
}

/// Handler for GET /api - lists the available routes.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/api",
    responses((status = 200, description = "Available routes", body = ApiIndexResponse)),
    tag = "System"
)]
pub async fn api_index_handler() -> Json<ApiIndexResponse> {
    let endpoints = ENDPOINTS
        .iter()
        .map(|endpoint| {
            (
                format!("{} {}", endpoint.method, endpoint.path),
                endpoint.description.to_string(),
            )
        })
        .collect();

    Json(ApiIndexResponse {
        message: "Welcome to the Task API".to_string(),
        endpoints,
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::task::api::list_tasks_handler,
        crate::task::api::get_task_handler,
        crate::task::api::create_task_handler,
        crate::task::api::update_task_handler,
        crate::task::api::delete_task_handler,
        time_handler,
        health_check_handler,
        setup_handler,
        api_index_handler,
    ),
    components(schemas(
        TaskJson,
        TasksResponse,
        CreateTaskRequest,
        UpdateTaskRequest,
        ErrorResponse,
        MessageResponse,
    )),
    tags(
        (name = "Tasks", description = "Task records"),
        (name = "System", description = "Time, health and maintenance")
    )
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(state: AppState) -> Router {
    let task_router = create_task_router(TaskState {
        store: state.tasks.clone(),
    });
    let system_router = Router::new()
        .route("/api", get(api_index_handler))
        .route("/api/time", get(time_handler))
        .route("/api/health", get(health_check_handler))
        .route("/api/setup", post(setup_handler))
        .with_state(state);

    Router::new()
        .merge(task_router)
        .merge(system_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
}
