use crate::task::{NewTask, RecordId, Task, TaskChanges, TaskStore, TaskStoreError};
use crate::web::api::{ErrorResponse, MessageResponse};
use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct TaskState {
    pub store: Arc<dyn TaskStore>,
}

/// JSON representation of a Task for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskJson {
    /// Integer for the in-memory store, UUID string for the database store
    pub id: RecordId,
    pub title: String,
    pub completed: bool,
    pub priority: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Absent until the task is first updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskJson {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            completed: task.completed,
            priority: task.priority,
            description: task.description,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// API response for listing all tasks.
#[derive(Debug, Serialize, ToSchema)]
pub struct TasksResponse {
    tasks: Vec<TaskJson>,
    /// Total number of tasks
    count: usize,
}

/// Request body for creating a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    /// Required and must not be empty
    title: Option<String>,
    completed: Option<bool>,
    priority: Option<String>,
    description: Option<String>,
}

/// Request body for updating a task. Omitted fields keep their value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    title: Option<String>,
    completed: Option<bool>,
    priority: Option<String>,
    description: Option<String>,
}

impl From<UpdateTaskRequest> for TaskChanges {
    fn from(request: UpdateTaskRequest) -> Self {
        Self {
            title: request.title,
            completed: request.completed,
            priority: request.priority,
            description: request.description,
        }
    }
}

/// Error type for task handlers.
#[derive(Debug, thiserror::Error)]
pub enum TaskApiError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

impl IntoResponse for TaskApiError {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            TaskApiError::MissingTitle | TaskApiError::EmptyTitle | TaskApiError::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            TaskApiError::Store(TaskStoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Task not found".to_string())
            }
            TaskApiError::Store(TaskStoreError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid task ID format".to_string())
            }
            TaskApiError::Store(err) => {
                tracing::error!("Task store failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database unavailable".to_string(),
                )
            }
        };

        (status_code, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Handler for GET /api/tasks - Returns all tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Successfully retrieved tasks", body = TasksResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<TaskState>,
) -> Result<Json<TasksResponse>, TaskApiError> {
    let tasks: Vec<TaskJson> = state
        .store
        .list_all()
        .await?
        .into_iter()
        .map(TaskJson::from)
        .collect();
    let count = tasks.len();

    Ok(Json(TasksResponse { tasks, count }))
}

/// Handler for GET /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskJson),
        (status = 400, description = "Malformed task ID", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<TaskState>,
    Path(id): Path<String>,
) -> Result<Json<TaskJson>, TaskApiError> {
    let task = state.store.get(&id).await?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for POST /api/tasks.
///
/// A missing or empty title is rejected before the store is touched.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskJson),
        (status = 400, description = "Title is required", body = ErrorResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<TaskState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskJson>), TaskApiError> {
    let Json(request) = payload?;
    let title = request
        .title
        .filter(|title| !title.is_empty())
        .ok_or(TaskApiError::MissingTitle)?;

    let mut new_task = NewTask::new(title);
    if let Some(completed) = request.completed {
        new_task = new_task.completed(completed);
    }
    if let Some(priority) = request.priority {
        new_task = new_task.priority(priority);
    }
    if let Some(description) = request.description {
        new_task = new_task.description(description);
    }

    let task = state.store.create(new_task).await?;
    tracing::info!("Created task {}", task.id);
    Ok((StatusCode::CREATED, Json(TaskJson::from(task))))
}

/// Handler for PUT /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskJson),
        (status = 400, description = "Malformed task ID or body", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<TaskState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<TaskJson>, TaskApiError> {
    let Json(request) = payload?;
    if request
        .title
        .as_deref()
        .is_some_and(|title| title.is_empty())
    {
        return Err(TaskApiError::EmptyTitle);
    }

    let task = state.store.update(&id, request.into()).await?;
    Ok(Json(TaskJson::from(task)))
}

/// Handler for DELETE /api/tasks/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 400, description = "Malformed task ID", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Database unavailable", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<TaskState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, TaskApiError> {
    state.store.delete(&id).await?;
    tracing::info!("Deleted task {}", id);
    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

/// Creates and returns the tasks API router.
pub fn create_task_router(state: TaskState) -> Router {
    Router::new()
        .route(
            "/api/tasks",
            get(list_tasks_handler).post(create_task_handler),
        )
        .route(
            "/api/tasks/{id}",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::MockTaskStore;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use sea_orm::DbErr;
    use tower::ServiceExt;

    fn router_with(store: MockTaskStore) -> Router {
        create_task_router(TaskState {
            store: Arc::new(store),
        })
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_title_never_reaches_the_store() {
        let mut store = MockTaskStore::new();
        store.expect_create().never();

        let (status, body) = send(router_with(store), Method::POST, "/api/tasks", Some("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Title is required"}));
    }

    #[tokio::test]
    async fn only_an_empty_title_counts_as_missing() {
        let mut store = MockTaskStore::new();
        store
            .expect_create()
            .withf(|new_task| new_task.title == "   ")
            .times(1)
            .returning(|new_task| {
                Ok(Task {
                    id: RecordId::Sequence(1),
                    title: new_task.title,
                    completed: new_task.completed,
                    priority: new_task.priority,
                    description: new_task.description,
                    created_at: Utc::now(),
                    updated_at: None,
                })
            });
        let app = router_with(store);

        let (empty_status, empty_body) = send(
            app.clone(),
            Method::POST,
            "/api/tasks",
            Some(r#"{"title": ""}"#),
        )
        .await;
        let (spaces_status, spaces_body) = send(
            app,
            Method::POST,
            "/api/tasks",
            Some(r#"{"title": "   "}"#),
        )
        .await;

        assert_eq!(empty_status, StatusCode::BAD_REQUEST);
        assert_eq!(empty_body, serde_json::json!({"error": "Title is required"}));
        assert_eq!(spaces_status, StatusCode::CREATED);
        assert_eq!(spaces_body["title"], "   ");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let mut store = MockTaskStore::new();
        store.expect_create().never();

        let (status, body) = send(
            router_with(store),
            Method::POST,
            "/api/tasks",
            Some("{not json"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid request body")
        );
    }

    #[tokio::test]
    async fn backend_failure_is_not_reported_as_invalid_key() {
        let mut store = MockTaskStore::new();
        store
            .expect_get()
            .returning(|_| Err(TaskStoreError::Database(DbErr::Custom("connection refused".into()))));

        let (status, body) = send(router_with(store), Method::GET, "/api/tasks/1", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Database unavailable"}));
    }

    #[tokio::test]
    async fn invalid_key_maps_to_bad_request() {
        let mut store = MockTaskStore::new();
        store
            .expect_delete()
            .withf(|key| key == "not-an-id")
            .returning(|key| Err(TaskStoreError::InvalidKey(key.to_string())));

        let (status, body) = send(
            router_with(store),
            Method::DELETE,
            "/api/tasks/not-an-id",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Invalid task ID format"}));
    }

    #[tokio::test]
    async fn empty_title_on_update_is_rejected() {
        let mut store = MockTaskStore::new();
        store.expect_update().never();

        let (status, body) = send(
            router_with(store),
            Method::PUT,
            "/api/tasks/1",
            Some(r#"{"title": ""}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title cannot be empty");
    }

    #[tokio::test]
    async fn update_forwards_only_provided_fields() {
        let mut store = MockTaskStore::new();
        store
            .expect_update()
            .withf(|key, changes| {
                key == "3"
                    && *changes
                        == TaskChanges {
                            completed: Some(true),
                            ..Default::default()
                        }
            })
            .returning(|_, _| {
                Ok(Task {
                    id: RecordId::Sequence(3),
                    title: "Unchanged".to_string(),
                    completed: true,
                    priority: "medium".to_string(),
                    description: String::new(),
                    created_at: Utc::now(),
                    updated_at: Some(Utc::now()),
                })
            });

        let (status, body) = send(
            router_with(store),
            Method::PUT,
            "/api/tasks/3",
            Some(r#"{"completed": true}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Unchanged");
        assert_eq!(body["completed"], true);
    }
}
