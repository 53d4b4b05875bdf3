use askama::Template;
use axum::Router;
use axum::http::StatusCode;
use axum::response::Html;
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, StoreKind};
use crate::seed::{self, Seeder};
use crate::task::{DatabaseTaskStore, InMemoryTaskStore, TaskStore};

pub mod api;

/// Backend handles shared by every handler. Both usually point at the same store.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskStore>,
    pub seeder: Arc<dyn Seeder>,
}

impl AppState {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        Self {
            tasks: store.clone(),
            seeder: store,
        }
    }

    pub fn database(db: DatabaseConnection) -> Self {
        let store = Arc::new(DatabaseTaskStore::new(db));
        Self {
            tasks: store.clone(),
            seeder: store,
        }
    }
}

/// A route advertised on the landing page and by `GET /api`.
#[derive(Debug)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        method: "GET",
        path: "/",
        description: "Landing page",
    },
    Endpoint {
        method: "GET",
        path: "/api",
        description: "This route listing",
    },
    Endpoint {
        method: "GET",
        path: "/api/tasks",
        description: "Get all tasks",
    },
    Endpoint {
        method: "GET",
        path: "/api/tasks/{id}",
        description: "Get a specific task",
    },
    Endpoint {
        method: "POST",
        path: "/api/tasks",
        description: "Create a new task",
    },
    Endpoint {
        method: "PUT",
        path: "/api/tasks/{id}",
        description: "Update a task",
    },
    Endpoint {
        method: "DELETE",
        path: "/api/tasks/{id}",
        description: "Delete a task",
    },
    Endpoint {
        method: "GET",
        path: "/api/time",
        description: "Get current server time",
    },
    Endpoint {
        method: "GET",
        path: "/api/health",
        description: "Check store connectivity",
    },
    Endpoint {
        method: "POST",
        path: "/api/setup",
        description: "Reset the store with sample data",
    },
    Endpoint {
        method: "GET",
        path: "/api/openapi.json",
        description: "OpenAPI document",
    },
    Endpoint {
        method: "GET",
        path: "/swagger-ui",
        description: "Interactive API docs",
    },
];

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl axum::response::IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{}", self);
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    endpoints: &'static [Endpoint],
}

impl IndexTemplate {
    pub fn new() -> Self {
        Self {
            endpoints: ENDPOINTS,
        }
    }
}

#[tracing::instrument]
pub async fn welcome_handler() -> Result<Html<String>, WebError> {
    let template = IndexTemplate::new();
    template.render().map(Html).map_err(WebError::from)
}

/// Builds the complete application: landing page, JSON API and API docs.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .route("/", axum::routing::get(welcome_handler))
        .merge(api::create_api_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Connects without touching the server, then applies migrations.
///
/// An unreachable database is logged and tolerated; the store then fails per
/// request until it becomes reachable.
#[tracing::instrument(skip(options))]
async fn connect_database(mut options: ConnectOptions) -> anyhow::Result<DatabaseConnection> {
    options.connect_lazy(true);
    let db = Database::connect(options).await?;

    match migration::Migrator::up(&db, None).await {
        Ok(()) => tracing::info!("Database migrations applied successfully"),
        Err(err) => tracing::error!("Failed to apply database migrations: {}", err),
    }
    Ok(db)
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let state = match config.store {
        StoreKind::Memory => {
            tracing::info!("Using in-memory task store");
            AppState::in_memory()
        }
        StoreKind::Database => {
            tracing::info!("Using database task store");
            let options = ConnectOptions::new(&config.database_url);
            AppState::database(connect_database(options).await?)
        }
    };

    if let Err(err) = seed::seed_if_empty(state.seeder.as_ref()).await {
        tracing::error!("Failed to initialize sample data: {}", err);
    }

    let app = create_app_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
