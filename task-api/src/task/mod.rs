use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod api;
pub mod database;
pub mod memory;

pub use database::DatabaseTaskStore;
pub use memory::InMemoryTaskStore;

/// Priority given to tasks created without one.
pub const DEFAULT_PRIORITY: &str = "medium";

/// Key of a stored record.
///
/// The in-memory store hands out sequential integers, the database store hands
/// out v4 UUIDs. Both serialize without a tag, so clients see either a number
/// or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RecordId {
    Sequence(u32),
    Uuid(Uuid),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Sequence(id) => write!(f, "{}", id),
            RecordId::Uuid(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub completed: bool,
    pub priority: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating a task. The store assigns the id and timestamps.
#[derive(Debug, PartialEq, Clone)]
pub struct NewTask {
    pub title: String,
    pub completed: bool,
    pub priority: String,
    pub description: String,
}

impl NewTask {
    /// Creates a task description with every optional field at its default.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            priority: DEFAULT_PRIORITY.to_string(),
            description: String::new(),
        }
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update of a task. `None` leaves the stored value untouched.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub description: Option<String>,
}

impl TaskChanges {
    /// Merges the provided fields onto `task`.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
    }
}

/// Error type for task and seeding store operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    /// The key is well formed but no record has it.
    #[error("Task with ID {0} not found")]
    NotFound(String),
    /// The key does not have the shape the store uses for ids.
    #[error("Malformed task ID '{0}'")]
    InvalidKey(String),
    /// A user with the same email already exists.
    #[error("Duplicate user email: {0}")]
    DuplicateEmail(String),
    /// The backing database failed or could not be reached.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Persistence for task records.
///
/// Keys are passed as the raw string the client sent; each implementation
/// validates the shape and answers [`TaskStoreError::InvalidKey`] for anything
/// it could never have issued.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Returns every task in the store's native order.
    async fn list_all(&self) -> Result<Vec<Task>, TaskStoreError>;

    async fn get(&self, key: &str) -> Result<Task, TaskStoreError>;

    /// Stores a new task and returns it with its server-assigned fields.
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskStoreError>;

    /// Merges `changes` onto the stored task and stamps `updated_at`.
    async fn update(&self, key: &str, changes: TaskChanges) -> Result<Task, TaskStoreError>;

    async fn delete(&self, key: &str) -> Result<(), TaskStoreError>;

    async fn count(&self) -> Result<u64, TaskStoreError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), TaskStoreError>;
}
