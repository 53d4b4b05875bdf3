use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::task::{NewTask, RecordId, TaskStoreError};

/// Account record created alongside the sample tasks.
#[derive(Debug, PartialEq, Clone)]
pub struct User {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

pub struct SampleTask {
    pub title: &'static str,
    pub completed: bool,
    pub priority: &'static str,
    pub description: &'static str,
}

impl SampleTask {
    pub fn to_new_task(&self) -> NewTask {
        NewTask::new(self.title)
            .completed(self.completed)
            .priority(self.priority)
            .description(self.description)
    }
}

pub struct SampleUser {
    pub name: &'static str,
    pub email: &'static str,
    pub role: &'static str,
}

pub const SAMPLE_TASKS: [SampleTask; 5] = [
    SampleTask {
        title: "Learn Python Basics",
        completed: true,
        priority: "high",
        description: "Complete Python fundamentals course",
    },
    SampleTask {
        title: "Build Flask API",
        completed: true,
        priority: "high",
        description: "Create REST API with Flask and MongoDB",
    },
    SampleTask {
        title: "Deploy to Render",
        completed: false,
        priority: "medium",
        description: "Deploy application to cloud platform",
    },
    SampleTask {
        title: "Learn MongoDB",
        completed: false,
        priority: "medium",
        description: "Understand NoSQL databases and MongoDB operations",
    },
    SampleTask {
        title: "Create Frontend UI",
        completed: false,
        priority: "low",
        description: "Build interactive web interface with HTML/CSS/JS",
    },
];

pub const SAMPLE_USERS: [SampleUser; 2] = [
    SampleUser {
        name: "Thakur Paudel",
        email: "thakur@example.com",
        role: "admin",
    },
    SampleUser {
        name: "Demo User",
        email: "demo@example.com",
        role: "user",
    },
];

/// Number of records inserted by a seeding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeedSummary {
    pub tasks_created: usize,
    pub users_created: usize,
}

/// Populates a store with the fixed sample data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Seeder: Send + Sync {
    /// True when there are neither tasks nor users.
    async fn is_empty(&self) -> Result<bool, TaskStoreError>;

    /// Inserts the sample tasks and users, then ensures the indexes exist.
    ///
    /// Not guarded: a second call without [`Seeder::clear`] in between fails
    /// on the unique user email.
    async fn seed(&self) -> Result<SeedSummary, TaskStoreError>;

    /// Removes every task and user.
    async fn clear(&self) -> Result<(), TaskStoreError>;

    /// Clears both collections and seeds them again. Not atomic.
    async fn reset(&self) -> Result<SeedSummary, TaskStoreError> {
        self.clear().await?;
        self.seed().await
    }
}

/// Seeds `seeder` when it holds no data.
///
/// Returns the summary of the run, or `None` when data was already present.
#[tracing::instrument(skip(seeder))]
pub async fn seed_if_empty(seeder: &dyn Seeder) -> Result<Option<SeedSummary>, TaskStoreError> {
    if !seeder.is_empty().await? {
        tracing::info!("Store already has data, skipping sample data");
        return Ok(None);
    }

    tracing::info!("Store is empty, inserting sample data");
    let summary = seeder.seed().await?;
    tracing::info!(
        "Inserted {} tasks and {} users",
        summary.tasks_created,
        summary.users_created
    );
    Ok(Some(summary))
}
