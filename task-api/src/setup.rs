use migration::MigratorTrait;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

use crate::entities::{task, user};
use crate::seed::{SeedSummary, Seeder};
use crate::task::DatabaseTaskStore;

/// Outcome of a setup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupReport {
    /// `None` when sample data was not requested
    pub seeded: Option<SeedSummary>,
    pub tasks: u64,
    pub users: u64,
}

/// Applies migrations and, when `populate` is set, replaces all tasks and
/// users with the sample data. Reports the row counts afterwards.
#[tracing::instrument(skip(db))]
pub async fn setup_database(
    db: &DatabaseConnection,
    populate: bool,
) -> anyhow::Result<SetupReport> {
    migration::Migrator::up(db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let seeded = if populate {
        let summary = DatabaseTaskStore::new(db.clone()).reset().await?;
        tracing::info!(
            "Reset sample data: {} tasks, {} users",
            summary.tasks_created,
            summary.users_created
        );
        Some(summary)
    } else {
        None
    };

    let report = SetupReport {
        seeded,
        tasks: task::Entity::find().count(db).await?,
        users: user::Entity::find().count(db).await?,
    };
    tracing::info!("Tasks: {} rows", report.tasks);
    tracing::info!("Users: {} rows", report.users);
    Ok(report)
}
