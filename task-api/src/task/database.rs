use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::*;
use uuid::Uuid;

use super::{NewTask, RecordId, Task, TaskChanges, TaskStore, TaskStoreError};
use crate::entities::{task, user};
use crate::seed::{SAMPLE_TASKS, SAMPLE_USERS, SeedSummary, Seeder};

/// Task store backed by the `tasks` and `users` tables.
#[derive(Debug, Clone)]
pub struct DatabaseTaskStore {
    db: DatabaseConnection,
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task {
            id: RecordId::Uuid(model.id),
            title: model.title,
            completed: model.completed,
            priority: model.priority,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl DatabaseTaskStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn parse_key(key: &str) -> Result<Uuid, TaskStoreError> {
        Uuid::parse_str(key).map_err(|_| TaskStoreError::InvalidKey(key.to_string()))
    }

    /// A row deleted between the lookup and the write is reported as missing.
    fn update_error(key: &str, err: DbErr) -> TaskStoreError {
        match err {
            DbErr::RecordNotUpdated => TaskStoreError::NotFound(key.to_string()),
            err => TaskStoreError::Database(err),
        }
    }

    async fn find_task(&self, key: &str) -> Result<task::Model, TaskStoreError> {
        let id = Self::parse_key(key)?;
        task::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| TaskStoreError::NotFound(key.to_string()))
    }

    fn index_statements() -> [IndexCreateStatement; 3] {
        [
            Index::create()
                .if_not_exists()
                .name("idx_tasks_created_at")
                .table(task::Entity)
                .col(task::Column::CreatedAt)
                .to_owned(),
            Index::create()
                .if_not_exists()
                .name("idx_tasks_completed")
                .table(task::Entity)
                .col(task::Column::Completed)
                .to_owned(),
            Index::create()
                .if_not_exists()
                .name("idx_users_email_unique")
                .table(user::Entity)
                .col(user::Column::Email)
                .unique()
                .to_owned(),
        ]
    }

    /// Creates the lookup indexes and the unique email constraint if missing.
    #[tracing::instrument(skip(self))]
    async fn ensure_indexes(&self) -> Result<(), TaskStoreError> {
        let backend = self.db.get_database_backend();
        for statement in Self::index_statements() {
            self.db.execute(backend.build(&statement)).await?;
        }
        tracing::info!("Indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl TaskStore for DatabaseTaskStore {
    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Task>, TaskStoreError> {
        let tasks = task::Entity::find()
            .order_by_asc(task::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Task, TaskStoreError> {
        self.find_task(key).await.map(Task::from)
    }

    #[tracing::instrument(skip(self))]
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskStoreError> {
        let active_model = task::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            title: ActiveValue::Set(new_task.title),
            completed: ActiveValue::Set(new_task.completed),
            priority: ActiveValue::Set(new_task.priority),
            description: ActiveValue::Set(new_task.description),
            created_at: ActiveValue::Set(Utc::now()),
            updated_at: ActiveValue::Set(None),
        };
        let created_model = active_model.insert(&self.db).await?;
        Ok(Task::from(created_model))
    }

    #[tracing::instrument(skip(self))]
    async fn update(&self, key: &str, changes: TaskChanges) -> Result<Task, TaskStoreError> {
        let task_to_update = self.find_task(key).await?;

        let mut active_model: task::ActiveModel = task_to_update.into();
        if let Some(title) = changes.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(completed) = changes.completed {
            active_model.completed = ActiveValue::Set(completed);
        }
        if let Some(priority) = changes.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(description) = changes.description {
            active_model.description = ActiveValue::Set(description);
        }
        active_model.updated_at = ActiveValue::Set(Some(Utc::now()));
        let updated_model = active_model
            .update(&self.db)
            .await
            .map_err(|err| Self::update_error(key, err))?;

        Ok(Task::from(updated_model))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), TaskStoreError> {
        let id = Self::parse_key(key)?;
        let result = task::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(TaskStoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, TaskStoreError> {
        Ok(task::Entity::find().count(&self.db).await?)
    }

    async fn ping(&self) -> Result<(), TaskStoreError> {
        Ok(self.db.ping().await?)
    }
}

#[async_trait]
impl Seeder for DatabaseTaskStore {
    #[tracing::instrument(skip(self))]
    async fn is_empty(&self) -> Result<bool, TaskStoreError> {
        let tasks_count = task::Entity::find().count(&self.db).await?;
        let users_count = user::Entity::find().count(&self.db).await?;
        Ok(tasks_count == 0 && users_count == 0)
    }

    #[tracing::instrument(skip(self))]
    async fn seed(&self) -> Result<SeedSummary, TaskStoreError> {
        let now = Utc::now();

        // One microsecond apart so listing by created_at keeps the sample order.
        let tasks = SAMPLE_TASKS.iter().zip(0i64..).map(|(sample, offset)| {
            let new_task = sample.to_new_task();
            task::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                title: ActiveValue::Set(new_task.title),
                completed: ActiveValue::Set(new_task.completed),
                priority: ActiveValue::Set(new_task.priority),
                description: ActiveValue::Set(new_task.description),
                created_at: ActiveValue::Set(now + TimeDelta::microseconds(offset)),
                updated_at: ActiveValue::Set(None),
            }
        });
        task::Entity::insert_many(tasks).exec(&self.db).await?;
        tracing::info!("Inserted {} tasks", SAMPLE_TASKS.len());

        let users = SAMPLE_USERS.iter().map(|sample| user::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            name: ActiveValue::Set(sample.name.to_string()),
            email: ActiveValue::Set(sample.email.to_string()),
            role: ActiveValue::Set(sample.role.to_string()),
            created_at: ActiveValue::Set(now),
        });
        user::Entity::insert_many(users)
            .exec(&self.db)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(detail)) => {
                    TaskStoreError::DuplicateEmail(detail)
                }
                _ => TaskStoreError::Database(err),
            })?;
        tracing::info!("Inserted {} users", SAMPLE_USERS.len());

        self.ensure_indexes().await?;

        Ok(SeedSummary {
            tasks_created: SAMPLE_TASKS.len(),
            users_created: SAMPLE_USERS.len(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), TaskStoreError> {
        task::Entity::delete_many().exec(&self.db).await?;
        user::Entity::delete_many().exec(&self.db).await?;
        tracing::info!("Cleared tasks and users");
        Ok(())
    }
}
