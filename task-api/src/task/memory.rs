use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{NewTask, RecordId, Task, TaskChanges, TaskStore, TaskStoreError};
use crate::seed::{SAMPLE_TASKS, SAMPLE_USERS, SeedSummary, Seeder, User};

#[derive(Debug, Default)]
struct Collections {
    tasks: Vec<Task>,
    users: Vec<User>,
}

/// Process-local store without persistence.
///
/// Tasks keep insertion order. Every operation holds the one lock for its whole
/// read-modify-write, so concurrent creates never compute the same id.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    collections: Mutex<Collections>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are plain decimal digits, without sign or whitespace.
    fn parse_key(key: &str) -> Result<u32, TaskStoreError> {
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TaskStoreError::InvalidKey(key.to_string()));
        }
        key.parse::<u32>()
            .map_err(|_| TaskStoreError::InvalidKey(key.to_string()))
    }
}

/// Next id is one past the highest id in use, so a freed top id is handed out again.
fn next_sequence<'a>(ids: impl Iterator<Item = &'a RecordId>) -> u32 {
    ids.filter_map(|id| match id {
        RecordId::Sequence(sequence) => Some(*sequence),
        RecordId::Uuid(_) => None,
    })
    .max()
    .unwrap_or(0)
        + 1
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Task>, TaskStoreError> {
        let collections = self.collections.lock().await;
        Ok(collections.tasks.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Task, TaskStoreError> {
        let id = RecordId::Sequence(Self::parse_key(key)?);
        let collections = self.collections.lock().await;
        collections
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(key.to_string()))
    }

    #[tracing::instrument(skip(self))]
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskStoreError> {
        let mut collections = self.collections.lock().await;
        let id = next_sequence(collections.tasks.iter().map(|task| &task.id));
        let task = Task {
            id: RecordId::Sequence(id),
            title: new_task.title,
            completed: new_task.completed,
            priority: new_task.priority,
            description: new_task.description,
            created_at: Utc::now(),
            updated_at: None,
        };
        collections.tasks.push(task.clone());
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    async fn update(&self, key: &str, changes: TaskChanges) -> Result<Task, TaskStoreError> {
        let id = RecordId::Sequence(Self::parse_key(key)?);
        let mut collections = self.collections.lock().await;
        let task = collections
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| TaskStoreError::NotFound(key.to_string()))?;
        changes.apply_to(task);
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), TaskStoreError> {
        let id = RecordId::Sequence(Self::parse_key(key)?);
        let mut collections = self.collections.lock().await;
        let position = collections
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| TaskStoreError::NotFound(key.to_string()))?;
        collections.tasks.remove(position);
        Ok(())
    }

    async fn count(&self) -> Result<u64, TaskStoreError> {
        let collections = self.collections.lock().await;
        Ok(collections.tasks.len() as u64)
    }

    async fn ping(&self) -> Result<(), TaskStoreError> {
        Ok(())
    }
}

#[async_trait]
impl Seeder for InMemoryTaskStore {
    async fn is_empty(&self) -> Result<bool, TaskStoreError> {
        let collections = self.collections.lock().await;
        Ok(collections.tasks.is_empty() && collections.users.is_empty())
    }

    #[tracing::instrument(skip(self))]
    async fn seed(&self) -> Result<SeedSummary, TaskStoreError> {
        let mut collections = self.collections.lock().await;

        for sample in SAMPLE_TASKS.iter() {
            let new_task = sample.to_new_task();
            let id = next_sequence(collections.tasks.iter().map(|task| &task.id));
            collections.tasks.push(Task {
                id: RecordId::Sequence(id),
                title: new_task.title,
                completed: new_task.completed,
                priority: new_task.priority,
                description: new_task.description,
                created_at: Utc::now(),
                updated_at: None,
            });
        }

        // Mirrors the unique email index of the database store.
        for sample in SAMPLE_USERS.iter() {
            if collections.users.iter().any(|user| user.email == sample.email) {
                return Err(TaskStoreError::DuplicateEmail(sample.email.to_string()));
            }
            let id = next_sequence(collections.users.iter().map(|user| &user.id));
            collections.users.push(User {
                id: RecordId::Sequence(id),
                name: sample.name.to_string(),
                email: sample.email.to_string(),
                role: sample.role.to_string(),
                created_at: Utc::now(),
            });
        }

        Ok(SeedSummary {
            tasks_created: SAMPLE_TASKS.len(),
            users_created: SAMPLE_USERS.len(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), TaskStoreError> {
        let mut collections = self.collections.lock().await;
        collections.tasks.clear();
        collections.users.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_task_in_empty_store_gets_id_one() {
        let store = InMemoryTaskStore::new();

        let task = store.create(NewTask::new("First")).await.unwrap();

        assert_eq!(task.id, RecordId::Sequence(1));
        assert!(!task.completed);
        assert_eq!(task.priority, "medium");
        assert_eq!(task.updated_at, None);
    }

    #[tokio::test]
    async fn assigns_consecutive_ids() {
        let store = InMemoryTaskStore::new();

        let first = store.create(NewTask::new("First")).await.unwrap();
        let second = store.create(NewTask::new("Second")).await.unwrap();

        assert_eq!(first.id, RecordId::Sequence(1));
        assert_eq!(second.id, RecordId::Sequence(2));
    }

    #[tokio::test]
    async fn reuses_highest_id_after_it_is_deleted() {
        let store = InMemoryTaskStore::new();
        store.create(NewTask::new("First")).await.unwrap();
        store.create(NewTask::new("Second")).await.unwrap();

        store.delete("2").await.unwrap();
        let replacement = store.create(NewTask::new("Replacement")).await.unwrap();

        assert_eq!(replacement.id, RecordId::Sequence(2));
    }

    #[tokio::test]
    async fn does_not_reuse_ids_below_the_highest() {
        let store = InMemoryTaskStore::new();
        store.create(NewTask::new("First")).await.unwrap();
        store.create(NewTask::new("Second")).await.unwrap();

        store.delete("1").await.unwrap();
        let third = store.create(NewTask::new("Third")).await.unwrap();

        assert_eq!(third.id, RecordId::Sequence(3));
    }

    #[tokio::test]
    async fn keeps_insertion_order() {
        let store = InMemoryTaskStore::new();
        for title in ["a", "b", "c"] {
            store.create(NewTask::new(title)).await.unwrap();
        }

        let titles: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.title)
            .collect();

        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn update_merges_only_provided_fields() {
        let store = InMemoryTaskStore::new();
        store
            .create(NewTask::new("Keep me").priority("high"))
            .await
            .unwrap();

        let updated = store
            .update(
                "1",
                TaskChanges {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Keep me");
        assert_eq!(updated.priority, "high");
        assert!(updated.completed);
        assert!(updated.updated_at.is_some());
        assert_eq!(store.get("1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn reports_missing_and_malformed_keys_differently() {
        let store = InMemoryTaskStore::new();

        assert!(matches!(
            store.get("42").await,
            Err(TaskStoreError::NotFound(key)) if key == "42"
        ));
        assert!(matches!(
            store.get("abc").await,
            Err(TaskStoreError::InvalidKey(key)) if key == "abc"
        ));
        assert!(matches!(
            store.update("-1", TaskChanges::default()).await,
            Err(TaskStoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn signed_keys_are_malformed() {
        let store = InMemoryTaskStore::new();
        store.create(NewTask::new("only")).await.unwrap();

        for key in ["+1", " 1", "1.0", ""] {
            assert!(
                matches!(store.get(key).await, Err(TaskStoreError::InvalidKey(_))),
                "{:?}",
                key
            );
        }
        assert!(matches!(
            store.delete("+1").await,
            Err(TaskStoreError::InvalidKey(_))
        ));
        assert_eq!(store.get("1").await.unwrap().title, "only");
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let store = InMemoryTaskStore::new();
        store.create(NewTask::new("Doomed")).await.unwrap();

        store.delete("1").await.unwrap();

        assert!(matches!(
            store.delete("1").await,
            Err(TaskStoreError::NotFound(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(InMemoryTaskStore::new());

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(NewTask::new(format!("Task {}", i))).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let task = handle.await.unwrap().unwrap();
            ids.insert(task.id);
        }

        let expected: HashSet<RecordId> = (1..=50).map(RecordId::Sequence).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn seeds_five_tasks_and_two_users() {
        let store = InMemoryTaskStore::new();
        assert!(store.is_empty().await.unwrap());

        let summary = store.seed().await.unwrap();

        assert_eq!(summary.tasks_created, 5);
        assert_eq!(summary.users_created, 2);
        assert_eq!(store.count().await.unwrap(), 5);
        assert!(!store.is_empty().await.unwrap());
        let first = store.get("1").await.unwrap();
        assert_eq!(first.title, "Learn Python Basics");
        assert!(first.completed);
        assert_eq!(first.priority, "high");
    }

    #[tokio::test]
    async fn seeding_twice_hits_the_unique_email() {
        let store = InMemoryTaskStore::new();
        store.seed().await.unwrap();

        let result = store.seed().await;

        assert!(matches!(
            result,
            Err(TaskStoreError::DuplicateEmail(email)) if email == "thakur@example.com"
        ));
    }

    #[tokio::test]
    async fn reset_is_not_cumulative() {
        let store = InMemoryTaskStore::new();
        store.seed().await.unwrap();
        store.create(NewTask::new("Extra")).await.unwrap();

        let summary = store.reset().await.unwrap();

        assert_eq!(summary.tasks_created, 5);
        assert_eq!(summary.users_created, 2);
        assert_eq!(store.count().await.unwrap(), 5);
        let collections = store.collections.lock().await;
        assert_eq!(collections.users.len(), 2);
    }
}
