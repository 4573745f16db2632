#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{Result, TaskdeckError};
use crate::store::{self, KeyValueStore, TASKS_KEY};
use crate::task::model::{NewTask, Task, TaskPatch};

/// Persistence for task records owned by users.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Newest first. Storage failures yield an empty list.
    async fn list_by_user(&self, user_id: &str) -> Vec<Task>;
    async fn create(&self, data: NewTask) -> Result<Task>;
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task>;
    /// Negates the stored `completed` flag in a single read-modify-write.
    async fn toggle_completion(&self, id: &str) -> Result<Task>;
    /// Missing ids are a no-op.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Keeps every user's tasks as one JSON list under [`TASKS_KEY`].
#[derive(Clone)]
pub struct StoredTaskRepository {
    store: Arc<dyn KeyValueStore>,
    latency: Duration,
}

impl StoredTaskRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            latency: Duration::ZERO,
        }
    }

    /// Delay applied before every call, standing in for a network round trip.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn load_all(&self) -> Result<Vec<Task>> {
        Ok(store::get_json::<Vec<Task>>(self.store.as_ref(), TASKS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_all(&self, tasks: &[Task]) -> Result<()> {
        store::set_json(self.store.as_ref(), TASKS_KEY, tasks).await
    }

    async fn modify(
        &self,
        id: &str,
        action: &'static str,
        f: impl FnOnce(&mut Task) + Send,
    ) -> Result<Task> {
        let mut all = self.load_all().await.map_err(|e| write_error(action, e))?;
        let Some(task) = all.iter_mut().find(|t| t.id == id) else {
            tracing::error!(task_id = id, "failed to {action} task: not found");
            return Err(TaskdeckError::TaskNotFound(id.to_owned()));
        };
        f(task);
        let updated = task.clone();
        self.save_all(&all)
            .await
            .map_err(|e| write_error(action, e))?;
        Ok(updated)
    }
}

fn write_error(action: &'static str, source: TaskdeckError) -> TaskdeckError {
    tracing::error!(error = %source, "failed to {action} task");
    TaskdeckError::TaskWrite {
        action,
        source: Box::new(source),
    }
}

#[async_trait]
impl TaskRepository for StoredTaskRepository {
    async fn list_by_user(&self, user_id: &str) -> Vec<Task> {
        self.simulate_latency().await;
        let all = match self.load_all().await {
            Ok(all) => all,
            Err(err) => {
                tracing::warn!(error = %err, "failed to get user tasks");
                return Vec::new();
            }
        };
        let mut tasks: Vec<Task> = all.into_iter().filter(|t| t.user_id == user_id).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    async fn create(&self, data: NewTask) -> Result<Task> {
        self.simulate_latency().await;
        let mut all = self
            .load_all()
            .await
            .map_err(|e| write_error("create", e))?;

        let taken: HashSet<&str> = all.iter().map(|t| t.id.as_str()).collect();
        let mut id = Task::new_id();
        while taken.contains(id.as_str()) {
            id = Task::new_id();
        }

        let task = Task::create(id, data, OffsetDateTime::now_utc());
        all.push(task.clone());
        self.save_all(&all)
            .await
            .map_err(|e| write_error("create", e))?;
        tracing::debug!(task_id = %task.id, user_id = %task.user_id, "created task");
        Ok(task)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        self.simulate_latency().await;
        let now = OffsetDateTime::now_utc();
        self.modify(id, "update", move |t| t.apply(patch, now)).await
    }

    async fn toggle_completion(&self, id: &str) -> Result<Task> {
        self.simulate_latency().await;
        let now = OffsetDateTime::now_utc();
        self.modify(id, "update", move |t| {
            let flipped = TaskPatch::completed(!t.completed);
            t.apply(flipped, now);
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut all = self
            .load_all()
            .await
            .map_err(|e| write_error("delete", e))?;
        let before = all.len();
        all.retain(|t| t.id != id);
        if all.len() == before {
            tracing::debug!(task_id = id, "delete of unknown task ignored");
        }
        self.save_all(&all)
            .await
            .map_err(|e| write_error("delete", e))
    }
}
