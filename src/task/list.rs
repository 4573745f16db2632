#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::{Result, TaskdeckError};
use crate::store::{self, FILTERS_KEY, KeyValueStore};
use crate::task::model::{NewTask, Task, TaskPatch};
use crate::task::query::{self, FilterParams, Pagination, SortParams, TaskView};
use crate::task::repository::TaskRepository;

/// One user's tasks as held in memory by an open session, plus the current
/// view parameters. Mutations go through the repository first; memory only
/// changes once the write succeeds.
pub struct TaskList {
    user_id: String,
    repo: Arc<dyn TaskRepository>,
    store: Arc<dyn KeyValueStore>,
    tasks: Vec<Task>,
    filters: FilterParams,
    sort: SortParams,
    pagination: Pagination,
}

impl TaskList {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        repo: Arc<dyn TaskRepository>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            repo,
            store,
            tasks: Vec::new(),
            filters: FilterParams::default(),
            sort: SortParams::default(),
            pagination: Pagination::default(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, limit: NonZeroUsize) -> Self {
        self.pagination = Pagination::first_page(limit);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortParams) -> Self {
        self.sort = sort;
        self
    }

    /// Loads the user's tasks and any saved filters.
    pub async fn open(&mut self) {
        self.load().await;
        self.load_saved_filters().await;
    }

    pub async fn load(&mut self) {
        self.tasks = self.repo.list_by_user(&self.user_id).await;
        tracing::debug!(user_id = %self.user_id, count = self.tasks.len(), "loaded tasks");
    }

    pub async fn load_saved_filters(&mut self) {
        match store::get_json::<FilterParams>(self.store.as_ref(), FILTERS_KEY).await {
            Ok(Some(saved)) => self.filters = saved,
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "failed to load filters"),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Every loaded task, newest first, ignoring the view parameters.
    #[must_use]
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn filters(&self) -> &FilterParams {
        &self.filters
    }

    #[must_use]
    pub fn sort(&self) -> SortParams {
        self.sort
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    #[must_use]
    pub fn view(&self) -> TaskView {
        query::derive_view(&self.tasks, &self.filters, &self.sort, &self.pagination)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        let total = query::filter_and_sort(&self.tasks, &self.filters, &self.sort).len();
        query::page_count(total, self.pagination.limit)
    }

    pub async fn add(&mut self, title: &str, description: &str) -> Result<Task> {
        let task = self
            .repo
            .create(NewTask {
                title: title.to_owned(),
                description: description.to_owned(),
                user_id: self.user_id.clone(),
            })
            .await?;
        self.tasks.insert(0, task.clone());
        Ok(task)
    }

    /// Only tasks in this list can be edited; any other id is not found.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Task> {
        if self.get(id).is_none() {
            return Err(TaskdeckError::TaskNotFound(id.to_owned()));
        }
        let task = self.repo.update(id, patch).await?;
        self.replace(&task);
        Ok(task)
    }

    /// Ids outside this list are ignored, leaving other users' tasks alone.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            tracing::debug!(task_id = id, "delete of unloaded task ignored");
            return Ok(());
        }
        self.repo.remove(id).await?;
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    /// Returns `Ok(None)` without touching storage when `id` is not loaded.
    pub async fn toggle_completion(&mut self, id: &str) -> Result<Option<Task>> {
        if self.get(id).is_none() {
            tracing::debug!(task_id = id, "toggle of unloaded task ignored");
            return Ok(None);
        }
        let task = self.repo.toggle_completion(id).await?;
        self.replace(&task);
        Ok(Some(task))
    }

    /// Replaces the filters, returns to the first page and saves the filters
    /// for the next session.
    pub async fn set_filters(&mut self, filters: FilterParams) {
        self.filters = filters;
        self.pagination.page = NonZeroUsize::MIN;
        if let Err(err) = store::set_json(self.store.as_ref(), FILTERS_KEY, &self.filters).await {
            tracing::warn!(error = %err, "failed to save filters");
        }
    }

    pub async fn clear_saved_filters(&mut self) -> Result<()> {
        self.filters = FilterParams::default();
        self.pagination.page = NonZeroUsize::MIN;
        self.store.remove(FILTERS_KEY).await
    }

    pub fn set_sort(&mut self, sort: SortParams) {
        self.sort = sort;
    }

    pub fn set_pagination(&mut self, pagination: Pagination) {
        self.pagination = pagination;
    }

    /// Moves to `page` when it exists; returns false and stays put otherwise.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        match NonZeroUsize::new(page) {
            Some(p) if page <= self.page_count() => {
                self.pagination.page = p;
                true
            }
            _ => false,
        }
    }

    fn replace(&mut self, task: &Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task.clone();
        }
    }
}
