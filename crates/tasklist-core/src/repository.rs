use std::io;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::projection::{self, Counts, TaskFilter};
use crate::store::KeyValueStore;
use crate::task::{NewTask, Task, TaskList, normalize_title};

pub const DEFAULT_TASKS_KEY: &str = "@tasks";

/// Owns the in-memory task list for one consumer and mirrors every change into the store.
///
/// Mutations hold the list lock across their store write, so two mutations issued
/// back-to-back on the same instance are applied and persisted one after the other.
pub struct TaskRepository<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
    tasks: Mutex<TaskList>,
}

impl<S: KeyValueStore + ?Sized> TaskRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, DEFAULT_TASKS_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            tasks: Mutex::new(TaskList::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads and decodes the stored list without touching the in-memory copy.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub async fn fetch(&self) -> Result<TaskList, StoreError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            debug!("no stored task list");
            return Ok(TaskList::new());
        };
        if raw.trim().is_empty() {
            return Ok(TaskList::new());
        }

        TaskList::from_json(&raw).map_err(|source| StoreError::Deserialization {
            key: self.key.clone(),
            source,
        })
    }

    /// Replaces the in-memory list with the stored one. Read or decode failures are
    /// logged and leave an empty list; the stored value itself is never rewritten here.
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub async fn load(&self) -> Vec<Task> {
        let mut tasks = self.tasks.lock().await;
        match self.fetch().await {
            Ok(list) => {
                info!(count = list.len(), "loaded tasks");
                *tasks = list;
            }
            Err(err) => {
                warn!(error = %err, "failed to load tasks, continuing with an empty list");
                *tasks = TaskList::new();
            }
        }
        tasks.to_vec()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.to_vec()
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.lock().await.get(id).cloned()
    }

    pub async fn project<F>(&self, filter: &F) -> Vec<Task>
    where
        F: TaskFilter + ?Sized,
    {
        let tasks = self.tasks.lock().await;
        projection::project(&*tasks, filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn counts(&self) -> Counts {
        projection::counts(&*self.tasks.lock().await)
    }

    /// Creates a task at the front of the list. A blank title is refused before any I/O.
    #[tracing::instrument(skip(self, input))]
    pub async fn add(&self, input: NewTask) -> Result<Task, StoreError> {
        normalize_title(&input.title)?;

        let mut tasks = self.tasks.lock().await;
        let id = tasks.fresh_id(Utc::now());
        let task = Task::from_new(id, input)?;
        tasks.prepend(task.clone())?;
        debug!(id = %task.id, count = tasks.len(), "task added");

        self.persist(&tasks).await?;
        Ok(task)
    }

    /// Replaces the entry with the same id. Unknown ids are reported as `NotFound`.
    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    pub async fn update(&self, mut task: Task) -> Result<(), StoreError> {
        task.title = normalize_title(&task.title)?;
        task.description = task.description.trim().to_string();

        let mut tasks = self.tasks.lock().await;
        let id = task.id.clone();
        if tasks.replace(task).is_none() {
            return Err(StoreError::NotFound { id });
        }
        debug!("task updated");

        self.persist(&tasks).await
    }

    /// Returns the new completion flag.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_completed(&self, id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let completed = tasks
            .toggle_completed(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        debug!(completed, "task toggled");

        self.persist(&tasks).await?;
        Ok(completed)
    }

    /// Removes the entry and returns it. An unknown id is a no-op and nothing is written.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let Some(removed) = tasks.remove(id) else {
            debug!("nothing to delete");
            return Ok(None);
        };
        debug!(count = tasks.len(), "task deleted");

        self.persist(&tasks).await?;
        Ok(Some(removed))
    }

    /// Replaces the whole list (newest first) and overwrites the stored copy.
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub async fn save(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let list = TaskList::from_newest_first(tasks)?;
        let mut current = self.tasks.lock().await;
        *current = list;
        self.persist(&current).await
    }

    async fn persist(&self, tasks: &TaskList) -> Result<(), StoreError> {
        let payload = tasks.to_json().map_err(|err| StoreError::StoreWrite {
            key: self.key.clone(),
            source: io::Error::other(err),
        })?;

        if let Err(err) = self.store.set(&self.key, payload).await {
            warn!(
                error = %err,
                count = tasks.len(),
                "failed to save tasks, in-memory list kept"
            );
            return Err(err);
        }
        Ok(())
    }
}
