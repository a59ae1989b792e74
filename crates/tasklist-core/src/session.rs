use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::error::StoreError;
use crate::repository::TaskRepository;
use crate::store::KeyValueStore;
use crate::task::{Priority, Task, normalize_title};

/// Scratch copy of the editable fields of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

impl EditDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date,
        }
    }

    /// Draft fields over `base`; id, completion flag and unknown fields come from `base`.
    /// `None` when the title is blank.
    fn merge_onto(&self, base: &Task) -> Option<Task> {
        let title = normalize_title(&self.title).ok()?;
        Some(Task {
            title,
            description: self.description.trim().to_string(),
            priority: self.priority,
            due_date: self.due_date,
            ..base.clone()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Title(String),
    Description(String),
    Priority(Priority),
    DueDate(Option<DateTime<Utc>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Task),
    /// Blank title; the session stays in `Editing` with the draft untouched.
    Refused,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no task is being edited")]
    NotEditing,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditSession {
    #[default]
    Idle,
    Editing { original: Task, draft: EditDraft },
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, EditSession::Editing { .. })
    }

    pub fn editing_id(&self) -> Option<&str> {
        match self {
            EditSession::Editing { original, .. } => Some(original.id.as_str()),
            EditSession::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        match self {
            EditSession::Editing { draft, .. } => Some(draft),
            EditSession::Idle => None,
        }
    }

    /// Opens `task` for editing. Any draft already open is dropped.
    pub fn start_editing(&mut self, task: &Task) {
        if let Some(previous) = self.editing_id() {
            debug!(previous = %previous, next = %task.id, "discarding open draft");
        }
        *self = EditSession::Editing {
            original: task.clone(),
            draft: EditDraft::from_task(task),
        };
    }

    pub fn apply(&mut self, change: FieldChange) -> Result<(), SessionError> {
        let EditSession::Editing { draft, .. } = self else {
            return Err(SessionError::NotEditing);
        };
        match change {
            FieldChange::Title(title) => draft.title = title,
            FieldChange::Description(description) => draft.description = description,
            FieldChange::Priority(priority) => draft.priority = priority,
            FieldChange::DueDate(due_date) => draft.due_date = due_date,
        }
        Ok(())
    }

    /// Returns the discarded draft, if one was open. Nothing is persisted.
    pub fn cancel(&mut self) -> Option<EditDraft> {
        match std::mem::take(self) {
            EditSession::Editing { draft, .. } => Some(draft),
            EditSession::Idle => None,
        }
    }

    /// Commits the draft through `repo.update` and returns to `Idle`.
    ///
    /// The draft is merged onto the repository's current copy of the task, so a
    /// completion toggled while the draft was open is kept. Once the title check passes
    /// the session is closed even if the repository then reports an error.
    #[tracing::instrument(skip(self, repo), fields(id = ?self.editing_id()))]
    pub async fn save<S>(&mut self, repo: &TaskRepository<S>) -> Result<SaveOutcome, SessionError>
    where
        S: KeyValueStore + ?Sized,
    {
        let EditSession::Editing { original, draft } = self else {
            return Err(SessionError::NotEditing);
        };

        let base = repo
            .get(&original.id)
            .await
            .unwrap_or_else(|| original.clone());
        let Some(merged) = draft.merge_onto(&base) else {
            debug!("blank title, staying in edit mode");
            return Ok(SaveOutcome::Refused);
        };

        *self = EditSession::Idle;
        repo.update(merged.clone()).await?;
        Ok(SaveOutcome::Saved(merged))
    }
}
