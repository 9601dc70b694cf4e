//! Task writes.
//!
//! Every operation here is a thin wrapper around the document store. None of
//! them touch the in-memory [`TaskStore`](crate::task_store::TaskStore): the
//! result becomes visible when the live feed delivers the next snapshot.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use futures::future::join_all;
use futures::StreamExt;

use crate::error::{ServiceError, StoreError};
use crate::fields::Status;
use crate::store::blob::attachment_key;
use crate::store::{BlobStore, DocumentStore};
use crate::task::{Task, TaskPatch, TASKS_COLLECTION};
use crate::task_store::subscribe;
use crate::validation::{Attachment, TaskDraft};

pub const CREATE_FAILED: &str = "Failed to create task. Please try again.";
pub const UPDATE_FAILED: &str = "Failed to update task. Please try again.";
pub const DELETE_FAILED: &str = "Failed to delete task. Please try again.";
pub const STATUS_FAILED: &str = "Failed to update task status. Please try again.";
pub const BULK_DELETE_FAILED: &str = "Failed to delete tasks. Please try again.";
pub const BULK_STATUS_FAILED: &str = "Failed to update task statuses. Please try again.";

/// What to do with an existing attachment when the edit form has no new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageChange {
    #[default]
    Keep,
    Remove,
}

/// One end of a card move: a status column and the position inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropLocation {
    pub status: Status,
    pub index: usize,
}

/// A finished drag. `destination` is `None` when the card was dropped
/// outside every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropResult {
    pub task_id: String,
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

impl DropResult {
    pub fn is_noop(&self) -> bool {
        self.destination.is_none_or(|d| d == self.source)
    }
}

/// Result of a bulk operation: every id was attempted.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, ServiceError)>,
}

impl BulkOutcome {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        TaskService { store, blobs }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    async fn upload(&self, uid: &str, attachment: &Attachment) -> Result<String, ServiceError> {
        let key = attachment_key(uid, &attachment.file_name, Utc::now().timestamp_millis());
        let url = self.blobs.upload(&key, &attachment.data).await.map_err(|e| {
            tracing::error!(error = %e, %key, "attachment upload failed");
            e
        })?;
        Ok(url)
    }

    /// Validate the draft, upload its attachment if any, then write the
    /// new record. Returns the id the store assigned.
    pub async fn create(&self, uid: &str, draft: TaskDraft) -> Result<String, ServiceError> {
        let valid = draft.validate(Self::today())?;
        let image_url = match &draft.attachment {
            Some(a) => Some(self.upload(uid, a).await?),
            None => None,
        };

        let now = Utc::now();
        let task = Task {
            id: String::new(),
            user_id: uid.to_string(),
            title: valid.title,
            description: valid.description,
            category: valid.category,
            dueon: valid.dueon,
            status: valid.status,
            is_completed: valid.status.is_completed(),
            image_url,
            created_at: now,
            updated_at: now,
        };
        let id = self.store.add(TASKS_COLLECTION, task.to_fields()?).await.map_err(|e| {
            tracing::error!(error = %e, "error creating task");
            e
        })?;
        tracing::info!(%id, uid, "task created");
        Ok(id)
    }

    /// Rewrite every editable field of `id`. A new attachment in the draft
    /// replaces the old one; otherwise `image` decides.
    pub async fn update(
        &self,
        uid: &str,
        id: &str,
        draft: TaskDraft,
        image: ImageChange,
    ) -> Result<(), ServiceError> {
        let valid = draft.validate(Self::today())?;
        let image_url = match (&draft.attachment, image) {
            (Some(a), _) => Some(Some(self.upload(uid, a).await?)),
            (None, ImageChange::Remove) => Some(None),
            (None, ImageChange::Keep) => None,
        };

        let patch = TaskPatch {
            title: Some(valid.title),
            description: Some(valid.description),
            category: Some(valid.category),
            dueon: Some(valid.dueon),
            status: Some(valid.status),
            image_url,
            updated_at: Some(Utc::now()),
        };
        self.patch(id, &patch).await.map_err(|e| {
            tracing::error!(error = %e, id, "error updating task");
            e
        })
    }

    async fn patch(&self, id: &str, patch: &TaskPatch) -> Result<(), ServiceError> {
        self.store.update(TASKS_COLLECTION, id, patch.to_fields()).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete(TASKS_COLLECTION, id).await.map_err(|e| {
            tracing::error!(error = %e, id, "error deleting task");
            ServiceError::from(e)
        })
    }

    /// Move a task to `status`, writing `isCompleted` with it.
    pub async fn set_status(&self, id: &str, status: Status) -> Result<(), ServiceError> {
        self.patch(id, &TaskPatch::status(status)).await.map_err(|e| {
            tracing::error!(error = %e, id, %status, "error updating task status");
            e
        })
    }

    /// Completed tasks go back to the to-do column, anything else completes.
    pub async fn toggle_completed(&self, task: &Task) -> Result<Status, ServiceError> {
        let next = if task.status.is_completed() { Status::ToDo } else { Status::Completed };
        self.set_status(&task.id, next).await?;
        Ok(next)
    }

    /// Apply a finished drag. Returns `false` when nothing had to be written.
    pub async fn drag_end(&self, drop: &DropResult) -> Result<bool, ServiceError> {
        let Some(destination) = drop.destination.filter(|_| !drop.is_noop()) else {
            return Ok(false);
        };
        self.set_status(&drop.task_id, destination.status).await?;
        Ok(true)
    }

    /// Delete all `ids` concurrently and wait for every one of them.
    pub async fn delete_many(&self, ids: &[String]) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| self.store.delete(TASKS_COLLECTION, id))).await;
        let outcome = collect(ids, results);
        if !outcome.is_ok() {
            tracing::error!(failed = outcome.failed.len(), "error deleting tasks");
        }
        outcome
    }

    /// Move all `ids` to `status` concurrently.
    pub async fn set_status_many(&self, ids: &[String], status: Status) -> BulkOutcome {
        let patch = TaskPatch::status(status).to_fields();
        let results = join_all(
            ids.iter().map(|id| self.store.update(TASKS_COLLECTION, id, patch.clone())),
        )
        .await;
        let outcome = collect(ids, results);
        if !outcome.is_ok() {
            tracing::error!(failed = outcome.failed.len(), %status, "error updating task statuses");
        }
        outcome
    }

    /// Current tasks of `uid`, in store order.
    pub async fn list(&self, uid: &str) -> Result<Vec<Task>, ServiceError> {
        match subscribe(self.store.clone(), uid).next().await {
            Some(Ok(tasks)) => Ok(tasks),
            Some(Err(e)) => Err(e.source.into()),
            None => Err(StoreError::Feed("feed closed before the first snapshot".into()).into()),
        }
    }

    /// Find the task of `uid` whose id is `prefix` or starts with it.
    pub async fn resolve(&self, uid: &str, prefix: &str) -> Result<Task, ServiceError> {
        let tasks = self.list(uid).await?;
        resolve_in(tasks, prefix)
    }
}

/// Pick the task matching `prefix`; an exact id always wins.
pub fn resolve_in(tasks: Vec<Task>, prefix: &str) -> Result<Task, ServiceError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(ServiceError::UnknownTask(prefix.to_string()));
    }
    let mut matches: Vec<Task> = tasks.into_iter().filter(|t| t.id.starts_with(prefix)).collect();
    if let Some(pos) = matches.iter().position(|t| t.id == prefix) {
        return Ok(matches.swap_remove(pos));
    }
    match matches.len() {
        0 => Err(ServiceError::UnknownTask(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(ServiceError::AmbiguousTask(prefix.to_string())),
    }
}

fn collect(ids: &[String], results: Vec<Result<(), StoreError>>) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(()) => outcome.succeeded.push(id.clone()),
            Err(e) => outcome.failed.push((id.clone(), e.into())),
        }
    }
    outcome
}
