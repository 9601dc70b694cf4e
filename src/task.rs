//! Task record and its document mapping.
//!
//! A [`Task`] is the typed view of one document in the `tasks` collection.
//! Documents arriving from the store are parsed through [`Task::from_document`],
//! which rejects anything that does not match the schema instead of trusting
//! the payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::{Category, Status};
use crate::store::Document;

/// Collection holding all task documents.
pub const TASKS_COLLECTION: &str = "tasks";

/// A personal task owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub dueon: NaiveDate,
    pub status: Status,
    pub is_completed: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field layout of a stored task document (everything but the id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskFields {
    user_id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    category: Category,
    dueon: NaiveDate,
    status: Status,
    #[serde(default)]
    is_completed: Option<bool>,
    #[serde(default)]
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Why a stored document could not be read as a task.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("document {id}: {source}")]
    Shape { id: String, source: serde_json::Error },

    #[error("document {id}: title is empty")]
    EmptyTitle { id: String },

    #[error("document {id}: userId is empty")]
    MissingOwner { id: String },
}

impl Task {
    /// Parse and normalise a stored document.
    ///
    /// `isCompleted` is always re-derived from `status`; a stored value that
    /// disagrees is ignored. Empty descriptions read as absent.
    pub fn from_document(doc: &Document) -> Result<Task, SchemaError> {
        let fields: TaskFields = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|source| SchemaError::Shape { id: doc.id.clone(), source })?;

        if fields.title.trim().is_empty() {
            return Err(SchemaError::EmptyTitle { id: doc.id.clone() });
        }
        if fields.user_id.is_empty() {
            return Err(SchemaError::MissingOwner { id: doc.id.clone() });
        }
        if fields.is_completed.is_some_and(|c| c != fields.status.is_completed()) {
            tracing::debug!(id = %doc.id, status = %fields.status, "isCompleted disagrees with status, using status");
        }

        Ok(Task {
            id: doc.id.clone(),
            user_id: fields.user_id,
            title: fields.title,
            description: fields.description.filter(|d| !d.trim().is_empty()),
            category: fields.category,
            dueon: fields.dueon,
            status: fields.status,
            is_completed: fields.status.is_completed(),
            image_url: fields.image_url.filter(|u| !u.is_empty()),
            created_at: fields.created_at,
            updated_at: fields.updated_at,
        })
    }

    /// Render the full document body for a new record.
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let fields = TaskFields {
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            dueon: self.dueon,
            status: self.status,
            is_completed: Some(self.status.is_completed()),
            image_url: self.image_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        serde_json::to_value(fields).and_then(serde_json::from_value)
    }
}

/// A partial update to a task document.
///
/// Only the fields that are `Some` are written. `image_url: Some(None)`
/// clears the attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Category>,
    pub dueon: Option<NaiveDate>,
    pub status: Option<Status>,
    pub image_url: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// Patch that moves a task to `status`, keeping `isCompleted` in step.
    pub fn status(status: Status) -> Self {
        TaskPatch { status: Some(status), ..Default::default() }
    }

    /// Document fields to merge into the stored record.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(title) = &self.title {
            map.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(desc) = &self.description {
            map.insert("description".into(), desc.clone().map(Value::String).unwrap_or(Value::Null));
        }
        if let Some(category) = self.category {
            map.insert("category".into(), Value::String(category.as_str().into()));
        }
        if let Some(dueon) = self.dueon {
            map.insert("dueon".into(), Value::String(dueon.format("%Y-%m-%d").to_string()));
        }
        if let Some(status) = self.status {
            map.insert("status".into(), Value::String(status.as_str().into()));
            map.insert("isCompleted".into(), Value::Bool(status.is_completed()));
        }
        if let Some(url) = &self.image_url {
            map.insert("imageUrl".into(), url.clone().map(Value::String).unwrap_or(Value::Null));
        }
        if let Some(at) = self.updated_at {
            map.insert("updatedAt".into(), Value::String(at.to_rfc3339()));
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(fields) => Document { id: "t1".into(), fields },
            _ => unreachable!(),
        }
    }

    fn stored() -> Value {
        json!({
            "userId": "u1",
            "title": "Write report",
            "description": "",
            "category": "Work",
            "dueon": "2025-01-20",
            "status": "COMPLETED",
            "isCompleted": false,
            "imageUrl": null,
            "createdAt": "2025-01-10T09:00:00Z",
            "updatedAt": "2025-01-11T09:00:00Z"
        })
    }

    #[test]
    fn reads_stored_document_and_derives_completion() {
        let task = Task::from_document(&doc(stored())).unwrap();
        assert_eq!(task.status, Status::Completed);
        assert!(task.is_completed);
        assert_eq!(task.description, None);
        assert_eq!(task.image_url, None);
    }

    #[test]
    fn rejects_unknown_status() {
        let mut value = stored();
        value["status"] = json!("BLOCKED");
        assert!(matches!(Task::from_document(&doc(value)), Err(SchemaError::Shape { .. })));
    }

    #[test]
    fn rejects_missing_owner() {
        let mut value = stored();
        value["userId"] = json!("");
        assert!(matches!(Task::from_document(&doc(value)), Err(SchemaError::MissingOwner { .. })));
    }

    #[test]
    fn status_patch_carries_completion_flag() {
        let fields = TaskPatch::status(Status::InProgress).to_fields();
        assert_eq!(fields["status"], json!("IN-PROGRESS"));
        assert_eq!(fields["isCompleted"], json!(false));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn cleared_image_patches_null() {
        let patch = TaskPatch { image_url: Some(None), ..Default::default() };
        assert_eq!(patch.to_fields()["imageUrl"], Value::Null);
    }

    #[test]
    fn new_record_fields_round_trip() {
        let task = Task::from_document(&doc(stored())).unwrap();
        let fields = task.to_fields().unwrap();
        for key in ["userId", "title", "category", "dueon", "status", "isCompleted", "createdAt", "updatedAt"] {
            assert!(fields.contains_key(key), "missing {key}");
        }
        let back = Task::from_document(&Document { id: task.id.clone(), fields }).unwrap();
        assert_eq!(back, task);
    }
}
