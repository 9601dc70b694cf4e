//! Task form validation.
//!
//! A [`TaskDraft`] holds what the user typed. [`TaskDraft::validate`] turns it
//! into a [`ValidTask`] or reports every failing field at once so the form
//! can show the messages inline.

use std::fmt;
use std::io;
use std::path::Path;

use chrono::NaiveDate;

use crate::dates::parse_due;
use crate::fields::{Category, Status};

/// Largest attachment accepted: 2 MiB.
pub const MAX_ATTACHMENT_BYTES: usize = 2 * 1024 * 1024;
pub const MIN_TITLE_CHARS: usize = 3;
pub const MIN_DESCRIPTION_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Category,
    Dueon,
    Status,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// All field errors of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: Field, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for `field`, if it failed.
    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.errors.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".into());
        Ok(Attachment { file_name, data })
    }
}

/// Raw form input for creating or editing a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub dueon: String,
    pub status: Option<Status>,
    pub attachment: Option<Attachment>,
}

/// Field values that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub dueon: NaiveDate,
    pub status: Status,
}

impl TaskDraft {
    /// Check every field; `today` anchors relative due dates like "tomorrow".
    pub fn validate(&self, today: NaiveDate) -> Result<ValidTask, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(Field::Title, "Title is required");
        } else if title.chars().count() < MIN_TITLE_CHARS {
            errors.push(Field::Title, "Title must be at least 3 characters");
        }

        // An empty description is the same as no description.
        let description = Some(self.description.trim()).filter(|d| !d.is_empty());
        if description.is_some_and(|d| d.chars().count() < MIN_DESCRIPTION_CHARS) {
            errors.push(Field::Description, "Description must be at least 10 characters");
        }

        if self.category.is_none() {
            errors.push(Field::Category, "Category is required");
        }

        let dueon = if self.dueon.trim().is_empty() {
            errors.push(Field::Dueon, "Due date is required");
            None
        } else {
            let parsed = parse_due(&self.dueon, today);
            if parsed.is_none() {
                errors.push(Field::Dueon, "Due date is not a valid date");
            }
            parsed
        };

        if self.status.is_none() {
            errors.push(Field::Status, "Status is required");
        }

        if self.attachment.as_ref().is_some_and(|a| a.data.len() > MAX_ATTACHMENT_BYTES) {
            errors.push(Field::Image, "File size is too large (max 2MB)");
        }

        match (self.category, dueon, self.status) {
            (Some(category), Some(dueon), Some(status)) if errors.is_empty() => Ok(ValidTask {
                title: title.to_string(),
                description: description.map(str::to_string),
                category,
                dueon,
                status,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn draft() -> TaskDraft {
        TaskDraft {
            title: "Buy milk".into(),
            description: String::new(),
            category: Some(Category::Personal),
            dueon: "2025-01-20".into(),
            status: Some(Status::ToDo),
            attachment: None,
        }
    }

    #[test]
    fn accepts_minimal_task() {
        let valid = draft().validate(today()).unwrap();
        assert_eq!(valid.title, "Buy milk");
        assert_eq!(valid.description, None);
        assert_eq!(valid.dueon, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
    }

    #[test]
    fn short_title_is_rejected() {
        let mut d = draft();
        d.title = "ab".into();
        let errs = d.validate(today()).unwrap_err();
        assert_eq!(errs.get(Field::Title), Some("Title must be at least 3 characters"));
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errs = TaskDraft::default().validate(today()).unwrap_err();
        assert_eq!(errs.get(Field::Title), Some("Title is required"));
        assert_eq!(errs.get(Field::Category), Some("Category is required"));
        assert_eq!(errs.get(Field::Dueon), Some("Due date is required"));
        assert_eq!(errs.get(Field::Status), Some("Status is required"));
        assert_eq!(errs.get(Field::Description), None);
    }

    #[test]
    fn short_description_is_rejected_but_long_one_kept() {
        let mut d = draft();
        d.description = "too short".into();
        assert!(d.validate(today()).unwrap_err().get(Field::Description).is_some());

        d.description = "  long enough description ".into();
        assert_eq!(d.validate(today()).unwrap().description.as_deref(), Some("long enough description"));
    }

    #[test]
    fn oversized_attachment_is_rejected() {
        let mut d = draft();
        d.attachment = Some(Attachment { file_name: "big.png".into(), data: vec![0; MAX_ATTACHMENT_BYTES + 1] });
        assert_eq!(d.validate(today()).unwrap_err().get(Field::Image), Some("File size is too large (max 2MB)"));

        d.attachment = Some(Attachment { file_name: "ok.png".into(), data: vec![0; MAX_ATTACHMENT_BYTES] });
        assert!(d.validate(today()).is_ok());
    }

    #[test]
    fn relative_due_dates_resolve() {
        let mut d = draft();
        d.dueon = "tomorrow".into();
        assert_eq!(d.validate(today()).unwrap().dueon, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
        d.dueon = "whenever".into();
        assert_eq!(d.validate(today()).unwrap_err().get(Field::Dueon), Some("Due date is not a valid date"));
    }

    #[test]
    fn out_of_range_relative_due_date_is_invalid() {
        let mut d = draft();
        d.dueon = "in 99999999d".into();
        assert_eq!(d.validate(today()).unwrap_err().get(Field::Dueon), Some("Due date is not a valid date"));
    }
}
