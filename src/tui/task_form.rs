//! Task form handling for the terminal user interface.
//!
//! One form serves both create and edit. It collects raw input into a
//! [`TaskDraft`], validates it locally so errors show inline right away, and
//! hands a [`Submission`] to the app, which runs the write in the background.
//! While that write is in flight the submit button is disabled.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::fields::{Category, Status};
use crate::service::ImageChange;
use crate::task::Task;
use crate::tui::colors::{BRAND, ERROR, GOLD};
use crate::tui::input::InputField;
use crate::tui::utils::centered_rect;
use crate::validation::{Attachment, Field, TaskDraft, ValidationErrors};

/// Field order for Tab/Up/Down navigation.
pub const TITLE_FIELD: usize = 0;
pub const DESCRIPTION_FIELD: usize = 1;
pub const CATEGORY_FIELD: usize = 2;
pub const DUE_FIELD: usize = 3;
pub const STATUS_FIELD: usize = 4;
pub const ATTACHMENT_FIELD: usize = 5;
/// Only present when editing a task that has an attachment.
pub const REMOVE_IMAGE_FIELD: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc> },
}

/// A validated form, ready to be written.
#[derive(Debug, Clone)]
pub struct Submission {
    /// `Some(id)` when editing.
    pub editing: Option<String>,
    pub draft: TaskDraft,
    pub image: ImageChange,
}

/// What the form wants after a key press.
#[derive(Debug)]
pub enum FormOutcome {
    Continue,
    Cancel,
    Submit(Submission),
}

pub struct TaskForm {
    pub mode: FormMode,
    pub title: InputField,
    pub description: InputField,
    pub category: Option<Category>,
    pub due: InputField,
    pub status: Option<Status>,
    /// Path of a new file to upload.
    pub attachment: InputField,
    pub existing_image: Option<String>,
    pub remove_image: bool,
    pub current_field: usize,
    pub errors: ValidationErrors,
    pub submitting: bool,
}

impl TaskForm {
    /// Empty form for a new task. `status` preselects a section, as when
    /// adding from inside one.
    pub fn new(status: Option<Status>) -> Self {
        let mut form = TaskForm {
            mode: FormMode::Create,
            title: InputField::new(),
            description: InputField::new(),
            category: None,
            due: InputField::new(),
            status,
            attachment: InputField::new(),
            existing_image: None,
            remove_image: false,
            current_field: TITLE_FIELD,
            errors: ValidationErrors::default(),
            submitting: false,
        };
        form.update_active_field();
        form
    }

    /// Form prefilled from the task as it is in the latest snapshot.
    pub fn from_task(task: &Task) -> Self {
        let mut form = TaskForm::new(Some(task.status));
        form.mode = FormMode::Edit {
            id: task.id.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        };
        form.title = InputField::with_value(&task.title);
        form.description = InputField::with_value(task.description.as_deref().unwrap_or_default());
        form.category = Some(task.category);
        form.due = InputField::with_value(&task.dueon.format("%Y-%m-%d").to_string());
        form.existing_image = task.image_url.clone();
        form.update_active_field();
        form
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit { .. })
    }

    pub fn field_count(&self) -> usize {
        if self.is_edit() && self.existing_image.is_some() {
            REMOVE_IMAGE_FIELD + 1
        } else {
            ATTACHMENT_FIELD + 1
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % self.field_count();
        self.update_active_field();
    }

    pub fn prev_field(&mut self) {
        self.current_field = if self.current_field == 0 {
            self.field_count() - 1
        } else {
            self.current_field - 1
        };
        self.update_active_field();
    }

    fn update_active_field(&mut self) {
        let current = self.current_field;
        for (index, field) in [
            (TITLE_FIELD, &mut self.title),
            (DESCRIPTION_FIELD, &mut self.description),
            (DUE_FIELD, &mut self.due),
            (ATTACHMENT_FIELD, &mut self.attachment),
        ] {
            field.active = index == current;
        }
    }

    fn active_input(&mut self) -> Option<&mut InputField> {
        match self.current_field {
            TITLE_FIELD => Some(&mut self.title),
            DESCRIPTION_FIELD => Some(&mut self.description),
            DUE_FIELD => Some(&mut self.due),
            ATTACHMENT_FIELD => Some(&mut self.attachment),
            _ => None,
        }
    }

    /// Left/Right: move the cursor in text fields, cycle selectors.
    pub fn handle_left_right(&mut self, right: bool) {
        match self.current_field {
            CATEGORY_FIELD => self.category = Some(cycle(&Category::ALL, self.category, right)),
            STATUS_FIELD => self.status = Some(cycle(&Status::ALL, self.status, right)),
            REMOVE_IMAGE_FIELD => self.remove_image = !self.remove_image,
            _ => {
                if let Some(input) = self.active_input() {
                    if right {
                        input.move_cursor_right()
                    } else {
                        input.move_cursor_left()
                    }
                }
            }
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, today: NaiveDate) -> FormOutcome {
        match code {
            KeyCode::Esc => return FormOutcome::Cancel,
            KeyCode::Enter => return self.submit(today),
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => return self.submit(today),
            KeyCode::Tab | KeyCode::Down => self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.prev_field(),
            KeyCode::Left => self.handle_left_right(false),
            KeyCode::Right => self.handle_left_right(true),
            KeyCode::Home => {
                if let Some(input) = self.active_input() {
                    input.move_home();
                }
            }
            KeyCode::End => {
                if let Some(input) = self.active_input() {
                    input.move_end();
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = self.active_input() {
                    input.handle_backspace();
                }
            }
            KeyCode::Delete => {
                if let Some(input) = self.active_input() {
                    input.handle_delete();
                }
            }
            KeyCode::Char(' ') if self.current_field == REMOVE_IMAGE_FIELD => {
                self.remove_image = !self.remove_image;
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.active_input() {
                    input.handle_char(c);
                }
            }
            _ => {}
        }
        FormOutcome::Continue
    }

    /// Validate and, if everything passes, mark the form as submitting.
    /// Does nothing while a previous submission is still in flight.
    pub fn submit(&mut self, today: NaiveDate) -> FormOutcome {
        if self.submitting {
            return FormOutcome::Continue;
        }

        let mut draft = TaskDraft {
            title: self.title.value.clone(),
            description: self.description.value.clone(),
            category: self.category,
            dueon: self.due.value.clone(),
            status: self.status,
            attachment: None,
        };

        let path = self.attachment.value.trim();
        let mut unreadable = false;
        if !path.is_empty() {
            match Attachment::from_path(Path::new(path)) {
                Ok(file) => draft.attachment = Some(file),
                Err(e) => {
                    tracing::warn!(path, error = %e, "attachment not readable");
                    unreadable = true;
                }
            }
        }

        let mut errors = match draft.validate(today) {
            Ok(_) => ValidationErrors::default(),
            Err(errors) => errors,
        };
        if unreadable {
            errors.push(Field::Image, "File could not be read");
        }
        if !errors.is_empty() {
            self.errors = errors;
            return FormOutcome::Continue;
        }

        self.errors = ValidationErrors::default();
        self.submitting = true;
        let image = if self.remove_image && draft.attachment.is_none() {
            ImageChange::Remove
        } else {
            ImageChange::Keep
        };
        let editing = match &self.mode {
            FormMode::Edit { id, .. } => Some(id.clone()),
            FormMode::Create => None,
        };
        FormOutcome::Submit(Submission { editing, draft, image })
    }

    /// The write came back. Errors from the service's own validation are
    /// shown inline; anything else is reported by the caller.
    pub fn finish(&mut self, errors: Option<ValidationErrors>) {
        self.submitting = false;
        if let Some(errors) = errors {
            self.errors = errors;
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match (self.is_edit(), self.submitting) {
            (false, false) => "CREATE",
            (false, true) => "CREATING...",
            (true, false) => "UPDATE",
            (true, true) => "UPDATING...",
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(70, 90, area);
        f.render_widget(Clear, area);

        let title = if self.is_edit() { " Edit Task " } else { " Create Task " };
        let outer = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BRAND));
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let mut constraints = vec![
            Constraint::Length(4), // Title
            Constraint::Length(5), // Description
            Constraint::Length(4), // Category
            Constraint::Length(4), // Due
            Constraint::Length(4), // Status
            Constraint::Length(4), // Attachment
        ];
        if self.field_count() > REMOVE_IMAGE_FIELD {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(2)); // Activity and buttons
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        self.render_input(f, chunks[0], TITLE_FIELD, "Task title *", &self.title, Field::Title);
        self.render_input(f, chunks[1], DESCRIPTION_FIELD, "Description", &self.description, Field::Description);

        let category = self.category.map(|c| c.to_string()).unwrap_or_else(|| "Select category".into());
        self.render_selector(f, chunks[2], CATEGORY_FIELD, "Category *", &category, Field::Category);

        self.render_input(f, chunks[3], DUE_FIELD, "Due on * (YYYY-MM-DD, today, fri, in 3d)", &self.due, Field::Dueon);

        let status = self.status.map(|s| s.to_string()).unwrap_or_else(|| "Choose".into());
        self.render_selector(f, chunks[4], STATUS_FIELD, "Task Status *", &status, Field::Status);

        let attachment_title = match (&self.existing_image, self.remove_image) {
            (Some(url), false) => format!("Attachment (current: {url})"),
            _ => "Attachment (file path, max 2MB)".to_string(),
        };
        self.render_input(f, chunks[5], ATTACHMENT_FIELD, &attachment_title, &self.attachment, Field::Image);

        let mut next = 6;
        if self.field_count() > REMOVE_IMAGE_FIELD {
            let mark = if self.remove_image { "[x]" } else { "[ ]" };
            let para = Paragraph::new(format!("{mark} Remove current attachment")).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(self.border_style(REMOVE_IMAGE_FIELD)),
            );
            f.render_widget(para, chunks[next]);
            next += 1;
        }

        let mut footer = Vec::new();
        if let FormMode::Edit { created_at, updated_at, .. } = &self.mode {
            footer.push(Line::from(Span::styled(
                format!(
                    "Created {}  ·  Last updated {}",
                    created_at.format("%d %b %Y, %H:%M"),
                    updated_at.format("%d %b %Y, %H:%M")
                ),
                Style::default().fg(Color::DarkGray),
            )));
        }
        let button_style = if self.submitting {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White).bg(BRAND).add_modifier(Modifier::BOLD)
        };
        footer.push(Line::from(vec![
            Span::raw("Esc CANCEL   "),
            Span::styled(format!(" Enter {} ", self.submit_label()), button_style),
        ]));
        let buttons = Paragraph::new(footer).alignment(Alignment::Right);
        f.render_widget(buttons, chunks[next]);
    }

    fn border_style(&self, field: usize) -> Style {
        if self.current_field == field {
            Style::default().fg(GOLD)
        } else {
            Style::default()
        }
    }

    fn field_block<'a>(&self, index: usize, title: &'a str, field: Field) -> (Block<'a>, Option<Line<'a>>) {
        let error = self.errors.get(field);
        let border = match error {
            Some(_) if self.current_field != index => Style::default().fg(ERROR),
            _ => self.border_style(index),
        };
        let block = Block::default().borders(Borders::ALL).title(title).border_style(border);
        let line = error.map(|msg| Line::from(Span::styled(msg, Style::default().fg(ERROR))));
        (block, line)
    }

    fn render_input(&self, f: &mut Frame, area: Rect, index: usize, title: &str, input: &InputField, field: Field) {
        let (block, error) = self.field_block(index, title, field);
        let text = if input.active { input.display_with_cursor() } else { input.value.clone() };
        let mut lines = vec![Line::from(text)];
        lines.extend(error);
        let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        f.render_widget(para, area);
    }

    fn render_selector(&self, f: &mut Frame, area: Rect, index: usize, title: &str, value: &str, field: Field) {
        let (block, error) = self.field_block(index, title, field);
        let mut lines = vec![Line::from(format!("< {value} >"))];
        lines.extend(error);
        f.render_widget(Paragraph::new(lines).block(block), area);
    }
}

/// Step through `options`, starting from the first (or last) when nothing
/// is chosen yet.
fn cycle<T: Copy + PartialEq>(options: &[T], current: Option<T>, forward: bool) -> T {
    let len = options.len();
    let next = match current.and_then(|c| options.iter().position(|&o| o == c)) {
        None if forward => 0,
        None => len - 1,
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
    };
    options[next]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn typed(form: &mut TaskForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c), KeyModifiers::NONE, today());
        }
    }

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: "t1".into(),
            user_id: "u1".into(),
            title: "Write report".into(),
            description: None,
            category: Category::Work,
            dueon: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            status: Status::InProgress,
            is_completed: false,
            image_url: Some("file:///tmp/a.png".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_submit_shows_errors_and_does_not_submit() {
        let mut form = TaskForm::new(None);
        assert!(matches!(form.submit(today()), FormOutcome::Continue));
        assert!(!form.submitting);
        assert_eq!(form.errors.get(Field::Title), Some("Title is required"));
        assert_eq!(form.errors.get(Field::Category), Some("Category is required"));
    }

    #[test]
    fn filled_form_submits_once() {
        let mut form = TaskForm::new(Some(Status::ToDo));
        typed(&mut form, "Buy milk");
        form.current_field = CATEGORY_FIELD;
        form.handle_left_right(true);
        assert_eq!(form.category, Some(Category::Work));
        form.current_field = DUE_FIELD;
        form.update_active_field();
        typed(&mut form, "tomorrow");

        let FormOutcome::Submit(sub) = form.submit(today()) else {
            panic!("expected a submission");
        };
        assert_eq!(sub.editing, None);
        assert_eq!(sub.draft.title, "Buy milk");
        assert_eq!(form.submit_label(), "CREATING...");
        // The button is disabled while the write is in flight.
        assert!(matches!(form.submit(today()), FormOutcome::Continue));

        form.finish(None);
        assert_eq!(form.submit_label(), "CREATE");
    }

    #[test]
    fn edit_form_prefills_and_can_remove_attachment() {
        let mut form = TaskForm::from_task(&task());
        assert_eq!(form.field_count(), REMOVE_IMAGE_FIELD + 1);
        assert_eq!(form.due.value, "2025-01-20");
        assert_eq!(form.submit_label(), "UPDATE");

        form.current_field = REMOVE_IMAGE_FIELD;
        form.handle_key(KeyCode::Char(' '), KeyModifiers::NONE, today());
        let FormOutcome::Submit(sub) = form.submit(today()) else {
            panic!("expected a submission");
        };
        assert_eq!(sub.editing.as_deref(), Some("t1"));
        assert_eq!(sub.image, ImageChange::Remove);
    }

    #[test]
    fn new_file_wins_over_remove_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"png").unwrap();

        let mut form = TaskForm::from_task(&task());
        form.remove_image = true;
        form.attachment = InputField::with_value(&file.path().display().to_string());
        let FormOutcome::Submit(sub) = form.submit(today()) else {
            panic!("expected a submission");
        };
        assert_eq!(sub.image, ImageChange::Keep);
        assert_eq!(sub.draft.attachment.map(|a| a.data), Some(b"png".to_vec()));
    }

    #[test]
    fn unreadable_attachment_is_a_field_error() {
        let mut form = TaskForm::from_task(&task());
        form.attachment = InputField::with_value("/definitely/not/here.png");
        assert!(matches!(form.submit(today()), FormOutcome::Continue));
        assert_eq!(form.errors.get(Field::Image), Some("File could not be read"));
    }

    #[test]
    fn selectors_wrap_around() {
        assert_eq!(cycle(&Status::ALL, None, false), Status::Completed);
        assert_eq!(cycle(&Status::ALL, Some(Status::Completed), true), Status::ToDo);
        assert_eq!(cycle(&Status::ALL, Some(Status::ToDo), false), Status::Completed);
    }
}
