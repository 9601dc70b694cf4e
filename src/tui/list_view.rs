//! Sectioned list view.
//!
//! Tasks are grouped into one collapsible section per status. Rows can be
//! checked for bulk actions, and a task can be moved to the section above or
//! below, which is the keyboard version of dragging it there.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::dates::{format_due, truncate};
use crate::fields::Status;
use crate::service::{DropLocation, DropResult};
use crate::task_store::TaskStore;
use crate::tui::colors::{status_color, GOLD};
use crate::tui::enums::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListRow {
    Header(Status),
    Empty(Status),
    Task { id: String, status: Status, index: usize },
}

#[derive(Default)]
pub struct ListView {
    collapsed: [bool; 3],
    rows: Vec<ListRow>,
    cursor: usize,
    table_state: TableState,
    /// Checked task ids, for bulk actions.
    pub selected: BTreeSet<String>,
    /// Task to keep the cursor on once the next snapshot places it.
    follow: Option<String>,
}

impl ListView {
    /// Rebuild rows from the store's filtered tasks.
    pub fn sync(&mut self, store: &TaskStore) {
        let current = self.current_task_id().map(str::to_string);
        self.rows.clear();
        for status in Status::ALL {
            self.rows.push(ListRow::Header(status));
            if self.collapsed[status.column()] {
                continue;
            }
            let tasks = store.tasks_by_status(status);
            if tasks.is_empty() {
                self.rows.push(ListRow::Empty(status));
            }
            for (index, task) in tasks.into_iter().enumerate() {
                self.rows.push(ListRow::Task { id: task.id.clone(), status, index });
            }
        }

        // Checked rows that disappeared from the feed can't be acted on.
        self.selected.retain(|id| store.get(id).is_some());

        let target = self.follow.clone().or(current);
        if let Some(pos) = target.and_then(|id| self.position_of(&id)) {
            self.cursor = pos;
            self.follow = None;
        }
        self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
    }

    fn position_of(&self, task_id: &str) -> Option<usize> {
        self.rows.iter().position(|r| matches!(r, ListRow::Task { id, .. } if id == task_id))
    }

    pub fn current_task_id(&self) -> Option<&str> {
        match self.rows.get(self.cursor) {
            Some(ListRow::Task { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Status of the section under the cursor.
    pub fn current_status(&self) -> Option<Status> {
        self.rows.get(self.cursor).map(|row| match row {
            ListRow::Header(s) | ListRow::Empty(s) => *s,
            ListRow::Task { status, .. } => *status,
        })
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn selection(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, store: &TaskStore) -> Action {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Up if ctrl => return self.move_task(store, false),
            KeyCode::Down if ctrl => return self.move_task(store, true),
            KeyCode::Char('<') => return self.move_task(store, false),
            KeyCode::Char('>') => return self.move_task(store, true),
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.rows.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.rows.len().saturating_sub(1),
            KeyCode::Enter => match self.rows.get(self.cursor) {
                Some(ListRow::Header(status)) => {
                    let column = status.column();
                    self.collapsed[column] = !self.collapsed[column];
                    self.sync(store);
                }
                Some(ListRow::Task { id, .. }) => return Action::Edit(id.clone()),
                _ => {}
            },
            KeyCode::Char(' ') => {
                if let Some(id) = self.current_task_id().map(str::to_string) {
                    if !self.selected.remove(&id) {
                        self.selected.insert(id);
                    }
                }
            }
            KeyCode::Char('c') => {
                if let Some(id) = self.current_task_id() {
                    return Action::Toggle(id.to_string());
                }
            }
            KeyCode::Char('i') => {
                if let Some(id) = self.current_task_id() {
                    return Action::Detail(id.to_string());
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.current_task_id() {
                    return Action::Delete(id.to_string());
                }
            }
            KeyCode::Char('a') => return Action::NewTask(self.current_status()),
            KeyCode::Char('S') if !self.selected.is_empty() => return Action::OpenBulkStatus,
            KeyCode::Char('X') if !self.selected.is_empty() => return Action::BulkDelete(self.selection()),
            KeyCode::Esc => self.clear_selection(),
            _ => {}
        }
        Action::None
    }

    /// Move the task under the cursor to the end of the neighbouring section.
    fn move_task(&mut self, store: &TaskStore, down: bool) -> Action {
        let Some(ListRow::Task { id, status, index }) = self.rows.get(self.cursor).cloned() else {
            return Action::None;
        };
        let target = if down { status.column() + 1 } else { status.column().wrapping_sub(1) };
        let Some(destination) = Status::from_column(target) else {
            return Action::None;
        };
        self.follow = Some(id.clone());
        Action::Drop(DropResult {
            task_id: id,
            source: DropLocation { status, index },
            destination: Some(DropLocation { status: destination, index: store.tasks_by_status(destination).len() }),
        })
    }

    /// `pending` holds ids with a write in flight; they render dimmed.
    pub fn render(&mut self, f: &mut Frame, area: Rect, store: &TaskStore, today: NaiveDate, pending: &HashSet<String>) {
        let title_width = area.width.saturating_sub(48).max(10) as usize;
        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| match row {
                ListRow::Header(status) => {
                    let arrow = if self.collapsed[status.column()] { "▶" } else { "▼" };
                    let count = store.tasks_by_status(*status).len();
                    Row::new(vec![
                        Cell::from(arrow),
                        Cell::from(format!("{} ({count})", status.heading())),
                    ])
                    .style(Style::default().bg(status_color(*status)).fg(Color::Black).add_modifier(Modifier::BOLD))
                }
                ListRow::Empty(status) => Row::new(vec![
                    Cell::from(""),
                    Cell::from(Span::styled(status.empty_message(), Style::default().fg(Color::DarkGray))),
                ]),
                ListRow::Task { id, .. } => match store.get(id) {
                    Some(task) => {
                        let check = if self.selected.contains(id) { "[x]" } else { "[ ]" };
                        let done = if task.is_completed { "✔" } else { "○" };
                        let mut title_style = Style::default();
                        if task.is_completed {
                            title_style = title_style.add_modifier(Modifier::CROSSED_OUT);
                        }
                        if pending.contains(id) {
                            title_style = title_style.fg(Color::DarkGray);
                        }
                        Row::new(vec![
                            Cell::from(check),
                            Cell::from(Line::from(vec![
                                Span::raw(format!("{done} ")),
                                Span::styled(truncate(&task.title, title_width), title_style),
                            ])),
                            Cell::from(format_due(task.dueon, today)),
                            Cell::from(Span::styled(task.status.as_str(), Style::default().fg(status_color(task.status)))),
                            Cell::from(task.category.as_str()),
                        ])
                    }
                    None => Row::new(vec![Cell::from(""), Cell::from("")]),
                },
            })
            .collect();

        let header = Row::new(vec!["", "Task name", "Due on", "Task Status", "Task Category"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(14),
                Constraint::Length(14),
                Constraint::Length(13),
                Constraint::Length(14),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Tasks"))
        .row_highlight_style(Style::default().fg(GOLD).add_modifier(Modifier::REVERSED));

        self.table_state.select((!self.rows.is_empty()).then_some(self.cursor));
        f.render_stateful_widget(table, area, &mut self.table_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Category;
    use crate::task::Task;
    use chrono::Utc;

    fn task(id: &str, status: Status) -> Task {
        let now = Utc::now();
        Task {
            id: id.into(),
            user_id: "u1".into(),
            title: format!("Task {id}"),
            description: None,
            category: Category::Work,
            dueon: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            status,
            is_completed: status.is_completed(),
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn store(tasks: Vec<Task>) -> TaskStore {
        let mut store = TaskStore::new();
        store.apply_snapshot(tasks);
        store
    }

    fn key(view: &mut ListView, store: &TaskStore, code: KeyCode) -> Action {
        view.handle_key(code, KeyModifiers::NONE, store)
    }

    #[test]
    fn sections_show_placeholders_when_empty() {
        let store = store(vec![task("a", Status::InProgress)]);
        let mut view = ListView::default();
        view.sync(&store);
        assert_eq!(
            view.rows,
            vec![
                ListRow::Header(Status::ToDo),
                ListRow::Empty(Status::ToDo),
                ListRow::Header(Status::InProgress),
                ListRow::Task { id: "a".into(), status: Status::InProgress, index: 0 },
                ListRow::Header(Status::Completed),
                ListRow::Empty(Status::Completed),
            ]
        );
    }

    #[test]
    fn enter_on_header_collapses_section() {
        let store = store(vec![task("a", Status::ToDo), task("b", Status::ToDo)]);
        let mut view = ListView::default();
        view.sync(&store);
        assert_eq!(key(&mut view, &store, KeyCode::Enter), Action::None);
        assert!(!view.rows.iter().any(|r| matches!(r, ListRow::Task { .. })));
        key(&mut view, &store, KeyCode::Enter);
        assert_eq!(view.rows.len(), 7);
    }

    #[test]
    fn moving_down_targets_end_of_next_section() {
        let store = store(vec![task("a", Status::ToDo), task("b", Status::InProgress)]);
        let mut view = ListView::default();
        view.sync(&store);
        key(&mut view, &store, KeyCode::Down);
        let action = view.handle_key(KeyCode::Down, KeyModifiers::CONTROL, &store);
        assert_eq!(
            action,
            Action::Drop(DropResult {
                task_id: "a".into(),
                source: DropLocation { status: Status::ToDo, index: 0 },
                destination: Some(DropLocation { status: Status::InProgress, index: 1 }),
            })
        );
        // Nothing above the first section.
        assert_eq!(view.handle_key(KeyCode::Up, KeyModifiers::CONTROL, &store), Action::None);
    }

    #[test]
    fn cursor_follows_moved_task_after_snapshot() {
        let mut store = store(vec![task("a", Status::ToDo), task("b", Status::InProgress)]);
        let mut view = ListView::default();
        view.sync(&store);
        key(&mut view, &store, KeyCode::Down);
        key(&mut view, &store, KeyCode::Char('>'));

        store.apply_snapshot(vec![task("a", Status::InProgress), task("b", Status::InProgress)]);
        view.sync(&store);
        assert_eq!(view.current_task_id(), Some("a"));
    }

    #[test]
    fn selection_drives_bulk_actions_and_is_pruned() {
        let mut store = store(vec![task("a", Status::ToDo), task("b", Status::ToDo)]);
        let mut view = ListView::default();
        view.sync(&store);
        assert_eq!(key(&mut view, &store, KeyCode::Char('X')), Action::None);

        key(&mut view, &store, KeyCode::Down);
        key(&mut view, &store, KeyCode::Char(' '));
        key(&mut view, &store, KeyCode::Down);
        key(&mut view, &store, KeyCode::Char(' '));
        assert_eq!(key(&mut view, &store, KeyCode::Char('X')), Action::BulkDelete(vec!["a".into(), "b".into()]));
        assert_eq!(key(&mut view, &store, KeyCode::Char('S')), Action::OpenBulkStatus);

        store.apply_snapshot(vec![task("b", Status::ToDo)]);
        view.sync(&store);
        assert_eq!(view.selected.len(), 1);

        key(&mut view, &store, KeyCode::Esc);
        assert!(view.selected.is_empty());
    }

    #[test]
    fn row_keys_map_to_actions() {
        let store = store(vec![task("a", Status::Completed)]);
        let mut view = ListView::default();
        view.sync(&store);
        view.cursor = view.position_of("a").unwrap();
        assert_eq!(key(&mut view, &store, KeyCode::Char('c')), Action::Toggle("a".into()));
        assert_eq!(key(&mut view, &store, KeyCode::Char('d')), Action::Delete("a".into()));
        assert_eq!(key(&mut view, &store, KeyCode::Enter), Action::Edit("a".into()));
        assert_eq!(key(&mut view, &store, KeyCode::Char('a')), Action::NewTask(Some(Status::Completed)));
    }
}
