//! Kanban board view.
//!
//! One column per status. Cards are moved between neighbouring columns with
//! Ctrl+Left/Right, which produces the same [`DropResult`] a mouse drag
//! would; the write goes through the service and the card shows up in its
//! new column when the feed pushes the change.

use std::collections::HashSet;

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::dates::{format_due, truncate};
use crate::fields::Status;
use crate::service::{DropLocation, DropResult};
use crate::task::Task;
use crate::task_store::TaskStore;
use crate::tui::colors::{status_color, GOLD};
use crate::tui::enums::Action;

const CARD_HEIGHT: usize = 5;

#[derive(Default)]
pub struct BoardView {
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; 3],
    /// Task ids per column, in feed order.
    columns: [Vec<String>; 3],
    /// Card to select once the feed shows it in its new column.
    follow: Option<String>,
}

impl BoardView {
    /// Rebuild columns from the store's filtered tasks.
    pub fn sync(&mut self, store: &TaskStore) {
        let current = self.selected_task_id().map(str::to_string);
        for status in Status::ALL {
            self.columns[status.column()] =
                store.tasks_by_status(status).into_iter().map(|t| t.id.clone()).collect();
        }

        let target = self.follow.clone().or(current);
        if let Some((column, card)) = target.and_then(|id| self.position_of(&id)) {
            self.selected_column = column;
            self.selected_card = card;
            self.follow = None;
        }
        self.clamp_selection();
    }

    fn position_of(&self, task_id: &str) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(c, ids)| ids.iter().position(|id| id == task_id).map(|i| (c, i)))
    }

    fn clamp_selection(&mut self) {
        let column_len = self.columns[self.selected_column].len();
        if column_len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    pub fn selected_task_id(&self) -> Option<&str> {
        self.columns[self.selected_column].get(self.selected_card).map(String::as_str)
    }

    pub fn selected_status(&self) -> Option<Status> {
        Status::from_column(self.selected_column)
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Left if ctrl => return self.move_card(false),
            KeyCode::Right if ctrl => return self.move_card(true),
            KeyCode::Left if self.selected_column > 0 => {
                self.selected_column -= 1;
                self.clamp_selection();
            }
            KeyCode::Right if self.selected_column + 1 < self.columns.len() => {
                self.selected_column += 1;
                self.clamp_selection();
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected_card = self.selected_card.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_card + 1 < self.columns[self.selected_column].len() {
                    self.selected_card += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char('i') => {
                if let Some(id) = self.selected_task_id() {
                    return Action::Detail(id.to_string());
                }
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_task_id() {
                    return Action::Edit(id.to_string());
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_task_id() {
                    return Action::Delete(id.to_string());
                }
            }
            KeyCode::Char('c') => {
                if let Some(id) = self.selected_task_id() {
                    return Action::Toggle(id.to_string());
                }
            }
            KeyCode::Char('a') => return Action::NewTask(self.selected_status()),
            _ => {}
        }
        Action::None
    }

    /// Drop the selected card at the bottom of the neighbouring column.
    fn move_card(&mut self, right: bool) -> Action {
        let Some(id) = self.selected_task_id().map(str::to_string) else {
            return Action::None;
        };
        let target = if right { self.selected_column + 1 } else { self.selected_column.wrapping_sub(1) };
        let (Some(source), Some(destination)) = (Status::from_column(self.selected_column), Status::from_column(target))
        else {
            return Action::None;
        };
        self.follow = Some(id.clone());
        Action::Drop(DropResult {
            task_id: id,
            source: DropLocation { status: source, index: self.selected_card },
            destination: Some(DropLocation { status: destination, index: self.columns[target].len() }),
        })
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, store: &TaskStore, today: NaiveDate, pending: &HashSet<String>) {
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, i, store, today, pending);
        }
    }

    fn render_column(
        &mut self,
        f: &mut Frame,
        area: Rect,
        column_index: usize,
        store: &TaskStore,
        today: NaiveDate,
        pending: &HashSet<String>,
    ) {
        let Some(status) = Status::from_column(column_index) else {
            return;
        };
        let is_selected = column_index == self.selected_column;
        let border_style = if is_selected {
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(status_color(status))
        };

        let cards = &self.columns[column_index];
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ({}) ", status.as_str(), cards.len()))
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if cards.is_empty() {
            let empty = Paragraph::new(status.empty_message()).style(Style::default().fg(Color::DarkGray));
            f.render_widget(empty, inner);
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = (available_height / CARD_HEIGHT).max(1);

        let scroll_offset = if is_selected {
            let start_visible = self.column_scroll_offsets[column_index];
            if self.selected_card < start_visible {
                self.selected_card
            } else if self.selected_card >= start_visible + visible_cards {
                self.selected_card + 1 - visible_cards
            } else {
                start_visible
            }
        } else {
            self.column_scroll_offsets[column_index].min(cards.len().saturating_sub(1))
        };
        self.column_scroll_offsets[column_index] = scroll_offset;

        let cards = &self.columns[column_index];
        let mut current_y = 0;
        let mut rendered_cards = 0;
        for (card_index, id) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let Some(task) = store.get(id) else {
                continue;
            };
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };
            let selected = is_selected && card_index == self.selected_card;
            render_card(f, card_area, task, selected, pending.contains(id), today);
            current_y += CARD_HEIGHT;
            rendered_cards += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{scroll_offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { x: inner.x, y: inner.y, width: inner.width, height: 1 });
        }
        let remaining = cards.len().saturating_sub(scroll_offset + rendered_cards);
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect { x: inner.x, y: inner.y + inner.height.saturating_sub(1), width: inner.width, height: 1 },
            );
        }
    }
}

fn render_card(f: &mut Frame, area: Rect, task: &Task, is_selected: bool, pending: bool, today: NaiveDate) {
    let style = if is_selected {
        Style::default().bg(status_color(task.status)).fg(Color::Black).add_modifier(Modifier::BOLD)
    } else if pending {
        Style::default().bg(Color::DarkGray).fg(Color::Gray)
    } else {
        Style::default().bg(Color::DarkGray)
    };

    let width = area.width.saturating_sub(2) as usize;
    let mut title = Style::default();
    if task.is_completed {
        title = title.add_modifier(Modifier::CROSSED_OUT);
    }
    let lines = vec![
        Line::styled(truncate(&task.title, width), title),
        Line::from(task.category.as_str()),
        Line::from(format_due(task.dueon, today)),
    ];
    let card = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .style(style)
        .wrap(Wrap { trim: true });
    f.render_widget(card, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Category;
    use chrono::Utc;

    fn task(id: &str, status: Status) -> Task {
        let now = Utc::now();
        Task {
            id: id.into(),
            user_id: "u1".into(),
            title: format!("Task {id}"),
            description: None,
            category: Category::Personal,
            dueon: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            status,
            is_completed: status.is_completed(),
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn board(tasks: Vec<Task>) -> (BoardView, TaskStore) {
        let mut store = TaskStore::new();
        store.apply_snapshot(tasks);
        let mut view = BoardView::default();
        view.sync(&store);
        (view, store)
    }

    #[test]
    fn ctrl_right_drops_card_in_next_column() {
        let (mut view, _) = board(vec![task("a", Status::ToDo), task("b", Status::InProgress)]);
        let action = view.handle_key(KeyCode::Right, KeyModifiers::CONTROL);
        assert_eq!(
            action,
            Action::Drop(DropResult {
                task_id: "a".into(),
                source: DropLocation { status: Status::ToDo, index: 0 },
                destination: Some(DropLocation { status: Status::InProgress, index: 1 }),
            })
        );
        assert_eq!(view.handle_key(KeyCode::Left, KeyModifiers::CONTROL), Action::None);
    }

    #[test]
    fn selection_follows_card_into_new_column() {
        let (mut view, mut store) = board(vec![task("a", Status::ToDo)]);
        view.handle_key(KeyCode::Right, KeyModifiers::CONTROL);
        store.apply_snapshot(vec![task("a", Status::InProgress)]);
        view.sync(&store);
        assert_eq!(view.selected_status(), Some(Status::InProgress));
        assert_eq!(view.selected_task_id(), Some("a"));
    }

    #[test]
    fn selection_is_clamped_when_cards_vanish() {
        let (mut view, mut store) = board(vec![task("a", Status::ToDo), task("b", Status::ToDo)]);
        view.handle_key(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(view.selected_task_id(), Some("b"));
        store.apply_snapshot(vec![task("a", Status::ToDo)]);
        view.sync(&store);
        assert_eq!(view.selected_task_id(), Some("a"));
    }

    #[test]
    fn card_keys_map_to_actions() {
        let (mut view, _) = board(vec![task("a", Status::ToDo)]);
        assert_eq!(view.handle_key(KeyCode::Enter, KeyModifiers::NONE), Action::Detail("a".into()));
        assert_eq!(view.handle_key(KeyCode::Char('e'), KeyModifiers::NONE), Action::Edit("a".into()));
        assert_eq!(view.handle_key(KeyCode::Char('d'), KeyModifiers::NONE), Action::Delete("a".into()));
        view.handle_key(KeyCode::Right, KeyModifiers::NONE);
        assert_eq!(view.selected_task_id(), None);
        assert_eq!(view.handle_key(KeyCode::Char('a'), KeyModifiers::NONE), Action::NewTask(Some(Status::InProgress)));
    }
}
