//! Sign-in screen.

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::auth::SignInRequest;
use crate::tui::colors::{BRAND, ERROR, GOLD};
use crate::tui::input::InputField;
use crate::tui::utils::centered_rect;

const ACCOUNT_FIELD: usize = 0;
const NAME_FIELD: usize = 1;

pub struct LoginView {
    pub account: InputField,
    pub name: InputField,
    current_field: usize,
    pub signing_in: bool,
    pub error: Option<String>,
}

impl Default for LoginView {
    fn default() -> Self {
        let mut account = InputField::new();
        account.active = true;
        LoginView { account, name: InputField::new(), current_field: ACCOUNT_FIELD, signing_in: false, error: None }
    }
}

impl LoginView {
    fn active_input(&mut self) -> &mut InputField {
        if self.current_field == ACCOUNT_FIELD {
            &mut self.account
        } else {
            &mut self.name
        }
    }

    fn switch_field(&mut self) {
        self.current_field = 1 - self.current_field;
        self.account.active = self.current_field == ACCOUNT_FIELD;
        self.name.active = self.current_field == NAME_FIELD;
    }

    /// Returns a request when the user pressed Enter to continue.
    pub fn handle_key(&mut self, code: KeyCode) -> Option<SignInRequest> {
        match code {
            KeyCode::Enter => return self.continue_sign_in(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => self.switch_field(),
            KeyCode::Left => self.active_input().move_cursor_left(),
            KeyCode::Right => self.active_input().move_cursor_right(),
            KeyCode::Backspace => self.active_input().handle_backspace(),
            KeyCode::Delete => self.active_input().handle_delete(),
            KeyCode::Char(c) => self.active_input().handle_char(c),
            _ => {}
        }
        None
    }

    fn continue_sign_in(&mut self) -> Option<SignInRequest> {
        if self.signing_in {
            return None;
        }
        let account = self.account.value.trim();
        if account.is_empty() {
            self.error = Some("Enter an account name to continue".into());
            return None;
        }
        let name = self.name.value.trim();
        self.error = None;
        self.signing_in = true;
        Some(SignInRequest {
            account: account.to_string(),
            display_name: (!name.is_empty()).then(|| name.to_string()),
            photo_url: None,
        })
    }

    /// The provider answered; `error` is set when sign-in failed.
    pub fn finish(&mut self, error: Option<String>) {
        self.signing_in = false;
        self.error = error;
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(50, 60, area);
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BRAND))
            .title(" TaskBuddy ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(2),
                Constraint::Min(1),
            ])
            .split(inner);

        let intro = Paragraph::new(vec![
            Line::from(Span::styled("TaskBuddy", Style::default().fg(BRAND).add_modifier(Modifier::BOLD))),
            Line::from("Streamline your workflow and track progress effortlessly."),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        f.render_widget(intro, chunks[0]);

        for (index, title, input, chunk) in [
            (ACCOUNT_FIELD, "Account", &self.account, chunks[1]),
            (NAME_FIELD, "Display name (optional)", &self.name, chunks[2]),
        ] {
            let style = if self.current_field == index { Style::default().fg(GOLD) } else { Style::default() };
            let text = if input.active { input.display_with_cursor() } else { input.value.clone() };
            let para = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title(title).border_style(style));
            f.render_widget(para, chunk);
        }

        let button = if self.signing_in {
            Span::styled(" Signing in... ", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(" Enter: Continue ", Style::default().fg(Color::White).bg(BRAND))
        };
        f.render_widget(Paragraph::new(Line::from(button)).alignment(Alignment::Center), chunks[3]);

        if let Some(error) = &self.error {
            let para = Paragraph::new(error.as_str())
                .style(Style::default().fg(ERROR))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(para, chunks[4]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_builds_request_once() {
        let mut view = LoginView::default();
        for c in "ada".chars() {
            view.handle_key(KeyCode::Char(c));
        }
        view.handle_key(KeyCode::Tab);
        for c in "Ada L".chars() {
            view.handle_key(KeyCode::Char(c));
        }
        let req = view.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(req.account, "ada");
        assert_eq!(req.display_name.as_deref(), Some("Ada L"));
        assert!(view.handle_key(KeyCode::Enter).is_none());

        view.finish(Some("nope".into()));
        assert!(!view.signing_in);
        assert!(view.handle_key(KeyCode::Enter).is_some());
    }

    #[test]
    fn blank_account_is_refused() {
        let mut view = LoginView::default();
        view.handle_key(KeyCode::Char(' '));
        assert!(view.handle_key(KeyCode::Enter).is_none());
        assert!(view.error.is_some());
    }
}
