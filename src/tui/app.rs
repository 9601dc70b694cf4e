//! Main application logic for the terminal user interface.
//!
//! The `App` owns all screen state and runs on the UI thread. Anything that
//! talks to a backend (sign-in, writes, the live task feed) is spawned on the
//! tokio runtime and reports back through an [`AppEvent`] channel, which the
//! event loop drains between key polls. Writes never touch local state: the
//! views only change when the feed delivers the next snapshot.

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::auth::{SessionContext, SignInRequest};
use crate::cmd::{Env, NO_RESULTS};
use crate::error::{FetchError, ServiceError};
use crate::fields::{Category, Status};
use crate::notify::{ToastKind, Toasts};
use crate::routes::{guard, Guard, Route};
use crate::service::{
    BULK_DELETE_FAILED, BULK_STATUS_FAILED, CREATE_FAILED, DELETE_FAILED, STATUS_FAILED, UPDATE_FAILED,
};
use crate::task_store::{subscribe, TaskStore};
use crate::tui::{
    board_view::BoardView,
    colors::{status_color, BRAND, ERROR, GOLD, SUCCESS},
    enums::{Action, AppEvent, Overlay, Screen},
    input::InputField,
    list_view::ListView,
    login::LoginView,
    task_form::{FormOutcome, Submission, TaskForm},
    utils::centered_rect,
};

const SIGN_OUT_FAILED: &str = "Failed to sign out. Please try again.";

pub struct App<'a> {
    env: &'a Env,
    rt: Handle,
    tx: UnboundedSender<AppEvent>,
    rx: UnboundedReceiver<AppEvent>,
    screen: Screen,
    /// Where to go once sign-in succeeds.
    after_login: Route,
    session: Option<SessionContext>,
    feed: Option<JoinHandle<()>>,
    /// Bumped whenever the feed is replaced; snapshots carry the value they
    /// were produced under.
    generation: u64,
    tasks: TaskStore,
    toasts: Toasts,
    list: ListView,
    board: BoardView,
    login: LoginView,
    form: Option<TaskForm>,
    overlay: Overlay,
    search: InputField,
    search_active: bool,
    status_message: String,
    /// Task ids with a single-task write in flight.
    pending: HashSet<String>,
    bulk_pending: bool,
}

impl<'a> App<'a> {
    /// Build the app for `route`, applying the route guard. With a restored
    /// session the feed starts right away.
    pub fn new(env: &'a Env, rt: Handle, route: Route, session: Option<SessionContext>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = App {
            env,
            rt,
            tx,
            rx,
            screen: Screen::Login,
            after_login: Route::Tasks,
            session: None,
            feed: None,
            generation: 0,
            tasks: TaskStore::new(),
            toasts: Toasts::new(env.settings.toast_duration()),
            list: ListView::default(),
            board: BoardView::default(),
            login: LoginView::default(),
            form: None,
            overlay: Overlay::None,
            search: InputField::new(),
            search_active: false,
            status_message: String::new(),
            pending: HashSet::new(),
            bulk_pending: false,
        };
        if let Some(ctx) = session {
            let uid = ctx.uid().to_string();
            app.session = Some(ctx);
            app.start_feed(&uid);
        }
        app.navigate(route);
        app
    }

    fn navigate(&mut self, route: Route) {
        let target = match guard(route, self.session.is_some()) {
            Guard::Allow(route) => route,
            Guard::ToLogin { then } => {
                self.after_login = then;
                Route::Login
            }
            Guard::ToHome => Route::Tasks,
        };
        tracing::debug!(route = %target, "navigate");
        self.screen = match target {
            Route::Login => Screen::Login,
            Route::Tasks => Screen::List,
            Route::Board => Screen::Board,
        };
    }

    /// Subscribe to `uid`'s tasks, replacing any running feed. Filters
    /// survive the swap; everything else waits for the first snapshot.
    fn start_feed(&mut self, uid: &str) {
        self.stop_feed();
        self.generation += 1;
        let generation = self.generation;

        let filters = self.tasks.filters().clone();
        self.tasks = TaskStore::new();
        self.tasks.set_search_query(filters.search_query);
        self.tasks.set_category(filters.category);

        let mut stream = subscribe(self.env.service.store(), uid);
        let tx = self.tx.clone();
        self.feed = Some(self.rt.spawn(async move {
            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok(tasks) => AppEvent::Snapshot { generation, tasks },
                    Err(error) => AppEvent::FeedFailed { generation, error },
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }

    fn sync_views(&mut self) {
        self.list.sync(&self.tasks);
        self.board.sync(&self.tasks);
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Snapshot { generation, tasks } if generation == self.generation => {
                tracing::trace!(count = tasks.len(), "snapshot");
                self.tasks.apply_snapshot(tasks);
                self.sync_views();
            }
            AppEvent::FeedFailed { generation, error } if generation == self.generation => {
                self.tasks.fail(error);
            }
            AppEvent::Snapshot { .. } | AppEvent::FeedFailed { .. } => {}
            AppEvent::SignedIn(Ok(ctx)) => {
                tracing::info!(uid = ctx.uid(), "signed in");
                self.login = LoginView::default();
                let uid = ctx.uid().to_string();
                self.session = Some(ctx);
                self.start_feed(&uid);
                let then = std::mem::replace(&mut self.after_login, Route::Tasks);
                self.navigate(then);
            }
            AppEvent::SignedIn(Err(e)) => {
                tracing::error!(error = %e, "sign in failed");
                self.login.finish(Some(format!("Sign in failed: {e}")));
            }
            AppEvent::SignedOut(Ok(())) => tracing::info!("signed out"),
            AppEvent::SignedOut(Err(e)) => {
                tracing::error!(error = %e, "sign out failed");
                self.toasts.error(SIGN_OUT_FAILED);
            }
            AppEvent::Saved { editing, result } => self.finish_save(editing, result),
            AppEvent::TaskWrite { id, failure, result } => {
                self.pending.remove(&id);
                if result.is_err() {
                    self.toasts.error(failure);
                }
            }
            AppEvent::BulkDone { failure, outcome } => {
                self.bulk_pending = false;
                self.list.clear_selection();
                if !outcome.is_ok() {
                    tracing::warn!(failed = outcome.failed.len(), succeeded = outcome.succeeded.len(), "bulk action partly failed");
                    self.toasts.error(failure);
                }
            }
        }
    }

    /// Field errors keep the form open so they can be fixed; any other
    /// failure closes it like a success would, with an error toast.
    fn finish_save(&mut self, editing: bool, result: Result<(), ServiceError>) {
        match result {
            Ok(()) => {
                self.form = None;
                self.toasts.success(if editing { "Task updated successfully" } else { "Task created successfully" });
            }
            Err(ServiceError::Invalid(errors)) => {
                if let Some(form) = self.form.as_mut() {
                    form.finish(Some(errors));
                }
            }
            Err(_) => {
                self.form = None;
                self.toasts.error(if editing { UPDATE_FAILED } else { CREATE_FAILED });
            }
        }
    }

    fn sign_in(&mut self, request: SignInRequest) {
        let provider = self.env.identity.clone();
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let result = SessionContext::sign_in(provider, request).await;
            let _ = tx.send(AppEvent::SignedIn(result));
        });
    }

    /// Tear down everything tied to the session, then end it in the
    /// background.
    fn sign_out(&mut self) {
        let Some(ctx) = self.session.take() else {
            return;
        };
        self.stop_feed();
        self.generation += 1;
        self.tasks = TaskStore::new();
        self.list = ListView::default();
        self.board = BoardView::default();
        self.form = None;
        self.overlay = Overlay::None;
        self.pending.clear();
        self.search.clear();
        self.search_active = false;
        self.navigate(Route::Login);

        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let _ = tx.send(AppEvent::SignedOut(ctx.sign_out().await));
        });
    }

    fn submit(&mut self, submission: Submission) {
        let Some(uid) = self.session.as_ref().map(|s| s.uid().to_string()) else {
            return;
        };
        let service = self.env.service.clone();
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let Submission { editing, draft, image } = submission;
            let result = match &editing {
                Some(id) => service.update(&uid, id, draft, image).await,
                None => service.create(&uid, draft).await.map(|_| ()),
            };
            let _ = tx.send(AppEvent::Saved { editing: editing.is_some(), result });
        });
    }

    /// Run one write for `id` unless one is already in flight for it.
    fn spawn_write<F>(&mut self, id: String, failure: &'static str, write: F)
    where
        F: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        if !self.pending.insert(id.clone()) {
            self.status_message = "Still saving that task...".into();
            return;
        }
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let result = write.await;
            let _ = tx.send(AppEvent::TaskWrite { id, failure, result });
        });
    }

    fn spawn_bulk(&mut self, ids: Vec<String>, status: Option<Status>) {
        if self.bulk_pending || ids.is_empty() {
            return;
        }
        self.bulk_pending = true;
        let service = self.env.service.clone();
        let tx = self.tx.clone();
        self.rt.spawn(async move {
            let (failure, outcome) = match status {
                Some(status) => (BULK_STATUS_FAILED, service.set_status_many(&ids, status).await),
                None => (BULK_DELETE_FAILED, service.delete_many(&ids).await),
            };
            let _ = tx.send(AppEvent::BulkDone { failure, outcome });
        });
    }

    fn perform(&mut self, action: Action) {
        let service = self.env.service.clone();
        match action {
            Action::None => {}
            Action::NewTask(status) => {
                self.overlay = Overlay::None;
                self.form = Some(TaskForm::new(status));
            }
            Action::Edit(id) => {
                if let Some(task) = self.tasks.get(&id) {
                    self.overlay = Overlay::None;
                    self.form = Some(TaskForm::from_task(task));
                }
            }
            Action::Detail(id) => self.overlay = Overlay::Detail(id),
            Action::Delete(id) => {
                self.overlay = Overlay::None;
                let target = id.clone();
                self.spawn_write(id, DELETE_FAILED, async move { service.delete(&target).await });
            }
            Action::Toggle(id) => {
                if let Some(task) = self.tasks.get(&id).cloned() {
                    self.spawn_write(id, STATUS_FAILED, async move {
                        service.toggle_completed(&task).await.map(|_| ())
                    });
                }
            }
            Action::Drop(drop) => {
                if !drop.is_noop() {
                    let id = drop.task_id.clone();
                    self.spawn_write(id, STATUS_FAILED, async move { service.drag_end(&drop).await.map(|_| ()) });
                }
            }
            Action::OpenBulkStatus => self.overlay = Overlay::BulkStatus,
            Action::BulkDelete(ids) => self.spawn_bulk(ids, None),
            Action::BulkStatus(ids, status) => {
                self.overlay = Overlay::None;
                self.spawn_bulk(ids, Some(status));
            }
        }
    }

    fn cycle_category(&mut self) {
        let next = match self.tasks.filters().category {
            None => Some(Category::Work),
            Some(Category::Work) => Some(Category::Personal),
            Some(Category::Personal) => None,
        };
        self.tasks.set_category(next);
        self.sync_views();
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.search.clear();
                self.search_active = false;
            }
            KeyCode::Enter => self.search_active = false,
            KeyCode::Backspace => self.search.handle_backspace(),
            KeyCode::Delete => self.search.handle_delete(),
            KeyCode::Left => self.search.move_cursor_left(),
            KeyCode::Right => self.search.move_cursor_right(),
            KeyCode::Char(c) => self.search.handle_char(c),
            _ => return,
        }
        self.search.active = self.search_active;
        self.tasks.set_search_query(self.search.value.clone());
        self.sync_views();
    }

    fn handle_overlay_key(&mut self, code: KeyCode) {
        match self.overlay.clone() {
            Overlay::None => {}
            Overlay::Help => self.overlay = Overlay::None,
            Overlay::Detail(id) => match code {
                KeyCode::Char('e') => self.perform(Action::Edit(id)),
                KeyCode::Char('d') => self.perform(Action::Delete(id)),
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.overlay = Overlay::None,
                _ => {}
            },
            Overlay::BulkStatus => {
                let choice = match code {
                    KeyCode::Char('1') => Some(Status::ToDo),
                    KeyCode::Char('2') => Some(Status::InProgress),
                    KeyCode::Char('3') => Some(Status::Completed),
                    _ => None,
                };
                match choice {
                    Some(status) => {
                        let ids = self.list.selected.iter().cloned().collect();
                        self.perform(Action::BulkStatus(ids, status));
                    }
                    None if code == KeyCode::Esc => self.overlay = Overlay::None,
                    None => {}
                }
            }
        }
    }

    /// The views are interactive only once tasks are on screen.
    fn views_ready(&self) -> bool {
        !self.tasks.is_loading() && self.tasks.error().is_none() && !self.tasks.shows_not_found()
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, today: NaiveDate) -> bool {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }

        if self.screen == Screen::Login {
            if code == KeyCode::Esc {
                return true;
            }
            if let Some(request) = self.login.handle_key(code) {
                self.sign_in(request);
            }
            return false;
        }

        if let Some(form) = self.form.as_mut() {
            match form.handle_key(code, modifiers, today) {
                FormOutcome::Continue => {}
                FormOutcome::Cancel => self.form = None,
                FormOutcome::Submit(submission) => self.submit(submission),
            }
            return false;
        }

        if self.overlay != Overlay::None {
            self.handle_overlay_key(code);
            return false;
        }

        if self.search_active {
            self.handle_search_key(code);
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab | KeyCode::Char('v') => {
                let next = if self.screen == Screen::Board { Route::Tasks } else { Route::Board };
                self.navigate(next);
            }
            KeyCode::Char('/') => {
                self.search_active = true;
                self.search.active = true;
            }
            KeyCode::Char('f') => self.cycle_category(),
            KeyCode::Char('L') => self.sign_out(),
            KeyCode::Char('?') => self.overlay = Overlay::Help,
            _ if self.views_ready() => {
                let action = match self.screen {
                    Screen::List => self.list.handle_key(code, modifiers, &self.tasks),
                    Screen::Board => self.board.handle_key(code, modifiers),
                    Screen::Login => Action::None,
                };
                self.perform(action);
            }
            KeyCode::Char('a') => self.perform(Action::NewTask(None)),
            _ => {}
        }
        false
    }

    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(false);
                }
                self.status_message.clear();
                let today = Local::now().date_naive();
                return Ok(self.handle_key(key.code, key.modifiers, today));
            }
        }
        Ok(false)
    }

    fn render_navbar(&self, f: &mut Frame, area: Rect) {
        let tab = |label: &'static str, active: bool| {
            if active {
                Span::styled(format!(" {label} "), Style::default().fg(Color::White).bg(BRAND).add_modifier(Modifier::BOLD))
            } else {
                Span::raw(format!(" {label} "))
            }
        };
        let left = Line::from(vec![
            Span::styled("TaskBuddy", Style::default().fg(BRAND).add_modifier(Modifier::BOLD)),
            Span::raw("   "),
            tab("List", self.screen == Screen::List),
            Span::raw(" "),
            tab("Board", self.screen == Screen::Board),
        ]);
        let block = Block::default().borders(Borders::ALL);
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(Paragraph::new(left), inner);

        let user = self.session.as_ref().map(|s| s.session().label().to_string()).unwrap_or_default();
        let right = Line::from(vec![
            Span::styled(user, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("  L: Logout", Style::default().fg(Color::DarkGray)),
        ]);
        f.render_widget(Paragraph::new(right).alignment(Alignment::Right), inner);
    }

    fn render_filter_bar(&self, f: &mut Frame, area: Rect) {
        let category = self.tasks.filters().category.map(|c| c.as_str()).unwrap_or("All");
        let search = if self.search_active {
            self.search.display_with_cursor()
        } else if self.search.value.is_empty() {
            "Search (/)".to_string()
        } else {
            self.search.value.clone()
        };
        let search_style = if self.search_active { Style::default().fg(GOLD) } else { Style::default() };
        let line = Line::from(vec![
            Span::raw("Filter by: Category "),
            Span::styled(format!("[{category}]"), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(" (f)", Style::default().fg(Color::DarkGray)),
            Span::raw("    "),
            Span::styled(search, search_style),
        ]);
        let para = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        f.render_widget(para, area);
    }

    fn render_body(&mut self, f: &mut Frame, area: Rect, today: NaiveDate) {
        let message = if self.tasks.is_loading() {
            Some(Paragraph::new("Loading tasks..."))
        } else if self.tasks.error().is_some() {
            Some(Paragraph::new(FetchError::USER_MESSAGE).style(Style::default().fg(ERROR)))
        } else if self.tasks.shows_not_found() {
            Some(Paragraph::new(NO_RESULTS))
        } else {
            None
        };
        if let Some(message) = message {
            let para = message
                .block(Block::default().borders(Borders::ALL))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(para, area);
            return;
        }

        match self.screen {
            Screen::List => self.list.render(f, area, &self.tasks, today, &self.pending),
            Screen::Board => self.board.render(f, area, &self.tasks, today, &self.pending),
            Screen::Login => {}
        }
    }

    fn render_bulk_bar(&self, f: &mut Frame, area: Rect) {
        let count = self.list.selected.len();
        let actions = if self.bulk_pending { "  Working..." } else { "  S: Status  X: Delete  Esc: Clear" };
        let line = Line::from(vec![
            Span::styled(format!(" {count} Tasks Selected "), Style::default().fg(Color::White).bg(Color::Black)),
            Span::raw(actions),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let (text, bg) = match self.toasts.current(Instant::now()) {
            Some(toast) => {
                let bg = match toast.kind {
                    ToastKind::Success => SUCCESS,
                    ToastKind::Error => ERROR,
                };
                (toast.message.clone(), bg)
            }
            None if !self.status_message.is_empty() => (self.status_message.clone(), BRAND),
            None => {
                let hint = match self.screen {
                    Screen::Login => "Enter: Continue | Tab: Next field | Esc: Quit",
                    Screen::List => "a: Add | Enter: Edit | Space: Select | c: Complete | </>: Move | v: Board | /: Search | ?: Help",
                    Screen::Board => "a: Add | Enter: Details | e: Edit | Ctrl+←/→: Move | v: List | /: Search | ?: Help",
                };
                (hint.to_string(), BRAND)
            }
        };
        let status = Paragraph::new(text).style(Style::default().bg(bg).fg(Color::White)).alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(70, 80, area);
        f.render_widget(Clear, area);
        let heading = |text: &'static str| Line::from(Span::styled(text, Style::default().add_modifier(Modifier::BOLD)));
        let help_text = vec![
            heading("Everywhere:"),
            Line::from("  v / Tab      Switch between list and board"),
            Line::from("  /            Search task titles"),
            Line::from("  f            Cycle category filter (All, WORK, PERSONAL)"),
            Line::from("  a            Add a task"),
            Line::from("  L            Sign out"),
            Line::from("  q / Ctrl+C   Quit"),
            Line::from(""),
            heading("List:"),
            Line::from("  ↑/↓ j/k      Move between rows"),
            Line::from("  Enter        Edit task, or collapse a section"),
            Line::from("  Space        Select row for bulk actions"),
            Line::from("  c            Toggle completed"),
            Line::from("  < / >        Move task to previous/next section"),
            Line::from("  i            Task details"),
            Line::from("  d            Delete task"),
            Line::from("  S / X        Bulk status / bulk delete"),
            Line::from(""),
            heading("Board:"),
            Line::from("  ←/→ ↑/↓      Move between cards"),
            Line::from("  Ctrl+←/→     Move card to another column"),
            Line::from("  Enter        Card details"),
            Line::from("  e / d        Edit / delete card"),
            Line::from(""),
            heading("Form:"),
            Line::from("  Tab/↑/↓      Next / previous field"),
            Line::from("  ←/→          Change category and status"),
            Line::from("  Enter        Create or update"),
            Line::from("  Esc          Cancel"),
        ];
        let paragraph = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help - Press any key to return"))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_detail(&self, f: &mut Frame, area: Rect, id: &str, today: NaiveDate) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        let area = centered_rect(60, 60, area);
        f.render_widget(Clear, area);

        let lines = vec![
            Line::from(Span::styled(task.title.as_str(), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from(vec![
                Span::raw("Status:      "),
                Span::styled(task.status.as_str(), Style::default().fg(status_color(task.status))),
            ]),
            Line::from(format!("Category:    {}", task.category)),
            Line::from(format!("Due on:      {}", crate::dates::format_due(task.dueon, today))),
            Line::from(format!("Attachment:  {}", task.image_url.as_deref().unwrap_or("-"))),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.as_deref().unwrap_or("-")),
            Line::from(""),
            Line::from(Span::styled("Activity", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(format!("  Created       {}", task.created_at.with_timezone(&Local).format("%d %b %Y, %H:%M"))),
            Line::from(format!("  Last updated  {}", task.updated_at.with_timezone(&Local).format("%d %b %Y, %H:%M"))),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (e: Edit, d: Delete, Esc: Close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(BRAND).add_modifier(Modifier::BOLD));
        let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        f.render_widget(para, area);
    }

    fn render_bulk_status(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(40, 30, area);
        f.render_widget(Clear, area);
        let mut lines = vec![Line::from(format!("Move {} tasks to:", self.list.selected.len())), Line::from("")];
        for (i, status) in Status::ALL.into_iter().enumerate() {
            lines.push(Line::from(vec![
                Span::raw(format!("  {}  ", i + 1)),
                Span::styled(status.as_str(), Style::default().fg(status_color(status))),
            ]));
        }
        let para = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Status (Esc to cancel)"));
        f.render_widget(para, area);
    }

    fn render(&mut self, f: &mut Frame) {
        let today = Local::now().date_naive();
        self.toasts.prune(Instant::now());

        if self.screen == Screen::Login {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)])
                .split(f.area());
            self.login.render(f, chunks[0]);
            self.render_status_bar(f, chunks[1]);
            return;
        }

        let bulk_height = if self.screen == Screen::List && !self.list.selected.is_empty() { 1 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),           // Navbar
                Constraint::Length(3),           // Filters
                Constraint::Min(0),              // List or board
                Constraint::Length(bulk_height), // Bulk bar
                Constraint::Length(1),           // Status bar
            ])
            .split(f.area());

        self.render_navbar(f, chunks[0]);
        self.render_filter_bar(f, chunks[1]);
        self.render_body(f, chunks[2], today);
        if bulk_height > 0 {
            self.render_bulk_bar(f, chunks[3]);
        }
        self.render_status_bar(f, chunks[4]);

        let body = chunks[2];
        match &self.overlay {
            Overlay::None => {}
            Overlay::Help => self.render_help(f, body),
            Overlay::Detail(id) => self.render_detail(f, body, id, today),
            Overlay::BulkStatus => self.render_bulk_status(f, body),
        }
        if let Some(form) = &self.form {
            let full = f.area();
            form.render(f, full);
        }
    }

    /// Main event loop: apply finished background work, draw, read a key.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.drain_events();
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        self.stop_feed();
        Ok(())
    }
}

impl Drop for App<'_> {
    fn drop(&mut self) {
        self.stop_feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::StoreError;
    use crate::service::BulkOutcome;
    use crate::task::Task;
    use chrono::Utc;

    fn env(dir: &tempfile::TempDir) -> Env {
        Env::open(Settings::load(dir.path().to_path_buf()).unwrap()).unwrap()
    }

    fn task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.into(),
            user_id: "u1".into(),
            title: format!("Task {id}"),
            description: None,
            category: Category::Work,
            dueon: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            status: Status::ToDo,
            is_completed: false,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn protected_route_without_session_shows_login_and_remembers_target() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let app = App::new(&env, rt.handle().clone(), Route::Board, None);
        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.after_login, Route::Board);
    }

    #[test]
    fn stale_snapshots_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);

        app.handle_event(AppEvent::Snapshot { generation: app.generation + 1, tasks: vec![task("a")] });
        assert!(app.tasks.is_loading());

        app.handle_event(AppEvent::Snapshot { generation: app.generation, tasks: vec![task("a")] });
        assert!(!app.tasks.is_loading());
        assert_eq!(app.tasks.tasks().len(), 1);
    }

    #[test]
    fn feed_failure_shows_banner_state() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);
        let error = FetchError { source: StoreError::Feed("gone".into()) };
        app.handle_event(AppEvent::FeedFailed { generation: app.generation, error });
        assert!(app.tasks.error().is_some());
        assert!(!app.views_ready());
    }

    #[test]
    fn bulk_failure_clears_selection_with_one_toast() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);
        app.list.selected.extend(["a".to_string(), "b".to_string()]);
        app.bulk_pending = true;

        let outcome = BulkOutcome {
            succeeded: vec!["a".into()],
            failed: vec![("b".into(), ServiceError::UnknownTask("b".into()))],
        };
        app.handle_event(AppEvent::BulkDone { failure: BULK_DELETE_FAILED, outcome });
        assert!(app.list.selected.is_empty());
        assert!(!app.bulk_pending);
        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.toasts.drain()[0].message, BULK_DELETE_FAILED);
    }

    #[test]
    fn save_failure_closes_form_with_toast_but_field_errors_keep_it() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);

        app.form = Some(TaskForm::new(None));
        let errors = crate::validation::TaskDraft::default().validate(today()).unwrap_err();
        app.handle_event(AppEvent::Saved { editing: false, result: Err(ServiceError::Invalid(errors)) });
        assert!(app.form.as_ref().is_some_and(|f| !f.errors.is_empty()));
        assert!(app.toasts.is_empty());

        app.handle_event(AppEvent::Saved {
            editing: true,
            result: Err(ServiceError::Store(StoreError::Io("disk full".into()))),
        });
        assert!(app.form.is_none());
        assert_eq!(app.toasts.drain()[0].message, UPDATE_FAILED);
    }

    #[test]
    fn failed_single_write_releases_the_task_and_toasts() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);
        app.pending.insert("a".into());
        app.handle_event(AppEvent::TaskWrite {
            id: "a".into(),
            failure: DELETE_FAILED,
            result: Err(ServiceError::Store(StoreError::Io("nope".into()))),
        });
        assert!(app.pending.is_empty());
        assert_eq!(app.toasts.drain()[0].message, DELETE_FAILED);
    }

    #[test]
    fn search_typing_updates_filters() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(&dir);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(&env, rt.handle().clone(), Route::Tasks, None);
        app.screen = Screen::List;
        app.handle_event(AppEvent::Snapshot { generation: app.generation, tasks: vec![task("a")] });

        app.handle_key(KeyCode::Char('/'), KeyModifiers::NONE, today());
        for c in "zzz".chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE, today());
        }
        assert!(app.tasks.shows_not_found());
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE, today());
        assert!(!app.tasks.shows_not_found());
        assert!(!app.search_active);

        app.handle_key(KeyCode::Char('f'), KeyModifiers::NONE, today());
        assert_eq!(app.tasks.filters().category, Some(Category::Work));
    }
}
