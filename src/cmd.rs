//! Command implementations for the CLI interface.
//!
//! Every handler resolves the signed-in session first; only `login`,
//! `logout`, `whoami` and `completions` work without one. Write failures
//! carry the same user-facing messages the TUI shows as toasts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use crate::auth::{IdentityProvider, LocalIdentityProvider, SessionContext, SignInRequest};
use crate::config::Settings;
use crate::error::{FetchError, ServiceError};
use crate::dates::{format_due, truncate, week_bounds};
use crate::fields::{Category, Status};
use crate::routes::Route;
use crate::service::{
    resolve_in, ImageChange, TaskService, BULK_DELETE_FAILED, BULK_STATUS_FAILED, CREATE_FAILED, DELETE_FAILED,
    STATUS_FAILED, UPDATE_FAILED,
};
use crate::store::{LocalBlobStore, LocalDocumentStore};
use crate::task::Task;
use crate::task_store::TaskStore;
use crate::tui::run::run_tui;
use crate::validation::{Attachment, TaskDraft};

/// Shown when a search matches nothing.
pub const NO_RESULTS: &str = "It looks like we can't find any results that match.";

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with an account name. The same name always maps to the same user.
    Login {
        account: String,
        /// Display name shown in the navbar.
        #[arg(long)]
        name: Option<String>,
        /// Profile photo URL.
        #[arg(long)]
        photo: Option<String>,
    },

    /// Sign out.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Launch the interactive UI.
    Ui {
        /// Route to open: "/", "/board" or "/login".
        route: Option<String>,
    },

    /// Launch the interactive UI on the kanban board.
    Board,

    /// Add a new task.
    Add {
        title: String,
        /// Optional description, at least 10 characters.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "fri", or "in Nd".
        #[arg(long)]
        due: Option<String>,
        #[arg(long, value_enum, default_value_t = Status::ToDo)]
        status: Status,
        /// File to attach (max 2MB).
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List tasks grouped by status.
    List {
        /// Case-insensitive title search.
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Only show one status section.
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Limit rows per section.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by id or id prefix.
    View { id: String },

    /// Edit a task. Unset options keep their current value.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_desc")]
        desc: Option<String>,
        #[arg(long)]
        clear_desc: bool,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Replace the attachment with this file.
        #[arg(long, conflicts_with = "remove_image")]
        image: Option<PathBuf>,
        #[arg(long)]
        remove_image: bool,
    },

    /// Move one or more tasks to another status column.
    Move {
        #[arg(value_enum)]
        status: Status,
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Toggle a task between completed and to-do.
    Toggle { id: String },

    /// Delete one or more tasks. No confirmation, no undo.
    Delete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
}

impl DueFilter {
    fn matches(self, task: &Task, today: chrono::NaiveDate) -> bool {
        match self {
            DueFilter::Today => task.dueon == today,
            DueFilter::ThisWeek => {
                let (start, end) = week_bounds(today);
                task.dueon >= start && task.dueon <= end
            }
            DueFilter::Overdue => task.dueon < today && !task.is_completed,
        }
    }
}

/// Backends opened from the settings.
pub struct Env {
    pub settings: Settings,
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<LocalDocumentStore>,
    pub service: TaskService,
}

impl Env {
    pub fn open(settings: Settings) -> Result<Env> {
        let db_path = settings.db_path();
        let documents = Arc::new(
            LocalDocumentStore::open(&db_path)
                .with_context(|| format!("Failed to open task store: {}", db_path.display()))?,
        );
        let blobs = Arc::new(LocalBlobStore::new(&settings.blob_dir()));
        let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentityProvider::new(&settings.home));
        let service = TaskService::new(documents.clone(), blobs);
        Ok(Env { settings, identity, documents, service })
    }

    async fn session(&self) -> Result<SessionContext> {
        SessionContext::require(self.identity.clone())
            .await
            .context("Sign in first with `tb login <account>`")
    }
}

pub async fn cmd_login(env: &Env, account: String, name: Option<String>, photo: Option<String>) -> Result<()> {
    let request = SignInRequest { account, display_name: name, photo_url: photo };
    let ctx = SessionContext::sign_in(env.identity.clone(), request).await.context("Sign in failed")?;
    println!("Signed in as {} ({})", ctx.session().label(), ctx.uid());
    Ok(())
}

pub async fn cmd_logout(env: &Env) -> Result<()> {
    match SessionContext::restore(env.identity.clone()).await? {
        Some(ctx) => {
            let label = ctx.session().label().to_string();
            ctx.sign_out().await.context("Sign out failed")?;
            println!("Signed out {label}.");
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn cmd_whoami(env: &Env) -> Result<()> {
    match SessionContext::restore(env.identity.clone()).await? {
        Some(ctx) => {
            let s = ctx.session();
            println!("Name:   {}", s.label());
            println!("User:   {}", s.uid);
            println!("Photo:  {}", s.photo_url.as_deref().unwrap_or("-"));
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

/// Launch the TUI. Runs on the calling thread; remote work goes to `rt`.
pub fn cmd_ui(env: &Env, rt: &tokio::runtime::Runtime, route: Option<String>) -> Result<()> {
    let route = route.map(|r| Route::parse(&r)).unwrap_or_default();
    run_tui(env, rt, route)
}

fn read_attachment(path: Option<PathBuf>) -> Result<Option<Attachment>> {
    path.map(|p| Attachment::from_path(&p).with_context(|| format!("Failed to read {}", p.display())))
        .transpose()
}

/// Validation errors print one line per field; anything else gets the
/// generic message.
fn write_error(err: ServiceError, generic: &'static str) -> anyhow::Error {
    match err {
        ServiceError::Invalid(errs) => {
            for e in errs.iter() {
                eprintln!("  {:?}: {}", e.field, e.message);
            }
            anyhow::anyhow!("Task is invalid: {errs}")
        }
        other => anyhow::Error::new(other).context(generic),
    }
}

pub async fn cmd_add(
    env: &Env,
    title: String,
    desc: Option<String>,
    category: Option<Category>,
    due: Option<String>,
    status: Status,
    image: Option<PathBuf>,
) -> Result<()> {
    let ctx = env.session().await?;
    let draft = TaskDraft {
        title,
        description: desc.unwrap_or_default(),
        category,
        dueon: due.unwrap_or_default(),
        status: Some(status),
        attachment: read_attachment(image)?,
    };
    let id = env.service.create(ctx.uid(), draft).await.map_err(|e| write_error(e, CREATE_FAILED))?;
    println!("Created task {}.", short_id(&id));
    Ok(())
}

pub async fn cmd_list(
    env: &Env,
    search: Option<String>,
    category: Option<Category>,
    status: Option<Status>,
    due: Option<DueFilter>,
    limit: Option<usize>,
) -> Result<()> {
    let ctx = env.session().await?;
    let today = Local::now().date_naive();
    let mut tasks = env.service.list(ctx.uid()).await.context(FetchError::USER_MESSAGE)?;
    if let Some(df) = due {
        tasks.retain(|t| df.matches(t, today));
    }

    let mut store = TaskStore::new();
    store.apply_snapshot(tasks);
    store.set_search_query(search.unwrap_or_default());
    store.set_category(category);

    if store.shows_not_found() {
        println!("{NO_RESULTS}");
        return Ok(());
    }

    let sections: Vec<Status> = match status {
        Some(s) => vec![s],
        None => Status::ALL.to_vec(),
    };
    for (i, section) in sections.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        let mut rows = store.tasks_by_status(section);
        println!("{} ({})", section.heading(), rows.len());
        if rows.is_empty() {
            println!("  {}", section.empty_message());
            continue;
        }
        if let Some(n) = limit {
            rows.truncate(n);
        }
        print_table(&rows, today);
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Print tasks as an aligned table.
pub fn print_table(tasks: &[&Task], today: chrono::NaiveDate) {
    println!("  {:<8} {:<12} {:<9} {:<13} {}", "ID", "Status", "Category", "Due", "Title");
    for t in tasks {
        let done = if t.is_completed { "✓ " } else { "" };
        println!(
            "  {:<8} {:<12} {:<9} {:<13} {}{}",
            short_id(&t.id),
            t.status.as_str(),
            t.category.as_str(),
            format_due(t.dueon, today),
            done,
            truncate(&t.title, 48),
        );
    }
}

pub async fn cmd_view(env: &Env, id: String) -> Result<()> {
    let ctx = env.session().await?;
    let task = env.service.resolve(ctx.uid(), &id).await?;
    let today = Local::now().date_naive();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Category:     {}", task.category);
    println!("Status:       {}", task.status.as_str());
    println!("Due:          {} ({})", task.dueon, format_due(task.dueon, today));
    println!("Attachment:   {}", task.image_url.as_deref().unwrap_or("-"));
    println!("Created:      {}", task.created_at.with_timezone(&Local).format("%b %d, %Y %H:%M"));
    println!("Updated:      {}", task.updated_at.with_timezone(&Local).format("%b %d, %Y %H:%M"));
    println!("Description:\n{}", task.description.as_deref().unwrap_or("-"));
    Ok(())
}

/// Prefill a draft with the stored values of `task`.
pub fn draft_from(task: &Task) -> TaskDraft {
    TaskDraft {
        title: task.title.clone(),
        description: task.description.clone().unwrap_or_default(),
        category: Some(task.category),
        dueon: task.dueon.format("%Y-%m-%d").to_string(),
        status: Some(task.status),
        attachment: None,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_edit(
    env: &Env,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    clear_desc: bool,
    category: Option<Category>,
    due: Option<String>,
    status: Option<Status>,
    image: Option<PathBuf>,
    remove_image: bool,
) -> Result<()> {
    let ctx = env.session().await?;
    let task = env.service.resolve(ctx.uid(), &id).await?;

    let mut draft = draft_from(&task);
    if let Some(t) = title {
        draft.title = t;
    }
    if let Some(d) = desc {
        draft.description = d;
    }
    if clear_desc {
        draft.description.clear();
    }
    if let Some(c) = category {
        draft.category = Some(c);
    }
    if let Some(d) = due {
        draft.dueon = d;
    }
    if let Some(s) = status {
        draft.status = Some(s);
    }
    draft.attachment = read_attachment(image)?;
    let image = if remove_image { ImageChange::Remove } else { ImageChange::Keep };

    env.service
        .update(ctx.uid(), &task.id, draft, image)
        .await
        .map_err(|e| write_error(e, UPDATE_FAILED))?;
    println!("Updated task {}.", short_id(&task.id));
    Ok(())
}

pub async fn cmd_move(env: &Env, status: Status, ids: Vec<String>) -> Result<()> {
    let ctx = env.session().await?;
    let resolved = resolve_all(env, ctx.uid(), &ids).await?;

    if let [single] = resolved.as_slice() {
        env.service.set_status(single, status).await.context(STATUS_FAILED)?;
        println!("Moved task {} to {}.", short_id(single), status.heading());
        return Ok(());
    }

    let outcome = env.service.set_status_many(&resolved, status).await;
    for (id, err) in &outcome.failed {
        eprintln!("  {}: {err}", short_id(id));
    }
    if !outcome.is_ok() {
        bail!(BULK_STATUS_FAILED);
    }
    println!("Moved {} tasks to {}.", outcome.succeeded.len(), status.heading());
    Ok(())
}

pub async fn cmd_toggle(env: &Env, id: String) -> Result<()> {
    let ctx = env.session().await?;
    let task = env.service.resolve(ctx.uid(), &id).await?;
    let next = env.service.toggle_completed(&task).await.context(STATUS_FAILED)?;
    println!("Task {} is now {}.", short_id(&task.id), next.as_str());
    Ok(())
}

/// Resolve every id prefix against one snapshot, dropping duplicates.
async fn resolve_all(env: &Env, uid: &str, ids: &[String]) -> Result<Vec<String>> {
    let tasks = env.service.list(uid).await?;
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let task = resolve_in(tasks.clone(), id)?;
        if !resolved.contains(&task.id) {
            resolved.push(task.id);
        }
    }
    Ok(resolved)
}

pub async fn cmd_delete(env: &Env, ids: Vec<String>) -> Result<()> {
    let ctx = env.session().await?;
    let resolved = resolve_all(env, ctx.uid(), &ids).await?;

    if let [single] = resolved.as_slice() {
        env.service.delete(single).await.context(DELETE_FAILED)?;
        println!("Deleted task {}.", short_id(single));
        return Ok(());
    }

    let outcome = env.service.delete_many(&resolved).await;
    for (id, err) in &outcome.failed {
        eprintln!("  {}: {err}", short_id(id));
    }
    if !outcome.is_ok() {
        bail!(BULK_DELETE_FAILED);
    }
    println!("Deleted {} tasks.", outcome.succeeded.len());
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Run a command that needs the async backends.
pub async fn dispatch(env: &Env, command: Commands) -> Result<()> {
    match command {
        Commands::Login { account, name, photo } => cmd_login(env, account, name, photo).await,
        Commands::Logout => cmd_logout(env).await,
        Commands::Whoami => cmd_whoami(env).await,
        Commands::Add { title, desc, category, due, status, image } => {
            cmd_add(env, title, desc, category, due, status, image).await
        }
        Commands::List { search, category, status, due, limit } => {
            cmd_list(env, search, category, status, due, limit).await
        }
        Commands::View { id } => cmd_view(env, id).await,
        Commands::Edit { id, title, desc, clear_desc, category, due, status, image, remove_image } => {
            cmd_edit(env, id, title, desc, clear_desc, category, due, status, image, remove_image).await
        }
        Commands::Move { status, ids } => cmd_move(env, status, ids).await,
        Commands::Toggle { id } => cmd_toggle(env, id).await,
        Commands::Delete { ids } => cmd_delete(env, ids).await,
        Commands::Ui { .. } | Commands::Board | Commands::Completions { .. } => {
            bail!("command must run outside the async dispatcher")
        }
    }
}
