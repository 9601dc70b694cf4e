//! TUI entry point and terminal setup.

use std::io;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;

use crate::auth::SessionContext;
use crate::cmd::Env;
use crate::routes::Route;
use crate::tui::app::App;

/// Initialise and run the terminal user interface on `route`.
///
/// The UI runs on the calling thread; background work and the store's
/// reload watcher run on `rt`.
pub fn run_tui(env: &Env, rt: &Runtime, route: Route) -> Result<()> {
    let _guard = rt.enter();
    let watcher = env.documents.spawn_reload_watcher(env.settings.poll_interval());
    let session = rt
        .block_on(SessionContext::restore(env.identity.clone()))
        .context("Failed to read the saved session")?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!(route = %route, signed_in = session.is_some(), "starting tui");
    let mut app = App::new(env, rt.handle().clone(), route, session);
    let result = app.run(&mut terminal);
    drop(app);
    watcher.abort();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result.context("Terminal UI failed")
}
