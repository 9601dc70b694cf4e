//! # TaskBuddy
//!
//! Personal task manager for the terminal: a sectioned list view and a
//! kanban board over one live-updating task feed.
//!
//! ## Key Features
//!
//! - **Live views**: every write lands in the store first and reaches the list
//!   and board through the feed, including writes from other `tb` processes
//! - **Search & filter**: case-insensitive title search plus a category filter
//! - **Bulk actions**: select rows, then move or delete them in one go
//! - **Attachments**: one file per task, up to 2MB
//!
//! ## Quick Start
//!
//! ```bash
//! # Sign in (same name, same tasks)
//! tb login ada --name "Ada Lovelace"
//!
//! # Add a task via CLI
//! tb add "Write report" --category work --due fri
//!
//! # Grouped listing with search
//! tb list --search wri
//!
//! # Interactive list view / board
//! tb ui
//! tb board
//! ```
//!
//! ## Key Commands
//!
//! - `tb ui [ROUTE]` - Launch the TUI on `/` (list) or `/board`
//! - `tb add <title>` - Create a task
//! - `tb list` - Tasks grouped by status, with filters
//! - `tb edit <id>` - Change fields or the attachment
//! - `tb move <status> <id>...` - Move tasks between columns
//! - `tb delete <id>...` - Delete tasks
//!
//! Data lives in `~/.taskbuddy/` (override with `--home` or `TASKBUDDY_HOME`).
//! Logs go to `tb.log` there; set `TB_LOG=debug` for more detail.

use anyhow::Result;
use clap::Parser;

use taskbuddy::cli::Cli;
use taskbuddy::cmd::{cmd_completions, cmd_ui, dispatch, Commands, Env};
use taskbuddy::config::{self, Settings};
use taskbuddy::logging;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let home = config::home_dir(cli.home.as_deref())?;
    let settings = Settings::load(home)?;
    logging::init(&settings.log_file(), &settings.config.log.level)?;
    tracing::debug!(home = %settings.home.display(), "starting");

    let rt = tokio::runtime::Runtime::new()?;
    let env = Env::open(settings)?;

    match cli.command {
        Commands::Ui { route } => cmd_ui(&env, &rt, route),
        Commands::Board => cmd_ui(&env, &rt, Some("/board".into())),
        command => rt.block_on(dispatch(&env, command)),
    }
}
