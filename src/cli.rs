use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal task manager with a live list view and kanban board.
/// Data lives in ~/.taskbuddy unless --home or TASKBUDDY_HOME says otherwise.
#[derive(Parser)]
#[command(name = "tb", version, about = "TaskBuddy: personal tasks in the terminal")]
pub struct Cli {
    /// TaskBuddy home directory (config, data, attachments, log).
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_bulk_delete_and_status_aliases() {
        let cli = Cli::try_parse_from(["tb", "delete", "ab12", "cd34"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { ref ids } if ids.len() == 2));

        let cli = Cli::try_parse_from(["tb", "move", "in-progress", "ab12"]).unwrap();
        assert!(matches!(cli.command, Commands::Move { status: crate::fields::Status::InProgress, .. }));

        let cli = Cli::try_parse_from(["tb", "move", "to-do", "ab12", "cd34"]).unwrap();
        assert!(matches!(cli.command, Commands::Move { status: crate::fields::Status::ToDo, ref ids } if ids.len() == 2));
    }

    #[test]
    fn edit_rejects_image_and_remove_together() {
        let res = Cli::try_parse_from(["tb", "edit", "ab", "--image", "a.png", "--remove-image"]);
        assert!(res.is_err());
    }
}
