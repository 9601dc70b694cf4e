//! Enumerations for TUI state management.

use crate::auth::SessionContext;
use crate::error::{AuthError, FetchError, ServiceError};
use crate::fields::Status;
use crate::service::{BulkOutcome, DropResult};
use crate::task::Task;

/// Which main view is on screen behind any popup.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Screen {
    Login,
    List,
    Board,
}

/// Popups drawn over the current screen. The task form is tracked
/// separately because it owns its own state.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Overlay {
    None,
    Help,
    /// Read-only card details, with the task id.
    Detail(String),
    /// Status picker for the selected rows.
    BulkStatus,
}

/// What a view asks the app to do after handling a key.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Action {
    None,
    /// Open the create form, optionally preselecting a status.
    NewTask(Option<Status>),
    Edit(String),
    Detail(String),
    Delete(String),
    Toggle(String),
    Drop(DropResult),
    OpenBulkStatus,
    BulkDelete(Vec<String>),
    BulkStatus(Vec<String>, Status),
}

/// Results of background work, sent back to the UI thread.
pub enum AppEvent {
    /// A feed snapshot. `generation` identifies the subscription it came
    /// from so snapshots of a feed that was replaced can be ignored.
    Snapshot { generation: u64, tasks: Vec<Task> },
    FeedFailed { generation: u64, error: FetchError },
    SignedIn(Result<SessionContext, AuthError>),
    SignedOut(Result<(), AuthError>),
    /// Create or update finished.
    Saved { editing: bool, result: Result<(), ServiceError> },
    /// A single-task write (delete, toggle, status change) finished.
    TaskWrite { id: String, failure: &'static str, result: Result<(), ServiceError> },
    BulkDone { failure: &'static str, outcome: BulkOutcome },
}
