//! Error types shared across the store, session and task operations.

use crate::validation::ValidationErrors;

/// Failures reported by a document store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The document addressed by an update does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// The backing file could not be parsed.
    #[error("storage file is corrupt: {0}")]
    Corrupt(String),

    /// The live feed could not deliver a snapshot.
    #[error("live feed failed: {0}")]
    Feed(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Failures reported by blob storage.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid blob key '{0}'")]
    InvalidKey(String),

    #[error("blob upload failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("account name must not be empty")]
    EmptyAccount,

    #[error("not signed in")]
    NotSignedIn,

    #[error("session storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The live task feed failed; surfaced as a page-level banner.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to fetch tasks: {source}")]
pub struct FetchError {
    #[from]
    pub source: StoreError,
}

impl FetchError {
    /// Message shown to the user in place of the task views.
    pub const USER_MESSAGE: &'static str = "Failed to load tasks. Please try again later.";
}

/// Failures of a single task operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("attachment upload failed: {0}")]
    Upload(#[from] BlobError),

    /// The record could not be turned into a document body.
    #[error("task could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no task matches '{0}'")]
    UnknownTask(String),

    #[error("'{0}' matches more than one task, use a longer id")]
    AmbiguousTask(String),
}
