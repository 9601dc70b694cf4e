//! Identity provider and the signed-in session.
//!
//! The app reads exactly three things from an identity: the user id, a display
//! name and a photo URL. [`LocalIdentityProvider`] maps account names to
//! stable user ids in `accounts.json` and keeps the active session in
//! `session.json`, so every `tb` invocation sees the same sign-in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Session {
    /// Name to show in the navbar; falls back to the uid.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.uid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignInRequest {
    pub account: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, request: SignInRequest) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Session restored from the provider, if any.
    async fn current(&self) -> Result<Option<Session>, AuthError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Accounts {
    #[serde(default)]
    accounts: BTreeMap<String, Session>,
}

/// File-backed identity provider rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    dir: PathBuf,
}

impl LocalIdentityProvider {
    pub fn new(dir: &Path) -> Self {
        LocalIdentityProvider { dir: dir.to_path_buf() }
    }

    fn accounts_path(&self) -> PathBuf {
        self.dir.join("accounts.json")
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    async fn load_accounts(&self) -> Result<Accounts, AuthError> {
        match tokio::fs::read_to_string(self.accounts_path()).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Accounts::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), AuthError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(value)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, request: SignInRequest) -> Result<Session, AuthError> {
        let account = request.account.trim().to_lowercase();
        if account.is_empty() {
            return Err(AuthError::EmptyAccount);
        }

        let mut accounts = self.load_accounts().await?;
        let session = accounts
            .accounts
            .entry(account.clone())
            .or_insert_with(|| Session {
                uid: uuid::Uuid::new_v4().simple().to_string(),
                display_name: None,
                photo_url: None,
            });
        // Profile details follow the latest sign-in, the uid never changes.
        session.display_name = request
            .display_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| session.display_name.clone())
            .or_else(|| Some(request.account.trim().to_string()));
        if request.photo_url.is_some() {
            session.photo_url = request.photo_url;
        }
        let session = session.clone();

        self.write_json(&self.accounts_path(), &accounts).await?;
        self.write_json(&self.session_path(), &session).await?;
        tracing::info!(uid = %session.uid, account = %account, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(self.session_path()).await {
            Ok(()) => {
                tracing::info!("signed out");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn current(&self) -> Result<Option<Session>, AuthError> {
        match tokio::fs::read_to_string(self.session_path()).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// A live sign-in: the session plus the provider that issued it.
///
/// Created by [`SessionContext::sign_in`] or [`SessionContext::restore`] and
/// ended by [`SessionContext::sign_out`], which consumes it. Not `Clone`, so
/// no copy outlives sign-out.
pub struct SessionContext {
    session: Session,
    provider: Arc<dyn IdentityProvider>,
}

impl SessionContext {
    pub async fn sign_in(provider: Arc<dyn IdentityProvider>, request: SignInRequest) -> Result<Self, AuthError> {
        let session = provider.sign_in(request).await?;
        Ok(SessionContext { session, provider })
    }

    pub async fn restore(provider: Arc<dyn IdentityProvider>) -> Result<Option<Self>, AuthError> {
        Ok(provider.current().await?.map(|session| SessionContext { session, provider }))
    }

    /// Like [`SessionContext::restore`] but failing when nobody is signed in.
    pub async fn require(provider: Arc<dyn IdentityProvider>) -> Result<Self, AuthError> {
        Self::restore(provider).await?.ok_or(AuthError::NotSignedIn)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn uid(&self) -> &str {
        &self.session.uid
    }

    pub async fn sign_out(self) -> Result<(), AuthError> {
        self.provider.sign_out().await
    }
}
